use std::{cmp::Ordering, rc::Rc};

use tracing::{debug, trace};

use crate::{
    ast::{
        BinaryOp, Expr, ExprKind, FunctionDecl, Literal, Program, StaticType, Stmt, StmtKind,
        UnaryOp,
    },
    config::InterpreterConfig,
    diagnostics::{error, error_at, DiagnosticKind, Result, SourceSpan, SprigError},
    environment::{Callable, Environment, EnvironmentRef},
    host::{FromValue, HostFunction},
    parser,
    stack::ensure_sufficient_stack,
    value::{modulo, Value},
};

/// Parses `source` and evaluates it against `env`, returning the program's
/// final value.
pub fn execute(source: &str, env: &EnvironmentRef) -> Result<Value> {
    let program = parser::parse_program(source)?;
    execute_program(&program, env)
}

pub fn execute_program(program: &Program, env: &EnvironmentRef) -> Result<Value> {
    debug!(statements = program.items.len(), "executing program");
    let value = Evaluator::new(Rc::clone(env)).run(program)?;
    debug!(result = %value, "program finished");
    Ok(value)
}

/// Calls `name` in `env` with already evaluated arguments, dispatching the
/// same way a call written in a script would.
pub fn call_function(env: &EnvironmentRef, name: &str, args: &[Value]) -> Result<Value> {
    Evaluator::new(Rc::clone(env)).call(name, args.to_vec(), SourceSpan::default())
}

/// A root environment together with the settings it was created from.
pub struct Interpreter {
    env: EnvironmentRef,
    config: InterpreterConfig,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        let env = Environment::with_config(&config);
        Self { env, config }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn environment(&self) -> &EnvironmentRef {
        &self.env
    }

    pub fn eval_source(&self, source: &str) -> Result<Value> {
        execute(source, &self.env)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        call_function(&self.env, name, args)
    }

    pub fn register<Args, F>(&self, name: &str, function: F) -> Result<()>
    where
        F: HostFunction<Args>,
    {
        self.env.borrow().register(name, function)
    }

    pub fn set_print_handler(&self, handler: impl FnMut(&str) + 'static) {
        self.env.borrow().set_print_handler(handler);
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a statement: a value, or a transfer to an enclosing loop,
/// call frame or program.
#[derive(Debug)]
enum Flow {
    Normal(Value),
    Return(Value),
    Break,
    Continue,
}

struct Evaluator {
    env: EnvironmentRef,
}

impl Evaluator {
    fn new(env: EnvironmentRef) -> Self {
        Self { env }
    }

    fn run(&mut self, program: &Program) -> Result<Value> {
        match self.execute_block(&program.items)? {
            Flow::Normal(value) | Flow::Return(value) => Ok(value),
            Flow::Break => Err(loop_control_escape("break", "the program")),
            Flow::Continue => Err(loop_control_escape("continue", "the program")),
        }
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<Flow> {
        let mut last_value = Value::Null;
        for stmt in statements {
            match self.execute_statement(stmt)? {
                Flow::Normal(value) => last_value = value,
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal(last_value))
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::VarDecl { name, value } | StmtKind::Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.env.borrow_mut().set(name, value.clone(), stmt.span)?;
                Ok(Flow::Normal(value))
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let taken = if self.evaluate(condition)?.expect_bool(condition.span)? {
                    Some(then_branch.as_slice())
                } else {
                    else_branch.as_deref()
                };
                match taken {
                    Some(branch) => match self.execute_block(branch)? {
                        Flow::Normal(Value::Void) => Ok(Flow::Normal(Value::Null)),
                        flow => Ok(flow),
                    },
                    None => Ok(Flow::Normal(Value::Null)),
                }
            }
            StmtKind::While { condition, body } => {
                while self.evaluate(condition)?.expect_bool(condition.span)? {
                    match self.execute_block(body)? {
                        Flow::Normal(_) | Flow::Continue => {}
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                    }
                }
                Ok(Flow::Normal(Value::Null))
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Expr(expr) => Ok(Flow::Normal(self.evaluate(expr)?)),
        }
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        ensure_sufficient_stack(|| match &expr.kind {
            ExprKind::Literal(literal) => Ok(self.literal(literal)),
            ExprKind::Variable(name) => Environment::get(&self.env, name, expr.span),
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right, expr.span),
            ExprKind::Unary { op, expr: operand } => {
                let value = self.evaluate(operand)?;
                match op {
                    UnaryOp::Negate => Ok(Value::Number(-value.expect_number(operand.span)?)),
                    UnaryOp::Not => Ok(Value::Bool(!value.expect_bool(operand.span)?)),
                }
            }
            ExprKind::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg)?);
                }
                self.call(name, values, expr.span)
            }
            ExprKind::Function(decl) => {
                debug!(
                    name = %decl.name,
                    params = decl.params.len(),
                    has_return = decl.has_return,
                    "declare function"
                );
                self.env.borrow().declare_function(Rc::clone(decl));
                Ok(Value::Null)
            }
        })
    }

    fn literal(&self, literal: &Literal) -> Value {
        match literal {
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        span: SourceSpan,
    ) -> Result<Value> {
        use BinaryOp::*;
        let lhs = self.evaluate(left)?;
        if let And | Or = op {
            let decided = lhs.expect_bool(left.span)?;
            if decided == (op == Or) {
                return Ok(Value::Bool(decided));
            }
        }
        let rhs = self.evaluate(right)?;
        match op {
            Add => self.numeric(&lhs, left, &rhs, right, |a, b| a + b),
            Sub => self.numeric(&lhs, left, &rhs, right, |a, b| a - b),
            Mul => self.numeric(&lhs, left, &rhs, right, |a, b| a * b),
            Div => self.numeric(&lhs, left, &rhs, right, |a, b| a / b),
            Mod => {
                let a = lhs.expect_number(left.span)?;
                let b = rhs.expect_number(right.span)?;
                Ok(Value::Number(modulo(a, b, span)?))
            }
            Equal => Ok(Value::Bool(self.equal(&lhs, left, &rhs, right, span)?)),
            NotEqual => Ok(Value::Bool(!self.equal(&lhs, left, &rhs, right, span)?)),
            Less => Ok(comparison(&lhs, &rhs, |o| o == Ordering::Less)),
            LessEqual => Ok(comparison(&lhs, &rhs, |o| o != Ordering::Greater)),
            Greater => Ok(comparison(&lhs, &rhs, |o| o == Ordering::Greater)),
            GreaterEqual => Ok(comparison(&lhs, &rhs, |o| o != Ordering::Less)),
            And | Or => Ok(Value::Bool(rhs.expect_bool(right.span)?)),
        }
    }

    fn numeric<F>(
        &self,
        lhs: &Value,
        left: &Expr,
        rhs: &Value,
        right: &Expr,
        func: F,
    ) -> Result<Value>
    where
        F: Fn(f32, f32) -> f32,
    {
        let a = lhs.expect_number(left.span)?;
        let b = rhs.expect_number(right.span)?;
        Ok(Value::Number(func(a, b)))
    }

    /// Operands of known type were already checked by the parser; anything
    /// dynamic is checked here before comparing.
    fn equal(
        &self,
        lhs: &Value,
        left: &Expr,
        rhs: &Value,
        right: &Expr,
        span: SourceSpan,
    ) -> Result<bool> {
        let statically_typed =
            left.static_type() != StaticType::Dynamic && right.static_type() != StaticType::Dynamic;
        if statically_typed {
            lhs.static_eq(rhs, span)
        } else {
            lhs.dynamic_eq(rhs, span)
        }
    }

    fn call(&mut self, name: &str, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        let callable = self.env.borrow().function(name);
        match callable {
            Some(Callable::Native(function)) => {
                trace!(name, args = args.len(), "call host function");
                let _guard = self.env.borrow().enter_call(span)?;
                function.call(&args).map_err(|err| err.or_span(span))
            }
            Some(Callable::Scripted(decl)) => self.call_declared(&decl, args, span),
            None => self.call_math(name, &args, span),
        }
    }

    fn call_declared(
        &mut self,
        decl: &FunctionDecl,
        args: Vec<Value>,
        span: SourceSpan,
    ) -> Result<Value> {
        if args.len() != decl.params.len() {
            return Err(error_at(
                DiagnosticKind::Arity,
                format!(
                    "function `{}` expected {} argument(s) but received {}",
                    decl.name,
                    decl.params.len(),
                    args.len()
                ),
                span,
            ));
        }
        trace!(name = %decl.name, args = args.len(), "call declared function");
        let _guard = self.env.borrow().enter_call(span)?;
        let frame = Environment::child(&self.env);
        {
            let mut scope = frame.borrow_mut();
            for (param, value) in decl.params.iter().zip(args) {
                scope.set(param, value, span)?;
            }
        }

        let previous = std::mem::replace(&mut self.env, frame);
        let flow = self.execute_block(&decl.body);
        self.env = previous;

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal(value) if decl.has_return => Ok(value),
            Flow::Normal(_) => Ok(Value::Void),
            Flow::Break => Err(loop_control_escape("break", &format!("function `{}`", decl.name))),
            Flow::Continue => Err(loop_control_escape(
                "continue",
                &format!("function `{}`", decl.name),
            )),
        }
    }

    fn call_math(&mut self, name: &str, args: &[Value], span: SourceSpan) -> Result<Value> {
        let provider = self.env.borrow().math_provider();
        let Some(function) = provider.lookup(name, args.len()) else {
            return Err(error_at(
                DiagnosticKind::UnresolvedName,
                format!(
                    "function `{name}` with {} argument(s) is not supported",
                    args.len()
                ),
                span,
            ));
        };
        trace!(name, arity = function.arity, "math provider fallback");
        let mut floats = Vec::with_capacity(args.len());
        for arg in args {
            floats.push(f32::from_value(arg).map_err(|err| err.or_span(span))?);
        }
        Ok(Value::Number(function.call(&floats)))
    }
}

fn comparison(lhs: &Value, rhs: &Value, accept: impl Fn(Ordering) -> bool) -> Value {
    Value::Bool(lhs.compare(rhs).map(accept).unwrap_or(false))
}

fn loop_control_escape(keyword: &str, boundary: &str) -> SprigError {
    error(
        DiagnosticKind::ControlFlow,
        format!("`{keyword}` outside of a loop reached {boundary}"),
    )
}
