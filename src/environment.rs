use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use indexmap::IndexMap;
use tracing::trace;

use crate::{
    ast::FunctionDecl,
    config::InterpreterConfig,
    diagnostics::{error, error_at, DiagnosticKind, Result, SourceSpan},
    host::{HostFunction, MathProvider, NativeFunction},
    value::{void_assignment, Value},
};

pub type EnvironmentRef = Rc<RefCell<Environment>>;

#[allow(clippy::approx_constant)]
pub const PI: f32 = 3.1415926;
#[allow(clippy::approx_constant)]
pub const E: f32 = 2.71828;

/// An entry of the root function table.
#[derive(Debug, Clone)]
pub enum Callable {
    Native(Rc<NativeFunction>),
    Scripted(Rc<FunctionDecl>),
}

/// Receives each line produced by `print`.
pub type PrintHandler = Rc<RefCell<Box<dyn FnMut(&str)>>>;

/// State owned by a root environment and referenced by all of its children.
struct Shared {
    functions: RefCell<IndexMap<String, Callable>>,
    print: PrintHandler,
    math: Rc<dyn MathProvider>,
    max_call_depth: usize,
    depth: Cell<usize>,
}

/// A scope: local variables plus a handle on the root's shared state.
/// Children resolve variables locally, then in the root, never further.
pub struct Environment {
    variables: IndexMap<String, Value>,
    root: Option<EnvironmentRef>,
    shared: Rc<Shared>,
}

impl Environment {
    /// A root environment with default settings.
    pub fn new() -> EnvironmentRef {
        Self::with_config(&InterpreterConfig::default())
    }

    pub fn with_config(config: &InterpreterConfig) -> EnvironmentRef {
        let stdout: Box<dyn FnMut(&str)> = Box::new(|line: &str| println!("{line}"));
        let shared = Shared {
            functions: RefCell::new(IndexMap::new()),
            print: Rc::new(RefCell::new(stdout)),
            math: config.math_provider.clone(),
            max_call_depth: config.max_call_depth,
            depth: Cell::new(0),
        };
        let mut variables = IndexMap::new();
        variables.insert("PI".to_string(), Value::Number(PI));
        variables.insert("E".to_string(), Value::Number(E));
        let env = Rc::new(RefCell::new(Self {
            variables,
            root: None,
            shared: Rc::new(shared),
        }));
        crate::stdlib::install(&env);
        env
    }

    /// A call frame whose variable fallback is the root of `env`.
    pub fn child(env: &EnvironmentRef) -> EnvironmentRef {
        let parent = env.borrow();
        let root = parent.root.clone().unwrap_or_else(|| env.clone());
        Rc::new(RefCell::new(Self {
            variables: IndexMap::new(),
            root: Some(root),
            shared: parent.shared.clone(),
        }))
    }

    pub fn is_root(&self) -> bool {
        self.root.is_none()
    }

    /// Reads `name` from this scope, then from the root scope.
    pub fn get(env: &EnvironmentRef, name: &str, span: SourceSpan) -> Result<Value> {
        let scope = env.borrow();
        if let Some(value) = scope.variables.get(name) {
            return Ok(value.clone());
        }
        if let Some(root) = &scope.root {
            if let Some(value) = root.borrow().variables.get(name) {
                return Ok(value.clone());
            }
        }
        Err(error_at(
            DiagnosticKind::UnresolvedName,
            format!("undefined variable `{name}`"),
            span,
        ))
    }

    /// Binds `name` in this scope. Ancestors are never written.
    pub fn set(&mut self, name: &str, value: Value, span: SourceSpan) -> Result<()> {
        if value.is_void() {
            return Err(void_assignment(name, span));
        }
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    /// Host-side variable write, without a source location.
    pub fn define(&mut self, name: &str, value: Value) -> Result<()> {
        self.set(name, value, SourceSpan::default())
    }

    pub fn local(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.shared.functions.borrow().contains_key(name)
    }

    pub fn function(&self, name: &str) -> Option<Callable> {
        self.shared.functions.borrow().get(name).cloned()
    }

    pub fn function_names(&self) -> Vec<String> {
        self.shared.functions.borrow().keys().cloned().collect()
    }

    /// Registers a typed host closure. Only a root environment may register.
    pub fn register<Args, F>(&self, name: &str, function: F) -> Result<()>
    where
        F: HostFunction<Args>,
    {
        self.register_native(function.into_native(name))
    }

    pub fn register_native(&self, function: NativeFunction) -> Result<()> {
        if !self.is_root() {
            return Err(error(
                DiagnosticKind::Registration,
                format!(
                    "cannot register function `{}` from a child environment",
                    function.name()
                ),
            ));
        }
        trace!(name = function.name(), arity = ?function.arity(), "register host function");
        self.define_function(
            function.name().to_string(),
            Callable::Native(Rc::new(function)),
        );
        Ok(())
    }

    /// Installs a scripted function into the root table, replacing any
    /// previous entry of the same name.
    pub(crate) fn declare_function(&self, decl: Rc<FunctionDecl>) {
        self.define_function(decl.name.clone(), Callable::Scripted(decl));
    }

    pub(crate) fn define_function(&self, name: String, callable: Callable) {
        self.shared.functions.borrow_mut().insert(name, callable);
    }

    pub fn set_print_handler(&self, handler: impl FnMut(&str) + 'static) {
        *self.shared.print.borrow_mut() = Box::new(handler);
    }

    pub(crate) fn print_handler(&self) -> PrintHandler {
        self.shared.print.clone()
    }

    pub fn math_provider(&self) -> Rc<dyn MathProvider> {
        self.shared.math.clone()
    }

    pub fn max_call_depth(&self) -> usize {
        self.shared.max_call_depth
    }

    /// Counts one more active call; the returned guard releases it on drop.
    pub(crate) fn enter_call(&self, span: SourceSpan) -> Result<CallGuard> {
        let depth = self.shared.depth.get();
        if depth >= self.shared.max_call_depth {
            return Err(error_at(
                DiagnosticKind::Resource,
                format!(
                    "maximum call depth of {} exceeded",
                    self.shared.max_call_depth
                ),
                span,
            ));
        }
        self.shared.depth.set(depth + 1);
        Ok(CallGuard {
            shared: self.shared.clone(),
        })
    }
}

pub(crate) struct CallGuard {
    shared: Rc<Shared>,
}

impl std::fmt::Debug for CallGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallGuard").finish_non_exhaustive()
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        let depth = self.shared.depth.get();
        self.shared.depth.set(depth.saturating_sub(1));
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("root", &self.is_root())
            .field("variables", &self.variables)
            .field("functions", &self.function_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPAN: SourceSpan = SourceSpan::new(0, 0);

    #[test]
    fn root_is_seeded_with_constants() {
        let env = Environment::new();
        assert_eq!(Environment::get(&env, "PI", SPAN).unwrap(), Value::Number(PI));
        assert_eq!(Environment::get(&env, "E", SPAN).unwrap(), Value::Number(E));
        assert!(env.borrow().is_root());
    }

    #[test]
    fn child_reads_root_but_writes_locally() {
        let root = Environment::new();
        root.borrow_mut().define("x", Value::Number(1.0)).unwrap();
        let child = Environment::child(&root);
        assert_eq!(Environment::get(&child, "x", SPAN).unwrap(), Value::Number(1.0));

        child.borrow_mut().define("x", Value::Number(2.0)).unwrap();
        assert_eq!(Environment::get(&child, "x", SPAN).unwrap(), Value::Number(2.0));
        assert_eq!(Environment::get(&root, "x", SPAN).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn lookup_skips_intermediate_frames() {
        let root = Environment::new();
        let outer = Environment::child(&root);
        outer.borrow_mut().define("local", Value::Bool(true)).unwrap();
        let inner = Environment::child(&outer);
        let err = Environment::get(&inner, "local", SPAN).unwrap_err();
        assert_eq!(err.kind(), Some(DiagnosticKind::UnresolvedName));
    }

    #[test]
    fn void_is_rejected_on_write() {
        let env = Environment::new();
        let err = env.borrow_mut().define("v", Value::Void).unwrap_err();
        assert_eq!(err.kind(), Some(DiagnosticKind::VoidMisuse));
        assert!(env.borrow().local("v").is_none());
    }

    #[test]
    fn registration_requires_root() {
        let root = Environment::new();
        let child = Environment::child(&root);
        let err = child
            .borrow()
            .register("twice", |n: f32| n * 2.0)
            .unwrap_err();
        assert_eq!(err.kind(), Some(DiagnosticKind::Registration));

        root.borrow().register("twice", |n: f32| n * 2.0).unwrap();
        assert!(child.borrow().has_function("twice"));
    }

    #[test]
    fn call_depth_is_released_by_guard() {
        let config = InterpreterConfig {
            max_call_depth: 1,
            ..InterpreterConfig::default()
        };
        let env = Environment::with_config(&config);
        {
            let _guard = env.borrow().enter_call(SPAN).unwrap();
            let err = env.borrow().enter_call(SPAN).unwrap_err();
            assert_eq!(err.kind(), Some(DiagnosticKind::Resource));
        }
        assert!(env.borrow().enter_call(SPAN).is_ok());
    }
}
