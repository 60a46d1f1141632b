use std::rc::Rc;

use crate::diagnostics::SourceSpan;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f32),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

/// Type of an expression as far as it is known before evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticType {
    Number,
    String,
    Bool,
    Dynamic,
}

impl StaticType {
    pub fn label(self) -> &'static str {
        match self {
            StaticType::Number => "float",
            StaticType::String => "string",
            StaticType::Bool => "bool",
            StaticType::Dynamic => "dynamic",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    Variable(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Function(Rc<FunctionDecl>),
}

impl Expr {
    pub fn static_type(&self) -> StaticType {
        match &self.kind {
            ExprKind::Literal(Literal::Number(_)) => StaticType::Number,
            ExprKind::Literal(Literal::String(_)) => StaticType::String,
            ExprKind::Literal(Literal::Bool(_)) => StaticType::Bool,
            ExprKind::Literal(Literal::Null) => StaticType::Dynamic,
            ExprKind::Binary { op, .. } => match op {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                    StaticType::Number
                }
                _ => StaticType::Bool,
            },
            ExprKind::Unary { op, .. } => match op {
                UnaryOp::Negate => StaticType::Number,
                UnaryOp::Not => StaticType::Bool,
            },
            ExprKind::Variable(_) | ExprKind::Call { .. } | ExprKind::Function(_) => {
                StaticType::Dynamic
            }
        }
    }
}

/// A parsed function declaration. `has_return` is fixed at parse time and
/// decides whether calls capture `return` or always yield `Void`.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub has_return: bool,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    VarDecl {
        name: String,
        value: Expr,
    },
    Assign {
        name: String,
        value: Expr,
    },
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub items: Vec<Stmt>,
}
