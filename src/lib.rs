//! Sprig: a small embeddable scripting language.
//!
//! Source text is tokenized by [`lexer`], parsed into an AST by [`parser`]
//! and evaluated by [`runtime`] against an [`Environment`]. Hosts register
//! native closures on the root environment and fall back to a
//! [`MathProvider`] for calls to unregistered names.

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod environment;
pub mod host;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod stack;
pub mod stdlib;
pub mod value;

pub use config::InterpreterConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Position, Result, SourceSpan, SprigError};
pub use environment::{Environment, EnvironmentRef};
pub use host::{
    FromValue, HostFunction, IntoValue, MathFunction, MathProvider, NativeFunction, ParamType,
    StdMath,
};
pub use repl::Repl;
pub use runtime::{call_function, execute, Interpreter};
pub use value::Value;
