use std::{cmp::Ordering, fmt};

use crate::diagnostics::{error_at, DiagnosticKind, Result, SourceSpan, SprigError};

/// A script value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f32),
    String(String),
    Bool(bool),
    /// Result of calling a function without `return`. Never stored in a variable.
    Void,
    Null,
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    /// Type label used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "float",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Void => "void",
            Value::Null => "null",
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn expect_number(&self, span: SourceSpan) -> Result<f32> {
        self.as_number().ok_or_else(|| {
            error_at(
                DiagnosticKind::Conversion,
                format!("cannot convert {} to float", self.type_name()),
                span,
            )
        })
    }

    pub fn expect_bool(&self, span: SourceSpan) -> Result<bool> {
        self.as_bool().ok_or_else(|| {
            error_at(
                DiagnosticKind::Conversion,
                format!("cannot convert {} to bool", self.type_name()),
                span,
            )
        })
    }

    /// Ordering used by `<`, `<=`, `>`, `>=`: numeric when both sides are
    /// numbers, otherwise by display form. `None` only for NaN.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            _ => Some(self.to_string().cmp(&other.to_string())),
        }
    }

    /// Equality for operands whose types were not known before evaluation.
    /// Both sides must carry the same concrete type; values are then
    /// compared through their display forms.
    pub fn dynamic_eq(&self, other: &Value, span: SourceSpan) -> Result<bool> {
        if std::mem::discriminant(self) != std::mem::discriminant(other) {
            return Err(type_mismatch(self.type_name(), other.type_name(), span));
        }
        Ok(self.to_string() == other.to_string())
    }

    /// Equality for operands of statically known, identical types.
    pub fn static_eq(&self, other: &Value, span: SourceSpan) -> Result<bool> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Ok(a == b),
            (Value::String(a), Value::String(b)) => Ok(a == b),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            _ => self.dynamic_eq(other, span),
        }
    }
}

fn type_mismatch(left: &str, right: &str, span: SourceSpan) -> SprigError {
    error_at(
        DiagnosticKind::TypeMismatch,
        format!("Type mismatch: cannot compare {left} with {right}"),
        span,
    )
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Void => f.write_str("void"),
            Value::Null => f.write_str("null"),
        }
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

/// Converts a float the way `%` sees its operands: truncated, saturating.
pub(crate) fn truncate_to_int(value: f32) -> i32 {
    value.trunc() as i32
}

/// Truncating integer remainder, result carries the dividend's sign.
pub(crate) fn modulo(left: f32, right: f32, span: SourceSpan) -> Result<f32> {
    let divisor = truncate_to_int(right);
    if divisor == 0 {
        return Err(error_at(
            DiagnosticKind::Arithmetic,
            "attempted to divide by zero in `%`",
            span,
        ));
    }
    Ok(truncate_to_int(left).wrapping_rem(divisor) as f32)
}

pub(crate) fn void_assignment(name: &str, span: SourceSpan) -> SprigError {
    error_at(
        DiagnosticKind::VoidMisuse,
        format!("Cannot assign void value to variable `{name}`; the function does not return a value"),
        span,
    )
}
