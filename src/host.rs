//! Host interop: native functions with typed parameters, and the float math
//! library used when a call names no registered function.

use std::{fmt, rc::Rc};

use crate::{
    diagnostics::{error, DiagnosticKind, Result, SprigError},
    value::Value,
};

/// Declared type of a native parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Float,
    Integer,
    Bool,
    String,
    Any,
}

impl ParamType {
    pub fn label(self) -> &'static str {
        match self {
            ParamType::Float => "float",
            ParamType::Integer => "integer",
            ParamType::Bool => "bool",
            ParamType::String => "string",
            ParamType::Any => "any",
        }
    }
}

fn conversion_error(value: &Value, target: ParamType) -> SprigError {
    error(
        DiagnosticKind::Conversion,
        format!(
            "cannot convert {} value `{value}` to {}",
            value.type_name(),
            target.label()
        ),
    )
}

/// Conversion from a script value into a native argument.
pub trait FromValue: Sized {
    const PARAM: ParamType;

    fn from_value(value: &Value) -> Result<Self>;
}

impl FromValue for f32 {
    const PARAM: ParamType = ParamType::Float;

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s
                .trim()
                .parse::<f32>()
                .map_err(|_| conversion_error(value, Self::PARAM)),
            _ => Err(conversion_error(value, Self::PARAM)),
        }
    }
}

impl FromValue for f64 {
    const PARAM: ParamType = ParamType::Float;

    fn from_value(value: &Value) -> Result<Self> {
        f32::from_value(value).map(f64::from)
    }
}

impl FromValue for i64 {
    const PARAM: ParamType = ParamType::Integer;

    fn from_value(value: &Value) -> Result<Self> {
        let number = f32::from_value(value).map_err(|_| conversion_error(value, Self::PARAM))?;
        Ok(number.round_ties_even() as i64)
    }
}

impl FromValue for i32 {
    const PARAM: ParamType = ParamType::Integer;

    fn from_value(value: &Value) -> Result<Self> {
        let number = f32::from_value(value).map_err(|_| conversion_error(value, Self::PARAM))?;
        Ok(number.round_ties_even() as i32)
    }
}

impl FromValue for bool {
    const PARAM: ParamType = ParamType::Bool;

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(conversion_error(value, Self::PARAM)),
        }
    }
}

impl FromValue for String {
    const PARAM: ParamType = ParamType::String;

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Number(_) | Value::String(_) | Value::Bool(_) => Ok(value.to_string()),
            _ => Err(conversion_error(value, Self::PARAM)),
        }
    }
}

impl FromValue for Value {
    const PARAM: ParamType = ParamType::Any;

    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

/// Conversion from a native return value into a script value.
pub trait IntoValue {
    fn into_value(self) -> Result<Value>;
}

macro_rules! into_number {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Result<Value> {
                    Ok(Value::Number(self as f32))
                }
            }
        )*
    };
}

into_number!(f32, f64, i32, i64);

impl IntoValue for bool {
    fn into_value(self) -> Result<Value> {
        Ok(Value::Bool(self))
    }
}

impl IntoValue for String {
    fn into_value(self) -> Result<Value> {
        Ok(Value::String(self))
    }
}

impl IntoValue for &'static str {
    fn into_value(self) -> Result<Value> {
        Ok(Value::string(self))
    }
}

impl IntoValue for () {
    fn into_value(self) -> Result<Value> {
        Ok(Value::Void)
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Result<Value> {
        Ok(self)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Result<Value> {
        match self {
            Some(value) => value.into_value(),
            None => Ok(Value::Null),
        }
    }
}

impl<T: IntoValue> IntoValue for std::result::Result<T, SprigError> {
    fn into_value(self) -> Result<Value> {
        self?.into_value()
    }
}

type Callback = dyn Fn(&[Value]) -> Result<Value>;

/// A host function entry: declared parameter types plus a callback that
/// receives arguments already checked for count.
#[derive(Clone)]
pub struct NativeFunction {
    name: String,
    params: Option<Vec<ParamType>>,
    callback: Rc<Callback>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        params: Vec<ParamType>,
        callback: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            params: Some(params),
            callback: Rc::new(callback),
        }
    }

    /// A function accepting any number of arguments of any type.
    pub fn variadic(
        name: impl Into<String>,
        callback: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            params: None,
            callback: Rc::new(callback),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` for variadic functions.
    pub fn arity(&self) -> Option<usize> {
        self.params.as_ref().map(Vec::len)
    }

    pub fn params(&self) -> &[ParamType] {
        self.params.as_deref().unwrap_or(&[])
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        if let Some(arity) = self.arity() {
            if args.len() != arity {
                return Err(error(
                    DiagnosticKind::Arity,
                    format!(
                        "function `{}` expected {arity} argument(s) but received {}",
                        self.name,
                        args.len()
                    ),
                ));
            }
        }
        (self.callback)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// Closures that can be registered as host functions. Implemented for
/// `Fn` closures of up to four [`FromValue`] parameters returning an
/// [`IntoValue`].
pub trait HostFunction<Args> {
    fn into_native(self, name: &str) -> NativeFunction;
}

fn argument<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a Value> {
    args.get(index).ok_or_else(|| {
        error(
            DiagnosticKind::Arity,
            format!("function `{name}` is missing argument {}", index + 1),
        )
    })
}

macro_rules! impl_host_function {
    ($($arg:ident => $idx:tt),*) => {
        impl<F, R, $($arg,)*> HostFunction<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + 'static,
            R: IntoValue,
            $($arg: FromValue,)*
        {
            #[allow(non_snake_case, unused_variables)]
            fn into_native(self, name: &str) -> NativeFunction {
                let owner = name.to_string();
                NativeFunction::new(name, vec![$($arg::PARAM),*], move |args: &[Value]| {
                    $(
                        let $arg = $arg::from_value(argument(args, $idx, &owner)?).map_err(|err| {
                            match err {
                                SprigError::Diagnostic(diag) => SprigError::from(diag.with_note(
                                    format!("while converting argument {} of `{}`", $idx + 1, owner),
                                )),
                                other => other,
                            }
                        })?;
                    )*
                    (self)($($arg),*).into_value()
                })
            }
        }
    };
}

impl_host_function!();
impl_host_function!(A => 0);
impl_host_function!(A => 0, B => 1);
impl_host_function!(A => 0, B => 1, C => 2);
impl_host_function!(A => 0, B => 1, C => 2, D => 3);

/// A float-only library function.
#[derive(Clone, Copy)]
pub struct MathFunction {
    pub name: &'static str,
    pub arity: usize,
    eval: fn(&[f32]) -> f32,
}

impl MathFunction {
    pub const fn new(name: &'static str, arity: usize, eval: fn(&[f32]) -> f32) -> Self {
        Self { name, arity, eval }
    }

    /// `args` must hold exactly `arity` values.
    pub fn call(&self, args: &[f32]) -> f32 {
        debug_assert_eq!(args.len(), self.arity);
        (self.eval)(args)
    }
}

impl fmt::Debug for MathFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// Fallback library consulted by exact name and arity.
pub trait MathProvider: fmt::Debug {
    fn lookup(&self, name: &str, arity: usize) -> Option<MathFunction>;
}

/// The standard single-precision math library.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdMath;

const STD_MATH: &[MathFunction] = &[
    MathFunction::new("Abs", 1, |a| a[0].abs()),
    MathFunction::new("Acos", 1, |a| a[0].acos()),
    MathFunction::new("Acosh", 1, |a| a[0].acosh()),
    MathFunction::new("Asin", 1, |a| a[0].asin()),
    MathFunction::new("Asinh", 1, |a| a[0].asinh()),
    MathFunction::new("Atan", 1, |a| a[0].atan()),
    MathFunction::new("Atan2", 2, |a| a[0].atan2(a[1])),
    MathFunction::new("Atanh", 1, |a| a[0].atanh()),
    MathFunction::new("Cbrt", 1, |a| a[0].cbrt()),
    MathFunction::new("Ceiling", 1, |a| a[0].ceil()),
    MathFunction::new("CopySign", 2, |a| a[0].copysign(a[1])),
    MathFunction::new("Cos", 1, |a| a[0].cos()),
    MathFunction::new("Cosh", 1, |a| a[0].cosh()),
    MathFunction::new("Exp", 1, |a| a[0].exp()),
    MathFunction::new("Floor", 1, |a| a[0].floor()),
    MathFunction::new("FusedMultiplyAdd", 3, |a| a[0].mul_add(a[1], a[2])),
    MathFunction::new("Log", 1, |a| a[0].ln()),
    MathFunction::new("Log", 2, |a| a[0].log(a[1])),
    MathFunction::new("Log10", 1, |a| a[0].log10()),
    MathFunction::new("Log2", 1, |a| a[0].log2()),
    MathFunction::new("Max", 2, |a| a[0].max(a[1])),
    MathFunction::new("Min", 2, |a| a[0].min(a[1])),
    MathFunction::new("Pow", 2, |a| a[0].powf(a[1])),
    MathFunction::new("Round", 1, |a| a[0].round_ties_even()),
    MathFunction::new("Sign", 1, |a| sign(a[0])),
    MathFunction::new("Sin", 1, |a| a[0].sin()),
    MathFunction::new("Sinh", 1, |a| a[0].sinh()),
    MathFunction::new("Sqrt", 1, |a| a[0].sqrt()),
    MathFunction::new("Tan", 1, |a| a[0].tan()),
    MathFunction::new("Tanh", 1, |a| a[0].tanh()),
    MathFunction::new("Truncate", 1, |a| a[0].trunc()),
];

fn sign(value: f32) -> f32 {
    if value.is_nan() {
        f32::NAN
    } else if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl StdMath {
    pub fn functions(&self) -> &'static [MathFunction] {
        STD_MATH
    }
}

impl MathProvider for StdMath {
    fn lookup(&self, name: &str, arity: usize) -> Option<MathFunction> {
        STD_MATH
            .iter()
            .find(|f| f.name == name && f.arity == arity)
            .copied()
    }
}
