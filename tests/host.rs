use std::rc::Rc;

use pretty_assertions::assert_eq;
use sprig::{
    call_function, execute, DiagnosticKind, Environment, Interpreter, InterpreterConfig,
    MathFunction, MathProvider, Result, SprigError, Value,
};

fn number(n: f32) -> Value {
    Value::Number(n)
}

fn host_failure(message: &str) -> SprigError {
    SprigError::from(sprig::Diagnostic::new(DiagnosticKind::Conversion, message))
}

#[test]
fn registers_closures_of_each_arity() {
    let interpreter = Interpreter::new();
    interpreter.register("Answer", || 42).unwrap();
    interpreter.register("Twice", |n: f32| n * 2.0).unwrap();
    interpreter.register("Sub", |a: f32, b: f32| a - b).unwrap();
    interpreter
        .register("Clamp", |v: f32, lo: f32, hi: f32| v.max(lo).min(hi))
        .unwrap();
    interpreter
        .register("Join4", |a: String, b: String, c: String, d: String| {
            format!("{a}{b}{c}{d}")
        })
        .unwrap();

    assert_eq!(interpreter.eval_source("Answer()").unwrap(), number(42.0));
    assert_eq!(interpreter.eval_source("Twice(4)").unwrap(), number(8.0));
    assert_eq!(interpreter.eval_source("Sub(10, 4)").unwrap(), number(6.0));
    assert_eq!(interpreter.eval_source("Clamp(15, 0, 10)").unwrap(), number(10.0));
    assert_eq!(
        interpreter
            .eval_source("Join4(\"a\", 1, true, \"z\")")
            .unwrap(),
        Value::string("a1truez")
    );
}

#[test]
fn integer_parameters_round_half_to_even() {
    let interpreter = Interpreter::new();
    interpreter.register("Half", |n: i32| n / 2).unwrap();
    assert_eq!(interpreter.eval_source("Half(9)").unwrap(), number(4.0));
    assert_eq!(interpreter.eval_source("Half(2.5)").unwrap(), number(1.0));
    assert_eq!(interpreter.eval_source("Half(3.5)").unwrap(), number(2.0));
}

#[test]
fn mixed_parameter_types() {
    let interpreter = Interpreter::new();
    interpreter
        .register("Describe", |count: i64, label: String, loud: bool, extra: Value| {
            let text = format!("{count} {label} ({})", extra.type_name());
            if loud {
                text.to_uppercase()
            } else {
                text
            }
        })
        .unwrap();
    assert_eq!(
        interpreter
            .eval_source("Describe(3, \"apples\", true, null)")
            .unwrap(),
        Value::string("3 APPLES (NULL)")
    );
}

#[test]
fn unit_return_maps_to_void() {
    let interpreter = Interpreter::new();
    interpreter.register("Ignore", |_: Value| ()).unwrap();
    assert_eq!(interpreter.eval_source("Ignore(1)").unwrap(), Value::Void);
    let err = interpreter.eval_source("var x = Ignore(1)").unwrap_err();
    assert_eq!(err.kind(), Some(DiagnosticKind::VoidMisuse));
}

#[test]
fn null_argument_is_conversion_error() {
    let interpreter = Interpreter::new();
    interpreter.register("Twice", |n: f32| n * 2.0).unwrap();
    let err = interpreter.eval_source("Twice(null)").unwrap_err();
    assert_eq!(err.kind(), Some(DiagnosticKind::Conversion));
    assert!(err.diagnostic().unwrap().span.is_some());
}

#[test]
fn bool_and_number_arguments_coerce_to_declared_slots() {
    let interpreter = Interpreter::new();
    interpreter.register("Twice", |n: f32| n * 2.0).unwrap();
    interpreter.register("Flip", |b: bool| !b).unwrap();
    assert_eq!(interpreter.eval_source("Twice(true)").unwrap(), number(2.0));
    assert_eq!(interpreter.eval_source("Twice(\"1.5\")").unwrap(), number(3.0));
    assert_eq!(interpreter.eval_source("Flip(0)").unwrap(), Value::Bool(true));
    assert_eq!(interpreter.eval_source("Flip(3)").unwrap(), Value::Bool(false));
}

#[test]
fn host_argument_count_is_checked() {
    let interpreter = Interpreter::new();
    interpreter.register("Sub", |a: f32, b: f32| a - b).unwrap();
    let err = interpreter.eval_source("Sub(1)").unwrap_err();
    assert_eq!(err.kind(), Some(DiagnosticKind::Arity));
}

#[test]
fn fallible_host_functions_propagate_errors() {
    let interpreter = Interpreter::new();
    interpreter
        .register("Checked", |n: f32| -> Result<f32> {
            if n < 0.0 {
                Err(host_failure("negative input"))
            } else {
                Ok(n.sqrt())
            }
        })
        .unwrap();
    assert_eq!(interpreter.eval_source("Checked(9)").unwrap(), number(3.0));
    let err = interpreter.eval_source("Checked(-1)").unwrap_err();
    assert!(err.to_string().contains("negative input"));
}

#[test]
fn registration_from_child_environment_fails() {
    let root = Environment::new();
    let child = Environment::child(&root);
    let err = child.borrow().register("Nope", || 1).unwrap_err();
    assert_eq!(err.kind(), Some(DiagnosticKind::Registration));
    assert!(!root.borrow().has_function("Nope"));
}

#[test]
fn registered_function_takes_precedence_over_math_provider() {
    let interpreter = Interpreter::new();
    interpreter.register("Max", |_: f32, _: f32| -1.0f32).unwrap();
    assert_eq!(interpreter.eval_source("Max(3, 5)").unwrap(), number(-1.0));
}

#[test]
fn call_function_dispatches_like_a_script_call() {
    let env = Environment::new();
    execute("add(a, b){ return a + b }", &env).unwrap();

    assert_eq!(
        call_function(&env, "add", &[number(1.0), number(2.0)]).unwrap(),
        number(3.0)
    );
    assert_eq!(call_function(&env, "Sqrt", &[number(9.0)]).unwrap(), number(3.0));

    let err = call_function(&env, "missing", &[]).unwrap_err();
    assert_eq!(err.kind(), Some(DiagnosticKind::UnresolvedName));
    let err = call_function(&env, "add", &[number(1.0)]).unwrap_err();
    assert_eq!(err.kind(), Some(DiagnosticKind::Arity));
}

#[test]
fn host_callbacks_can_reenter_the_interpreter() {
    let interpreter = Interpreter::new();
    let env = Rc::downgrade(interpreter.environment());
    interpreter
        .register("Apply", move |name: String, arg: f32| -> Result<Value> {
            let env = env.upgrade().ok_or_else(|| host_failure("environment dropped"))?;
            call_function(&env, &name, &[Value::Number(arg)])
        })
        .unwrap();
    interpreter.eval_source("square(x){ return x * x }").unwrap();
    assert_eq!(
        interpreter.eval_source("Apply(\"square\", 7)").unwrap(),
        number(49.0)
    );
}

#[derive(Debug)]
struct Doubling;

impl MathProvider for Doubling {
    fn lookup(&self, name: &str, arity: usize) -> Option<MathFunction> {
        (name == "Double" && arity == 1).then(|| MathFunction::new("Double", 1, |a| a[0] * 2.0))
    }
}

#[test]
fn custom_math_provider_replaces_standard_library() {
    let config = InterpreterConfig::default().with_math_provider(Doubling);
    let interpreter = Interpreter::with_config(config);
    assert_eq!(interpreter.eval_source("Double(4)").unwrap(), number(8.0));
    let err = interpreter.eval_source("Sqrt(4)").unwrap_err();
    assert_eq!(err.kind(), Some(DiagnosticKind::UnresolvedName));
}

#[test]
fn call_depth_limit_is_configurable_and_recovers() {
    let config = InterpreterConfig::default().with_max_call_depth(10);
    let interpreter = Interpreter::with_config(config);
    interpreter
        .eval_source("down(n){ if (n <= 0) { return 0 } return down(n - 1) }")
        .unwrap();

    assert_eq!(interpreter.eval_source("down(9)").unwrap(), number(0.0));
    let err = interpreter.eval_source("down(50)").unwrap_err();
    assert_eq!(err.kind(), Some(DiagnosticKind::Resource));
    assert_eq!(interpreter.eval_source("down(5)").unwrap(), number(0.0));
}

#[test]
fn environment_introspection() {
    let interpreter = Interpreter::new();
    interpreter.eval_source("var a = 1\nf(){ return a }").unwrap();
    let env = interpreter.environment().borrow();

    assert!(env.is_root());
    assert_eq!(env.variable_names(), vec!["PI", "E", "a"]);
    assert!(env.has_function("f"));
    assert!(env.has_function("print"));
    assert!(!env.has_function("Sqrt"));
}

#[test]
fn host_can_seed_variables() {
    let interpreter = Interpreter::new();
    interpreter
        .environment()
        .borrow_mut()
        .define("limit", number(3.0))
        .unwrap();
    assert_eq!(interpreter.eval_source("limit * 2").unwrap(), number(6.0));
}
