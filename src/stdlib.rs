use std::rc::Rc;

use crate::{
    diagnostics::{error, DiagnosticKind},
    environment::{Callable, EnvironmentRef, PrintHandler},
    host::NativeFunction,
    value::Value,
};

/// Installs the built-in functions every root environment starts with.
pub fn install(env: &EnvironmentRef) {
    let scope = env.borrow();
    let print = print_function(scope.print_handler());
    scope.define_function(print.name().to_string(), Callable::Native(Rc::new(print)));
}

/// `print(a, b, ...)`: concatenates the display forms of its arguments and
/// hands the line to the environment's print handler.
fn print_function(handler: PrintHandler) -> NativeFunction {
    NativeFunction::variadic("print", move |args: &[Value]| {
        let line: String = args.iter().map(ToString::to_string).collect();
        let mut sink = handler.try_borrow_mut().map_err(|_| {
            error(
                DiagnosticKind::Resource,
                "`print` called re-entrantly from a print handler",
            )
        })?;
        (*sink)(&line);
        Ok(Value::Void)
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::environment::Environment;

    #[test]
    fn print_concatenates_display_forms() {
        let env = Environment::new();
        let lines = Rc::new(RefCell::new(Vec::new()));
        let captured = Rc::clone(&lines);
        env.borrow()
            .set_print_handler(move |line| captured.borrow_mut().push(line.to_string()));

        let Some(Callable::Native(print)) = env.borrow().function("print") else {
            panic!("print should be installed");
        };
        let result = print
            .call(&[Value::string("x = "), Value::Number(1.5), Value::Bool(true)])
            .unwrap();

        assert_eq!(result, Value::Void);
        assert_eq!(lines.borrow().as_slice(), ["x = 1.5true"]);
    }

    #[test]
    fn print_is_variadic() {
        let env = Environment::new();
        let Some(Callable::Native(print)) = env.borrow().function("print") else {
            panic!("print should be installed");
        };
        assert_eq!(print.arity(), None);
    }
}
