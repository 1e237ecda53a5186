//! Exception values and the host-facing error surface.

use monty::{ExcType, Monty, Object};
use pretty_assertions::assert_eq;

fn run(code: &str) -> Object {
    let m = Monty::new(code.to_owned(), "<test>", vec![]).unwrap();
    m.run_no_limits(vec![]).unwrap()
}

fn run_err(code: &str) -> monty::Exception {
    let m = Monty::new(code.to_owned(), "<test>", vec![]).unwrap();
    m.run_no_limits(vec![]).unwrap_err()
}

#[test]
fn exception_instances_carry_args() {
    assert_eq!(
        run("e = ValueError('a', 2)\ne.args"),
        Object::Tuple(vec![Object::String("a".to_owned()), Object::Int(2)])
    );
    assert_eq!(run("ValueError().args"), Object::Tuple(vec![]));
}

#[test]
fn exception_str_and_repr() {
    assert_eq!(run("str(ValueError('msg'))"), Object::String("msg".to_owned()));
    assert_eq!(run("str(ValueError())"), Object::String(String::new()));
    assert_eq!(
        run("str(ValueError('a', 'b'))"),
        Object::String("('a', 'b')".to_owned())
    );
    assert_eq!(run("repr(ValueError('msg'))"), Object::String("ValueError('msg')".to_owned()));
    // KeyError's str is the repr of its key
    assert_eq!(run("str(KeyError('k'))"), Object::String("'k'".to_owned()));
}

#[test]
fn exception_classes_are_first_class() {
    assert_eq!(run("repr(ValueError)"), Object::String("<class 'ValueError'>".to_owned()));
    assert_eq!(run("type(ValueError('x')) is ValueError"), Object::Bool(true));
    assert_eq!(run("kinds = [ValueError, TypeError]\nisinstance(1, int) and kinds[0] is ValueError"), Object::Bool(true));
}

#[test]
fn except_matches_tuples_of_classes() {
    let code = "\
def catch(f):
    try:
        f()
    except (KeyError, ZeroDivisionError):
        return 'caught'
    except BaseException:
        return 'other'
    return 'none'
[catch(lambda: {}['x']), catch(lambda: 1 // 0), catch(lambda: [].nope), catch(lambda: 0)]";
    assert_eq!(
        run(code),
        Object::List(vec![
            Object::String("caught".to_owned()),
            Object::String("caught".to_owned()),
            Object::String("other".to_owned()),
            Object::String("none".to_owned()),
        ])
    );
}

#[test]
fn non_class_in_except_raises_type_error() {
    let err = run_err("try:\n    1 // 0\nexcept 42:\n    pass");
    assert_eq!(err.exc_type(), ExcType::TypeError);
    assert_eq!(
        err.message(),
        Some("catching classes that do not inherit from BaseException is not allowed")
    );
}

#[test]
fn uncaught_exception_surfaces_kind_message_and_frames() {
    let err = run_err("raise ValueError('boom')");
    assert_eq!(err.exc_type(), ExcType::ValueError);
    assert_eq!(err.message(), Some("boom"));
    assert_eq!(err.frames().len(), 1);
    assert_eq!(err.frames()[0].function_name, "<module>");
    assert_eq!(err.frames()[0].source_line, "raise ValueError('boom')");
    assert_eq!(err.summary(), "ValueError: boom");
}

#[test]
fn cause_chain_surfaces_to_host() {
    let code = "\
try:
    raise ValueError('root')
except ValueError as e:
    raise TypeError('wrapper') from e";
    let err = run_err(code);
    assert_eq!(err.exc_type(), ExcType::TypeError);
    assert_eq!(err.message(), Some("wrapper"));
    let cause = err.cause().expect("explicit cause recorded");
    assert_eq!(cause.exc_type(), ExcType::ValueError);
    assert_eq!(cause.message(), Some("root"));
    let rendered = err.to_string();
    assert!(rendered.contains("The above exception was the direct cause of the following exception:"));
    assert!(rendered.contains("ValueError: root"));
    assert!(rendered.ends_with("TypeError: wrapper"));
}

#[test]
fn context_chain_surfaces_to_host() {
    let code = "\
try:
    1 // 0
except ZeroDivisionError:
    raise ValueError('while handling')";
    let err = run_err(code);
    assert_eq!(err.exc_type(), ExcType::ValueError);
    let context = err.context().expect("implicit context recorded");
    assert_eq!(context.exc_type(), ExcType::ZeroDivisionError);
    let rendered = err.to_string();
    assert!(rendered.contains("During handling of the above exception, another exception occurred:"));
}

#[test]
fn from_none_suppresses_context() {
    let code = "\
try:
    1 // 0
except ZeroDivisionError:
    raise ValueError('clean') from None";
    let err = run_err(code);
    assert_eq!(err.exc_type(), ExcType::ValueError);
    assert!(err.cause().is_none());
    assert!(err.context().is_none());
}

#[test]
fn system_exit_and_keyboard_interrupt_bypass_except_exception() {
    let code = "\
try:
    raise SystemExit()
except Exception:
    result = 'swallowed'
result";
    let err = run_err(code);
    assert_eq!(err.exc_type(), ExcType::SystemExit);

    assert_eq!(
        run("try:\n    raise KeyboardInterrupt()\nexcept BaseException:\n    r = 'caught'\nr"),
        Object::String("caught".to_owned())
    );
}

#[test]
fn stop_iteration_is_an_ordinary_exception() {
    assert_eq!(
        run("try:\n    raise StopIteration('done')\nexcept Exception as e:\n    r = str(e)\nr"),
        Object::String("done".to_owned())
    );
}

#[test]
fn canonical_builtin_error_messages() {
    let err = run_err("len(1)");
    assert_eq!(err.message(), Some("object of type 'int' has no len()"));
    let err = run_err("None[0]");
    assert_eq!(err.message(), Some("'NoneType' object is not subscriptable"));
    let err = run_err("3()");
    assert_eq!(err.message(), Some("'int' object is not callable"));
    let err = run_err("for x in 5:\n    pass");
    assert_eq!(err.message(), Some("'int' object is not iterable"));
    let err = run_err("'a' < 1");
    assert_eq!(
        err.message(),
        Some("'<' not supported between instances of 'str' and 'int'")
    );
}

#[test]
fn reraise_keeps_the_original_traceback_growing() {
    let code = "\
def lower():
    raise ValueError('deep')

def upper():
    try:
        lower()
    except ValueError:
        raise

upper()";
    let err = run_err(code);
    assert_eq!(err.exc_type(), ExcType::ValueError);
    let names: Vec<&str> = err.frames().iter().map(|f| f.function_name.as_str()).collect();
    assert_eq!(names.first().copied(), Some("<module>"));
    assert!(names.contains(&"upper"));
    assert!(names.contains(&"lower"));
}

#[test]
fn handler_as_name_is_unbound_after_the_handler() {
    let code = "\
try:
    1 // 0
except ZeroDivisionError as e:
    pass
e";
    let err = run_err(code);
    assert_eq!(err.exc_type(), ExcType::NameError);
}

#[test]
fn exceptions_are_values() {
    // instances can be stored, passed and raised later
    let code = "\
saved = ValueError('later')
def thrower(exc):
    raise exc
try:
    thrower(saved)
except ValueError as e:
    r = str(e)
r";
    assert_eq!(run(code), Object::String("later".to_owned()));
}
