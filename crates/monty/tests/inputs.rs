//! Host bridge round-trips: every supported input kind in, identity out,
//! plus subtype coercion and conversion errors.

use monty::{ExcType, Monty, Object};
use num_bigint::BigInt;
use pretty_assertions::assert_eq;

fn echo(input: Object) -> Object {
    let m = Monty::new("x".to_owned(), "<test>", vec!["x".to_owned()]).unwrap();
    m.run_no_limits(vec![input]).unwrap()
}

fn run(code: &str) -> Object {
    let m = Monty::new(code.to_owned(), "<test>", vec![]).unwrap();
    m.run_no_limits(vec![]).unwrap()
}

fn run_with(code: &str, names: &[&str], inputs: Vec<Object>) -> Object {
    let names = names.iter().map(|s| (*s).to_owned()).collect();
    let m = Monty::new(code.to_owned(), "<test>", names).unwrap();
    m.run_no_limits(inputs).unwrap()
}

#[test]
fn none_round_trips() {
    assert_eq!(echo(Object::None), Object::None);
    assert_eq!(run_with("x is None", &["x"], vec![Object::None]), Object::Bool(true));
}

#[test]
fn ellipsis_round_trips() {
    assert_eq!(echo(Object::Ellipsis), Object::Ellipsis);
    assert_eq!(run_with("x is ...", &["x"], vec![Object::Ellipsis]), Object::Bool(true));
    assert_eq!(run("..."), Object::Ellipsis);
}

#[test]
fn bool_round_trips_and_stays_bool() {
    assert_eq!(echo(Object::Bool(true)), Object::Bool(true));
    assert_eq!(echo(Object::Bool(false)), Object::Bool(false));
    // Bool is preserved, never demoted to Int, despite being a numeric subtype
    assert_eq!(
        run_with("type(x) is bool", &["x"], vec![Object::Bool(true)]),
        Object::Bool(true)
    );
}

#[test]
fn int_round_trips() {
    assert_eq!(echo(Object::Int(42)), Object::Int(42));
    assert_eq!(echo(Object::Int(-100)), Object::Int(-100));
    assert_eq!(echo(Object::Int(0)), Object::Int(0));
}

#[test]
fn big_int_round_trips_at_full_precision() {
    let huge = BigInt::from(2).pow(100);
    assert_eq!(echo(Object::BigInt(huge.clone())), Object::BigInt(huge.clone()));
    // type is int, not some separate big-int type
    assert_eq!(
        run_with("type(x) is int", &["x"], vec![Object::BigInt(huge)]),
        Object::Bool(true)
    );
}

#[test]
fn big_int_demotes_to_small_when_it_fits() {
    assert_eq!(echo(Object::BigInt(BigInt::from(7))), Object::Int(7));
}

#[test]
fn big_int_hash_consistency_across_representations() {
    // (x - x) + 42 routes through big-int arithmetic, then indexes a dict
    // keyed with the small form; hash transparency makes the lookup succeed
    let huge = BigInt::from(2).pow(100);
    let code = "d = {42: 'v'}\nd[(x - x) + 42]";
    assert_eq!(
        run_with(code, &["x"], vec![Object::BigInt(huge)]),
        Object::String("v".to_owned())
    );
}

#[test]
fn big_int_arithmetic_round_trips() {
    let huge = BigInt::from(2).pow(100);
    let result = run_with("x", &["x"], vec![Object::BigInt(huge.clone())]);
    assert_eq!(result, Object::BigInt(huge.clone()));
    let doubled = run_with("x + x", &["x"], vec![Object::BigInt(huge.clone())]);
    assert_eq!(doubled, Object::BigInt(huge * 2));
}

#[test]
fn float_round_trips() {
    assert_eq!(echo(Object::Float(3.14)), Object::Float(3.14));
    assert_eq!(echo(Object::Float(-2.5)), Object::Float(-2.5));
    assert_eq!(echo(Object::Float(0.0)), Object::Float(0.0));
}

#[test]
fn string_round_trips() {
    assert_eq!(echo(Object::String("hello".to_owned())), Object::String("hello".to_owned()));
    assert_eq!(echo(Object::String(String::new())), Object::String(String::new()));
    assert_eq!(
        echo(Object::String("unicode: éè🎉".to_owned())),
        Object::String("unicode: éè🎉".to_owned())
    );
}

#[test]
fn bytes_round_trips() {
    assert_eq!(echo(Object::Bytes(b"hello".to_vec())), Object::Bytes(b"hello".to_vec()));
    assert_eq!(echo(Object::Bytes(vec![0, 1, 2])), Object::Bytes(vec![0, 1, 2]));
}

#[test]
fn list_round_trips() {
    let list = Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)]);
    assert_eq!(echo(list.clone()), list);
    assert_eq!(echo(Object::List(vec![])), Object::List(vec![]));
}

#[test]
fn nested_containers_round_trip() {
    let nested = Object::List(vec![
        Object::List(vec![Object::Int(1), Object::Int(2)]),
        Object::List(vec![Object::Int(3), Object::List(vec![Object::Int(4)])]),
    ]);
    assert_eq!(echo(nested.clone()), nested);

    let deep_dict = Object::Dict(vec![(
        Object::String("a".to_owned()),
        Object::Dict(vec![(Object::String("b".to_owned()), Object::Int(1))]),
    )]);
    assert_eq!(echo(deep_dict.clone()), deep_dict);
}

#[test]
fn tuple_round_trips() {
    let tuple = Object::Tuple(vec![Object::Int(1), Object::String("two".to_owned())]);
    assert_eq!(echo(tuple.clone()), tuple);
    assert_eq!(echo(Object::Tuple(vec![])), Object::Tuple(vec![]));
}

#[test]
fn dict_round_trips_in_insertion_order() {
    let dict = Object::Dict(vec![
        (Object::String("a".to_owned()), Object::Int(1)),
        (Object::String("b".to_owned()), Object::Int(2)),
    ]);
    assert_eq!(echo(dict.clone()), dict);
}

#[test]
fn set_round_trips() {
    let set = Object::Set(vec![Object::Int(1), Object::Int(2), Object::Int(3)]);
    assert_eq!(echo(set.clone()), set);
    assert_eq!(
        run_with("x == {3, 2, 1}", &["x"], vec![set]),
        Object::Bool(true)
    );
}

#[test]
fn frozenset_round_trips() {
    let set = Object::FrozenSet(vec![Object::Int(1), Object::Int(2)]);
    assert_eq!(echo(set.clone()), set);
    assert_eq!(
        run_with("type(x) is frozenset", &["x"], vec![Object::FrozenSet(vec![Object::Int(1)])]),
        Object::Bool(true)
    );
}

#[test]
fn exception_instances_cross_the_bridge() {
    // a host `MyError(ValueError)` arrives coerced to its nearest supported
    // base kind; the bridge preserves kind and args exactly
    let input = Object::exception(ExcType::ValueError, "custom");
    let result = echo(input);
    assert_eq!(
        result,
        Object::Exception {
            exc_type: ExcType::ValueError,
            args: vec![Object::String("custom".to_owned())],
        }
    );
    // kind is visible to isinstance inside the sandbox
    assert_eq!(
        run_with(
            "isinstance(x, ValueError) and isinstance(x, Exception)",
            &["x"],
            vec![Object::exception(ExcType::ValueError, "custom")]
        ),
        Object::Bool(true)
    );
}

#[test]
fn exception_message_is_preserved() {
    assert_eq!(
        run_with(
            "x.args[0]",
            &["x"],
            vec![Object::exception(ExcType::ValueError, "custom")]
        ),
        Object::String("custom".to_owned())
    );
}

#[test]
fn repr_objects_are_rejected_as_input() {
    let m = Monty::new("x".to_owned(), "<test>", vec!["x".to_owned()]).unwrap();
    let err = m.run_no_limits(vec![Object::Repr("<thing>".to_owned())]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
}

#[test]
fn wrong_input_count_is_a_host_error() {
    let m = Monty::new("x".to_owned(), "<test>", vec!["x".to_owned()]).unwrap();
    let err = m.run_no_limits(vec![]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
}

#[test]
fn functions_surface_as_repr() {
    let result = run("def f():\n    pass\nf");
    assert!(matches!(result, Object::Repr(r) if r.contains('f')));
}

#[test]
fn cyclic_list_converts_with_placeholder() {
    let result = run("a = [1]\na.append(a)\na");
    let Object::List(items) = result else {
        panic!("expected list, got {result:?}");
    };
    assert_eq!(items[0], Object::Int(1));
    assert_eq!(items[1], Object::Repr("[...]".to_owned()));
}

#[test]
fn type_objects_cross_the_bridge() {
    assert_eq!(run("int"), Object::Type(monty::Type::Int));
    assert_eq!(run("type(3)"), Object::Type(monty::Type::Int));
    assert_eq!(run("type('s')"), Object::Type(monty::Type::Str));
}

#[test]
fn hash_of_round_tripped_values_is_stable() {
    // hash(x) inside the sandbox matches across runs for the same input
    let huge = BigInt::from(2).pow(100);
    let a = run_with("hash(x)", &["x"], vec![Object::BigInt(huge.clone())]);
    let b = run_with("hash(x)", &["x"], vec![Object::BigInt(huge)]);
    assert_eq!(a, b);
    // and equals the hash of the value computed natively in the sandbox
    let c = run("hash(2 ** 100)");
    assert_eq!(a, c);
}
