//! The builtin function surface.

use monty::{CollectStringPrint, ExcType, Monty, NoLimitTracker, Object, RunOptions};
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
fn abs_over_the_numeric_tower() {
    assert_eq!(run("abs(-5)"), Object::Int(5));
    assert_eq!(run("abs(5)"), Object::Int(5));
    assert_eq!(run("abs(-2.5)"), Object::Float(2.5));
    assert_eq!(run("abs(True)"), Object::Int(1));
    assert_eq!(run("abs(-(2 ** 100)) == 2 ** 100"), Object::Bool(true));
    let err = run_err("abs('x')");
    assert_eq!(err.message(), Some("bad operand type for abs(): 'str'"));
}

#[test]
fn all_and_any() {
    assert_eq!(run("all([1, 2, 3])"), Object::Bool(true));
    assert_eq!(run("all([1, 0, 3])"), Object::Bool(false));
    assert_eq!(run("all([])"), Object::Bool(true));
    assert_eq!(run("any([0, 0, 1])"), Object::Bool(true));
    assert_eq!(run("any([])"), Object::Bool(false));
    assert_eq!(run("any(x > 2 for x in [1, 2, 3])"), Object::Bool(true));
}

#[test]
fn base_conversions() {
    assert_eq!(run("bin(10)"), Object::String("0b1010".to_owned()));
    assert_eq!(run("bin(-3)"), Object::String("-0b11".to_owned()));
    assert_eq!(run("oct(8)"), Object::String("0o10".to_owned()));
    assert_eq!(run("hex(255)"), Object::String("0xff".to_owned()));
    assert_eq!(run("hex(-255)"), Object::String("-0xff".to_owned()));
}

#[test]
fn chr_and_ord() {
    assert_eq!(run("chr(97)"), Object::String("a".to_owned()));
    assert_eq!(run("chr(127881)"), Object::String("🎉".to_owned()));
    assert_eq!(run("ord('a')"), Object::Int(97));
    assert_eq!(run("ord('🎉')"), Object::Int(127881));
    let err = run_err("chr(1114112)");
    assert_eq!(err.message(), Some("chr() arg not in range(0x110000)"));
    let err = run_err("ord('ab')");
    assert_eq!(err.exc_type(), ExcType::TypeError);
}

#[test]
fn divmod_follows_floor_semantics() {
    assert_eq!(run("divmod(7, 2)"), Object::Tuple(vec![Object::Int(3), Object::Int(1)]));
    assert_eq!(run("divmod(-7, 2)"), Object::Tuple(vec![Object::Int(-4), Object::Int(1)]));
    assert_eq!(run("divmod(7, -2)"), Object::Tuple(vec![Object::Int(-4), Object::Int(-1)]));
    let err = run_err("divmod(1, 0)");
    assert_eq!(err.exc_type(), ExcType::ZeroDivisionError);
}

#[test]
fn hash_consistency() {
    assert_eq!(run("hash(1) == hash(1.0) == hash(True)"), Object::Bool(true));
    assert_eq!(run("hash(0) == hash(0.0) == hash(False)"), Object::Bool(true));
    assert_eq!(run("hash('a') == hash('a')"), Object::Bool(true));
    assert_eq!(run("hash((1, 2)) == hash((1, 2))"), Object::Bool(true));
    let err = run_err("hash([1])");
    assert_eq!(err.message(), Some("unhashable type: 'list'"));
    let err = run_err("hash({1: 2})");
    assert_eq!(err.message(), Some("unhashable type: 'dict'"));
    let err = run_err("hash({1})");
    assert_eq!(err.message(), Some("unhashable type: 'set'"));
    assert_eq!(run("hash(frozenset({1, 2})) == hash(frozenset({2, 1}))"), Object::Bool(true));
}

#[test]
fn id_and_identity() {
    assert_eq!(run("a = [1]\nb = a\nid(a) == id(b)"), Object::Bool(true));
    assert_eq!(run("a = [1]\nb = [1]\nid(a) == id(b)"), Object::Bool(false));
    assert_eq!(run("a = [1]\nb = a\na is b"), Object::Bool(true));
    assert_eq!(run("None is None"), Object::Bool(true));
}

#[test]
fn isinstance_accepts_types_and_tuples() {
    assert_eq!(run("isinstance(1, int)"), Object::Bool(true));
    assert_eq!(run("isinstance(True, int)"), Object::Bool(true));
    assert_eq!(run("isinstance(1, bool)"), Object::Bool(false));
    assert_eq!(run("isinstance('s', (int, str))"), Object::Bool(true));
    assert_eq!(run("isinstance(1.5, (int, str))"), Object::Bool(false));
    assert_eq!(run("isinstance([1], list)"), Object::Bool(true));
    let err = run_err("isinstance(1, 2)");
    assert_eq!(err.message(), Some("isinstance() arg 2 must be a type or tuple of types"));
}

#[test]
fn isinstance_honors_exception_hierarchy() {
    let code = "\
try:
    {}['k']
except Exception as e:
    result = [isinstance(e, KeyError), isinstance(e, LookupError), isinstance(e, ValueError)]
result";
    assert_eq!(
        run(code),
        Object::List(vec![Object::Bool(true), Object::Bool(true), Object::Bool(false)])
    );
}

#[test]
fn len_of_every_sized_type() {
    assert_eq!(run("len('a🎉b')"), Object::Int(3));
    assert_eq!(run("len(b'abc')"), Object::Int(3));
    assert_eq!(run("len([1, 2])"), Object::Int(2));
    assert_eq!(run("len((1,))"), Object::Int(1));
    assert_eq!(run("len({'a': 1})"), Object::Int(1));
    assert_eq!(run("len({1, 2, 3})"), Object::Int(3));
    assert_eq!(run("len(range(10))"), Object::Int(10));
    assert_eq!(run("len(range(0, 10, 3))"), Object::Int(4));
    let err = run_err("len(5)");
    assert_eq!(err.message(), Some("object of type 'int' has no len()"));
}

#[test]
fn min_max_with_and_without_key() {
    assert_eq!(run("max([3, 1, 2])"), Object::Int(3));
    assert_eq!(run("min(3, 1, 2)"), Object::Int(1));
    assert_eq!(run("max('a', 'c', 'b')"), Object::String("c".to_owned()));
    assert_eq!(run("min([], default='empty')"), Object::String("empty".to_owned()));
    assert_eq!(
        run("max(['aa', 'b', 'cccc'], key=len)"),
        Object::String("cccc".to_owned())
    );
    assert_eq!(
        run("min([(1, 'b'), (1, 'a')], key=lambda p: p[0])"),
        // first occurrence wins among equal keys
        Object::Tuple(vec![Object::Int(1), Object::String("b".to_owned())])
    );
    let err = run_err("min([])");
    assert_eq!(err.message(), Some("min() arg is an empty sequence"));
}

#[test]
fn pow_including_modular() {
    assert_eq!(run("pow(2, 10)"), Object::Int(1024));
    assert_eq!(run("pow(2, 10, 100)"), Object::Int(24));
    assert_eq!(run("pow(2, -1)"), Object::Float(0.5));
    assert_eq!(run("pow(-3, 3, 7)"), Object::Int(1));
    assert_eq!(run("pow(2, 200, 1000) == (2 ** 200) % 1000"), Object::Bool(true));
    let err = run_err("pow(2, -1, 7)");
    assert_eq!(
        err.message(),
        Some("pow() 2nd argument cannot be negative when 3rd argument specified")
    );
    let err = run_err("pow(2, 3, 0)");
    assert_eq!(err.message(), Some("pow() 3rd argument cannot be 0"));
}

#[test]
fn print_writes_through_the_writer() {
    let m = Monty::new(
        "print('a', 1, [2], sep='-')\nprint('end', end='!')".to_owned(),
        "<test>",
        vec![],
    )
    .unwrap();
    let mut collect = CollectStringPrint::new();
    m.run(
        vec![],
        RunOptions {
            tracker: NoLimitTracker,
            os: None,
            print: &mut collect,
            hash_seed: 0,
        },
    )
    .unwrap();
    assert_eq!(collect.output(), "a-1-[2]\nend!");
}

#[test]
fn repr_of_values() {
    assert_eq!(run("repr('it')"), Object::String("'it'".to_owned()));
    assert_eq!(run("repr([1, 'a', None])"), Object::String("[1, 'a', None]".to_owned()));
    assert_eq!(run("repr((1,))"), Object::String("(1,)".to_owned()));
    assert_eq!(run("repr({'k': [1, 2]})"), Object::String("{'k': [1, 2]}".to_owned()));
    assert_eq!(run("repr(1.0)"), Object::String("1.0".to_owned()));
    assert_eq!(run("repr(True)"), Object::String("True".to_owned()));
    assert_eq!(run("repr(range(3))"), Object::String("range(0, 3)".to_owned()));
    assert_eq!(run("repr(b'ab')"), Object::String("b'ab'".to_owned()));
}

#[test]
fn repr_of_cyclic_containers() {
    assert_eq!(run("a = [1]\na.append(a)\nrepr(a)"), Object::String("[1, [...]]".to_owned()));
    assert_eq!(
        run("d = {}\nd['self'] = d\nrepr(d)"),
        Object::String("{'self': {...}}".to_owned())
    );
}

#[test]
fn round_uses_bankers_rounding() {
    assert_eq!(run("round(2.5)"), Object::Int(2));
    assert_eq!(run("round(3.5)"), Object::Int(4));
    assert_eq!(run("round(-2.5)"), Object::Int(-2));
    assert_eq!(run("round(2.675, 2)"), Object::Float(2.67));
    assert_eq!(run("round(7)"), Object::Int(7));
    assert_eq!(run("round(1.5, 0)"), Object::Float(2.0));
}

#[test]
fn sorted_is_stable_and_supports_key_and_reverse() {
    assert_eq!(
        run("sorted([3, 1, 2])"),
        Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)])
    );
    assert_eq!(
        run("sorted([3, 1, 2], reverse=True)"),
        Object::List(vec![Object::Int(3), Object::Int(2), Object::Int(1)])
    );
    // stability: equal keys keep source order
    assert_eq!(
        run("sorted([(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd')], key=lambda p: p[0])"),
        Object::List(vec![
            Object::Tuple(vec![Object::Int(1), Object::String("b".to_owned())]),
            Object::Tuple(vec![Object::Int(1), Object::String("d".to_owned())]),
            Object::Tuple(vec![Object::Int(2), Object::String("a".to_owned())]),
            Object::Tuple(vec![Object::Int(2), Object::String("c".to_owned())]),
        ])
    );
    // sorted() does not mutate its input
    assert_eq!(
        run("xs = [2, 1]\nsorted(xs)\nxs"),
        Object::List(vec![Object::Int(2), Object::Int(1)])
    );
    let err = run_err("sorted([1, 'a'])");
    assert_eq!(
        err.message(),
        Some("'<' not supported between instances of 'str' and 'int'")
    );
}

#[test]
fn sum_folds_with_add() {
    assert_eq!(run("sum([1, 2, 3])"), Object::Int(6));
    assert_eq!(run("sum([1, 2], 10)"), Object::Int(13));
    assert_eq!(run("sum([0.5, 0.25])"), Object::Float(0.75));
    assert_eq!(run("sum([])"), Object::Int(0));
    let err = run_err("sum(['a', 'b'], '')");
    assert_eq!(err.message(), Some("sum() can't sum strings [use ''.join(seq) instead]"));
}

#[test]
fn enumerate_reversed_zip_are_eager_sequences() {
    assert_eq!(
        run("list(enumerate(['a', 'b'], start=1))"),
        Object::List(vec![
            Object::Tuple(vec![Object::Int(1), Object::String("a".to_owned())]),
            Object::Tuple(vec![Object::Int(2), Object::String("b".to_owned())]),
        ])
    );
    assert_eq!(
        run("list(reversed([1, 2, 3]))"),
        Object::List(vec![Object::Int(3), Object::Int(2), Object::Int(1)])
    );
    assert_eq!(
        run("list(zip([1, 2, 3], 'ab'))"),
        Object::List(vec![
            Object::Tuple(vec![Object::Int(1), Object::String("a".to_owned())]),
            Object::Tuple(vec![Object::Int(2), Object::String("b".to_owned())]),
        ])
    );
}

#[test]
fn type_constructors() {
    assert_eq!(run("int('42')"), Object::Int(42));
    assert_eq!(run("int('  -17  ')"), Object::Int(-17));
    assert_eq!(run("int('ff', 16)"), Object::Int(255));
    assert_eq!(run("int('0x1A', 16)"), Object::Int(26));
    assert_eq!(run("int('1_000')"), Object::Int(1000));
    assert_eq!(run("int(3.99)"), Object::Int(3));
    assert_eq!(run("int(-3.99)"), Object::Int(-3));
    assert_eq!(run("int(True)"), Object::Int(1));
    assert_eq!(run("int()"), Object::Int(0));
    let err = run_err("int('12.5')");
    assert_eq!(err.message(), Some("invalid literal for int() with base 10: '12.5'"));

    assert_eq!(run("float('2.5')"), Object::Float(2.5));
    assert_eq!(run("float('inf') > 10 ** 400"), Object::Bool(true));
    assert_eq!(run("float(3)"), Object::Float(3.0));
    let err = run_err("float('abc')");
    assert_eq!(err.message(), Some("could not convert string to float: 'abc'"));

    assert_eq!(run("str(42)"), Object::String("42".to_owned()));
    assert_eq!(run("str([1])"), Object::String("[1]".to_owned()));
    assert_eq!(run("bool([])"), Object::Bool(false));
    assert_eq!(run("bool('x')"), Object::Bool(true));
    assert_eq!(run("list('ab')"), Object::List(vec![
        Object::String("a".to_owned()),
        Object::String("b".to_owned()),
    ]));
    assert_eq!(run("tuple([1, 2])"), Object::Tuple(vec![Object::Int(1), Object::Int(2)]));
    assert_eq!(run("dict([(1, 'a'), (2, 'b')])[2]"), Object::String("b".to_owned()));
    assert_eq!(run("dict(a=1)['a']"), Object::Int(1));
    assert_eq!(run("set([1, 1, 2]) == {1, 2}"), Object::Bool(true));
    assert_eq!(run("bytes(3)"), Object::Bytes(vec![0, 0, 0]));
    assert_eq!(run("bytes([65, 66])"), Object::Bytes(b"AB".to_vec()));
    assert_eq!(run("bytes('hé', 'utf-8')"), Object::Bytes("hé".as_bytes().to_vec()));
}
