//! Built-in type behavior: operators, methods, slicing, the numeric tower.

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

fn s(text: &str) -> Object {
    Object::String(text.to_owned())
}

// === numeric tower ===

#[test]
fn cross_type_numeric_equality() {
    assert_eq!(run("1 == 1.0 == True"), Object::Bool(true));
    assert_eq!(run("0 == 0.0 == False"), Object::Bool(true));
    assert_eq!(run("1 == 2"), Object::Bool(false));
    assert_eq!(run("2 ** 100 == 2.0 ** 100"), Object::Bool(true));
}

#[test]
fn bool_participates_as_zero_and_one() {
    assert_eq!(run("True + True"), Object::Int(2));
    assert_eq!(run("type(True + True) is int"), Object::Bool(true));
    // bitwise between two bools stays bool
    assert_eq!(run("True & True"), Object::Bool(true));
    assert_eq!(run("True | False"), Object::Bool(true));
    assert_eq!(run("type(True & False) is bool"), Object::Bool(true));
    // mixed with int it degrades to int
    assert_eq!(run("True & 1"), Object::Int(1));
}

#[test]
fn division_always_floats_floordiv_floors() {
    assert_eq!(run("7 / 2"), Object::Float(3.5));
    assert_eq!(run("6 / 3"), Object::Float(2.0));
    assert_eq!(run("7 // 2"), Object::Int(3));
    assert_eq!(run("-7 // 2"), Object::Int(-4));
    assert_eq!(run("7 // -2"), Object::Int(-4));
    assert_eq!(run("7.0 // 2"), Object::Float(3.0));
}

#[test]
fn modulo_takes_divisor_sign() {
    assert_eq!(run("7 % 3"), Object::Int(1));
    assert_eq!(run("-7 % 3"), Object::Int(2));
    assert_eq!(run("7 % -3"), Object::Int(-2));
    assert_eq!(run("-7 % -3"), Object::Int(-1));
    assert_eq!(run("7.5 % 2"), Object::Float(1.5));
    assert_eq!(run("-7.5 % 2"), Object::Float(0.5));
}

#[test]
fn division_by_zero_messages() {
    let err = run_err("1 / 0");
    assert_eq!(err.exc_type(), ExcType::ZeroDivisionError);
    assert_eq!(err.message(), Some("division by zero"));
    let err = run_err("1 // 0");
    assert_eq!(err.message(), Some("integer division or modulo by zero"));
    let err = run_err("1 % 0");
    assert_eq!(err.message(), Some("integer division or modulo by zero"));
    let err = run_err("1.0 / 0.0");
    assert_eq!(err.message(), Some("float division by zero"));
}

#[test]
fn int_overflow_promotes_transparently() {
    assert_eq!(run("(2 ** 62) * 4 == 2 ** 64"), Object::Bool(true));
    assert_eq!(run("type(2 ** 100) is int"), Object::Bool(true));
    assert_eq!(run("(2 ** 100) // (2 ** 90)"), Object::Int(1024));
    assert_eq!(run("(2 ** 100) % 97 == pow(2, 100, 97)"), Object::Bool(true));
    // -(2^63) lands exactly on the small-int boundary and demotes
    assert_eq!(run("-(2 ** 63)"), Object::Int(i64::MIN));
}

#[test]
fn pow_with_negative_exponent_yields_float() {
    assert_eq!(run("2 ** -1"), Object::Float(0.5));
    assert_eq!(run("2 ** 10"), Object::Int(1024));
    assert_eq!(run("(-2) ** 3"), Object::Int(-8));
}

#[test]
fn mixed_arithmetic_promotes_to_float() {
    assert_eq!(run("1 + 2.5"), Object::Float(3.5));
    assert_eq!(run("True + 0.5"), Object::Float(1.5));
    assert_eq!(run("type(1 * 1.0) is float"), Object::Bool(true));
}

#[test]
fn unsupported_operands_name_both_types() {
    let err = run_err("1 + 'x'");
    assert_eq!(
        err.message(),
        Some("unsupported operand type(s) for +: 'int' and 'str'")
    );
    let err = run_err("'x' + 1");
    assert_eq!(err.message(), Some("can only concatenate str (not \"int\") to str"));
}

// === str ===

#[test]
fn string_indexing_is_by_code_point() {
    assert_eq!(run("list('a🎉b')"), Object::List(vec![s("a"), s("🎉"), s("b")]));
    assert_eq!(run("'a🎉b'[1]"), s("🎉"));
    assert_eq!(run("'a🎉b'[-1]"), s("b"));
    assert_eq!(run("'a🎉b'[::-1]"), s("b🎉a"));
    let err = run_err("'ab'[5]");
    assert_eq!(err.message(), Some("string index out of range"));
}

#[test]
fn string_slicing_clamps() {
    assert_eq!(run("'hello'[1:3]"), s("el"));
    assert_eq!(run("'hello'[:100]"), s("hello"));
    assert_eq!(run("'hello'[100:]"), s(""));
    assert_eq!(run("'hello'[::2]"), s("hlo"));
    assert_eq!(run("'hello'[-3:]"), s("llo"));
}

#[test]
fn string_methods() {
    assert_eq!(run("'Hello World'.upper()"), s("HELLO WORLD"));
    assert_eq!(run("'Hello'.lower()"), s("hello"));
    assert_eq!(run("'  pad  '.strip()"), s("pad"));
    assert_eq!(run("'xxhixx'.strip('x')"), s("hi"));
    assert_eq!(run("'  pad  '.lstrip()"), s("pad  "));
    assert_eq!(run("'a,b,,c'.split(',')"), Object::List(vec![s("a"), s("b"), s(""), s("c")]));
    assert_eq!(run("'a b  c'.split()"), Object::List(vec![s("a"), s("b"), s("c")]));
    assert_eq!(run("'a,b,c'.split(',', 1)"), Object::List(vec![s("a"), s("b,c")]));
    assert_eq!(run("'-'.join(['a', 'b', 'c'])"), s("a-b-c"));
    assert_eq!(run("'banana'.replace('an', 'o')"), s("boona"));
    assert_eq!(run("'banana'.replace('a', 'A', 2)"), s("bAnAna"));
    assert_eq!(run("'prefix-rest'.startswith('pre')"), Object::Bool(true));
    assert_eq!(run("'file.txt'.endswith(('.txt', '.md'))"), Object::Bool(true));
    assert_eq!(run("'banana'.find('na')"), Object::Int(2));
    assert_eq!(run("'banana'.rfind('na')"), Object::Int(4));
    assert_eq!(run("'banana'.find('xyz')"), Object::Int(-1));
    assert_eq!(run("'banana'.count('an')"), Object::Int(2));
    assert_eq!(run("'a🎉b'.find('b')"), Object::Int(2));
    assert_eq!(run("'42'.zfill(5)"), s("00042"));
    assert_eq!(run("'-42'.zfill(5)"), s("-0042"));
    assert_eq!(run("'hi'.ljust(5, '.')"), s("hi..."));
    assert_eq!(run("'hi'.rjust(5)"), s("   hi"));
    assert_eq!(run("'title case'.title()"), s("Title Case"));
    assert_eq!(run("'www.example'.removeprefix('www.')"), s("example"));
    assert_eq!(run("'123'.isdigit()"), Object::Bool(true));
    assert_eq!(run("'12a'.isdigit()"), Object::Bool(false));
    assert_eq!(run("'abc'.isalpha()"), Object::Bool(true));
    assert_eq!(run("'ABC'.isupper()"), Object::Bool(true));
    assert_eq!(run("'one\\ntwo'.splitlines()"), Object::List(vec![s("one"), s("two")]));
    let err = run_err("'abc'.index('z')");
    assert_eq!(err.message(), Some("substring not found"));
}

#[test]
fn string_format_method() {
    assert_eq!(run("'{} and {}'.format(1, 'two')"), s("1 and two"));
    assert_eq!(run("'{1}{0}'.format('a', 'b')"), s("ba"));
    assert_eq!(run("'{name}!'.format(name='hi')"), s("hi!"));
    assert_eq!(run("'{:>6.2f}'.format(3.14159)"), s("  3.14"));
    assert_eq!(run("'{:,}'.format(1234567)"), s("1,234,567"));
    assert_eq!(run("'{:#x}'.format(255)"), s("0xff"));
    assert_eq!(run("'{:05d}'.format(42)"), s("00042"));
}

#[test]
fn percent_formatting() {
    assert_eq!(run("'%s-%s' % ('a', 1)"), s("a-1"));
    assert_eq!(run("'%d' % 42"), s("42"));
    assert_eq!(run("'%05d' % 42"), s("00042"));
    assert_eq!(run("'%.2f' % 3.14159"), s("3.14"));
    assert_eq!(run("'%x' % 255"), s("ff"));
    assert_eq!(run("'%r' % 'v'"), s("'v'"));
    assert_eq!(run("'100%%' % ()"), s("100%"));
    let err = run_err("'%s %s' % ('only',)");
    assert_eq!(err.message(), Some("not enough arguments for format string"));
}

#[test]
fn str_encode_and_bytes_decode() {
    assert_eq!(run("'hé'.encode()"), Object::Bytes("hé".as_bytes().to_vec()));
    assert_eq!(run("b'h\\xc3\\xa9'.decode()"), s("hé"));
    assert_eq!(run("'abc'.encode('ascii')"), Object::Bytes(b"abc".to_vec()));
    let err = run_err("b'\\xff'.decode()");
    assert_eq!(err.exc_type(), ExcType::ValueError);
}

#[test]
fn bytes_behavior() {
    assert_eq!(run("b'ab' + b'cd'"), Object::Bytes(b"abcd".to_vec()));
    assert_eq!(run("b'ab' * 2"), Object::Bytes(b"abab".to_vec()));
    assert_eq!(run("b'abc'[1]"), Object::Int(98));
    assert_eq!(run("b'abcd'[1:3]"), Object::Bytes(b"bc".to_vec()));
    assert_eq!(run("list(b'\\x00\\x01')"), Object::List(vec![Object::Int(0), Object::Int(1)]));
    assert_eq!(run("98 in b'abc'"), Object::Bool(true));
    assert_eq!(run("b'bc' in b'abc'"), Object::Bool(true));
    assert_eq!(run("b'ff'.hex()"), s("6666"));
    assert_eq!(run("b'a-b'.split(b'-')"), Object::List(vec![
        Object::Bytes(b"a".to_vec()),
        Object::Bytes(b"b".to_vec()),
    ]));
}

// === list ===

#[test]
fn list_indexing_and_mutation() {
    assert_eq!(run("lst = [1, 2, 3]\nlst[0] = 9\nlst[-1] = 7\nlst"), Object::List(vec![
        Object::Int(9),
        Object::Int(2),
        Object::Int(7),
    ]));
    let err = run_err("[1][5]");
    assert_eq!(err.message(), Some("list index out of range"));
    let err = run_err("lst = [1]\nlst[5] = 0");
    assert_eq!(err.message(), Some("list assignment index out of range"));
}

#[test]
fn list_slicing_and_slice_assignment() {
    assert_eq!(run("[1, 2, 3, 4][1:3]"), Object::List(vec![Object::Int(2), Object::Int(3)]));
    assert_eq!(run("[1, 2, 3][::-1]"), Object::List(vec![Object::Int(3), Object::Int(2), Object::Int(1)]));
    assert_eq!(run("[1, 2, 3][5:]"), Object::List(vec![]));
    assert_eq!(
        run("lst = [1, 2, 3, 4]\nlst[1:3] = [9]\nlst"),
        Object::List(vec![Object::Int(1), Object::Int(9), Object::Int(4)])
    );
    assert_eq!(
        run("lst = [1, 2, 3, 4]\nlst[::2] = [8, 9]\nlst"),
        Object::List(vec![Object::Int(8), Object::Int(2), Object::Int(9), Object::Int(4)])
    );
    let err = run_err("lst = [1, 2, 3]\nlst[::2] = [1]");
    assert_eq!(
        err.message(),
        Some("attempt to assign sequence of size 1 to extended slice of size 2")
    );
}

#[test]
fn list_methods_mutate_shared_references() {
    let code = "\
a = [1]
b = a
b.append(2)
a";
    assert_eq!(run(code), Object::List(vec![Object::Int(1), Object::Int(2)]));
}

#[test]
fn list_insert_clamps() {
    assert_eq!(
        run("lst = [1, 2]\nlst.insert(-100, 0)\nlst.insert(100, 9)\nlst"),
        Object::List(vec![Object::Int(0), Object::Int(1), Object::Int(2), Object::Int(9)])
    );
    assert_eq!(
        run("lst = [1, 2, 3]\nlst.insert(-1, 9)\nlst"),
        Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(9), Object::Int(3)])
    );
}

#[test]
fn list_method_surface() {
    assert_eq!(run("lst = [3, 1]\nlst.extend([2])\nlst.sort()\nlst"), Object::List(vec![
        Object::Int(1),
        Object::Int(2),
        Object::Int(3),
    ]));
    assert_eq!(run("lst = [1, 2, 3]\n[lst.pop(), lst]"), Object::List(vec![
        Object::Int(3),
        Object::List(vec![Object::Int(1), Object::Int(2)]),
    ]));
    assert_eq!(run("lst = [1, 2, 3]\nlst.pop(0)\nlst"), Object::List(vec![Object::Int(2), Object::Int(3)]));
    assert_eq!(run("lst = ['a', 'b', 'a']\nlst.remove('a')\nlst"), Object::List(vec![s("b"), s("a")]));
    assert_eq!(run("[1, 2, 1].count(1)"), Object::Int(2));
    assert_eq!(run("[1, 2, 3].index(2)"), Object::Int(1));
    assert_eq!(run("lst = [1, 2]\nlst.reverse()\nlst"), Object::List(vec![Object::Int(2), Object::Int(1)]));
    assert_eq!(run("a = [1]\nb = a.copy()\nb.append(2)\n[a, b]"), Object::List(vec![
        Object::List(vec![Object::Int(1)]),
        Object::List(vec![Object::Int(1), Object::Int(2)]),
    ]));
    let err = run_err("[].pop()");
    assert_eq!(err.message(), Some("pop from empty list"));
    let err = run_err("[1].remove(2)");
    assert_eq!(err.message(), Some("list.remove(x): x not in list"));
}

#[test]
fn list_sort_with_key_is_stable() {
    assert_eq!(
        run("lst = ['bb', 'a', 'ccc']\nlst.sort(key=len)\nlst"),
        Object::List(vec![s("a"), s("bb"), s("ccc")])
    );
    assert_eq!(
        run("lst = [3, 1, 2]\nlst.sort(reverse=True)\nlst"),
        Object::List(vec![Object::Int(3), Object::Int(2), Object::Int(1)])
    );
    // sort is idempotent
    assert_eq!(
        run("lst = [2, 1, 3]\nlst.sort()\nlst.sort()\nlst"),
        Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)])
    );
}

#[test]
fn list_concat_and_repeat() {
    assert_eq!(run("[1] + [2]"), Object::List(vec![Object::Int(1), Object::Int(2)]));
    assert_eq!(run("[1, 2] * 2"), Object::List(vec![
        Object::Int(1),
        Object::Int(2),
        Object::Int(1),
        Object::Int(2),
    ]));
    assert_eq!(run("2 * [0]"), Object::List(vec![Object::Int(0), Object::Int(0)]));
    assert_eq!(run("[1] * -1"), Object::List(vec![]));
    // += extends in place through aliases
    assert_eq!(
        run("a = [1]\nb = a\na += [2]\nb"),
        Object::List(vec![Object::Int(1), Object::Int(2)])
    );
}

// === dict ===

#[test]
fn dict_is_insertion_ordered() {
    assert_eq!(
        run("d = {}\nd['z'] = 1\nd['a'] = 2\nd['m'] = 3\nlist(d.keys())"),
        Object::List(vec![s("z"), s("a"), s("m")])
    );
    // replacing a key keeps its position
    assert_eq!(
        run("d = {'a': 1, 'b': 2}\nd['a'] = 9\nlist(d.items())[0]"),
        Object::Tuple(vec![s("a"), Object::Int(9)])
    );
}

#[test]
fn dict_equality_ignores_order() {
    assert_eq!(run("{'a': 1, 'b': 2} == {'b': 2, 'a': 1}"), Object::Bool(true));
    assert_eq!(run("{'a': 1} == {'a': 2}"), Object::Bool(false));
}

#[test]
fn dict_cross_representation_keys() {
    // bool/int/float keys with equal values address the same entry
    assert_eq!(run("d = {1: 'one'}\nd[1.0]"), s("one"));
    assert_eq!(run("d = {True: 'x'}\nd[1]"), s("x"));
    assert_eq!(run("d = {}\nd[1] = 'a'\nd[1.0] = 'b'\nlen(d)"), Object::Int(1));
}

#[test]
fn dict_methods() {
    assert_eq!(run("{'a': 1}.get('a')"), Object::Int(1));
    assert_eq!(run("{'a': 1}.get('x')"), Object::None);
    assert_eq!(run("{'a': 1}.get('x', 0)"), Object::Int(0));
    assert_eq!(run("d = {'a': 1}\n[d.pop('a'), d]"), Object::List(vec![
        Object::Int(1),
        Object::Dict(vec![]),
    ]));
    assert_eq!(run("d = {'a': 1, 'b': 2}\nd.popitem()"), Object::Tuple(vec![s("b"), Object::Int(2)]));
    assert_eq!(run("d = {}\nd.setdefault('k', []).append(1)\nd"), Object::Dict(vec![(
        s("k"),
        Object::List(vec![Object::Int(1)]),
    )]));
    assert_eq!(
        run("d = {'a': 1}\nd.update({'b': 2})\nd.update([('c', 3)])\nlist(d.values())"),
        Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)])
    );
    let err = run_err("{}.pop('missing')");
    assert_eq!(err.exc_type(), ExcType::KeyError);
    let err = run_err("{'a': 1}['b']");
    assert_eq!(err.exc_type(), ExcType::KeyError);
    assert_eq!(err.message(), Some("'b'"));
}

#[test]
fn dict_merge_operator() {
    assert_eq!(
        run("{'a': 1, 'b': 1} | {'b': 2, 'c': 3}"),
        Object::Dict(vec![
            (s("a"), Object::Int(1)),
            (s("b"), Object::Int(2)),
            (s("c"), Object::Int(3)),
        ])
    );
    assert_eq!(
        run("d = {'a': 1}\nd |= {'b': 2}\nd"),
        Object::Dict(vec![(s("a"), Object::Int(1)), (s("b"), Object::Int(2))])
    );
}

#[test]
fn unhashable_keys_are_rejected() {
    let err = run_err("{[1]: 'v'}");
    assert_eq!(err.message(), Some("unhashable type: 'list'"));
    let err = run_err("{1: 'v'}[[2]]");
    assert_eq!(err.message(), Some("unhashable type: 'list'"));
}

// === set / frozenset ===

#[test]
fn set_algebra() {
    assert_eq!(run("{1, 2, 3} | {3, 4} == {1, 2, 3, 4}"), Object::Bool(true));
    assert_eq!(run("{1, 2, 3} & {2, 3, 4} == {2, 3}"), Object::Bool(true));
    assert_eq!(run("{1, 2, 3} - {2} == {1, 3}"), Object::Bool(true));
    assert_eq!(run("{1, 2} ^ {2, 3} == {1, 3}"), Object::Bool(true));
    assert_eq!(run("s = {1}\ns |= {2}\ns == {1, 2}"), Object::Bool(true));
    assert_eq!(run("{1, 2} <= {1, 2, 3}"), Object::Bool(true));
    assert_eq!(run("{1, 2} < {1, 2}"), Object::Bool(false));
    assert_eq!(run("{1, 2, 3} > {1}"), Object::Bool(true));
}

#[test]
fn set_methods() {
    assert_eq!(run("s = {1}\ns.add(2)\ns.add(1)\ns == {1, 2}"), Object::Bool(true));
    assert_eq!(run("s = {1, 2}\ns.discard(5)\ns.remove(1)\ns == {2}"), Object::Bool(true));
    assert_eq!(run("{1, 2}.union([3], {4}) == {1, 2, 3, 4}"), Object::Bool(true));
    assert_eq!(run("{1, 2}.isdisjoint({3})"), Object::Bool(true));
    assert_eq!(run("{1}.issubset({1, 2})"), Object::Bool(true));
    assert_eq!(run("{1, 2}.issuperset([1])"), Object::Bool(true));
    let err = run_err("{1}.remove(9)");
    assert_eq!(err.exc_type(), ExcType::KeyError);
}

#[test]
fn set_equals_frozenset_by_membership() {
    assert_eq!(run("{1, 2} == frozenset({2, 1})"), Object::Bool(true));
    assert_eq!(run("frozenset({1}) == {1}"), Object::Bool(true));
    assert_eq!(run("frozenset() == set()"), Object::Bool(true));
    // frozensets are hashable and usable as dict keys
    assert_eq!(run("d = {frozenset({1, 2}): 'v'}\nd[frozenset({2, 1})]"), s("v"));
}

// === tuple / range ===

#[test]
fn tuples_are_immutable_sequences() {
    assert_eq!(run("t = (1, 2, 3)\nt[1]"), Object::Int(2));
    assert_eq!(run("(1, 2) + (3,)"), Object::Tuple(vec![Object::Int(1), Object::Int(2), Object::Int(3)]));
    assert_eq!(run("(1, 2).count(1)"), Object::Int(1));
    assert_eq!(run("(1, 2, 3).index(3)"), Object::Int(2));
    let err = run_err("t = (1,)\nt[0] = 2");
    assert_eq!(err.message(), Some("'tuple' object does not support item assignment"));
}

#[test]
fn tuple_and_list_comparisons_are_lexicographic() {
    assert_eq!(run("[1, 2, 3] < [1, 2, 4]"), Object::Bool(true));
    assert_eq!(run("[1, 2] < [1, 2, 0]"), Object::Bool(true));
    assert_eq!(run("(1, 'a') == (1, 'a')"), Object::Bool(true));
    let err = run_err("[1] < (1,)");
    assert_eq!(
        err.message(),
        Some("'<' not supported between instances of 'list' and 'tuple'")
    );
}

#[test]
fn range_is_lazy() {
    assert_eq!(run("list(range(3))"), Object::List(vec![Object::Int(0), Object::Int(1), Object::Int(2)]));
    assert_eq!(run("len(range(10 ** 15))"), Object::Int(1_000_000_000_000_000));
    assert_eq!(run("10 ** 14 in range(10 ** 15)"), Object::Bool(true));
    assert_eq!(run("range(10)[3]"), Object::Int(3));
    assert_eq!(run("range(10)[-1]"), Object::Int(9));
    assert_eq!(run("list(range(10, 0, -3))"), Object::List(vec![
        Object::Int(10),
        Object::Int(7),
        Object::Int(4),
        Object::Int(1),
    ]));
    assert_eq!(run("2.0 in range(3)"), Object::Bool(true));
    let err = run_err("range(1, 2, 0)");
    assert_eq!(err.message(), Some("range() arg 3 must not be zero"));
}

#[test]
fn slice_objects() {
    assert_eq!(run("s = slice(1, 3)\n[0, 1, 2, 3][s]"), Object::List(vec![Object::Int(1), Object::Int(2)]));
    assert_eq!(run("repr(slice(1, 3, None))"), s("slice(1, 3, None)"));
    let err = run_err("[1, 2][::0]");
    assert_eq!(err.message(), Some("slice step cannot be zero"));
}

// === identity vs equality ===

#[test]
fn identity_of_sentinels() {
    assert_eq!(run("None is None"), Object::Bool(true));
    assert_eq!(run("True is True"), Object::Bool(true));
    assert_eq!(run("False is False"), Object::Bool(true));
    assert_eq!(run("... is ..."), Object::Bool(true));
    assert_eq!(run("None == False"), Object::Bool(false));
}

#[test]
fn nan_behaves_like_cpython() {
    assert_eq!(run("n = float('nan')\nn == n"), Object::Bool(false));
    assert_eq!(run("n = float('nan')\nn is n"), Object::Bool(true));
    // containers use identity-or-equality for membership
    assert_eq!(run("n = float('nan')\nn in [n]"), Object::Bool(true));
    assert_eq!(run("n = float('nan')\nlst = [n]\nlst == lst"), Object::Bool(true));
}

#[test]
fn containers_compare_element_wise() {
    assert_eq!(run("[1, [2, 3]] == [1, [2, 3]]"), Object::Bool(true));
    assert_eq!(run("[1, [2, 3]] == [1, [2, 4]]"), Object::Bool(false));
    assert_eq!(run("{'k': [1]} == {'k': [1]}"), Object::Bool(true));
    assert_eq!(run("(1, 2) == [1, 2]"), Object::Bool(false));
}

#[test]
fn str_repr_quoting_rules() {
    assert_eq!(run("repr(\"it's\")"), s("\"it's\""));
    assert_eq!(run("repr('plain')"), s("'plain'"));
    assert_eq!(run("repr('line\\n')"), s("'line\\n'"));
}

#[test]
fn float_repr_matches_cpython() {
    assert_eq!(run("repr(1e16)"), s("1e+16"));
    assert_eq!(run("repr(1e-5)"), s("1e-05"));
    assert_eq!(run("repr(0.1)"), s("0.1"));
    assert_eq!(run("str(float('inf'))"), s("inf"));
    assert_eq!(run("str(float('-inf'))"), s("-inf"));
    assert_eq!(run("str(float('nan'))"), s("nan"));
}

#[test]
fn bound_methods_are_first_class() {
    assert_eq!(
        run("lst = []\nadd = lst.append\nadd(1)\nadd(2)\nlst"),
        Object::List(vec![Object::Int(1), Object::Int(2)])
    );
    assert_eq!(run("up = 'abc'.upper\nup()"), s("ABC"));
}

#[test]
fn attribute_errors_name_the_type() {
    let err = run_err("[1].nope()");
    assert_eq!(err.message(), Some("'list' object has no attribute 'nope'"));
    let err = run_err("(3).nope");
    assert_eq!(err.message(), Some("'int' object has no attribute 'nope'"));
}
