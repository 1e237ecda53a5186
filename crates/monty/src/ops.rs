//! Operator dispatch: equality, ordering, arithmetic, bitwise, membership.
//!
//! Binary operators follow the reflection protocol in spirit: each operation
//! tries the left operand's interpretation, then the right's (sequence
//! repetition by a left-hand int, timedelta scaling, and so on), and raises
//! the canonical `TypeError` naming both type names when neither side
//! applies.
//!
//! The numeric tower: `Bool` participates as 0/1 and keeps its boolness only
//! for `& | ^` between two bools; `Int`/`Float` mix promotes to `Float`; `/`
//! always yields `Float`; `//` floors toward negative infinity; `%` takes the
//! divisor's sign. Machine-word ints overflow transparently into heap big
//! ints, and results are demoted whenever they fit.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{FromPrimitive, Pow, Signed, ToPrimitive, Zero};

use crate::{
    exception::{ExcType, RunResult},
    expressions::{CmpOperator, Operator},
    heap::{Heap, HeapData, HeapId},
    intern::Interns,
    resource::{LARGE_RESULT_THRESHOLD, ResourceTracker},
    types::{
        Type, datetime,
        dict::{Dict, dicts_equal, hash_key},
        iter::iterate_to_vec,
        list::List,
        long_int::{estimate_pow_bytes, estimate_shift_bytes, int_to_value},
        set::{FrozenSet, Set, SetStorage},
        tuple::Tuple,
    },
    value::{IntRef, Value, value_as_bytes, value_as_str},
};

/// Either-int-or-float view used by the numeric tower.
#[derive(Debug, Clone, Copy)]
enum Num<'a> {
    Int(IntRef<'a>),
    Float(f64),
}

fn as_num<'a>(value: &'a Value, heap: &'a Heap<impl ResourceTracker>, interns: &'a Interns) -> Option<Num<'a>> {
    match value {
        Value::Float(f) => Some(Num::Float(*f)),
        _ => value.as_int(heap, interns).map(Num::Int),
    }
}

// === equality ===

/// Structural, cross-variant equality (`==`). Never raises except for
/// pathologically deep nesting.
pub(crate) fn values_eq(
    a: &Value,
    b: &Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<bool> {
    // same arena object is always equal to itself, element checks included
    if let (Value::Ref(ia), Value::Ref(ib)) = (a, b)
        && ia == ib
    {
        return Ok(true);
    }

    // numeric tower: 1 == 1.0 == True
    if let (Some(na), Some(nb)) = (as_num(a, heap, interns), as_num(b, heap, interns)) {
        return Ok(num_cmp(na, nb) == Some(Ordering::Equal));
    }

    if let (Some(sa), Some(sb)) = (value_as_str(a, heap, interns), value_as_str(b, heap, interns)) {
        return Ok(sa == sb);
    }
    if let (Some(ba), Some(bb)) = (value_as_bytes(a, heap, interns), value_as_bytes(b, heap, interns)) {
        return Ok(ba == bb);
    }

    match (a, b) {
        (Value::None, Value::None)
        | (Value::Ellipsis, Value::Ellipsis)
        | (Value::NotImplemented, Value::NotImplemented) => Ok(true),
        (Value::Builtin(x), Value::Builtin(y)) => Ok(x == y),
        (Value::Module(x), Value::Module(y)) => Ok(x == y),
        (Value::Ref(ia), Value::Ref(ib)) => heap.with_data_depth(|| heap_eq(*ia, *ib, heap, interns)),
        _ => Ok(false),
    }
}

/// Identity-or-equality, the relation containers use for membership and key
/// lookup (this is what makes NaN usable as a dict key).
pub(crate) fn values_eq_or_identical(
    a: &Value,
    b: &Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<bool> {
    if a.is_identical(b) {
        return Ok(true);
    }
    values_eq(a, b, heap, interns)
}

fn heap_eq(ia: HeapId, ib: HeapId, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> RunResult<bool> {
    match (heap.get(ia), heap.get(ib)) {
        (HeapData::List(la), HeapData::List(lb)) => {
            seq_eq(&la.as_slice().to_vec(), &lb.as_slice().to_vec(), heap, interns)
        }
        (HeapData::Tuple(ta), HeapData::Tuple(tb)) => {
            seq_eq(&ta.as_slice().to_vec(), &tb.as_slice().to_vec(), heap, interns)
        }
        (HeapData::Dict(da), HeapData::Dict(db)) => dicts_equal(da, db, heap, interns),
        (HeapData::Set(sa), HeapData::Set(sb)) => sa.storage().set_eq(sb.storage(), heap, interns),
        (HeapData::FrozenSet(sa), HeapData::FrozenSet(sb)) => sa.storage().set_eq(sb.storage(), heap, interns),
        // set == frozenset compares by membership
        (HeapData::Set(sa), HeapData::FrozenSet(sb)) => sa.storage().set_eq(sb.storage(), heap, interns),
        (HeapData::FrozenSet(sa), HeapData::Set(sb)) => sa.storage().set_eq(sb.storage(), heap, interns),
        (HeapData::Range(ra), HeapData::Range(rb)) => Ok(ra.py_eq(rb)),
        (HeapData::Slice(sa), HeapData::Slice(sb)) => {
            Ok(values_eq(&sa.start, &sb.start, heap, interns)?
                && values_eq(&sa.stop, &sb.stop, heap, interns)?
                && values_eq(&sa.step, &sb.step, heap, interns)?)
        }
        (HeapData::Date(da), HeapData::Date(db)) => Ok(da == db),
        (HeapData::Time(ta), HeapData::Time(tb)) => Ok(datetime::eq_times(ta, tb, heap)),
        (HeapData::DateTime(da), HeapData::DateTime(db)) => Ok(datetime::eq_datetimes(da, db, heap)),
        (HeapData::Timedelta(ta), HeapData::Timedelta(tb)) => Ok(ta == tb),
        (HeapData::Timezone(za), HeapData::Timezone(zb)) => Ok(za.offset() == zb.offset()),
        _ => Ok(false),
    }
}

fn seq_eq(a: &[Value], b: &[Value], heap: &Heap<impl ResourceTracker>, interns: &Interns) -> RunResult<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b) {
        if !values_eq_or_identical(x, y, heap, interns)? {
            return Ok(false);
        }
    }
    Ok(true)
}

// === ordering ===

fn num_cmp(a: Num<'_>, b: Num<'_>) -> Option<Ordering> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => Some(int_cmp(x, y)),
        (Num::Float(x), Num::Float(y)) => x.partial_cmp(&y),
        (Num::Int(x), Num::Float(y)) => cmp_int_float(x, y),
        (Num::Float(x), Num::Int(y)) => cmp_int_float(y, x).map(Ordering::reverse),
    }
}

fn int_cmp(a: IntRef<'_>, b: IntRef<'_>) -> Ordering {
    match (a, b) {
        (IntRef::Small(x), IntRef::Small(y)) => x.cmp(&y),
        (IntRef::Big(x), IntRef::Big(y)) => x.cmp(y),
        (IntRef::Small(x), IntRef::Big(y)) => BigInt::from(x).cmp(y),
        (IntRef::Big(x), IntRef::Small(y)) => x.cmp(&BigInt::from(y)),
    }
}

/// Exact int-vs-float comparison, safe beyond 2^53.
fn cmp_int_float(a: IntRef<'_>, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f == f64::INFINITY {
        return Some(Ordering::Less);
    }
    if f == f64::NEG_INFINITY {
        return Some(Ordering::Greater);
    }
    if let IntRef::Small(i) = a
        && i.abs() <= (1 << 53)
    {
        return (i as f64).partial_cmp(&f);
    }
    let big = a.to_big();
    let floor = f.floor();
    let floor_big = BigInt::from_f64(floor)?;
    Some(match big.cmp(&floor_big) {
        Ordering::Less => Ordering::Less,
        Ordering::Greater => Ordering::Greater,
        Ordering::Equal => {
            if f > floor {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        }
    })
}

/// Three-way comparison for `< <= > >=`; `None` means unordered types and
/// the caller raises. Sets are handled separately (partial subset order);
/// datetime kinds raise their own aware/naive errors from here.
pub(crate) fn values_cmp(
    a: &Value,
    b: &Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Ordering>> {
    if let (Some(na), Some(nb)) = (as_num(a, heap, interns), as_num(b, heap, interns)) {
        return Ok(num_cmp(na, nb));
    }
    if let (Some(sa), Some(sb)) = (value_as_str(a, heap, interns), value_as_str(b, heap, interns)) {
        return Ok(Some(sa.cmp(sb)));
    }
    if let (Some(ba), Some(bb)) = (value_as_bytes(a, heap, interns), value_as_bytes(b, heap, interns)) {
        return Ok(Some(ba.cmp(bb)));
    }
    if let (Value::Ref(ia), Value::Ref(ib)) = (a, b) {
        match (heap.get(*ia), heap.get(*ib)) {
            (HeapData::List(la), HeapData::List(lb)) => {
                let (va, vb) = (la.as_slice().to_vec(), lb.as_slice().to_vec());
                return heap.with_data_depth(|| seq_cmp(&va, &vb, heap, interns));
            }
            (HeapData::Tuple(ta), HeapData::Tuple(tb)) => {
                let (va, vb) = (ta.as_slice().to_vec(), tb.as_slice().to_vec());
                return heap.with_data_depth(|| seq_cmp(&va, &vb, heap, interns));
            }
            (HeapData::Date(da), HeapData::Date(db)) => return Ok(Some(da.cmp(db))),
            (HeapData::DateTime(da), HeapData::DateTime(db)) => {
                return datetime::cmp_datetimes(da, db, heap).map(Some);
            }
            (HeapData::Time(ta), HeapData::Time(tb)) => {
                return datetime::cmp_times(ta, tb, heap).map(Some);
            }
            (HeapData::Timedelta(ta), HeapData::Timedelta(tb)) => return Ok(Some(ta.cmp(tb))),
            _ => {}
        }
    }
    Ok(None)
}

fn seq_cmp(
    a: &[Value],
    b: &[Value],
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Ordering>> {
    for (x, y) in a.iter().zip(b) {
        if values_eq_or_identical(x, y, heap, interns)? {
            continue;
        }
        return values_cmp(x, y, heap, interns);
    }
    Ok(Some(a.len().cmp(&b.len())))
}

/// Full comparison-operator dispatch, producing a `Bool` value.
pub(crate) fn cmp_op(
    op: &CmpOperator,
    left: Value,
    right: Value,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    let result = match op {
        CmpOperator::Eq => values_eq(&left, &right, heap, interns)?,
        CmpOperator::NotEq => !values_eq(&left, &right, heap, interns)?,
        CmpOperator::Is => left.is_identical(&right),
        CmpOperator::IsNot => !left.is_identical(&right),
        CmpOperator::In => contains(&right, &left, heap, interns)?,
        CmpOperator::NotIn => !contains(&right, &left, heap, interns)?,
        CmpOperator::Lt | CmpOperator::LtE | CmpOperator::Gt | CmpOperator::GtE => {
            // sets order by the subset relation, not lexicographically
            if let Some(result) = set_order_op(op, &left, &right, heap, interns)? {
                return Ok(Value::Bool(result));
            }
            let ordering = values_cmp(&left, &right, heap, interns)?.ok_or_else(|| {
                ExcType::type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op.symbol(),
                    left.py_type(heap),
                    right.py_type(heap)
                ))
            })?;
            match op {
                CmpOperator::Lt => ordering == Ordering::Less,
                CmpOperator::LtE => ordering != Ordering::Greater,
                CmpOperator::Gt => ordering == Ordering::Greater,
                CmpOperator::GtE => ordering != Ordering::Less,
                _ => unreachable!(),
            }
        }
    };
    Ok(Value::Bool(result))
}

fn set_order_op(
    op: &CmpOperator,
    left: &Value,
    right: &Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<bool>> {
    let (Some(a), Some(b)) = (as_set_storage(left, heap), as_set_storage(right, heap)) else {
        return Ok(None);
    };
    let result = match op {
        CmpOperator::Lt => a.len() < b.len() && a.is_subset(b, heap, interns)?,
        CmpOperator::LtE => a.is_subset(b, heap, interns)?,
        CmpOperator::Gt => b.len() < a.len() && b.is_subset(a, heap, interns)?,
        CmpOperator::GtE => b.is_subset(a, heap, interns)?,
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn as_set_storage<'a>(value: &Value, heap: &'a Heap<impl ResourceTracker>) -> Option<&'a SetStorage> {
    match value {
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Set(s) => Some(s.storage()),
            HeapData::FrozenSet(s) => Some(s.storage()),
            _ => None,
        },
        _ => None,
    }
}

/// `needle in haystack`.
pub(crate) fn contains(
    haystack: &Value,
    needle: &Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<bool> {
    if let Some(hs) = value_as_str(haystack, heap, interns) {
        let Some(ns) = value_as_str(needle, heap, interns) else {
            return Err(ExcType::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                needle.py_type(heap)
            )));
        };
        return Ok(hs.contains(ns));
    }
    if let Some(hb) = value_as_bytes(haystack, heap, interns) {
        return match needle.as_int(heap, interns) {
            Some(IntRef::Small(i)) if (0..=255).contains(&i) => Ok(hb.contains(&(i as u8))),
            Some(_) => Err(ExcType::value_error("byte must be in range(0, 256)")),
            None => match value_as_bytes(needle, heap, interns) {
                Some(nb) => Ok(nb.is_empty() || hb.windows(nb.len().max(1)).any(|w| w == nb)),
                None => Err(ExcType::type_error(format!(
                    "a bytes-like object is required, not '{}'",
                    needle.py_type(heap)
                ))),
            },
        };
    }
    if let Value::Ref(id) = haystack {
        match heap.get(*id) {
            HeapData::List(l) => return seq_contains(&l.as_slice().to_vec(), needle, heap, interns),
            HeapData::Tuple(t) => return seq_contains(&t.as_slice().to_vec(), needle, heap, interns),
            HeapData::Dict(d) => {
                let hash = hash_key(*needle, heap, interns)?;
                return Ok(d.lookup(*needle, hash, heap, interns)?.is_some());
            }
            HeapData::Set(s) => {
                let hash = needle.py_hash(heap, interns)?;
                return s.storage().contains_hashed(*needle, hash, heap, interns);
            }
            HeapData::FrozenSet(s) => {
                let hash = needle.py_hash(heap, interns)?;
                return s.storage().contains_hashed(*needle, hash, heap, interns);
            }
            HeapData::Range(r) => {
                if let Some(IntRef::Small(i)) = needle.as_int(heap, interns) {
                    return Ok(r.contains_int(i));
                }
                // floats and big ints fall back to an equality scan
                let mut it = crate::types::range::RangeIter::new(r);
                while let Some(item) = it.next() {
                    if values_eq_or_identical(&item, needle, heap, interns)? {
                        return Ok(true);
                    }
                }
                return Ok(false);
            }
            _ => {}
        }
    }
    Err(ExcType::type_error(format!(
        "argument of type '{}' is not iterable",
        haystack.py_type(heap)
    )))
}

fn seq_contains(
    items: &[Value],
    needle: &Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<bool> {
    for item in items {
        if values_eq_or_identical(item, needle, heap, interns)? {
            return Ok(true);
        }
    }
    Ok(false)
}

// === binary arithmetic / bitwise ===

fn unsupported_operands(
    op: &Operator,
    left: &Value,
    right: &Value,
    heap: &Heap<impl ResourceTracker>,
) -> crate::exception::RunError {
    ExcType::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.py_type(heap),
        right.py_type(heap)
    ))
}

/// Evaluates `left op right` for every operator except the short-circuiting
/// `and`/`or`, which the evaluator handles before operands are forced.
pub(crate) fn binary_op(
    op: &Operator,
    left: Value,
    right: Value,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    // bool & bool (and | ^) preserves boolness
    if let (Value::Bool(a), Value::Bool(b)) = (&left, &right) {
        match op {
            Operator::BitAnd => return Ok(Value::Bool(*a & *b)),
            Operator::BitOr => return Ok(Value::Bool(*a | *b)),
            Operator::BitXor => return Ok(Value::Bool(*a ^ *b)),
            _ => {}
        }
    }

    // numeric tower
    if let (Some(na), Some(nb)) = (as_num(&left, heap, interns), as_num(&right, heap, interns)) {
        return match (na, nb) {
            (Num::Int(a), Num::Int(b)) => {
                let (a, b) = (own_int(a), own_int(b));
                int_binary(op, &a, &b, heap)
            }
            _ => {
                let (Some(fa), Some(fb)) = (num_to_f64(na), num_to_f64(nb)) else {
                    return Err(ExcType::overflow_error("int too large to convert to float"));
                };
                float_binary(op, fa, fb)
            }
        };
    }

    // str/bytes concatenation and repetition, str % formatting
    if let Some(result) = str_bytes_binary(op, &left, &right, heap, interns)? {
        return Ok(result);
    }

    // sequence concatenation and repetition
    if let Some(result) = seq_binary(op, &left, &right, heap, interns)? {
        return Ok(result);
    }

    // set algebra, dict merge
    if let Some(result) = collection_binary(op, &left, &right, heap, interns)? {
        return Ok(result);
    }

    // datetime arithmetic
    if let Some(result) = datetime::binary_op(op, &left, &right, heap)? {
        return Ok(result);
    }

    Err(unsupported_operands(op, &left, &right, heap))
}

enum OwnedInt {
    Small(i64),
    Big(BigInt),
}

fn own_int(int: IntRef<'_>) -> OwnedInt {
    match int {
        IntRef::Small(i) => OwnedInt::Small(i),
        IntRef::Big(b) => OwnedInt::Big(b.clone()),
    }
}

impl OwnedInt {
    fn to_big(&self) -> BigInt {
        match self {
            Self::Small(i) => BigInt::from(*i),
            Self::Big(b) => b.clone(),
        }
    }

    fn small(&self) -> Option<i64> {
        match self {
            Self::Small(i) => Some(*i),
            Self::Big(b) => b.to_i64(),
        }
    }

    fn is_negative(&self) -> bool {
        match self {
            Self::Small(i) => *i < 0,
            Self::Big(b) => b.is_negative(),
        }
    }

    fn bits(&self) -> u64 {
        match self {
            Self::Small(i) => 64 - i.unsigned_abs().leading_zeros() as u64,
            Self::Big(b) => b.bits(),
        }
    }
}

fn int_binary(
    op: &Operator,
    a: &OwnedInt,
    b: &OwnedInt,
    heap: &mut Heap<impl ResourceTracker>,
) -> RunResult<Value> {
    // fast path: both machine words, checked ops, promote on overflow
    if let (Some(x), Some(y)) = (a.small(), b.small()) {
        let small = match op {
            Operator::Add => x.checked_add(y),
            Operator::Sub => x.checked_sub(y),
            Operator::Mult => x.checked_mul(y),
            Operator::FloorDiv => {
                if y == 0 {
                    return Err(ExcType::zero_division("integer division or modulo by zero"));
                }
                checked_floor_div(x, y)
            }
            Operator::Mod => {
                if y == 0 {
                    return Err(ExcType::zero_division("integer division or modulo by zero"));
                }
                Some(floor_mod_i64(x, y))
            }
            _ => None,
        };
        if let Some(result) = small {
            return Ok(Value::Int(result));
        }
    }

    let (big_a, big_b) = (a.to_big(), b.to_big());
    let result: BigInt = match op {
        Operator::Add => big_a + big_b,
        Operator::Sub => big_a - big_b,
        Operator::Mult => big_a * big_b,
        Operator::FloorDiv => {
            if big_b.is_zero() {
                return Err(ExcType::zero_division("integer division or modulo by zero"));
            }
            big_a.div_floor(&big_b)
        }
        Operator::Mod => {
            if big_b.is_zero() {
                return Err(ExcType::zero_division("integer division or modulo by zero"));
            }
            big_a.mod_floor(&big_b)
        }
        Operator::Div => {
            if big_b.is_zero() {
                return Err(ExcType::zero_division("division by zero"));
            }
            let (Some(fa), Some(fb)) = (big_a.to_f64(), big_b.to_f64()) else {
                return Err(ExcType::overflow_error("integer division result too large for a float"));
            };
            return Ok(Value::Float(fa / fb));
        }
        Operator::Pow => return int_pow(a, b, heap),
        Operator::LShift => {
            if b.is_negative() {
                return Err(ExcType::value_error("negative shift count"));
            }
            let Some(shift) = b.small().and_then(|s| u64::try_from(s).ok()) else {
                return Err(ExcType::overflow_error("shift count too large"));
            };
            if let Some(estimate) = estimate_shift_bytes(a.bits(), shift)
                && estimate > LARGE_RESULT_THRESHOLD
            {
                heap.tracker_ref().check_large_result(estimate)?;
            }
            big_a << shift
        }
        Operator::RShift => {
            if b.is_negative() {
                return Err(ExcType::value_error("negative shift count"));
            }
            let shift = b.small().and_then(|s| u64::try_from(s).ok()).unwrap_or(u64::MAX);
            if shift >= u64::from(u32::MAX) {
                // shifted out entirely; sign decides the result
                return Ok(Value::Int(if big_a.is_negative() { -1 } else { 0 }));
            }
            big_a >> shift
        }
        Operator::BitAnd => big_a & big_b,
        Operator::BitOr => big_a | big_b,
        Operator::BitXor => big_a ^ big_b,
        Operator::MatMult => {
            return Err(ExcType::type_error(
                "unsupported operand type(s) for @: 'int' and 'int'",
            ));
        }
        Operator::And | Operator::Or => unreachable!("short-circuit ops evaluated in the interpreter"),
    };
    Ok(int_to_value(result, heap)?)
}

fn int_pow(a: &OwnedInt, b: &OwnedInt, heap: &mut Heap<impl ResourceTracker>) -> RunResult<Value> {
    if b.is_negative() {
        // negative exponent yields a float
        let (Some(base), Some(exp)) = (a.to_big().to_f64(), b.to_big().to_f64()) else {
            return Err(ExcType::overflow_error("int too large to convert to float"));
        };
        if base == 0.0 {
            return Err(ExcType::zero_division("0.0 cannot be raised to a negative power"));
        }
        return Ok(Value::Float(base.powf(exp)));
    }
    let Some(exp) = b.small().and_then(|e| u64::try_from(e).ok()) else {
        return Err(ExcType::overflow_error("exponent too large"));
    };
    // 0, 1 and -1 bases stay small no matter the exponent
    if let Some(base) = a.small()
        && (-1..=1).contains(&base)
    {
        let result = match base {
            0 => i64::from(exp == 0),
            1 => 1,
            _ => {
                if exp % 2 == 0 {
                    1
                } else {
                    -1
                }
            }
        };
        return Ok(Value::Int(result));
    }
    if let Some(estimate) = estimate_pow_bytes(a.bits(), exp) {
        if estimate > LARGE_RESULT_THRESHOLD {
            heap.tracker_ref().check_large_result(estimate)?;
        }
    } else {
        return Err(ExcType::overflow_error("pow() result too large"));
    }
    let result = Pow::pow(a.to_big(), exp);
    Ok(int_to_value(result, heap)?)
}

fn checked_floor_div(a: i64, b: i64) -> Option<i64> {
    let quotient = a.checked_div(b)?;
    let remainder = a % b;
    if remainder != 0 && (remainder < 0) != (b < 0) {
        Some(quotient - 1)
    } else {
        Some(quotient)
    }
}

fn floor_mod_i64(a: i64, b: i64) -> i64 {
    let remainder = a % b;
    if remainder != 0 && (remainder < 0) != (b < 0) {
        remainder + b
    } else {
        remainder
    }
}

fn num_to_f64(num: Num<'_>) -> Option<f64> {
    match num {
        Num::Float(f) => Some(f),
        Num::Int(i) => i.to_f64(),
    }
}

fn float_binary(op: &Operator, a: f64, b: f64) -> RunResult<Value> {
    let result = match op {
        Operator::Add => a + b,
        Operator::Sub => a - b,
        Operator::Mult => a * b,
        Operator::Div => {
            if b == 0.0 {
                return Err(ExcType::zero_division("float division by zero"));
            }
            a / b
        }
        Operator::FloorDiv => {
            if b == 0.0 {
                return Err(ExcType::zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        Operator::Mod => {
            if b == 0.0 {
                return Err(ExcType::zero_division("float modulo"));
            }
            float_mod(a, b)
        }
        Operator::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(ExcType::zero_division("0.0 cannot be raised to a negative power"));
            }
            if a < 0.0 && b.fract() != 0.0 {
                return Err(ExcType::type_error(
                    "complex results from fractional powers of negative numbers are not supported",
                ));
            }
            a.powf(b)
        }
        _ => {
            return Err(ExcType::type_error(format!(
                "unsupported operand type(s) for {}: 'float' and 'float'",
                op.symbol()
            )));
        }
    };
    Ok(Value::Float(result))
}

/// `%` with the divisor's sign, like CPython's float mod.
fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }
}

fn str_bytes_binary(
    op: &Operator,
    left: &Value,
    right: &Value,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    // str + str
    if let Some(sa) = value_as_str(left, heap, interns).map(str::to_owned) {
        match op {
            Operator::Add => {
                let Some(sb) = value_as_str(right, heap, interns) else {
                    return Err(ExcType::type_error(format!(
                        "can only concatenate str (not \"{}\") to str",
                        right.py_type(heap)
                    )));
                };
                let mut result = String::with_capacity(sa.len() + sb.len());
                result.push_str(&sa);
                result.push_str(sb);
                return Ok(Some(heap.alloc_str(result)?));
            }
            Operator::Mult => {
                let count = repeat_count(right, heap, interns)?;
                check_repeat(heap, sa.len(), count)?;
                return Ok(Some(heap.alloc_str(sa.repeat(count))?));
            }
            Operator::Mod => {
                let result = crate::types::str::percent_format(&sa, *right, heap, interns)?;
                return Ok(Some(heap.alloc_str(result)?));
            }
            _ => return Ok(None),
        }
    }
    // int * str
    if let Operator::Mult = op
        && let Some(sb) = value_as_str(right, heap, interns).map(str::to_owned)
        && left.as_int(heap, interns).is_some()
    {
        let count = repeat_count(left, heap, interns)?;
        check_repeat(heap, sb.len(), count)?;
        return Ok(Some(heap.alloc_str(sb.repeat(count))?));
    }
    // bytes
    if let Some(ba) = value_as_bytes(left, heap, interns).map(<[u8]>::to_vec) {
        match op {
            Operator::Add => {
                let Some(bb) = value_as_bytes(right, heap, interns) else {
                    return Err(ExcType::type_error(format!(
                        "can't concat {} to bytes",
                        right.py_type(heap)
                    )));
                };
                let mut result = ba;
                result.extend_from_slice(bb);
                return Ok(Some(heap.alloc_bytes(result)?));
            }
            Operator::Mult => {
                let count = repeat_count(right, heap, interns)?;
                check_repeat(heap, ba.len(), count)?;
                return Ok(Some(heap.alloc_bytes(ba.repeat(count))?));
            }
            _ => return Ok(None),
        }
    }
    if let Operator::Mult = op
        && let Some(bb) = value_as_bytes(right, heap, interns).map(<[u8]>::to_vec)
        && left.as_int(heap, interns).is_some()
    {
        let count = repeat_count(left, heap, interns)?;
        check_repeat(heap, bb.len(), count)?;
        return Ok(Some(heap.alloc_bytes(bb.repeat(count))?));
    }
    Ok(None)
}

/// Repetition count for `seq * n`; negative counts clamp to zero.
fn repeat_count(value: &Value, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> RunResult<usize> {
    match value.as_int(heap, interns) {
        Some(IntRef::Small(i)) => Ok(usize::try_from(i).unwrap_or(0)),
        Some(IntRef::Big(b)) => {
            if b.is_negative() {
                Ok(0)
            } else {
                Err(ExcType::overflow_error("repeated sequence is too long"))
            }
        }
        None => Err(ExcType::type_error(format!(
            "can't multiply sequence by non-int of type '{}'",
            value.py_type(heap)
        ))),
    }
}

fn check_repeat(heap: &Heap<impl ResourceTracker>, unit: usize, count: usize) -> RunResult<()> {
    let estimate = unit.saturating_mul(count);
    if estimate > LARGE_RESULT_THRESHOLD {
        heap.tracker_ref().check_large_result(estimate)?;
    }
    Ok(())
}

fn seq_binary(
    op: &Operator,
    left: &Value,
    right: &Value,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    if !matches!(left, Value::Ref(_)) && !matches!(right, Value::Ref(_)) {
        return Ok(None);
    }
    match op {
        Operator::Add => {
            if let (Some(la), Some(lb)) = (as_list_items(left, heap), as_list_items(right, heap)) {
                let mut items = la;
                items.extend(lb);
                return Ok(Some(heap.alloc_list(items)?));
            }
            if let (Some(ta), Some(tb)) = (as_tuple_items(left, heap), as_tuple_items(right, heap)) {
                let mut items = ta;
                items.extend(tb);
                return Ok(Some(heap.alloc_tuple(items)?));
            }
            // list + non-list is the canonical concatenate error
            if as_list_items(left, heap).is_some() {
                return Err(ExcType::type_error(format!(
                    "can only concatenate list (not \"{}\") to list",
                    right.py_type(heap)
                )));
            }
            if as_tuple_items(left, heap).is_some() {
                return Err(ExcType::type_error(format!(
                    "can only concatenate tuple (not \"{}\") to tuple",
                    right.py_type(heap)
                )));
            }
            Ok(None)
        }
        Operator::Mult => {
            for (seq, other) in [(left, right), (right, left)] {
                if let Some(items) = as_list_items(seq, heap) {
                    if other.as_int(heap, interns).is_none() {
                        return Err(ExcType::type_error(format!(
                            "can't multiply sequence by non-int of type '{}'",
                            other.py_type(heap)
                        )));
                    }
                    let count = repeat_count(other, heap, interns)?;
                    check_repeat(heap, items.len() * std::mem::size_of::<Value>(), count)?;
                    return Ok(Some(heap.alloc_list(repeat_items(&items, count))?));
                }
                if let Some(items) = as_tuple_items(seq, heap) {
                    if other.as_int(heap, interns).is_none() {
                        continue;
                    }
                    let count = repeat_count(other, heap, interns)?;
                    check_repeat(heap, items.len() * std::mem::size_of::<Value>(), count)?;
                    return Ok(Some(heap.alloc_tuple(repeat_items(&items, count))?));
                }
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

fn repeat_items(items: &[Value], count: usize) -> Vec<Value> {
    let mut result = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        result.extend_from_slice(items);
    }
    result
}

fn as_list_items(value: &Value, heap: &Heap<impl ResourceTracker>) -> Option<Vec<Value>> {
    match value {
        Value::Ref(id) => match heap.get(*id) {
            HeapData::List(l) => Some(l.as_slice().to_vec()),
            _ => None,
        },
        _ => None,
    }
}

fn as_tuple_items(value: &Value, heap: &Heap<impl ResourceTracker>) -> Option<Vec<Value>> {
    match value {
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Tuple(t) => Some(t.as_slice().to_vec()),
            _ => None,
        },
        _ => None,
    }
}

fn collection_binary(
    op: &Operator,
    left: &Value,
    right: &Value,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    // dict | dict merges with right-hand precedence
    if let Operator::BitOr = op
        && let (Value::Ref(ia), Value::Ref(ib)) = (left, right)
        && matches!(heap.get(*ia), HeapData::Dict(_))
        && matches!(heap.get(*ib), HeapData::Dict(_))
    {
        let (HeapData::Dict(da), HeapData::Dict(db)) = (heap.get(*ia), heap.get(*ib)) else {
            unreachable!()
        };
        let mut merged = da.shallow_copy();
        let right_entries: Vec<_> = db.entries().to_vec();
        for entry in right_entries {
            merged.insert(entry.key, entry.hash, entry.value, heap, interns)?;
        }
        let id = heap.allocate(HeapData::Dict(merged))?;
        return Ok(Some(Value::Ref(id)));
    }

    // set algebra; mixed set/frozenset yields the left-hand kind
    let (Some(_), Some(_)) = (as_set_storage(left, heap), as_set_storage(right, heap)) else {
        return Ok(None);
    };
    let result = match op {
        Operator::BitOr | Operator::BitAnd | Operator::BitXor | Operator::Sub => {
            let a = as_set_storage(left, heap).expect("checked").shallow_copy();
            let b = as_set_storage(right, heap).expect("checked").shallow_copy();
            set_algebra(op, &a, &b, heap, interns)?
        }
        _ => return Ok(None),
    };
    let left_is_frozen = matches!(left, Value::Ref(id) if matches!(heap.get(*id), HeapData::FrozenSet(_)));
    let data = if left_is_frozen {
        HeapData::FrozenSet(FrozenSet::new(result))
    } else {
        HeapData::Set(Set::new(result))
    };
    Ok(Some(Value::Ref(heap.allocate(data)?)))
}

/// Core set algebra over storages; used by both operators and methods.
pub(crate) fn set_algebra(
    op: &Operator,
    a: &SetStorage,
    b: &SetStorage,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<SetStorage> {
    let mut result = SetStorage::new();
    match op {
        Operator::BitOr => {
            for entry in a.entries().iter().chain(b.entries()) {
                result.add(entry.value, entry.hash, heap, interns)?;
            }
        }
        Operator::BitAnd => {
            for entry in a.entries() {
                if b.contains_hashed(entry.value, entry.hash, heap, interns)? {
                    result.add(entry.value, entry.hash, heap, interns)?;
                }
            }
        }
        Operator::Sub => {
            for entry in a.entries() {
                if !b.contains_hashed(entry.value, entry.hash, heap, interns)? {
                    result.add(entry.value, entry.hash, heap, interns)?;
                }
            }
        }
        Operator::BitXor => {
            for entry in a.entries() {
                if !b.contains_hashed(entry.value, entry.hash, heap, interns)? {
                    result.add(entry.value, entry.hash, heap, interns)?;
                }
            }
            for entry in b.entries() {
                if !a.contains_hashed(entry.value, entry.hash, heap, interns)? {
                    result.add(entry.value, entry.hash, heap, interns)?;
                }
            }
        }
        _ => unreachable!("not a set operator"),
    }
    Ok(result)
}

// === unary ===

pub(crate) fn unary_minus(value: Value, heap: &mut Heap<impl ResourceTracker>, interns: &Interns) -> RunResult<Value> {
    match as_num(&value, heap, interns) {
        Some(Num::Float(f)) => Ok(Value::Float(-f)),
        Some(Num::Int(IntRef::Small(i))) => match i.checked_neg() {
            Some(n) => Ok(Value::Int(n)),
            None => Ok(int_to_value(-BigInt::from(i), heap)?),
        },
        Some(Num::Int(IntRef::Big(b))) => {
            let negated = -b.clone();
            Ok(int_to_value(negated, heap)?)
        }
        None => {
            if let Value::Ref(id) = value
                && let HeapData::Timedelta(td) = heap.get(id)
            {
                let negated = td.negated()?;
                return Ok(Value::Ref(heap.allocate(HeapData::Timedelta(negated))?));
            }
            Err(ExcType::type_error(format!(
                "bad operand type for unary -: '{}'",
                value.py_type(heap)
            )))
        }
    }
}

pub(crate) fn unary_plus(value: Value, heap: &mut Heap<impl ResourceTracker>, interns: &Interns) -> RunResult<Value> {
    match as_num(&value, heap, interns) {
        Some(Num::Float(f)) => Ok(Value::Float(f)),
        Some(Num::Int(IntRef::Small(i))) => Ok(Value::Int(i)),
        Some(Num::Int(IntRef::Big(b))) => {
            let owned = b.clone();
            Ok(int_to_value(owned, heap)?)
        }
        None => {
            if let Value::Ref(id) = value
                && matches!(heap.get(id), HeapData::Timedelta(_))
            {
                return Ok(value);
            }
            Err(ExcType::type_error(format!(
                "bad operand type for unary +: '{}'",
                value.py_type(heap)
            )))
        }
    }
}

pub(crate) fn unary_invert(value: Value, heap: &mut Heap<impl ResourceTracker>, interns: &Interns) -> RunResult<Value> {
    match value.as_int(heap, interns) {
        Some(IntRef::Small(i)) => Ok(Value::Int(!i)),
        Some(IntRef::Big(b)) => {
            let inverted = -(b.clone()) - 1;
            Ok(int_to_value(inverted, heap)?)
        }
        None => Err(ExcType::type_error(format!(
            "bad operand type for unary ~: '{}'",
            value.py_type(heap)
        ))),
    }
}

// === augmented assignment ===

/// `target op= rhs`. Mutates lists/sets/dicts in place so aliases observe the
/// change; everything else falls back to the plain binary operator and the
/// caller rebinds.
pub(crate) fn aug_op(
    op: &Operator,
    target: Value,
    rhs: Value,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    if let Value::Ref(id) = target {
        match (op, heap.get(id)) {
            (Operator::Add, HeapData::List(_)) => {
                // `lst += iterable` extends in place, unlike `lst + other`
                let items = iterate_to_vec(rhs, heap, interns)?;
                let HeapData::List(list) = heap.get_mut(id) else { unreachable!() };
                list.as_vec_mut().extend(items);
                return Ok(target);
            }
            (Operator::Mult, HeapData::List(list)) => {
                if rhs.as_int(heap, interns).is_some() {
                    let items = list.as_slice().to_vec();
                    let count = repeat_count(&rhs, heap, interns)?;
                    check_repeat(heap, items.len() * std::mem::size_of::<Value>(), count)?;
                    let repeated = repeat_items(&items, count);
                    let HeapData::List(list) = heap.get_mut(id) else { unreachable!() };
                    *list.as_vec_mut() = repeated;
                    return Ok(target);
                }
            }
            (Operator::BitOr, HeapData::Dict(_)) => {
                if let Value::Ref(rid) = rhs
                    && matches!(heap.get(rid), HeapData::Dict(_))
                {
                    let HeapData::Dict(other) = heap.get(rid) else { unreachable!() };
                    let entries: Vec<_> = other.entries().to_vec();
                    let mut dict = match heap.take(id) {
                        HeapData::Dict(d) => d,
                        other => {
                            heap.put_back(id, other);
                            unreachable!("checked dict above")
                        }
                    };
                    let mut result = Ok(());
                    for entry in entries {
                        if let Err(err) = dict.insert(entry.key, entry.hash, entry.value, heap, interns) {
                            result = Err(err);
                            break;
                        }
                    }
                    heap.put_back(id, HeapData::Dict(dict));
                    result?;
                    return Ok(target);
                }
            }
            (Operator::BitOr | Operator::BitAnd | Operator::BitXor | Operator::Sub, HeapData::Set(_)) => {
                if as_set_storage(&rhs, heap).is_some() {
                    let other = as_set_storage(&rhs, heap).expect("checked").shallow_copy();
                    let current = match heap.take(id) {
                        HeapData::Set(s) => s.into_storage(),
                        other_data => {
                            heap.put_back(id, other_data);
                            unreachable!("checked set above")
                        }
                    };
                    let result = set_algebra(op, &current, &other, heap, interns);
                    match result {
                        Ok(storage) => {
                            heap.put_back(id, HeapData::Set(Set::new(storage)));
                            return Ok(target);
                        }
                        Err(err) => {
                            heap.put_back(id, HeapData::Set(Set::new(current)));
                            return Err(err);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    binary_op(op, target, rhs, heap, interns)
}

// === sorting ===

/// Stable merge sort over `(key, payload)` pairs, comparing keys with `<`.
///
/// Used by `list.sort` and `sorted`. `reverse` flips the comparison while
/// preserving stability, exactly like CPython's `reverse=True`.
pub(crate) fn sort_pairs(
    pairs: Vec<(Value, Value)>,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
    reverse: bool,
) -> RunResult<Vec<(Value, Value)>> {
    fn merge(
        left: Vec<(Value, Value)>,
        right: Vec<(Value, Value)>,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
        reverse: bool,
    ) -> RunResult<Vec<(Value, Value)>> {
        let mut result = Vec::with_capacity(left.len() + right.len());
        let (mut li, mut ri) = (0, 0);
        while li < left.len() && ri < right.len() {
            // stability: take from the left unless the right is strictly smaller
            let right_first = lt(&right[ri].0, &left[li].0, heap, interns, reverse)?;
            if right_first {
                result.push(right[ri]);
                ri += 1;
            } else {
                result.push(left[li]);
                li += 1;
            }
        }
        result.extend_from_slice(&left[li..]);
        result.extend_from_slice(&right[ri..]);
        Ok(result)
    }

    fn lt(
        a: &Value,
        b: &Value,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
        reverse: bool,
    ) -> RunResult<bool> {
        let ordering = values_cmp(a, b, heap, interns)?.ok_or_else(|| {
            ExcType::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                a.py_type(heap),
                b.py_type(heap)
            ))
        })?;
        Ok(if reverse {
            ordering == Ordering::Greater
        } else {
            ordering == Ordering::Less
        })
    }

    if pairs.len() <= 1 {
        return Ok(pairs);
    }
    let mid = pairs.len() / 2;
    let mut left = pairs;
    let right = left.split_off(mid);
    let left = sort_pairs(left, heap, interns, reverse)?;
    let right = sort_pairs(right, heap, interns, reverse)?;
    merge(left, right, heap, interns, reverse)
}

// === truthiness-preserving type promotion helpers ===

/// `float` value of any number, for `float(x)` and float-accepting APIs.
pub(crate) fn to_f64(value: &Value, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> Option<f64> {
    as_num(value, heap, interns).and_then(num_to_f64)
}
