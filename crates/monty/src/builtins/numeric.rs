//! The numeric builtin group: `abs bin chr divmod hex oct ord pow round`.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    expressions::Operator,
    heap::{Heap, HeapData},
    intern::Interns,
    ops,
    resource::ResourceTracker,
    types::long_int::int_to_value,
    value::{IntRef, Value, value_as_str},
};

pub(super) fn call_abs(
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    let value = args.exactly_one("abs")?;
    match value {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Int(i) => match i.checked_abs() {
            Some(a) => Ok(Value::Int(a)),
            None => Ok(int_to_value(-BigInt::from(i), heap)?),
        },
        _ => {
            if let Some(IntRef::Big(big)) = value.as_int(heap, interns) {
                let result = big.abs();
                return Ok(int_to_value(result, heap)?);
            }
            if let Value::Ref(id) = value
                && let HeapData::Timedelta(td) = heap.get(id)
            {
                let magnitude = if td.as_micros() < 0 { td.negated()? } else { *td };
                return Ok(Value::Ref(heap.allocate(HeapData::Timedelta(magnitude))?));
            }
            Err(ExcType::type_error(format!(
                "bad operand type for abs(): '{}'",
                value.py_type(heap)
            )))
        }
    }
}

/// `bin`/`oct`/`hex`: radix rendering with the `0b`/`0o`/`0x` prefix.
pub(super) fn call_to_base(
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
    fname: &str,
    radix: u32,
) -> RunResult<Value> {
    let value = args.exactly_one(fname)?;
    let Some(int) = value.as_int(heap, interns) else {
        return Err(ExcType::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.py_type(heap)
        )));
    };
    let big = int.to_big();
    let (sign, magnitude) = if big.is_negative() { ("-", -big) } else { ("", big) };
    let prefix = match radix {
        2 => "0b",
        8 => "0o",
        _ => "0x",
    };
    let text = format!("{sign}{prefix}{}", magnitude.to_str_radix(radix));
    Ok(heap.alloc_str(text)?)
}

pub(super) fn call_chr(
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    let value = args.exactly_one("chr")?;
    let code = value.expect_index(heap, interns, "chr")?;
    let c = u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| ExcType::value_error("chr() arg not in range(0x110000)"))?;
    Ok(heap.alloc_str(c.to_string())?)
}

pub(super) fn call_ord(
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    let value = args.exactly_one("ord")?;
    let Some(s) = value_as_str(&value, heap, interns) else {
        return Err(ExcType::type_error(format!(
            "ord() expected string of length 1, but {} found",
            value.py_type(heap)
        )));
    };
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::Int(i64::from(c as u32))),
        _ => Err(ExcType::type_error(format!(
            "ord() expected a character, but string of length {} found",
            s.chars().count()
        ))),
    }
}

pub(super) fn call_divmod(
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.no_kwargs("divmod")?;
    args.check_arity("divmod", 2, 2)?;
    let a = args.pos_arg(0).expect("arity checked");
    let b = args.pos_arg(1).expect("arity checked");
    let quotient = ops::binary_op(&Operator::FloorDiv, a, b, heap, interns)?;
    let remainder = ops::binary_op(&Operator::Mod, a, b, heap, interns)?;
    Ok(heap.alloc_tuple(vec![quotient, remainder])?)
}

/// Three-argument `pow` does modular exponentiation on ints; two-argument
/// `pow` is the `**` operator.
pub(super) fn call_pow(
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.reject_unknown_kwargs("pow", &["base", "exp", "mod"])?;
    args.check_arity("pow", 0, 3)?;
    let base = args
        .pos_or_kwarg("pow", 0, "base")?
        .ok_or_else(|| ExcType::type_error("pow() missing required argument: 'base'"))?;
    let exp = args
        .pos_or_kwarg("pow", 1, "exp")?
        .ok_or_else(|| ExcType::type_error("pow() missing required argument: 'exp'"))?;
    let modulus = args.pos_or_kwarg("pow", 2, "mod")?;

    let Some(modulus) = modulus.filter(|m| !matches!(m, Value::None)) else {
        return ops::binary_op(&Operator::Pow, base, exp, heap, interns);
    };

    let (Some(base_int), Some(exp_int), Some(mod_int)) = (
        base.as_int(heap, interns),
        exp.as_int(heap, interns),
        modulus.as_int(heap, interns),
    ) else {
        return Err(ExcType::type_error(
            "pow() 3rd argument not allowed unless all arguments are integers",
        ));
    };
    let (base_big, exp_big, mod_big) = (base_int.to_big(), exp_int.to_big(), mod_int.to_big());
    if mod_big.is_zero() {
        return Err(ExcType::value_error("pow() 3rd argument cannot be 0"));
    }
    if exp_big.is_negative() {
        return Err(ExcType::value_error(
            "pow() 2nd argument cannot be negative when 3rd argument specified",
        ));
    }
    let mut result = base_big.modpow(&exp_big, &mod_big);
    // modpow yields the remainder with the sign of the base; Python wants the
    // sign of the modulus
    if result.is_negative() != mod_big.is_negative() && !result.is_zero() {
        result += &mod_big;
    }
    Ok(int_to_value(result, heap)?)
}

/// `round(x[, ndigits])` with banker's rounding.
pub(super) fn call_round(
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.reject_unknown_kwargs("round", &["number", "ndigits"])?;
    args.check_arity("round", 1, 2)?;
    let number = args
        .pos_or_kwarg("round", 0, "number")?
        .ok_or_else(|| ExcType::type_error("round() missing required argument: 'number' (pos 1)"))?;
    let ndigits = match args.pos_or_kwarg("round", 1, "ndigits")? {
        None | Some(Value::None) => None,
        Some(v) => Some(v.expect_index(heap, interns, "round")?),
    };

    match number {
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Int(_) | Value::InternLongInt(_) => match ndigits {
            None | Some(0..) => Ok(number),
            Some(n) => {
                // negative ndigits rounds an int to a multiple of 10^-n
                let Some(IntRef::Small(i)) = number.as_int(heap, interns) else {
                    return Ok(number);
                };
                let factor = 10i64.checked_pow(u32::try_from(-n).unwrap_or(u32::MAX)).unwrap_or(i64::MAX);
                let half = factor / 2;
                let rem = i.rem_euclid(factor);
                let floor = i - rem;
                let rounded = if rem > half || (rem == half && (floor / factor) % 2 != 0) {
                    floor + factor
                } else {
                    floor
                };
                Ok(Value::Int(rounded))
            }
        },
        Value::Float(f) => match ndigits {
            None => {
                if f.is_nan() {
                    return Err(ExcType::value_error("cannot convert float NaN to integer"));
                }
                if f.is_infinite() {
                    return Err(ExcType::overflow_error("cannot convert float infinity to integer"));
                }
                let rounded = f.round_ties_even();
                if rounded.abs() > i64::MAX as f64 {
                    let big: BigInt = num_traits::FromPrimitive::from_f64(rounded).unwrap_or_else(BigInt::zero);
                    return Ok(int_to_value(big, heap)?);
                }
                Ok(Value::Int(rounded as i64))
            }
            Some(n) => {
                if !f.is_finite() {
                    return Ok(Value::Float(f));
                }
                let factor = 10f64.powi(i32::try_from(n).unwrap_or(i32::MAX));
                let scaled = f * factor;
                if !scaled.is_finite() {
                    return Ok(Value::Float(f));
                }
                Ok(Value::Float(scaled.round_ties_even() / factor))
            }
        },
        Value::Ref(_) => {
            if let Some(IntRef::Big(_)) = number.as_int(heap, interns) {
                return Ok(number);
            }
            Err(ExcType::type_error(format!(
                "type {} doesn't define __round__ method",
                number.py_type(heap)
            )))
        }
        _ => Err(ExcType::type_error(format!(
            "type {} doesn't define __round__ method",
            number.py_type(heap)
        ))),
    }
}

