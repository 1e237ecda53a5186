//! Calling type objects: `int('42')`, `list(x)`, `dict(a=1)`, `type(x)`, …

use num_bigint::BigInt;

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    heap::{Heap, HeapData},
    intern::Interns,
    ops::to_f64,
    resource::ResourceTracker,
    types::{
        Type, datetime,
        dict::{Dict, hash_key},
        iter::iterate_to_vec,
        long_int::int_to_value,
        range::Range,
        set::{FrozenSet, Set, storage_from_values},
        slice::Slice,
    },
    value::{IntRef, Value, value_as_bytes, value_as_str},
};

use super::value_to_str;

/// Dispatches `T(...)` for every callable type object.
pub(crate) fn call_type(
    t: Type,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    match t {
        Type::Bool => {
            args.no_kwargs("bool")?;
            args.check_arity("bool", 0, 1)?;
            match args.pos_arg(0) {
                Some(v) => Ok(Value::Bool(v.py_bool(heap, interns))),
                None => Ok(Value::Bool(false)),
            }
        }
        Type::Int => construct_int(&args, heap, interns),
        Type::Float => construct_float(&args, heap, interns),
        Type::Str => {
            args.no_kwargs("str")?;
            args.check_arity("str", 0, 1)?;
            match args.pos_arg(0) {
                Some(v) => value_to_str(v, heap, interns),
                None => Ok(heap.alloc_str(String::new())?),
            }
        }
        Type::Bytes => construct_bytes(&args, heap, interns),
        Type::List => {
            args.no_kwargs("list")?;
            args.check_arity("list", 0, 1)?;
            let items = match args.pos_arg(0) {
                Some(v) => iterate_to_vec(v, heap, interns)?,
                None => Vec::new(),
            };
            Ok(heap.alloc_list(items)?)
        }
        Type::Tuple => {
            args.no_kwargs("tuple")?;
            args.check_arity("tuple", 0, 1)?;
            let items = match args.pos_arg(0) {
                Some(v) => iterate_to_vec(v, heap, interns)?,
                None => Vec::new(),
            };
            Ok(heap.alloc_tuple(items)?)
        }
        Type::Dict => construct_dict(&args, heap, interns),
        Type::Set => {
            args.no_kwargs("set")?;
            args.check_arity("set", 0, 1)?;
            let values = match args.pos_arg(0) {
                Some(v) => iterate_to_vec(v, heap, interns)?,
                None => Vec::new(),
            };
            let storage = storage_from_values(values, heap, interns)?;
            Ok(Value::Ref(heap.allocate(HeapData::Set(Set::new(storage)))?))
        }
        Type::FrozenSet => {
            args.no_kwargs("frozenset")?;
            args.check_arity("frozenset", 0, 1)?;
            let values = match args.pos_arg(0) {
                Some(v) => iterate_to_vec(v, heap, interns)?,
                None => Vec::new(),
            };
            let storage = storage_from_values(values, heap, interns)?;
            Ok(Value::Ref(heap.allocate(HeapData::FrozenSet(FrozenSet::new(storage)))?))
        }
        Type::Range => construct_range(&args, heap, interns),
        Type::Slice => construct_slice(&args, heap),
        Type::Type => {
            args.no_kwargs("type")?;
            args.check_arity("type", 1, 1)?;
            let value = args.pos_arg(0).expect("arity checked");
            Ok(Value::Builtin(super::Builtins::Type(value.py_type(heap))))
        }
        Type::Date => datetime::construct_date(&args, heap, interns),
        Type::Time => datetime::construct_time(&args, heap, interns),
        Type::DateTime => datetime::construct_datetime(&args, heap, interns),
        Type::Timedelta => datetime::construct_timedelta(&args, heap, interns),
        Type::Timezone => datetime::construct_timezone(&args, heap, interns),
        Type::Exception(exc) => {
            args.no_kwargs(exc.into())?;
            let instance = crate::exception::ExcInstance::new(exc, args.pos);
            Ok(Value::Ref(heap.allocate(HeapData::Exception(instance))?))
        }
        _ => Err(ExcType::type_error(format!("cannot create '{t}' instances"))),
    }
}

fn construct_int(
    args: &ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.reject_unknown_kwargs("int", &["base"])?;
    args.check_arity("int", 0, 2)?;
    let Some(value) = args.pos_arg(0) else {
        return Ok(Value::Int(0));
    };
    let base = match args.pos_or_kwarg("int", 1, "base")? {
        None => None,
        Some(v) => Some(v.expect_index(heap, interns, "int")?),
    };

    if let Some(base) = base {
        let Some(text) = value_as_str(&value, heap, interns) else {
            return Err(ExcType::type_error("int() can't convert non-string with explicit base"));
        };
        if base != 0 && !(2..=36).contains(&base) {
            return Err(ExcType::value_error("int() base must be >= 2 and <= 36, or 0"));
        }
        let text = text.to_owned();
        return parse_int_str(&text, base, heap);
    }

    match value {
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Int(_) | Value::InternLongInt(_) => match value.as_int(heap, interns) {
            Some(IntRef::Small(i)) => Ok(Value::Int(i)),
            Some(IntRef::Big(b)) => {
                let owned = b.clone();
                Ok(int_to_value(owned, heap)?)
            }
            None => unreachable!("matched int variants"),
        },
        Value::Float(f) => {
            if f.is_nan() {
                return Err(ExcType::value_error("cannot convert float NaN to integer"));
            }
            if f.is_infinite() {
                return Err(ExcType::overflow_error("cannot convert float infinity to integer"));
            }
            let truncated = f.trunc();
            if truncated.abs() <= i64::MAX as f64 {
                Ok(Value::Int(truncated as i64))
            } else {
                let big: BigInt = num_traits::FromPrimitive::from_f64(truncated)
                    .ok_or_else(|| ExcType::overflow_error("cannot convert float infinity to integer"))?;
                Ok(int_to_value(big, heap)?)
            }
        }
        _ => match value_as_str(&value, heap, interns) {
            Some(text) => {
                let text = text.to_owned();
                parse_int_str(&text, 10, heap)
            }
            None => {
                if let Value::Ref(id) = value
                    && let HeapData::LongInt(b) = heap.get(id)
                {
                    let owned = b.clone();
                    return Ok(int_to_value(owned, heap)?);
                }
                Err(ExcType::type_error(format!(
                    "int() argument must be a string, a bytes-like object or a real number, not '{}'",
                    value.py_type(heap)
                )))
            }
        },
    }
}

/// Parses an int literal the way `int(str, base)` does: optional sign,
/// optional radix prefix (base 0 or matching base), underscores between
/// digits, surrounding whitespace.
fn parse_int_str(text: &str, base: i64, heap: &mut Heap<impl ResourceTracker>) -> RunResult<Value> {
    let invalid = || {
        ExcType::value_error(format!(
            "invalid literal for int() with base {base}: {}",
            crate::repr::str_repr(text)
        ))
    };
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix(['-', '+']) {
        Some(rest) => (trimmed.starts_with('-'), rest),
        None => (false, trimmed),
    };
    let (radix, digits) = detect_radix(body, base).ok_or_else(invalid)?;
    let cleaned = strip_underscores(digits).ok_or_else(invalid)?;
    if cleaned.is_empty() {
        return Err(invalid());
    }
    let magnitude = BigInt::parse_bytes(cleaned.as_bytes(), radix).ok_or_else(invalid)?;
    let result = if negative { -magnitude } else { magnitude };
    Ok(int_to_value(result, heap)?)
}

fn detect_radix(body: &str, base: i64) -> Option<(u32, &str)> {
    let lower = body.get(..2).map(str::to_ascii_lowercase);
    let prefix_radix = match lower.as_deref() {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    match (base, prefix_radix) {
        (0, Some(r)) => Some((r, &body[2..])),
        (0, None) => Some((10, body)),
        (base, Some(r)) if base == i64::from(r) => Some((r, &body[2..])),
        (base, _) if (2..=36).contains(&base) => Some((base as u32, body)),
        _ => None,
    }
}

/// Removes underscores, rejecting leading/trailing/doubled ones.
fn strip_underscores(digits: &str) -> Option<String> {
    if digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return None;
    }
    Some(digits.chars().filter(|c| *c != '_').collect())
}

fn construct_float(
    args: &ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.no_kwargs("float")?;
    args.check_arity("float", 0, 1)?;
    let Some(value) = args.pos_arg(0) else {
        return Ok(Value::Float(0.0));
    };
    if let Some(f) = to_f64(&value, heap, interns) {
        return Ok(Value::Float(f));
    }
    if value.as_int(heap, interns).is_some() {
        return Err(ExcType::overflow_error("int too large to convert to float"));
    }
    let Some(text) = value_as_str(&value, heap, interns) else {
        return Err(ExcType::type_error(format!(
            "float() argument must be a string or a real number, not '{}'",
            value.py_type(heap)
        )));
    };
    let parsed = parse_float_str(text).ok_or_else(|| {
        ExcType::value_error(format!(
            "could not convert string to float: {}",
            crate::repr::str_repr(text)
        ))
    })?;
    Ok(Value::Float(parsed))
}

fn parse_float_str(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (negative, body) = match trimmed.strip_prefix(['-', '+']) {
        Some(rest) => (trimmed.starts_with('-'), rest),
        None => (false, trimmed),
    };
    let magnitude = match body.to_ascii_lowercase().as_str() {
        "inf" | "infinity" => f64::INFINITY,
        "nan" => f64::NAN,
        _ => {
            let cleaned = strip_underscores(body)?;
            // reject forms Rust accepts but Python doesn't
            if cleaned.contains(['x', 'X']) {
                return None;
            }
            cleaned.parse::<f64>().ok()?
        }
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn construct_bytes(
    args: &ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.reject_unknown_kwargs("bytes", &["encoding"])?;
    args.check_arity("bytes", 0, 2)?;
    let Some(value) = args.pos_arg(0) else {
        return Ok(heap.alloc_bytes(Vec::new())?);
    };
    if let Some(text) = value_as_str(&value, heap, interns) {
        let encoding = args
            .pos_or_kwarg("bytes", 1, "encoding")?
            .ok_or_else(|| ExcType::type_error("string argument without an encoding"))?;
        let Some(enc_name) = value_as_str(&encoding, heap, interns) else {
            return Err(ExcType::type_error("bytes() argument 'encoding' must be str"));
        };
        match enc_name.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" | "ascii" => {
                let owned = text.as_bytes().to_vec();
                return Ok(heap.alloc_bytes(owned)?);
            }
            other => return Err(ExcType::value_error(format!("unknown encoding: {other}"))),
        }
    }
    if let Some(b) = value_as_bytes(&value, heap, interns) {
        let owned = b.to_vec();
        return Ok(heap.alloc_bytes(owned)?);
    }
    if let Some(IntRef::Small(n)) = value.as_int(heap, interns) {
        let count = usize::try_from(n).map_err(|_| ExcType::value_error("negative count"))?;
        heap.tracker_ref().check_large_result(count)?;
        return Ok(heap.alloc_bytes(vec![0; count])?);
    }
    // iterable of ints
    let items = iterate_to_vec(value, heap, interns)?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item.as_int(heap, interns) {
            Some(IntRef::Small(i)) if (0..=255).contains(&i) => out.push(i as u8),
            Some(_) => return Err(ExcType::value_error("bytes must be in range(0, 256)")),
            None => {
                return Err(ExcType::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    item.py_type(heap)
                )));
            }
        }
    }
    Ok(heap.alloc_bytes(out)?)
}

fn construct_dict(
    args: &ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.check_arity("dict", 0, 1)?;
    let mut dict = Dict::new();
    if let Some(source) = args.pos_arg(0) {
        match source {
            Value::Ref(id) if matches!(heap.get(id), HeapData::Dict(_)) => {
                let HeapData::Dict(d) = heap.get(id) else { unreachable!() };
                let entries: Vec<_> = d.entries().to_vec();
                for entry in entries {
                    dict.insert(entry.key, entry.hash, entry.value, heap, interns)?;
                }
            }
            _ => {
                // an iterable of key/value pairs
                let pairs = iterate_to_vec(source, heap, interns)?;
                for (index, pair) in pairs.into_iter().enumerate() {
                    let items = iterate_to_vec(pair, heap, interns).map_err(|_| {
                        ExcType::type_error(format!(
                            "cannot convert dictionary update sequence element #{index} to a sequence"
                        ))
                    })?;
                    let [key, value] = items.as_slice() else {
                        return Err(ExcType::value_error(format!(
                            "dictionary update sequence element #{index} has length {}; 2 is required",
                            items.len()
                        )));
                    };
                    let hash = hash_key(*key, heap, interns)?;
                    dict.insert(*key, hash, *value, heap, interns)?;
                }
            }
        }
    }
    // keyword arguments become string keys, in order
    let kwargs = args.kwargs.clone();
    for (name, value) in kwargs {
        let key = heap.alloc_str(name)?;
        let hash = hash_key(key, heap, interns)?;
        dict.insert(key, hash, value, heap, interns)?;
    }
    Ok(Value::Ref(heap.allocate(HeapData::Dict(dict))?))
}

fn construct_range(
    args: &ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.no_kwargs("range")?;
    args.check_arity("range", 1, 3)?;
    let first = args.pos_arg(0).expect("arity checked").expect_index(heap, interns, "range")?;
    let range = match (args.pos_arg(1), args.pos_arg(2)) {
        (None, _) => Range::new(0, first, 1)?,
        (Some(stop), None) => Range::new(first, stop.expect_index(heap, interns, "range")?, 1)?,
        (Some(stop), Some(step)) => Range::new(
            first,
            stop.expect_index(heap, interns, "range")?,
            step.expect_index(heap, interns, "range")?,
        )?,
    };
    Ok(Value::Ref(heap.allocate(HeapData::Range(range))?))
}

fn construct_slice(args: &ArgValues, heap: &mut Heap<impl ResourceTracker>) -> RunResult<Value> {
    args.no_kwargs("slice")?;
    args.check_arity("slice", 1, 3)?;
    let slice = match (args.pos_arg(0), args.pos_arg(1), args.pos_arg(2)) {
        (Some(stop), None, _) => Slice {
            start: Value::None,
            stop,
            step: Value::None,
        },
        (Some(start), Some(stop), step) => Slice {
            start,
            stop,
            step: step.unwrap_or(Value::None),
        },
        _ => unreachable!("arity checked"),
    };
    Ok(Value::Ref(heap.allocate(HeapData::Slice(slice))?))
}

