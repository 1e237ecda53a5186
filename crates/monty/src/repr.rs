//! `repr()` and `str()` rendering.
//!
//! Containers render recursively with a set of currently-rendering heap ids;
//! re-entering an id emits the cyclic placeholder (`[...]` / `{...}`), which
//! is what keeps `lst.append(lst); repr(lst)` terminating. Floats render with
//! ryu's shortest round-trip output post-processed into CPython's exponent
//! conventions.

use ahash::AHashSet;

use crate::{
    builtins::Builtins,
    exception::{ExcInstance, RunResult},
    heap::{Heap, HeapData, HeapId},
    intern::Interns,
    resource::ResourceTracker,
    types::datetime,
    value::Value,
};

/// `repr(value)`.
pub(crate) fn repr_value(
    value: &Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<String> {
    let mut out = String::new();
    let mut rendering = AHashSet::new();
    repr_fmt(value, &mut out, heap, interns, &mut rendering)?;
    Ok(out)
}

/// `str(value)`: identity for strings, message extraction for exceptions,
/// dedicated forms for the datetime family, `repr` for everything else.
pub(crate) fn str_value(
    value: &Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<String> {
    match value {
        Value::InternString(id) => Ok(interns.get_str(*id).to_owned()),
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Str(s) => Ok(s.clone()),
            HeapData::Exception(exc) => exception_str(exc, heap, interns),
            HeapData::Date(d) => Ok(datetime::str_date(d)),
            HeapData::Time(t) => Ok(datetime::str_time(t, heap)),
            HeapData::DateTime(dt) => Ok(datetime::str_datetime(dt, heap)),
            HeapData::Timedelta(td) => Ok(datetime::str_timedelta(td)),
            _ => repr_value(value, heap, interns),
        },
        _ => repr_value(value, heap, interns),
    }
}

/// `str(e)` for an exception instance: empty for no args, the first arg for
/// one (repr'd for `KeyError`), the args tuple otherwise.
pub(crate) fn exception_str(
    exc: &ExcInstance,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<String> {
    match exc.args.as_slice() {
        [] => Ok(String::new()),
        [arg] => {
            if exc.exc_type == crate::exception::ExcType::KeyError {
                repr_value(arg, heap, interns)
            } else {
                str_value(arg, heap, interns)
            }
        }
        args => {
            let mut out = String::from("(");
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&repr_value(arg, heap, interns)?);
            }
            out.push(')');
            Ok(out)
        }
    }
}

fn repr_fmt(
    value: &Value,
    out: &mut String,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
    rendering: &mut AHashSet<HeapId>,
) -> RunResult<()> {
    match value {
        Value::Undefined => unreachable!("Undefined is never rendered"),
        Value::None => out.push_str("None"),
        Value::Ellipsis => out.push_str("Ellipsis"),
        Value::NotImplemented => out.push_str("NotImplemented"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(f) => out.push_str(&float_repr(*f)),
        Value::InternString(id) => out.push_str(&str_repr(interns.get_str(*id))),
        Value::InternBytes(id) => out.push_str(&bytes_repr(interns.get_bytes(*id))),
        Value::InternLongInt(id) => out.push_str(&interns.get_long_int(*id).to_string()),
        Value::Builtin(b) => out.push_str(&builtin_repr(b)),
        Value::Module(m) => {
            out.push_str("<module '");
            out.push_str(m.name());
            out.push_str("'>");
        }
        Value::Ref(id) => repr_heap(*id, out, heap, interns, rendering)?,
    }
    Ok(())
}

fn builtin_repr(builtin: &Builtins) -> String {
    match builtin {
        Builtins::Function(f) => format!("<built-in function {}>", f.name()),
        Builtins::Type(t) => format!("<class '{t}'>"),
        Builtins::Exc(e) => format!("<class '{e}'>"),
    }
}

fn repr_heap(
    id: HeapId,
    out: &mut String,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
    rendering: &mut AHashSet<HeapId>,
) -> RunResult<()> {
    match heap.get(id) {
        HeapData::Str(s) => out.push_str(&str_repr(s)),
        HeapData::Bytes(b) => out.push_str(&bytes_repr(b)),
        HeapData::LongInt(i) => out.push_str(&i.to_string()),
        HeapData::List(list) => {
            if !rendering.insert(id) {
                out.push_str("[...]");
                return Ok(());
            }
            let items = list.as_slice().to_vec();
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                heap.with_data_depth(|| repr_fmt(item, out, heap, interns, rendering))?;
            }
            out.push(']');
            rendering.remove(&id);
        }
        HeapData::Tuple(tuple) => {
            if !rendering.insert(id) {
                out.push_str("(...)");
                return Ok(());
            }
            let items = tuple.as_slice().to_vec();
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                heap.with_data_depth(|| repr_fmt(item, out, heap, interns, rendering))?;
            }
            if items.len() == 1 {
                out.push(',');
            }
            out.push(')');
            rendering.remove(&id);
        }
        HeapData::Dict(dict) => {
            if !rendering.insert(id) {
                out.push_str("{...}");
                return Ok(());
            }
            let entries: Vec<_> = dict.entries().iter().map(|e| (e.key, e.value)).collect();
            out.push('{');
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                heap.with_data_depth(|| repr_fmt(key, out, heap, interns, rendering))?;
                out.push_str(": ");
                heap.with_data_depth(|| repr_fmt(value, out, heap, interns, rendering))?;
            }
            out.push('}');
            rendering.remove(&id);
        }
        HeapData::Set(set) => {
            let items: Vec<_> = set.storage().entries().iter().map(|e| e.value).collect();
            if items.is_empty() {
                out.push_str("set()");
                return Ok(());
            }
            if !rendering.insert(id) {
                out.push_str("{...}");
                return Ok(());
            }
            out.push('{');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                heap.with_data_depth(|| repr_fmt(item, out, heap, interns, rendering))?;
            }
            out.push('}');
            rendering.remove(&id);
        }
        HeapData::FrozenSet(set) => {
            let items: Vec<_> = set.storage().entries().iter().map(|e| e.value).collect();
            if items.is_empty() {
                out.push_str("frozenset()");
                return Ok(());
            }
            out.push_str("frozenset({");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                heap.with_data_depth(|| repr_fmt(item, out, heap, interns, rendering))?;
            }
            out.push_str("})");
        }
        HeapData::Range(r) => {
            if r.step() == 1 {
                out.push_str(&format!("range({}, {})", r.start(), r.stop()));
            } else {
                out.push_str(&format!("range({}, {}, {})", r.start(), r.stop(), r.step()));
            }
        }
        HeapData::Slice(s) => {
            let (start, stop, step) = (s.start, s.stop, s.step);
            out.push_str("slice(");
            repr_fmt(&start, out, heap, interns, rendering)?;
            out.push_str(", ");
            repr_fmt(&stop, out, heap, interns, rendering)?;
            out.push_str(", ");
            repr_fmt(&step, out, heap, interns, rendering)?;
            out.push(')');
        }
        HeapData::Closure(c) => {
            let name = interns.get_str(interns.get_function(c.function_id).name_id);
            out.push_str(&format!("<function {name}>"));
        }
        HeapData::BoundMethod(m) => {
            let receiver_type = m.receiver.py_type(heap);
            out.push_str(&format!(
                "<built-in method {} of {} object>",
                interns.get_str(m.method),
                receiver_type
            ));
        }
        HeapData::Exception(exc) => {
            let args = exc.args.clone();
            out.push_str(exc.exc_type.into());
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                heap.with_data_depth(|| repr_fmt(arg, out, heap, interns, rendering))?;
            }
            out.push(')');
        }
        HeapData::Date(d) => out.push_str(&datetime::repr_date(d)),
        HeapData::Time(t) => out.push_str(&datetime::repr_time(t, heap)),
        HeapData::DateTime(dt) => out.push_str(&datetime::repr_datetime(dt, heap)),
        HeapData::Timedelta(td) => out.push_str(&datetime::repr_timedelta(td)),
        HeapData::Timezone(tz) => out.push_str(&datetime::repr_timezone(tz)),
        HeapData::Cell(_) | HeapData::Moved => unreachable!("not first-class values"),
    }
    Ok(())
}

/// CPython `repr(float)`: shortest round-trip digits, `.0` suffix for
/// integral values, `e+NN`/`e-NN` exponents with at least two digits.
pub(crate) fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".to_owned() } else { "-inf".to_owned() };
    }
    let mut buffer = ryu::Buffer::new();
    let rendered = buffer.format(f);
    match rendered.find('e') {
        Some(pos) => {
            let (mantissa, exponent) = rendered.split_at(pos);
            let exponent = &exponent[1..];
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ("-", digits),
                None => ("+", exponent),
            };
            // ryu renders "1e16"; Python wants "1e+16" with 2+ exponent digits
            let mantissa = mantissa.strip_suffix(".0").unwrap_or(mantissa);
            if digits.len() < 2 {
                format!("{mantissa}e{sign}0{digits}")
            } else {
                format!("{mantissa}e{sign}{digits}")
            }
        }
        None => rendered.to_owned(),
    }
}

/// CPython `repr(str)`: single quotes, switching to double quotes when the
/// text contains `'` but no `"`; control characters escape as `\xXX`.
pub(crate) fn str_repr(s: &str) -> String {
    let has_single = s.contains('\'');
    let has_double = s.contains('"');
    let quote = if has_single && !has_double { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || (0x7f..0xa0).contains(&(c as u32)) => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// CPython `repr(bytes)`.
pub(crate) fn bytes_repr(b: &[u8]) -> String {
    let has_single = b.contains(&b'\'');
    let has_double = b.contains(&b'"');
    let quote = if has_single && !has_double { '"' } else { '\'' };
    let mut out = String::with_capacity(b.len() + 3);
    out.push('b');
    out.push(quote);
    for &byte in b {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            byte if byte == quote as u8 => {
                out.push('\\');
                out.push(byte as char);
            }
            0x20..=0x7e => out.push(byte as char),
            byte => out.push_str(&format!("\\x{byte:02x}")),
        }
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_repr_matches_cpython() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(-0.5), "-0.5");
        assert_eq!(float_repr(3.14), "3.14");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1e-5), "1e-05");
        assert_eq!(float_repr(f64::INFINITY), "inf");
        assert_eq!(float_repr(f64::NEG_INFINITY), "-inf");
        assert_eq!(float_repr(f64::NAN), "nan");
        assert_eq!(float_repr(-0.0), "-0.0");
        assert_eq!(float_repr(100.0), "100.0");
    }

    #[test]
    fn str_repr_quoting() {
        assert_eq!(str_repr("abc"), "'abc'");
        assert_eq!(str_repr("it's"), "\"it's\"");
        assert_eq!(str_repr("both ' and \""), "'both \\' and \"'");
        assert_eq!(str_repr("line\nbreak"), "'line\\nbreak'");
        assert_eq!(str_repr("\x01"), "'\\x01'");
        assert_eq!(str_repr("a🎉b"), "'a🎉b'");
    }

    #[test]
    fn bytes_repr_escaping() {
        assert_eq!(bytes_repr(b"hello"), "b'hello'");
        assert_eq!(bytes_repr(b"\x00\x01"), "b'\\x00\\x01'");
        assert_eq!(bytes_repr(b"a\nb"), "b'a\\nb'");
        assert_eq!(bytes_repr(b"it's"), "b\"it's\"");
    }
}
