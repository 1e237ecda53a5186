//! Bytes methods.
//!
//! `bytes` is an immutable sequence of 8-bit integers; iteration and indexing
//! yield `int` 0..=255. The method surface covers the common search, strip
//! and split operations plus the `str` bridge (`decode`, `hex`).

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    heap::Heap,
    intern::Interns,
    resource::ResourceTracker,
    types::iter::iterate_to_vec,
    value::{Value, value_as_bytes, value_as_str},
};

/// Calls a bytes method by name; `Ok(None)` means no such method.
pub(crate) fn call_bytes_method(
    b: &[u8],
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let result = match method {
        "decode" => {
            args.reject_unknown_kwargs(method, &["encoding", "errors"])?;
            args.check_arity(method, 0, 2)?;
            let encoding = match args.pos_or_kwarg(method, 0, "encoding")? {
                None => "utf-8".to_owned(),
                Some(v) => value_as_str(&v, heap, interns)
                    .map(str::to_owned)
                    .ok_or_else(|| ExcType::type_error("decode() argument 'encoding' must be str"))?,
            };
            match encoding.to_ascii_lowercase().replace('_', "-").as_str() {
                "utf-8" | "utf8" => match std::str::from_utf8(b) {
                    Ok(s) => heap.alloc_str(s.to_owned())?,
                    Err(err) => {
                        return Err(ExcType::value_error(format!(
                            "'utf-8' codec can't decode byte 0x{:02x} in position {}: invalid start byte",
                            b.get(err.valid_up_to()).copied().unwrap_or(0),
                            err.valid_up_to()
                        )));
                    }
                },
                "ascii" => {
                    if let Some(pos) = b.iter().position(|byte| !byte.is_ascii()) {
                        return Err(ExcType::value_error(format!(
                            "'ascii' codec can't decode byte 0x{:02x} in position {pos}: ordinal not in range(128)",
                            b[pos]
                        )));
                    }
                    heap.alloc_str(String::from_utf8_lossy(b).into_owned())?
                }
                other => return Err(ExcType::value_error(format!("unknown encoding: {other}"))),
            }
        }
        "hex" => {
            args.exactly_none(method)?;
            let mut out = String::with_capacity(b.len() * 2);
            for byte in b {
                out.push_str(&format!("{byte:02x}"));
            }
            heap.alloc_str(out)?
        }
        "startswith" | "endswith" => {
            args.no_kwargs(method)?;
            args.check_arity(method, 1, 1)?;
            let needle = expect_bytes_arg(method, args.pos_arg(0), heap, interns)?;
            let matched = if method == "startswith" {
                b.starts_with(&needle)
            } else {
                b.ends_with(&needle)
            };
            Value::Bool(matched)
        }
        "find" | "index" => {
            args.no_kwargs(method)?;
            args.check_arity(method, 1, 1)?;
            let needle = expect_bytes_arg(method, args.pos_arg(0), heap, interns)?;
            match find_sub(b, &needle) {
                Some(pos) => Value::Int(pos as i64),
                None => {
                    if method == "index" {
                        return Err(ExcType::value_error("subsection not found"));
                    }
                    Value::Int(-1)
                }
            }
        }
        "count" => {
            let needle = expect_bytes_arg(method, Some(args.exactly_one(method)?), heap, interns)?;
            let count = if needle.is_empty() {
                b.len() + 1
            } else {
                let mut count = 0;
                let mut pos = 0;
                while let Some(found) = find_sub(&b[pos..], &needle) {
                    count += 1;
                    pos += found + needle.len();
                }
                count
            };
            Value::Int(count as i64)
        }
        "replace" => {
            args.no_kwargs(method)?;
            args.check_arity(method, 2, 2)?;
            let old = expect_bytes_arg(method, args.pos_arg(0), heap, interns)?;
            let new = expect_bytes_arg(method, args.pos_arg(1), heap, interns)?;
            let mut out = Vec::with_capacity(b.len());
            if old.is_empty() {
                out.extend_from_slice(b);
            } else {
                let mut pos = 0;
                while let Some(found) = find_sub(&b[pos..], &old) {
                    out.extend_from_slice(&b[pos..pos + found]);
                    out.extend_from_slice(&new);
                    pos += found + old.len();
                }
                out.extend_from_slice(&b[pos..]);
            }
            heap.alloc_bytes(out)?
        }
        "strip" | "lstrip" | "rstrip" => {
            args.no_kwargs(method)?;
            args.check_arity(method, 0, 1)?;
            let strip_set: Vec<u8> = match args.pos_arg(0) {
                None | Some(Value::None) => vec![b' ', b'\t', b'\n', b'\r', 0x0b, 0x0c],
                Some(v) => expect_bytes_arg(method, Some(v), heap, interns)?,
            };
            let mut start = 0;
            let mut end = b.len();
            if method != "rstrip" {
                while start < end && strip_set.contains(&b[start]) {
                    start += 1;
                }
            }
            if method != "lstrip" {
                while end > start && strip_set.contains(&b[end - 1]) {
                    end -= 1;
                }
            }
            heap.alloc_bytes(b[start..end].to_vec())?
        }
        "split" => {
            args.reject_unknown_kwargs(method, &["sep"])?;
            args.check_arity(method, 0, 1)?;
            let sep = match args.pos_or_kwarg(method, 0, "sep")? {
                None | Some(Value::None) => None,
                Some(v) => {
                    let sep = expect_bytes_arg(method, Some(v), heap, interns)?;
                    if sep.is_empty() {
                        return Err(ExcType::value_error("empty separator"));
                    }
                    Some(sep)
                }
            };
            let parts = match sep {
                Some(sep) => split_bytes(b, &sep),
                None => b
                    .split(u8::is_ascii_whitespace)
                    .filter(|part| !part.is_empty())
                    .map(<[u8]>::to_vec)
                    .collect(),
            };
            let mut items = Vec::with_capacity(parts.len());
            for part in parts {
                items.push(heap.alloc_bytes(part)?);
            }
            heap.alloc_list(items)?
        }
        "join" => {
            let iterable = args.exactly_one(method)?;
            let items = iterate_to_vec(iterable, heap, interns)?;
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                let Some(part) = value_as_bytes(item, heap, interns) else {
                    return Err(ExcType::type_error(format!(
                        "sequence item {i}: expected a bytes-like object, {} found",
                        item.py_type(heap)
                    )));
                };
                if i > 0 {
                    out.extend_from_slice(b);
                }
                out.extend_from_slice(part);
            }
            heap.alloc_bytes(out)?
        }
        "upper" => {
            args.exactly_none(method)?;
            heap.alloc_bytes(b.to_ascii_uppercase())?
        }
        "lower" => {
            args.exactly_none(method)?;
            heap.alloc_bytes(b.to_ascii_lowercase())?
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn expect_bytes_arg(
    method: &str,
    value: Option<Value>,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Vec<u8>> {
    let value = value.ok_or_else(|| ExcType::type_error(format!("{method}() missing required argument")))?;
    value_as_bytes(&value, heap, interns)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| {
            ExcType::type_error(format!(
                "a bytes-like object is required, not '{}'",
                value.py_type(heap)
            ))
        })
}

fn find_sub(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split_bytes(b: &[u8], sep: &[u8]) -> Vec<Vec<u8>> {
    let mut parts = Vec::new();
    let mut pos = 0;
    while let Some(found) = find_sub(&b[pos..], sep) {
        parts.push(b[pos..pos + found].to_vec());
        pos += found + sep.len();
    }
    parts.push(b[pos..].to_vec());
    parts
}
