//! String methods and `%`-formatting.
//!
//! Strings are immutable UTF-8; indexing, slicing and the position arguments
//! of `find`/`count`/`startswith` are all in code points, never bytes. The
//! dispatcher receives an owned snapshot of the receiver because results are
//! allocated on the same heap the receiver lives in.

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    fstring::{FormatSpec, format_value},
    heap::Heap,
    intern::Interns,
    repr::repr_value,
    resource::ResourceTracker,
    types::iter::iterate_to_vec,
    value::{IntRef, Value, value_as_str},
};

/// Calls a str method by name; `Ok(None)` means no such method.
pub(crate) fn call_str_method(
    s: &str,
    method: &str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let result = match method {
        "upper" => simple(heap, args, method, s.to_uppercase())?,
        "lower" => simple(heap, args, method, s.to_lowercase())?,
        "capitalize" => {
            args.exactly_none(method)?;
            let mut chars = s.chars();
            let capitalized = match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            };
            heap.alloc_str(capitalized)?
        }
        "title" => {
            args.exactly_none(method)?;
            heap.alloc_str(title_case(s))?
        }
        "swapcase" => {
            args.exactly_none(method)?;
            let swapped: String = s
                .chars()
                .flat_map(|c| {
                    if c.is_uppercase() {
                        c.to_lowercase().collect::<Vec<_>>()
                    } else {
                        c.to_uppercase().collect::<Vec<_>>()
                    }
                })
                .collect();
            heap.alloc_str(swapped)?
        }
        "strip" | "lstrip" | "rstrip" => {
            args.no_kwargs(method)?;
            args.check_arity(method, 0, 1)?;
            let chars: Option<Vec<char>> = match args.pos_arg(0) {
                None | Some(Value::None) => None,
                Some(v) => match value_as_str(&v, heap, interns) {
                    Some(cs) => Some(cs.chars().collect()),
                    None => {
                        return Err(ExcType::type_error(format!(
                            "{method} arg must be None or str, not {}",
                            v.py_type(heap)
                        )));
                    }
                },
            };
            let matches = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            let stripped = match method {
                "strip" => s.trim_matches(matches),
                "lstrip" => s.trim_start_matches(matches),
                _ => s.trim_end_matches(matches),
            };
            heap.alloc_str(stripped.to_owned())?
        }
        "split" | "rsplit" => {
            args.reject_unknown_kwargs(method, &["sep", "maxsplit"])?;
            args.check_arity(method, 0, 2)?;
            let sep = match args.pos_or_kwarg(method, 0, "sep")? {
                None | Some(Value::None) => None,
                Some(v) => match value_as_str(&v, heap, interns) {
                    Some(sep) if sep.is_empty() => return Err(ExcType::value_error("empty separator")),
                    Some(sep) => Some(sep.to_owned()),
                    None => {
                        return Err(ExcType::type_error(format!(
                            "must be str or None, not {}",
                            v.py_type(heap)
                        )));
                    }
                },
            };
            let maxsplit = match args.pos_or_kwarg(method, 1, "maxsplit")? {
                None => -1,
                Some(v) => v.expect_index(heap, interns, method)?,
            };
            let parts = if method == "split" {
                split_str(s, sep.as_deref(), maxsplit)
            } else {
                rsplit_str(s, sep.as_deref(), maxsplit)
            };
            let mut items = Vec::with_capacity(parts.len());
            for part in parts {
                items.push(heap.alloc_str(part)?);
            }
            heap.alloc_list(items)?
        }
        "splitlines" => {
            args.reject_unknown_kwargs(method, &["keepends"])?;
            args.check_arity(method, 0, 1)?;
            let keepends = args
                .pos_or_kwarg(method, 0, "keepends")?
                .map(|v| v.py_bool(heap, interns))
                .unwrap_or(false);
            let mut items = Vec::new();
            for line in split_lines(s, keepends) {
                items.push(heap.alloc_str(line)?);
            }
            heap.alloc_list(items)?
        }
        "join" => {
            let iterable = args.exactly_one(method)?;
            let items = iterate_to_vec(iterable, heap, interns)?;
            let mut out = String::new();
            for (i, item) in items.iter().enumerate() {
                let Some(part) = value_as_str(item, heap, interns) else {
                    return Err(ExcType::type_error(format!(
                        "sequence item {i}: expected str instance, {} found",
                        item.py_type(heap)
                    )));
                };
                if i > 0 {
                    out.push_str(s);
                }
                out.push_str(part);
            }
            heap.alloc_str(out)?
        }
        "replace" => {
            args.no_kwargs(method)?;
            args.check_arity(method, 2, 3)?;
            let old = expect_str_arg(method, args.pos_arg(0), heap, interns)?;
            let new = expect_str_arg(method, args.pos_arg(1), heap, interns)?;
            let count = match args.pos_arg(2) {
                None => -1,
                Some(v) => v.expect_index(heap, interns, method)?,
            };
            let replaced = if count < 0 {
                s.replace(&old, &new)
            } else {
                s.replacen(&old, &new, usize::try_from(count).unwrap_or(0))
            };
            heap.alloc_str(replaced)?
        }
        "startswith" | "endswith" => {
            args.no_kwargs(method)?;
            args.check_arity(method, 1, 3)?;
            let target = range_arg_slice(s, &args, heap, interns, method)?;
            let needle = args.pos_arg(0).expect("arity checked");
            let prefixes = prefix_candidates(method, needle, heap, interns)?;
            let matched = prefixes.iter().any(|p| {
                if method == "startswith" {
                    target.starts_with(p.as_str())
                } else {
                    target.ends_with(p.as_str())
                }
            });
            Value::Bool(matched)
        }
        "find" | "rfind" | "index" | "rindex" => {
            args.no_kwargs(method)?;
            args.check_arity(method, 1, 3)?;
            let needle = expect_str_arg(method, args.pos_arg(0), heap, interns)?;
            let (window, offset) = range_arg_window(s, &args, heap, interns, method)?;
            let found = if method.starts_with('r') {
                window.rfind(&needle)
            } else {
                window.find(&needle)
            };
            match found {
                Some(byte_pos) => {
                    let cp = window[..byte_pos].chars().count() + offset;
                    Value::Int(cp as i64)
                }
                None => {
                    if method.contains("index") {
                        return Err(ExcType::value_error("substring not found"));
                    }
                    Value::Int(-1)
                }
            }
        }
        "count" => {
            args.no_kwargs(method)?;
            args.check_arity(method, 1, 3)?;
            let needle = expect_str_arg(method, args.pos_arg(0), heap, interns)?;
            let (window, _) = range_arg_window(s, &args, heap, interns, method)?;
            let count = if needle.is_empty() {
                window.chars().count() + 1
            } else {
                window.matches(&needle).count()
            };
            Value::Int(count as i64)
        }
        "format" => {
            let formatted = str_format(s, &args, heap, interns)?;
            heap.alloc_str(formatted)?
        }
        "isdigit" => predicate(&args, method, s, |c| c.is_ascii_digit())?,
        "isalpha" => predicate(&args, method, s, char::is_alphabetic)?,
        "isalnum" => predicate(&args, method, s, char::is_alphanumeric)?,
        "isspace" => predicate(&args, method, s, char::is_whitespace)?,
        "isupper" => {
            args.exactly_none(method)?;
            let has_cased = s.chars().any(|c| c.is_uppercase() || c.is_lowercase());
            Value::Bool(has_cased && !s.chars().any(char::is_lowercase))
        }
        "islower" => {
            args.exactly_none(method)?;
            let has_cased = s.chars().any(|c| c.is_uppercase() || c.is_lowercase());
            Value::Bool(has_cased && !s.chars().any(char::is_uppercase))
        }
        "istitle" => {
            args.exactly_none(method)?;
            Value::Bool(!s.is_empty() && title_case(s) == s && s.chars().any(char::is_alphabetic))
        }
        "zfill" => {
            args.no_kwargs(method)?;
            args.check_arity(method, 1, 1)?;
            let width = args.pos_arg(0).expect("arity checked").expect_index(heap, interns, method)?;
            heap.alloc_str(zfill(s, usize::try_from(width).unwrap_or(0)))?
        }
        "ljust" | "rjust" | "center" => {
            args.no_kwargs(method)?;
            args.check_arity(method, 1, 2)?;
            let width = args.pos_arg(0).expect("arity checked").expect_index(heap, interns, method)?;
            let width = usize::try_from(width).unwrap_or(0);
            let fill = match args.pos_arg(1) {
                None => ' ',
                Some(v) => {
                    let fill_str = expect_str_arg(method, Some(v), heap, interns)?;
                    let mut chars = fill_str.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => c,
                        _ => {
                            return Err(ExcType::type_error(
                                "The fill character must be exactly one character long",
                            ));
                        }
                    }
                }
            };
            let len = s.chars().count();
            let padded = if len >= width {
                s.to_owned()
            } else {
                let pad = width - len;
                match method {
                    "ljust" => format!("{s}{}", fill.to_string().repeat(pad)),
                    "rjust" => format!("{}{s}", fill.to_string().repeat(pad)),
                    _ => {
                        // CPython: left margin gets the extra char for odd widths
                        let left = pad / 2 + (pad & width & 1);
                        let right = pad - left;
                        format!("{}{s}{}", fill.to_string().repeat(left), fill.to_string().repeat(right))
                    }
                }
            };
            heap.alloc_str(padded)?
        }
        "removeprefix" => {
            let prefix = expect_str_arg(method, Some(args.exactly_one(method)?), heap, interns)?;
            heap.alloc_str(s.strip_prefix(&prefix).unwrap_or(s).to_owned())?
        }
        "removesuffix" => {
            let suffix = expect_str_arg(method, Some(args.exactly_one(method)?), heap, interns)?;
            let stripped = if suffix.is_empty() { s } else { s.strip_suffix(&suffix).unwrap_or(s) };
            heap.alloc_str(stripped.to_owned())?
        }
        "encode" => {
            args.reject_unknown_kwargs(method, &["encoding", "errors"])?;
            args.check_arity(method, 0, 2)?;
            let encoding = match args.pos_or_kwarg(method, 0, "encoding")? {
                None => "utf-8".to_owned(),
                Some(v) => expect_str_arg(method, Some(v), heap, interns)?,
            };
            match encoding.to_ascii_lowercase().replace('_', "-").as_str() {
                "utf-8" | "utf8" => heap.alloc_bytes(s.as_bytes().to_vec())?,
                "ascii" => {
                    if let Some(bad) = s.chars().find(|c| !c.is_ascii()) {
                        return Err(ExcType::value_error(format!(
                            "'ascii' codec can't encode character '{bad}'"
                        )));
                    }
                    heap.alloc_bytes(s.as_bytes().to_vec())?
                }
                other => return Err(ExcType::value_error(format!("unknown encoding: {other}"))),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn simple(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    method: &str,
    result: String,
) -> RunResult<Value> {
    args.exactly_none(method)?;
    Ok(heap.alloc_str(result)?)
}

fn predicate(args: &ArgValues, method: &str, s: &str, test: impl Fn(char) -> bool) -> RunResult<Value> {
    args.exactly_none(method)?;
    Ok(Value::Bool(!s.is_empty() && s.chars().all(test)))
}

fn expect_str_arg(
    method: &str,
    value: Option<Value>,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<String> {
    let value = value.ok_or_else(|| ExcType::type_error(format!("{method}() missing required argument")))?;
    value_as_str(&value, heap, interns)
        .map(str::to_owned)
        .ok_or_else(|| ExcType::type_error(format!("{method}() argument must be str, not {}", value.py_type(heap))))
}

/// Applies optional code-point start/end arguments (positions 1 and 2),
/// returning the selected substring.
fn range_arg_slice(
    s: &str,
    args: &ArgValues,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
    method: &str,
) -> RunResult<String> {
    range_arg_window(s, args, heap, interns, method).map(|(w, _)| w)
}

/// Like [`range_arg_slice`], also returning the start offset in code points.
fn range_arg_window(
    s: &str,
    args: &ArgValues,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
    method: &str,
) -> RunResult<(String, usize)> {
    let len = s.chars().count() as i64;
    let clamp = |raw: i64| -> usize {
        let adjusted = if raw < 0 { raw + len } else { raw };
        usize::try_from(adjusted.clamp(0, len)).expect("clamped to non-negative")
    };
    let start = match args.pos_arg(1) {
        None | Some(Value::None) => 0,
        Some(v) => clamp(v.expect_index(heap, interns, method)?),
    };
    let end = match args.pos_arg(2) {
        None | Some(Value::None) => len as usize,
        Some(v) => clamp(v.expect_index(heap, interns, method)?),
    };
    if start >= end {
        return Ok((String::new(), start));
    }
    let window: String = s.chars().skip(start).take(end - start).collect();
    Ok((window, start))
}

fn prefix_candidates(
    method: &str,
    needle: Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Vec<String>> {
    if let Some(single) = value_as_str(&needle, heap, interns) {
        return Ok(vec![single.to_owned()]);
    }
    if let Value::Ref(id) = needle
        && let crate::heap::HeapData::Tuple(t) = heap.get(id)
    {
        let mut candidates = Vec::with_capacity(t.len());
        for item in t.as_slice() {
            let Some(part) = value_as_str(item, heap, interns) else {
                return Err(ExcType::type_error(format!(
                    "tuple for {method} must only contain str, not {}",
                    item.py_type(heap)
                )));
            };
            candidates.push(part.to_owned());
        }
        return Ok(candidates);
    }
    Err(ExcType::type_error(format!(
        "{method} first arg must be str or a tuple of str, not {}",
        needle.py_type(heap)
    )))
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

fn zfill(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_owned();
    }
    let pad = "0".repeat(width - len);
    if let Some(rest) = s.strip_prefix('-') {
        format!("-{pad}{rest}")
    } else if let Some(rest) = s.strip_prefix('+') {
        format!("+{pad}{rest}")
    } else {
        format!("{pad}{s}")
    }
}

/// `str.split` with CPython's None-separator semantics (runs of whitespace,
/// no leading/trailing empties).
pub(crate) fn split_str(s: &str, sep: Option<&str>, maxsplit: i64) -> Vec<String> {
    match sep {
        Some(sep) => {
            if maxsplit < 0 {
                s.split(sep).map(str::to_owned).collect()
            } else {
                s.splitn(maxsplit as usize + 1, sep).map(str::to_owned).collect()
            }
        }
        None => {
            let mut parts: Vec<String> = Vec::new();
            let mut remaining = s.trim_start();
            let mut splits = 0;
            while !remaining.is_empty() {
                if maxsplit >= 0 && splits == maxsplit {
                    parts.push(remaining.trim_end().to_owned());
                    return parts;
                }
                match remaining.find(char::is_whitespace) {
                    Some(pos) => {
                        parts.push(remaining[..pos].to_owned());
                        remaining = remaining[pos..].trim_start();
                        splits += 1;
                    }
                    None => {
                        parts.push(remaining.to_owned());
                        return parts;
                    }
                }
            }
            parts
        }
    }
}

fn rsplit_str(s: &str, sep: Option<&str>, maxsplit: i64) -> Vec<String> {
    match sep {
        Some(sep) => {
            if maxsplit < 0 {
                s.split(sep).map(str::to_owned).collect()
            } else {
                let mut parts: Vec<String> =
                    s.rsplitn(maxsplit as usize + 1, sep).map(str::to_owned).collect();
                parts.reverse();
                parts
            }
        }
        None => {
            if maxsplit < 0 {
                return split_str(s, None, -1);
            }
            let mut parts: Vec<String> = Vec::new();
            let mut remaining = s.trim_end();
            let mut splits = 0;
            while !remaining.is_empty() {
                if splits == maxsplit {
                    parts.push(remaining.trim_start().to_owned());
                    break;
                }
                match remaining.rfind(char::is_whitespace) {
                    Some(pos) => {
                        parts.push(remaining[pos..].trim_start().to_owned());
                        remaining = remaining[..pos].trim_end();
                        splits += 1;
                    }
                    None => {
                        parts.push(remaining.to_owned());
                        break;
                    }
                }
            }
            parts.reverse();
            parts
        }
    }
}

fn split_lines(s: &str, keepends: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let (is_break, break_len) = match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => (true, 2),
            b'\r' | b'\n' => (true, 1),
            _ => (false, 0),
        };
        if is_break {
            let end = if keepends { i + break_len } else { i };
            lines.push(s[start..end].to_owned());
            i += break_len;
            start = i;
        } else {
            i += 1;
        }
    }
    if start < s.len() {
        lines.push(s[start..].to_owned());
    }
    lines
}

// === str.format ===

/// The `str.format` subset: auto-numbered `{}`, positional `{0}`, keyword
/// `{name}` fields with `!s`/`!r` conversions and format specs. Nested
/// attribute/index field access is outside the subset.
pub(crate) fn str_format(
    template: &str,
    args: &ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut auto_index = 0usize;
    let mut saw_manual = false;
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut field = String::new();
                let mut depth = 1;
                for fc in chars.by_ref() {
                    match fc {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    field.push(fc);
                }
                if depth != 0 {
                    return Err(ExcType::value_error("Single '{' encountered in format string"));
                }
                let rendered = render_field(&field, args, &mut auto_index, &mut saw_manual, heap, interns)?;
                out.push_str(&rendered);
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(ExcType::value_error("Single '}' encountered in format string"));
                }
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn render_field(
    field: &str,
    args: &ArgValues,
    auto_index: &mut usize,
    saw_manual: &mut bool,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<String> {
    let (name_part, spec_part) = match field.split_once(':') {
        Some((name, spec)) => (name, Some(spec)),
        None => (field, None),
    };
    let (name, conversion) = match name_part.split_once('!') {
        Some((name, conv)) => (name, Some(conv)),
        None => (name_part, None),
    };

    let value = if name.is_empty() {
        if *saw_manual {
            return Err(ExcType::value_error(
                "cannot switch from manual field specification to automatic field numbering",
            ));
        }
        let value = args.pos_arg(*auto_index).ok_or_else(|| {
            ExcType::IndexError.msg("Replacement index out of range for positional args tuple")
        })?;
        *auto_index += 1;
        value
    } else if let Ok(index) = name.parse::<usize>() {
        *saw_manual = true;
        args.pos_arg(index).ok_or_else(|| {
            ExcType::IndexError.msg("Replacement index out of range for positional args tuple")
        })?
    } else {
        args.kwarg(name)
            .ok_or_else(|| ExcType::key_error_str(heap, name))?
    };

    let converted = match conversion {
        Some("r") => Some(repr_value(&value, heap, interns)?),
        Some("s") => Some(crate::repr::str_value(&value, heap, interns)?),
        Some("a") => Some(repr_value(&value, heap, interns)?),
        Some(other) => {
            return Err(ExcType::value_error(format!(
                "Unknown conversion specifier {other}"
            )));
        }
        None => None,
    };

    let spec = FormatSpec::parse(spec_part.unwrap_or(""))?;
    match converted {
        Some(text) => {
            let as_str = heap.alloc_str(text)?;
            format_value(&as_str, &spec, heap, interns)
        }
        None => format_value(&value, &spec, heap, interns),
    }
}

// === % formatting ===

/// `template % args` with the classic conversion set.
pub(crate) fn percent_format(
    template: &str,
    args: Value,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<String> {
    let arg_list: Vec<Value> = match args {
        Value::Ref(id) => match heap.get(id) {
            crate::heap::HeapData::Tuple(t) => t.as_slice().to_vec(),
            _ => vec![args],
        },
        _ => vec![args],
    };
    let mut out = String::with_capacity(template.len());
    let mut arg_index = 0usize;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        // flags
        let mut zero_pad = false;
        let mut left_align = false;
        let mut sign_plus = false;
        let mut sign_space = false;
        while let Some(&flag) = chars.peek() {
            match flag {
                '0' => zero_pad = true,
                '-' => left_align = true,
                '+' => sign_plus = true,
                ' ' => sign_space = true,
                _ => break,
            }
            chars.next();
        }
        // width
        let mut width = 0usize;
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            width = width * 10 + d as usize;
            chars.next();
        }
        // precision
        let mut precision: Option<usize> = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut p = 0usize;
            while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                p = p * 10 + d as usize;
                chars.next();
            }
            precision = Some(p);
        }
        let Some(kind) = chars.next() else {
            return Err(ExcType::value_error("incomplete format"));
        };
        let value = arg_list.get(arg_index).copied().ok_or_else(|| {
            ExcType::type_error("not enough arguments for format string")
        })?;
        arg_index += 1;

        let rendered = percent_one(kind, value, precision, sign_plus, sign_space, heap, interns)?;
        let padded = if rendered.chars().count() >= width {
            rendered
        } else {
            let pad = width - rendered.chars().count();
            if left_align {
                format!("{rendered}{}", " ".repeat(pad))
            } else if zero_pad && matches!(kind, 'd' | 'i' | 'u' | 'f' | 'F' | 'e' | 'E' | 'g' | 'x' | 'X' | 'o') {
                pad_zero(&rendered, pad)
            } else {
                format!("{}{rendered}", " ".repeat(pad))
            }
        };
        out.push_str(&padded);
    }
    if arg_index < arg_list.len() {
        return Err(ExcType::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(out)
}

fn pad_zero(rendered: &str, pad: usize) -> String {
    if let Some(rest) = rendered.strip_prefix('-') {
        format!("-{}{rest}", "0".repeat(pad))
    } else {
        format!("{}{rendered}", "0".repeat(pad))
    }
}

fn percent_one(
    kind: char,
    value: Value,
    precision: Option<usize>,
    sign_plus: bool,
    sign_space: bool,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<String> {
    let with_sign = |text: String, negative: bool| -> String {
        if negative {
            text
        } else if sign_plus {
            format!("+{text}")
        } else if sign_space {
            format!(" {text}")
        } else {
            text
        }
    };
    match kind {
        's' => {
            let text = crate::repr::str_value(&value, heap, interns)?;
            Ok(match precision {
                Some(p) => text.chars().take(p).collect(),
                None => text,
            })
        }
        'r' => {
            let text = repr_value(&value, heap, interns)?;
            Ok(match precision {
                Some(p) => text.chars().take(p).collect(),
                None => text,
            })
        }
        'd' | 'i' | 'u' => match value.as_int(heap, interns) {
            Some(IntRef::Small(i)) => Ok(with_sign(i.to_string(), i < 0)),
            Some(IntRef::Big(b)) => {
                let negative = b.sign() == num_bigint::Sign::Minus;
                Ok(with_sign(b.to_string(), negative))
            }
            None => match value {
                Value::Float(f) => Ok(with_sign(format!("{}", f.trunc() as i64), f < 0.0)),
                _ => Err(ExcType::type_error(format!(
                    "%{kind} format: a real number is required, not {}",
                    value.py_type(heap)
                ))),
            },
        },
        'x' | 'X' | 'o' => {
            let Some(int) = value.as_int(heap, interns) else {
                return Err(ExcType::type_error(format!(
                    "%{kind} format: an integer is required, not {}",
                    value.py_type(heap)
                )));
            };
            let big = int.to_big();
            let (sign, magnitude) = if big.sign() == num_bigint::Sign::Minus {
                ("-", -big)
            } else {
                ("", big)
            };
            let digits = match kind {
                'x' => magnitude.to_str_radix(16),
                'X' => magnitude.to_str_radix(16).to_uppercase(),
                _ => magnitude.to_str_radix(8),
            };
            Ok(format!("{sign}{digits}"))
        }
        'f' | 'F' => {
            let Some(f) = crate::ops::to_f64(&value, heap, interns) else {
                return Err(ExcType::type_error(format!(
                    "must be real number, not {}",
                    value.py_type(heap)
                )));
            };
            let p = precision.unwrap_or(6);
            Ok(with_sign(format!("{f:.p$}"), f < 0.0))
        }
        'e' | 'E' => {
            let Some(f) = crate::ops::to_f64(&value, heap, interns) else {
                return Err(ExcType::type_error(format!(
                    "must be real number, not {}",
                    value.py_type(heap)
                )));
            };
            let p = precision.unwrap_or(6);
            let text = format_exponential(f, p, kind == 'E');
            Ok(with_sign(text, f < 0.0))
        }
        'g' | 'G' => {
            let Some(f) = crate::ops::to_f64(&value, heap, interns) else {
                return Err(ExcType::type_error(format!(
                    "must be real number, not {}",
                    value.py_type(heap)
                )));
            };
            Ok(with_sign(format_general(f, precision.unwrap_or(6)), f < 0.0))
        }
        'c' => match value.as_int(heap, interns) {
            Some(IntRef::Small(i)) => {
                let c = u32::try_from(i)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ExcType::overflow_error("%c arg not in range(0x110000)"))?;
                Ok(c.to_string())
            }
            _ => match value_as_str(&value, heap, interns) {
                Some(s) if s.chars().count() == 1 => Ok(s.to_owned()),
                _ => Err(ExcType::type_error("%c requires an int or a unicode character")),
            },
        },
        other => Err(ExcType::value_error(format!(
            "unsupported format character '{other}'"
        ))),
    }
}

/// `%e` style exponential with at least two exponent digits.
pub(crate) fn format_exponential(f: f64, precision: usize, upper: bool) -> String {
    let formatted = format!("{f:.precision$e}");
    // Rust renders "1.5e2"; Python wants "1.5e+02"
    let (mantissa, exponent) = formatted.split_once('e').expect("exponential format has 'e'");
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ("-", digits.to_owned()),
        None => ("+", exponent.to_owned()),
    };
    let digits = if digits.len() < 2 { format!("0{digits}") } else { digits };
    let e = if upper { 'E' } else { 'e' };
    format!("{mantissa}{e}{sign}{digits}")
}

/// `%g` general format: exponential outside `[1e-4, 10^precision)`, trailing
/// zeros trimmed.
pub(crate) fn format_general(f: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if f == 0.0 {
        return "0".to_owned();
    }
    let exp = f.abs().log10().floor() as i32;
    if exp < -4 || exp >= precision as i32 {
        let text = format_exponential(f, precision.saturating_sub(1), false);
        trim_general(&text)
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        let text = format!("{f:.decimals$}");
        trim_general(&text)
    }
}

fn trim_general(text: &str) -> String {
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let trimmed = if mantissa.contains('.') {
                mantissa.trim_end_matches('0').trim_end_matches('.')
            } else {
                mantissa
            };
            format!("{trimmed}e{exp}")
        }
        None => {
            if text.contains('.') {
                text.trim_end_matches('0').trim_end_matches('.').to_owned()
            } else {
                text.to_owned()
            }
        }
    }
}
