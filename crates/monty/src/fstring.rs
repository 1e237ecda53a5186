//! The format mini-language shared by f-strings, `format()` specs inside
//! `str.format`, and the evaluator's f-string rendering.
//!
//! Implements the common subset: `[[fill]align][sign][#][0][width][,_][.precision][type]`
//! with types `s d b o x X c e E f F g G %`. Nested interpolations inside a
//! format spec are outside the subset and rejected at parse time.

use crate::{
    exception::{ExcType, RunResult},
    heap::Heap,
    intern::{Interns, StringId},
    repr::{float_repr, repr_value, str_value},
    resource::ResourceTracker,
    types::str::{format_exponential, format_general},
    value::{IntRef, Value, value_as_str},
};

/// One piece of an f-string, as prepared from the parse tree.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) enum FStringPart {
    Literal(StringId),
    Interpolation {
        expr: crate::expressions::ExprLoc,
        conversion: ConversionFlag,
        /// Literal format spec text (interned); `None` for a bare `{expr}`.
        spec: Option<StringId>,
    },
}

/// `!s` / `!r` / `!a` conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub(crate) enum ConversionFlag {
    None,
    Str,
    Repr,
    Ascii,
}

/// Alignment inside a width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    /// `=`: padding goes between the sign and the digits.
    AfterSign,
}

/// Sign display for numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignMode {
    OnlyMinus,
    Always,
    SpaceForPositive,
}

/// A parsed format spec.
#[derive(Debug, Clone)]
pub(crate) struct FormatSpec {
    fill: char,
    align: Option<Align>,
    sign: SignMode,
    alternate: bool,
    zero: bool,
    width: Option<usize>,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    pub(crate) fn parse(spec: &str) -> RunResult<Self> {
        let chars: Vec<char> = spec.chars().collect();
        let mut pos = 0;

        let (mut fill, mut align) = (' ', None);
        if chars.len() >= 2
            && let Some(a) = parse_align(chars[1])
        {
            fill = chars[0];
            align = Some(a);
            pos = 2;
        } else if let Some(&first) = chars.first()
            && let Some(a) = parse_align(first)
        {
            align = Some(a);
            pos = 1;
        }

        let mut sign = SignMode::OnlyMinus;
        if let Some(&c) = chars.get(pos) {
            match c {
                '+' => {
                    sign = SignMode::Always;
                    pos += 1;
                }
                '-' => pos += 1,
                ' ' => {
                    sign = SignMode::SpaceForPositive;
                    pos += 1;
                }
                _ => {}
            }
        }

        let mut alternate = false;
        if chars.get(pos) == Some(&'#') {
            alternate = true;
            pos += 1;
        }

        let mut zero = false;
        if chars.get(pos) == Some(&'0') {
            zero = true;
            pos += 1;
        }

        let mut width = None;
        let mut w = 0usize;
        let mut saw_width = false;
        while let Some(d) = chars.get(pos).and_then(|c| c.to_digit(10)) {
            w = w * 10 + d as usize;
            saw_width = true;
            pos += 1;
        }
        if saw_width {
            width = Some(w);
        }

        let mut grouping = None;
        if let Some(&c) = chars.get(pos)
            && (c == ',' || c == '_')
        {
            grouping = Some(c);
            pos += 1;
        }

        let mut precision = None;
        if chars.get(pos) == Some(&'.') {
            pos += 1;
            let mut p = 0usize;
            let mut saw_precision = false;
            while let Some(d) = chars.get(pos).and_then(|c| c.to_digit(10)) {
                p = p * 10 + d as usize;
                saw_precision = true;
                pos += 1;
            }
            if !saw_precision {
                return Err(ExcType::value_error("Format specifier missing precision"));
            }
            precision = Some(p);
        }

        let mut kind = None;
        if let Some(&c) = chars.get(pos) {
            if "sdboxXceEfFgGn%".contains(c) {
                kind = Some(c);
                pos += 1;
            } else {
                return Err(ExcType::value_error(format!(
                    "Invalid format specifier '{spec}'"
                )));
            }
        }
        if pos != chars.len() {
            return Err(ExcType::value_error(format!("Invalid format specifier '{spec}'")));
        }

        Ok(Self {
            fill,
            align,
            sign,
            alternate,
            zero,
            width,
            grouping,
            precision,
            kind,
        })
    }
}

fn parse_align(c: char) -> Option<Align> {
    match c {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        '=' => Some(Align::AfterSign),
        _ => None,
    }
}

/// Formats a value under a spec — the engine behind `f"{x:>10.2f}"` and
/// `"{:>10.2f}".format(x)`.
pub(crate) fn format_value(
    value: &Value,
    spec: &FormatSpec,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<String> {
    let (body, negative, is_numeric) = render_body(value, spec, heap, interns)?;
    Ok(apply_padding(&body, negative, is_numeric, spec))
}

fn render_body(
    value: &Value,
    spec: &FormatSpec,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<(String, bool, bool)> {
    match spec.kind {
        None | Some('s') => {
            if spec.kind == Some('s') && value_as_str(value, heap, interns).is_none() {
                return Err(ExcType::type_error(format!(
                    "unknown format code 's' for object of type '{}'",
                    value.py_type(heap)
                )));
            }
            // default formatting: numbers keep numeric alignment
            match value {
                Value::Int(_) | Value::InternLongInt(_) | Value::Bool(_) => {
                    if spec.kind.is_none() && matches!(value, Value::Int(_) | Value::InternLongInt(_)) {
                        return render_int(value, spec, 10, heap, interns);
                    }
                    let text = str_value(value, heap, interns)?;
                    Ok((text, false, false))
                }
                Value::Float(f) => {
                    if spec.kind.is_none() {
                        let text = match spec.precision {
                            Some(p) => format!("{:.p$}", f.abs()),
                            None => float_repr(f.abs()),
                        };
                        Ok((text, *f < 0.0, true))
                    } else {
                        Ok((float_repr(*f), false, false))
                    }
                }
                _ => {
                    let mut text = str_value(value, heap, interns)?;
                    if let Some(p) = spec.precision {
                        text = text.chars().take(p).collect();
                    }
                    Ok((text, false, false))
                }
            }
        }
        Some('d') => render_int(value, spec, 10, heap, interns),
        Some('b') => render_int(value, spec, 2, heap, interns),
        Some('o') => render_int(value, spec, 8, heap, interns),
        Some('x') => render_int(value, spec, 16, heap, interns),
        Some('X') => {
            let (text, negative, numeric) = render_int(value, spec, 16, heap, interns)?;
            Ok((text.to_uppercase(), negative, numeric))
        }
        Some('c') => match value.as_int(heap, interns) {
            Some(IntRef::Small(i)) => {
                let c = u32::try_from(i)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ExcType::overflow_error("%c arg not in range(0x110000)"))?;
                Ok((c.to_string(), false, false))
            }
            _ => Err(ExcType::type_error("c format: an integer is required")),
        },
        Some(kind @ ('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%' | 'n')) => {
            let Some(f) = crate::ops::to_f64(value, heap, interns) else {
                return Err(ExcType::type_error(format!(
                    "unknown format code '{kind}' for object of type '{}'",
                    value.py_type(heap)
                )));
            };
            let negative = f < 0.0;
            let magnitude = f.abs();
            let text = match kind {
                'e' | 'E' => format_exponential(magnitude, spec.precision.unwrap_or(6), kind == 'E'),
                'f' | 'F' => {
                    let p = spec.precision.unwrap_or(6);
                    format!("{magnitude:.p$}")
                }
                '%' => {
                    let p = spec.precision.unwrap_or(6);
                    format!("{:.p$}%", magnitude * 100.0)
                }
                _ => format_general(magnitude, spec.precision.unwrap_or(6)),
            };
            Ok((text, negative, true))
        }
        Some(other) => Err(ExcType::value_error(format!("Unknown format code '{other}'"))),
    }
}

fn render_int(
    value: &Value,
    spec: &FormatSpec,
    radix: u32,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<(String, bool, bool)> {
    let Some(int) = value.as_int(heap, interns) else {
        return Err(ExcType::type_error(format!(
            "unknown format code 'd' for object of type '{}'",
            value.py_type(heap)
        )));
    };
    if spec.precision.is_some() {
        return Err(ExcType::value_error("Precision not allowed in integer format specifier"));
    }
    let big = int.to_big();
    let negative = big.sign() == num_bigint::Sign::Minus;
    let magnitude = if negative { -big } else { big };
    let mut digits = magnitude.to_str_radix(radix);
    if let Some(sep) = spec.grouping {
        let group = if radix == 10 && sep == ',' { 3 } else { 4 };
        let sep = if radix == 10 { sep } else { '_' };
        digits = group_digits(&digits, group, sep);
    }
    let prefixed = if spec.alternate {
        match radix {
            2 => format!("0b{digits}"),
            8 => format!("0o{digits}"),
            16 => format!("0x{digits}"),
            _ => digits,
        }
    } else {
        digits
    };
    Ok((prefixed, negative, true))
}

fn group_digits(digits: &str, group: usize, sep: char) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let mut out = String::with_capacity(digits.len() + digits.len() / group);
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % group == 0 {
            out.push(sep);
        }
        out.push(*c);
    }
    out
}

fn apply_padding(body: &str, negative: bool, is_numeric: bool, spec: &FormatSpec) -> String {
    let sign = if is_numeric {
        if negative {
            "-"
        } else {
            match spec.sign {
                SignMode::OnlyMinus => "",
                SignMode::Always => "+",
                SignMode::SpaceForPositive => " ",
            }
        }
    } else {
        ""
    };

    let Some(width) = spec.width else {
        return format!("{sign}{body}");
    };
    let content_len = sign.chars().count() + body.chars().count();
    if content_len >= width {
        return format!("{sign}{body}");
    }
    let pad = width - content_len;

    // bare `0` width acts like fill='0', align='='
    let (fill, align) = if spec.align.is_none() && spec.zero && is_numeric {
        ('0', Align::AfterSign)
    } else {
        let default_align = if is_numeric { Align::Right } else { Align::Left };
        (spec.fill, spec.align.unwrap_or(default_align))
    };
    let fill_str = fill.to_string();
    match align {
        Align::Left => format!("{sign}{body}{}", fill_str.repeat(pad)),
        Align::Right => format!("{}{sign}{body}", fill_str.repeat(pad)),
        Align::AfterSign => format!("{sign}{}{body}", fill_str.repeat(pad)),
        Align::Center => {
            let left = pad / 2;
            format!("{}{sign}{body}{}", fill_str.repeat(left), fill_str.repeat(pad - left))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt_str(spec: &str, text: &str) -> String {
        let spec = FormatSpec::parse(spec).unwrap();
        apply_padding(text, false, false, &spec)
    }

    #[test]
    fn padding_and_alignment() {
        assert_eq!(fmt_str(">6", "ab"), "    ab");
        assert_eq!(fmt_str("<6", "ab"), "ab    ");
        assert_eq!(fmt_str("^6", "ab"), "  ab  ");
        assert_eq!(fmt_str("*^6", "ab"), "**ab**");
        assert_eq!(fmt_str("2", "abc"), "abc");
    }

    #[test]
    fn spec_parsing_rejects_garbage() {
        assert!(FormatSpec::parse("{").is_err());
        assert!(FormatSpec::parse("10q").is_err());
        assert!(FormatSpec::parse(".").is_err());
        assert!(FormatSpec::parse("").is_ok());
        assert!(FormatSpec::parse("+#010,.3f").is_ok());
    }
}
