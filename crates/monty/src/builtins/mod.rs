//! Builtin functions, type objects and exception classes.
//!
//! Name resolution falls through to [`lookup_builtin`] after locals, cells
//! and module globals miss. Each builtin function is an enum variant with a
//! stable identifier; dispatch is a match, not a string lookup per call.
//!
//! `sorted`, `min` and `max` with a `key=` function re-enter script code and
//! are composed in the evaluator; everything else is pure and lives here.

mod isinstance;
mod min_max;
mod numeric;
mod print;
mod sorted;
mod sum;
mod type_call;

pub(crate) use min_max::{collect_candidates, min_max_pick};
pub(crate) use sorted::sorted_values;
pub(crate) use type_call::call_type;

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    heap::Heap,
    intern::Interns,
    io::PrintWriter,
    repr::{repr_value, str_value},
    resource::ResourceTracker,
    types::{Type, iter::iterate_to_vec},
    value::Value,
};

/// The builtin function set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum BuiltinFunction {
    Abs,
    All,
    Any,
    Bin,
    Chr,
    DivMod,
    Enumerate,
    Hash,
    Hex,
    Id,
    IsInstance,
    Len,
    Max,
    Min,
    Oct,
    Ord,
    Pow,
    Print,
    Repr,
    Reversed,
    Round,
    Sorted,
    Sum,
    Zip,
}

impl BuiltinFunction {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::DivMod => "divmod",
            Self::IsInstance => "isinstance",
            other => other.into(),
        }
    }
}

/// What a name can resolve to in the builtin namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Builtins {
    Function(BuiltinFunction),
    Type(Type),
    Exc(ExcType),
}

impl Builtins {
    pub(crate) fn py_type(self) -> Type {
        match self {
            Self::Function(_) => Type::BuiltinFunction,
            Self::Type(_) | Self::Exc(_) => Type::Type,
        }
    }

    /// Stable per-variant index for identity hashing.
    pub(crate) fn stable_index(self) -> i64 {
        match self {
            Self::Function(f) => f as i64,
            Self::Type(t) => 100 + type_index(t),
            Self::Exc(e) => 200 + e as i64,
        }
    }
}

fn type_index(t: Type) -> i64 {
    match t {
        Type::NoneType => 0,
        Type::Ellipsis => 1,
        Type::NotImplementedType => 2,
        Type::Bool => 3,
        Type::Int => 4,
        Type::Float => 5,
        Type::Str => 6,
        Type::Bytes => 7,
        Type::List => 8,
        Type::Tuple => 9,
        Type::Dict => 10,
        Type::Set => 11,
        Type::FrozenSet => 12,
        Type::Range => 13,
        Type::Slice => 14,
        Type::Type => 15,
        Type::Function => 16,
        Type::BuiltinFunction => 17,
        Type::BoundMethod => 18,
        Type::Module => 19,
        Type::Exception(e) => 30 + e as i64,
        Type::Date => 20,
        Type::Time => 21,
        Type::DateTime => 22,
        Type::Timedelta => 23,
        Type::Timezone => 24,
    }
}

/// Resolves a bare name against the builtin namespace.
pub(crate) fn lookup_builtin(name: &str) -> Option<Value> {
    let builtin = match name {
        // functions
        "abs" => Builtins::Function(BuiltinFunction::Abs),
        "all" => Builtins::Function(BuiltinFunction::All),
        "any" => Builtins::Function(BuiltinFunction::Any),
        "bin" => Builtins::Function(BuiltinFunction::Bin),
        "chr" => Builtins::Function(BuiltinFunction::Chr),
        "divmod" => Builtins::Function(BuiltinFunction::DivMod),
        "enumerate" => Builtins::Function(BuiltinFunction::Enumerate),
        "hash" => Builtins::Function(BuiltinFunction::Hash),
        "hex" => Builtins::Function(BuiltinFunction::Hex),
        "id" => Builtins::Function(BuiltinFunction::Id),
        "isinstance" => Builtins::Function(BuiltinFunction::IsInstance),
        "len" => Builtins::Function(BuiltinFunction::Len),
        "max" => Builtins::Function(BuiltinFunction::Max),
        "min" => Builtins::Function(BuiltinFunction::Min),
        "oct" => Builtins::Function(BuiltinFunction::Oct),
        "ord" => Builtins::Function(BuiltinFunction::Ord),
        "pow" => Builtins::Function(BuiltinFunction::Pow),
        "print" => Builtins::Function(BuiltinFunction::Print),
        "repr" => Builtins::Function(BuiltinFunction::Repr),
        "reversed" => Builtins::Function(BuiltinFunction::Reversed),
        "round" => Builtins::Function(BuiltinFunction::Round),
        "sorted" => Builtins::Function(BuiltinFunction::Sorted),
        "sum" => Builtins::Function(BuiltinFunction::Sum),
        "zip" => Builtins::Function(BuiltinFunction::Zip),
        // types
        "bool" => Builtins::Type(Type::Bool),
        "int" => Builtins::Type(Type::Int),
        "float" => Builtins::Type(Type::Float),
        "str" => Builtins::Type(Type::Str),
        "bytes" => Builtins::Type(Type::Bytes),
        "list" => Builtins::Type(Type::List),
        "tuple" => Builtins::Type(Type::Tuple),
        "dict" => Builtins::Type(Type::Dict),
        "set" => Builtins::Type(Type::Set),
        "frozenset" => Builtins::Type(Type::FrozenSet),
        "range" => Builtins::Type(Type::Range),
        "slice" => Builtins::Type(Type::Slice),
        "type" => Builtins::Type(Type::Type),
        // exception classes
        _ => match name.parse::<ExcType>() {
            Ok(exc) => Builtins::Exc(exc),
            Err(_) => return None,
        },
    };
    Some(Value::Builtin(builtin))
}

/// Dispatches a builtin function call.
///
/// `sorted`/`min`/`max` with `key=` are routed by the evaluator before this
/// is reached; a `key` that arrives here is a caller bug turned `TypeError`.
pub(crate) fn call_builtin(
    function: BuiltinFunction,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
    print: &mut dyn PrintWriter,
) -> RunResult<Value> {
    match function {
        BuiltinFunction::Abs => numeric::call_abs(args, heap, interns),
        BuiltinFunction::All => {
            let iterable = args.exactly_one("all")?;
            let items = iterate_to_vec(iterable, heap, interns)?;
            Ok(Value::Bool(items.iter().all(|v| v.py_bool(heap, interns))))
        }
        BuiltinFunction::Any => {
            let iterable = args.exactly_one("any")?;
            let items = iterate_to_vec(iterable, heap, interns)?;
            Ok(Value::Bool(items.iter().any(|v| v.py_bool(heap, interns))))
        }
        BuiltinFunction::Bin => numeric::call_to_base(args, heap, interns, "bin", 2),
        BuiltinFunction::Chr => numeric::call_chr(args, heap, interns),
        BuiltinFunction::DivMod => numeric::call_divmod(args, heap, interns),
        BuiltinFunction::Enumerate => {
            // eager: enumerate materializes to a list of (index, item) pairs
            args.reject_unknown_kwargs("enumerate", &["start"])?;
            args.check_arity("enumerate", 1, 2)?;
            let iterable = args.pos_arg(0).expect("arity checked");
            let start = match args.pos_or_kwarg("enumerate", 1, "start")? {
                None => 0,
                Some(v) => v.expect_index(heap, interns, "enumerate")?,
            };
            let items = iterate_to_vec(iterable, heap, interns)?;
            let mut pairs = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let pair = heap.alloc_tuple(vec![Value::Int(start + i as i64), item])?;
                pairs.push(pair);
            }
            Ok(heap.alloc_list(pairs)?)
        }
        BuiltinFunction::Hash => {
            let value = args.exactly_one("hash")?;
            let hash = value.py_hash(heap, interns)?;
            Ok(Value::Int(hash as i64))
        }
        BuiltinFunction::Hex => numeric::call_to_base(args, heap, interns, "hex", 16),
        BuiltinFunction::Id => {
            let value = args.exactly_one("id")?;
            Ok(Value::Int(value.py_id(0x10_0000) as i64))
        }
        BuiltinFunction::IsInstance => isinstance::call_isinstance(args, heap, interns),
        BuiltinFunction::Len => {
            let value = args.exactly_one("len")?;
            match value.py_len(heap, interns) {
                Some(len) => Ok(Value::Int(len as i64)),
                None => Err(ExcType::type_error(format!(
                    "object of type '{}' has no len()",
                    value.py_type(heap)
                ))),
            }
        }
        BuiltinFunction::Max => min_max::call_min_max(args, heap, interns, true),
        BuiltinFunction::Min => min_max::call_min_max(args, heap, interns, false),
        BuiltinFunction::Oct => numeric::call_to_base(args, heap, interns, "oct", 8),
        BuiltinFunction::Ord => numeric::call_ord(args, heap, interns),
        BuiltinFunction::Pow => numeric::call_pow(args, heap, interns),
        BuiltinFunction::Print => print::call_print(args, heap, interns, print),
        BuiltinFunction::Repr => {
            let value = args.exactly_one("repr")?;
            let text = repr_value(&value, heap, interns)?;
            Ok(heap.alloc_str(text)?)
        }
        BuiltinFunction::Reversed => {
            let value = args.exactly_one("reversed")?;
            // reversed() requires a sequence, not an arbitrary iterable
            let is_sequence = matches!(
                value.py_type(heap),
                Type::List | Type::Tuple | Type::Str | Type::Bytes | Type::Range
            );
            if !is_sequence {
                return Err(ExcType::type_error(format!(
                    "argument to reversed() must be a sequence, not {}",
                    value.py_type(heap)
                )));
            }
            let mut items = iterate_to_vec(value, heap, interns)?;
            items.reverse();
            Ok(heap.alloc_list(items)?)
        }
        BuiltinFunction::Round => numeric::call_round(args, heap, interns),
        BuiltinFunction::Sorted => sorted::call_sorted(args, heap, interns),
        BuiltinFunction::Sum => sum::call_sum(args, heap, interns),
        BuiltinFunction::Zip => {
            args.no_kwargs("zip")?;
            let mut columns = Vec::with_capacity(args.pos.len());
            for iterable in &args.pos {
                columns.push(iterate_to_vec(*iterable, heap, interns)?);
            }
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            let mut result = Vec::with_capacity(rows);
            for row in 0..rows {
                let tuple: Vec<Value> = columns.iter().map(|col| col[row]).collect();
                result.push(heap.alloc_tuple(tuple)?);
            }
            Ok(heap.alloc_list(result)?)
        }
    }
}

/// `str(value)` as a builtin-call helper (used by the `str` type object).
pub(crate) fn value_to_str(
    value: Value,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    let text = str_value(&value, heap, interns)?;
    Ok(heap.alloc_str(text)?)
}
