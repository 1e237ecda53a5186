//! The host value bridge.
//!
//! [`Object`] is the public, self-contained value representation: it owns all
//! its data and needs no heap. Host inputs convert into arena values on the
//! way in (`object_to_value`); results convert back on the way out
//! (`value_to_object`). Sentinels round-trip to themselves, integers
//! round-trip at full precision through the `Int`/`BigInt` split, and host
//! exception instances carry their kind (already coerced to the supported
//! base by the embedding veneer) and args.

use ahash::AHashSet;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::{
    exception::{ExcInstance, ExcType, RunResult},
    heap::{Heap, HeapData, HeapId},
    intern::Interns,
    repr::repr_value,
    resource::ResourceTracker,
    types::{
        Type,
        dict::{Dict, hash_key},
        set::{FrozenSet, Set, storage_from_values},
    },
    value::Value,
};

/// A Python value crossing the host boundary.
///
/// Most variants work in both directions. `Repr` is output-only: it stands in
/// for values with no host mapping (functions, ranges, datetime objects) and
/// for cyclic container slots (`"[...]"`).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Object {
    /// Python's `None`.
    #[serde(alias = "none", alias = "NoneType")]
    None,
    /// Python's `Ellipsis` (`...`).
    #[serde(alias = "ellipsis")]
    Ellipsis,
    /// Python's `NotImplemented`.
    NotImplemented,
    #[serde(alias = "bool")]
    Bool(bool),
    /// Machine-word integer.
    #[serde(alias = "int")]
    Int(i64),
    /// Arbitrary-precision integer beyond `i64`.
    BigInt(BigInt),
    #[serde(alias = "float")]
    Float(f64),
    #[serde(alias = "str")]
    String(String),
    #[serde(alias = "bytes")]
    Bytes(Vec<u8>),
    #[serde(alias = "list")]
    List(Vec<Object>),
    #[serde(alias = "tuple")]
    Tuple(Vec<Object>),
    /// Insertion-ordered key/value pairs.
    #[serde(alias = "dict")]
    Dict(Vec<(Object, Object)>),
    #[serde(alias = "set")]
    Set(Vec<Object>),
    #[serde(alias = "frozenset")]
    FrozenSet(Vec<Object>),
    /// An exception instance: kind plus constructor args.
    Exception { exc_type: ExcType, args: Vec<Object> },
    /// A first-class type object.
    Type(Type),
    /// Output-only fallback carrying `repr()` of the value.
    Repr(String),
}

impl Object {
    /// Convenience constructor for the common single-message exception case.
    #[must_use]
    pub fn exception(exc_type: ExcType, message: &str) -> Self {
        Self::Exception {
            exc_type,
            args: vec![Self::String(message.to_owned())],
        }
    }

    /// An integer from any magnitude, demoting to `Int` when it fits.
    #[must_use]
    pub fn int(value: BigInt) -> Self {
        match value.to_i64() {
            Some(small) => Self::Int(small),
            None => Self::BigInt(value),
        }
    }
}

/// Converts a host value into an arena value (the bridge's entry direction).
pub(crate) fn object_to_value(
    obj: &Object,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    match obj {
        Object::None => Ok(Value::None),
        Object::Ellipsis => Ok(Value::Ellipsis),
        Object::NotImplemented => Ok(Value::NotImplemented),
        Object::Bool(b) => Ok(Value::Bool(*b)),
        Object::Int(i) => Ok(Value::Int(*i)),
        Object::BigInt(big) => Ok(crate::types::long_int::int_to_value(big.clone(), heap)?),
        Object::Float(f) => Ok(Value::Float(*f)),
        Object::String(s) => Ok(heap.alloc_str(s.clone())?),
        Object::Bytes(b) => Ok(heap.alloc_bytes(b.clone())?),
        Object::List(items) => {
            let values = items
                .iter()
                .map(|item| object_to_value(item, heap, interns))
                .collect::<RunResult<Vec<_>>>()?;
            Ok(heap.alloc_list(values)?)
        }
        Object::Tuple(items) => {
            let values = items
                .iter()
                .map(|item| object_to_value(item, heap, interns))
                .collect::<RunResult<Vec<_>>>()?;
            Ok(heap.alloc_tuple(values)?)
        }
        Object::Dict(pairs) => {
            let mut dict = Dict::new();
            for (key, value) in pairs {
                let key = object_to_value(key, heap, interns)?;
                let value = object_to_value(value, heap, interns)?;
                let hash = hash_key(key, heap, interns)?;
                dict.insert(key, hash, value, heap, interns)?;
            }
            Ok(Value::Ref(heap.allocate(HeapData::Dict(dict))?))
        }
        Object::Set(items) => {
            let values = items
                .iter()
                .map(|item| object_to_value(item, heap, interns))
                .collect::<RunResult<Vec<_>>>()?;
            let storage = storage_from_values(values, heap, interns)?;
            Ok(Value::Ref(heap.allocate(HeapData::Set(Set::new(storage)))?))
        }
        Object::FrozenSet(items) => {
            let values = items
                .iter()
                .map(|item| object_to_value(item, heap, interns))
                .collect::<RunResult<Vec<_>>>()?;
            let storage = storage_from_values(values, heap, interns)?;
            Ok(Value::Ref(heap.allocate(HeapData::FrozenSet(FrozenSet::new(storage)))?))
        }
        Object::Exception { exc_type, args } => {
            // host subclasses arrive pre-coerced; normalize anyway
            let exc_type = exc_type.nearest_supported();
            let args = args
                .iter()
                .map(|arg| object_to_value(arg, heap, interns))
                .collect::<RunResult<Vec<_>>>()?;
            let instance = ExcInstance::new(exc_type, args);
            Ok(Value::Ref(heap.allocate(HeapData::Exception(instance))?))
        }
        Object::Type(t) => Ok(Value::Builtin(match t {
            Type::Exception(exc) => crate::builtins::Builtins::Exc(*exc),
            other => crate::builtins::Builtins::Type(*other),
        })),
        Object::Repr(_) => Err(ExcType::type_error(
            "Repr objects are output-only and cannot be used as input",
        )),
    }
}

/// Converts an arena value back to a host value (the exit direction).
pub(crate) fn value_to_object(
    value: &Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Object> {
    let mut converting = AHashSet::new();
    convert_out(value, heap, interns, &mut converting)
}

fn convert_out(
    value: &Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
    converting: &mut AHashSet<HeapId>,
) -> RunResult<Object> {
    let object = match value {
        Value::Undefined => unreachable!("Undefined cannot escape the evaluator"),
        Value::None => Object::None,
        Value::Ellipsis => Object::Ellipsis,
        Value::NotImplemented => Object::NotImplemented,
        Value::Bool(b) => Object::Bool(*b),
        Value::Int(i) => Object::Int(*i),
        Value::Float(f) => Object::Float(*f),
        Value::InternString(id) => Object::String(interns.get_str(*id).to_owned()),
        Value::InternBytes(id) => Object::Bytes(interns.get_bytes(*id).to_owned()),
        Value::InternLongInt(id) => Object::int(interns.get_long_int(*id).clone()),
        Value::Builtin(crate::builtins::Builtins::Type(t)) => Object::Type(*t),
        Value::Builtin(crate::builtins::Builtins::Exc(e)) => Object::Type(Type::Exception(*e)),
        Value::Builtin(_) | Value::Module(_) => Object::Repr(repr_value(value, heap, interns)?),
        Value::Ref(id) => {
            match heap.get(*id) {
                HeapData::Str(s) => Object::String(s.clone()),
                HeapData::Bytes(b) => Object::Bytes(b.clone()),
                HeapData::LongInt(big) => Object::int(big.clone()),
                HeapData::List(list) => {
                    if !converting.insert(*id) {
                        return Ok(Object::Repr("[...]".to_owned()));
                    }
                    let items = list.as_slice().to_vec();
                    let converted = heap.with_data_depth(|| {
                        items
                            .iter()
                            .map(|item| convert_out(item, heap, interns, converting))
                            .collect::<RunResult<Vec<_>>>()
                    })?;
                    converting.remove(id);
                    Object::List(converted)
                }
                HeapData::Tuple(tuple) => {
                    if !converting.insert(*id) {
                        return Ok(Object::Repr("(...)".to_owned()));
                    }
                    let items = tuple.as_slice().to_vec();
                    let converted = heap.with_data_depth(|| {
                        items
                            .iter()
                            .map(|item| convert_out(item, heap, interns, converting))
                            .collect::<RunResult<Vec<_>>>()
                    })?;
                    converting.remove(id);
                    Object::Tuple(converted)
                }
                HeapData::Dict(dict) => {
                    if !converting.insert(*id) {
                        return Ok(Object::Repr("{...}".to_owned()));
                    }
                    let entries: Vec<_> = dict.entries().iter().map(|e| (e.key, e.value)).collect();
                    let converted = heap.with_data_depth(|| {
                        entries
                            .iter()
                            .map(|(key, value)| {
                                Ok((
                                    convert_out(key, heap, interns, converting)?,
                                    convert_out(value, heap, interns, converting)?,
                                ))
                            })
                            .collect::<RunResult<Vec<_>>>()
                    })?;
                    converting.remove(id);
                    Object::Dict(converted)
                }
                HeapData::Set(set) => {
                    let items: Vec<_> = set.storage().entries().iter().map(|e| e.value).collect();
                    let converted = heap.with_data_depth(|| {
                        items
                            .iter()
                            .map(|item| convert_out(item, heap, interns, converting))
                            .collect::<RunResult<Vec<_>>>()
                    })?;
                    Object::Set(converted)
                }
                HeapData::FrozenSet(set) => {
                    let items: Vec<_> = set.storage().entries().iter().map(|e| e.value).collect();
                    let converted = heap.with_data_depth(|| {
                        items
                            .iter()
                            .map(|item| convert_out(item, heap, interns, converting))
                            .collect::<RunResult<Vec<_>>>()
                    })?;
                    Object::FrozenSet(converted)
                }
                HeapData::Exception(exc) => {
                    let args = exc.args.clone();
                    let exc_type = exc.exc_type;
                    let converted = args
                        .iter()
                        .map(|arg| convert_out(arg, heap, interns, converting))
                        .collect::<RunResult<Vec<_>>>()?;
                    Object::Exception {
                        exc_type,
                        args: converted,
                    }
                }
                // no host mapping: surface the repr
                _ => Object::Repr(repr_value(value, heap, interns)?),
            }
        }
    };
    Ok(object)
}
