//! The runtime value representation.
//!
//! A [`Value`] is a small `Copy` tagged union: immediate payloads (numbers,
//! singletons, interned-literal ids, builtin references) are stored inline,
//! everything else is a [`HeapId`] into the per-run arena. Copying a `Value`
//! copies the handle, never the object, which is exactly Python's shared
//! reference semantics.
//!
//! This module owns the cross-cutting value queries: dynamic type, truth
//! value, length, identity and hashing. Operator dispatch is in `ops`,
//! rendering in `repr`.

use num_traits::{Signed, ToPrimitive, Zero};

use crate::{
    builtins::Builtins,
    exception::{ExcType, RunResult},
    heap::{Heap, HeapData, HeapId},
    intern::{BytesId, LongIntId, StringId},
    modules::ModuleId,
    py_hash,
    resource::ResourceTracker,
    types::{Type, long_int},
};

/// A runtime value: an immediate payload or a handle into the arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Value {
    /// Sentinel for a namespace slot that has no value bound. Never observable
    /// from scripts; reads convert it to `NameError`.
    Undefined,
    None,
    Ellipsis,
    /// Returned by binary dunders to decline an operation; the dispatcher
    /// then tries the reflected form on the other operand.
    NotImplemented,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A string literal, by id into the program's intern table.
    InternString(StringId),
    /// A bytes literal, by id into the program's intern table.
    InternBytes(BytesId),
    /// An integer literal too large for `i64`, by id into the intern table.
    InternLongInt(LongIntId),
    /// A builtin function, a type object, or an exception class.
    Builtin(Builtins),
    /// A registered module (`datetime`).
    Module(ModuleId),
    Ref(HeapId),
}

impl Value {
    /// The value's dynamic type.
    pub(crate) fn py_type(&self, heap: &Heap<impl ResourceTracker>) -> Type {
        match self {
            Self::Undefined => unreachable!("Undefined has no type"),
            Self::None => Type::NoneType,
            Self::Ellipsis => Type::Ellipsis,
            Self::NotImplemented => Type::NotImplementedType,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) | Self::InternLongInt(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::InternString(_) => Type::Str,
            Self::InternBytes(_) => Type::Bytes,
            Self::Builtin(b) => b.py_type(),
            Self::Module(_) => Type::Module,
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(_) => Type::Str,
                HeapData::Bytes(_) => Type::Bytes,
                HeapData::LongInt(_) => Type::Int,
                HeapData::List(_) => Type::List,
                HeapData::Tuple(_) => Type::Tuple,
                HeapData::Dict(_) => Type::Dict,
                HeapData::Set(_) => Type::Set,
                HeapData::FrozenSet(_) => Type::FrozenSet,
                HeapData::Range(_) => Type::Range,
                HeapData::Slice(_) => Type::Slice,
                HeapData::Closure(_) => Type::Function,
                HeapData::Cell(_) => unreachable!("cells are not first-class values"),
                HeapData::BoundMethod(_) => Type::BoundMethod,
                HeapData::Exception(exc) => Type::Exception(exc.exc_type),
                HeapData::Date(_) => Type::Date,
                HeapData::Time(_) => Type::Time,
                HeapData::DateTime(_) => Type::DateTime,
                HeapData::Timedelta(_) => Type::Timedelta,
                HeapData::Timezone(_) => Type::Timezone,
                HeapData::Moved => unreachable!("Moved placeholder observed"),
            },
        }
    }

    /// Python truth value. Total: every real value is truthy or falsy.
    pub(crate) fn py_bool(&self, heap: &Heap<impl ResourceTracker>, interns: &crate::intern::Interns) -> bool {
        match self {
            Self::Undefined => unreachable!("Undefined has no truth value"),
            Self::None => false,
            Self::Ellipsis | Self::NotImplemented => true,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::InternString(id) => !interns.get_str(*id).is_empty(),
            Self::InternBytes(id) => !interns.get_bytes(*id).is_empty(),
            Self::InternLongInt(id) => !interns.get_long_int(*id).is_zero(),
            Self::Builtin(_) | Self::Module(_) => true,
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => !s.is_empty(),
                HeapData::Bytes(b) => !b.is_empty(),
                HeapData::LongInt(i) => !i.is_zero(),
                HeapData::List(l) => !l.is_empty(),
                HeapData::Tuple(t) => !t.is_empty(),
                HeapData::Dict(d) => d.len() != 0,
                HeapData::Set(s) => s.storage().len() != 0,
                HeapData::FrozenSet(s) => s.storage().len() != 0,
                HeapData::Range(r) => r.len() != 0,
                _ => true,
            },
        }
    }

    /// `len(value)`, when the type has a length.
    pub(crate) fn py_len(&self, heap: &Heap<impl ResourceTracker>, interns: &crate::intern::Interns) -> Option<usize> {
        match self {
            // length is in code points, not bytes
            Self::InternString(id) => Some(interns.get_str(*id).chars().count()),
            Self::InternBytes(id) => Some(interns.get_bytes(*id).len()),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => Some(s.chars().count()),
                HeapData::Bytes(b) => Some(b.len()),
                HeapData::List(l) => Some(l.len()),
                HeapData::Tuple(t) => Some(t.len()),
                HeapData::Dict(d) => Some(d.len()),
                HeapData::Set(s) => Some(s.storage().len()),
                HeapData::FrozenSet(s) => Some(s.storage().len()),
                HeapData::Range(r) => Some(r.len()),
                _ => None,
            },
            _ => None,
        }
    }

    /// `a is b`.
    ///
    /// Same heap handle for arena objects; same singleton for the sentinels.
    /// For immediate primitives identity is implementation-defined, and this
    /// implementation treats equal immediates as identical (a superset of
    /// CPython's small-int/str interning).
    pub(crate) fn is_identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None)
            | (Self::Ellipsis, Self::Ellipsis)
            | (Self::NotImplemented, Self::NotImplemented) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::InternString(a), Self::InternString(b)) => a == b,
            (Self::InternBytes(a), Self::InternBytes(b)) => a == b,
            (Self::InternLongInt(a), Self::InternLongInt(b)) => a == b,
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Module(a), Self::Module(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => a == b,
            _ => false,
        }
    }

    /// Stable integer identity for `id()`.
    ///
    /// Heap objects use their arena slot; immediates get a synthetic id in a
    /// disjoint range. Only documented to be stable within one run.
    pub(crate) fn py_id(&self, heap_base: u64) -> u64 {
        const IMMEDIATE_BASE: u64 = 1 << 48;
        match self {
            Self::Ref(id) => heap_base + u64::from(id.raw()),
            Self::None => IMMEDIATE_BASE,
            Self::Ellipsis => IMMEDIATE_BASE + 1,
            Self::NotImplemented => IMMEDIATE_BASE + 2,
            Self::Bool(b) => IMMEDIATE_BASE + 3 + u64::from(*b),
            Self::Int(i) => IMMEDIATE_BASE + 16 + (*i as u64 & 0xffff_ffff),
            Self::Float(f) => IMMEDIATE_BASE ^ f.to_bits(),
            Self::InternString(_) | Self::InternBytes(_) | Self::InternLongInt(_) => {
                IMMEDIATE_BASE + 8 + py_hash::hash_i64(self.variant_tag())
            }
            Self::Builtin(_) | Self::Module(_) => IMMEDIATE_BASE + 9 + py_hash::hash_i64(self.variant_tag()),
            Self::Undefined => unreachable!("Undefined has no identity"),
        }
    }

    fn variant_tag(&self) -> i64 {
        match self {
            Self::InternString(id) => 0x10_0000 + i64::from(id.raw()),
            Self::InternBytes(_) => 0x20_0000,
            Self::InternLongInt(_) => 0x30_0000,
            Self::Builtin(b) => 0x40_0000 + b.stable_index(),
            Self::Module(m) => 0x50_0000 + *m as i64,
            _ => 0,
        }
    }

    /// `hash(value)`.
    ///
    /// Defined for all immutable values; mutable containers raise `TypeError`.
    /// Every representation of the same mathematical number hashes the same,
    /// and str/bytes hashing is keyed from the per-run seed.
    pub(crate) fn py_hash(
        &self,
        heap: &Heap<impl ResourceTracker>,
        interns: &crate::intern::Interns,
    ) -> RunResult<u64> {
        match self {
            Self::Undefined => unreachable!("Undefined is not hashable"),
            Self::None => Ok(py_hash::hash_i64(0x6055_3F66)),
            Self::Ellipsis => Ok(py_hash::hash_i64(0x2F0E_39D1)),
            Self::NotImplemented => Ok(py_hash::hash_i64(0x5A2B_91C7)),
            Self::Bool(b) => Ok(py_hash::hash_i64(i64::from(*b))),
            Self::Int(i) => Ok(py_hash::hash_i64(*i)),
            Self::Float(f) => Ok(py_hash::hash_f64(*f)),
            Self::InternString(id) => Ok(py_hash::hash_str(interns.get_str(*id), heap.hash_seed())),
            Self::InternBytes(id) => Ok(py_hash::hash_bytes(interns.get_bytes(*id), heap.hash_seed())),
            Self::InternLongInt(id) => Ok(long_int::hash_big_int(interns.get_long_int(*id))),
            Self::Builtin(b) => Ok(py_hash::hash_i64(0x7000 + b.stable_index())),
            Self::Module(m) => Ok(py_hash::hash_i64(0x8000 + *m as i64)),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => Ok(py_hash::hash_str(s, heap.hash_seed())),
                HeapData::Bytes(b) => Ok(py_hash::hash_bytes(b, heap.hash_seed())),
                HeapData::LongInt(i) => Ok(long_int::hash_big_int(i)),
                HeapData::Tuple(t) => {
                    let items = t.as_slice().to_vec();
                    heap.with_data_depth(|| {
                        let mut hashes = Vec::with_capacity(items.len());
                        for item in &items {
                            hashes.push(item.py_hash(heap, interns)?);
                        }
                        Ok(py_hash::hash_tuple_elements(hashes.into_iter()))
                    })
                }
                HeapData::FrozenSet(s) => {
                    // element hashes are stored alongside the entries
                    Ok(py_hash::hash_set_elements(s.storage().entry_hashes()))
                }
                HeapData::Range(r) => {
                    let parts = [r.len() as i64, r.start(), r.step()];
                    Ok(py_hash::hash_tuple_elements(
                        parts.iter().map(|p| py_hash::hash_i64(*p)),
                    ))
                }
                HeapData::List(_) => Err(ExcType::unhashable("list")),
                HeapData::Dict(_) => Err(ExcType::unhashable("dict")),
                HeapData::Set(_) => Err(ExcType::unhashable("set")),
                HeapData::Slice(_) => Err(ExcType::unhashable("slice")),
                HeapData::Exception(_) | HeapData::Closure(_) | HeapData::BoundMethod(_) => {
                    // identity hash, stable within the run
                    Ok(py_hash::hash_i64(0x4000_0000 + i64::from(id.raw())))
                }
                HeapData::Date(d) => Ok(d.py_hash()),
                HeapData::Time(t) => Ok(t.py_hash(heap)),
                HeapData::DateTime(dt) => Ok(dt.py_hash(heap)),
                HeapData::Timedelta(td) => Ok(td.py_hash()),
                HeapData::Timezone(tz) => Ok(tz.py_hash()),
                HeapData::Cell(_) | HeapData::Moved => unreachable!("not first-class values"),
            },
        }
    }

    /// The integer value when this is an int of either representation.
    pub(crate) fn as_int<'a>(
        &'a self,
        heap: &'a Heap<impl ResourceTracker>,
        interns: &'a crate::intern::Interns,
    ) -> Option<IntRef<'a>> {
        match self {
            Self::Bool(b) => Some(IntRef::Small(i64::from(*b))),
            Self::Int(i) => Some(IntRef::Small(*i)),
            Self::InternLongInt(id) => Some(IntRef::Big(interns.get_long_int(*id))),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::LongInt(i) => Some(IntRef::Big(i)),
                _ => None,
            },
            _ => None,
        }
    }

    /// The integer value as `i64`, erroring with `OverflowError` when the
    /// value is a big int outside machine range. `strict` ints only — bools
    /// count, floats do not.
    pub(crate) fn expect_index(
        &self,
        heap: &Heap<impl ResourceTracker>,
        interns: &crate::intern::Interns,
        what: &str,
    ) -> RunResult<i64> {
        match self.as_int(heap, interns) {
            Some(IntRef::Small(i)) => Ok(i),
            Some(IntRef::Big(big)) => big
                .to_i64()
                .ok_or_else(|| ExcType::overflow_error("Python int too large to convert to C ssize_t")),
            None => Err(ExcType::type_error(format!(
                "{what} indices must be integers, not {}",
                self.py_type(heap)
            ))),
        }
    }
}

/// Borrowed view of an integer in either representation.
#[derive(Debug, Clone, Copy)]
pub(crate) enum IntRef<'a> {
    Small(i64),
    Big(&'a num_bigint::BigInt),
}

impl IntRef<'_> {
    pub(crate) fn to_big(self) -> num_bigint::BigInt {
        match self {
            Self::Small(i) => num_bigint::BigInt::from(i),
            Self::Big(b) => b.clone(),
        }
    }

    pub(crate) fn to_f64(self) -> Option<f64> {
        match self {
            Self::Small(i) => Some(i as f64),
            Self::Big(b) => {
                let f = b.to_f64()?;
                f.is_finite().then_some(f)
            }
        }
    }

    pub(crate) fn is_negative(self) -> bool {
        match self {
            Self::Small(i) => i < 0,
            Self::Big(b) => b.is_negative(),
        }
    }
}

/// Reads string content out of either representation.
pub(crate) fn value_as_str<'a>(
    value: &Value,
    heap: &'a Heap<impl ResourceTracker>,
    interns: &'a crate::intern::Interns,
) -> Option<&'a str> {
    match value {
        Value::InternString(id) => Some(interns.get_str(*id)),
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Str(s) => Some(s.as_str()),
            _ => None,
        },
        _ => None,
    }
}

/// Reads bytes content out of either representation.
pub(crate) fn value_as_bytes<'a>(
    value: &Value,
    heap: &'a Heap<impl ResourceTracker>,
    interns: &'a crate::intern::Interns,
) -> Option<&'a [u8]> {
    match value {
        Value::InternBytes(id) => Some(interns.get_bytes(*id)),
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Bytes(b) => Some(b.as_slice()),
            _ => None,
        },
        _ => None,
    }
}

