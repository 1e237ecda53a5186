//! The iteration protocol.
//!
//! `for`, comprehensions, unpacking, constructors and several builtins all
//! iterate through [`ValueIter`]. Every iterable in the value model is backed
//! by data the iterator can walk without calling script code, so iteration is
//! infallible apart from allocation and the mutated-while-iterating checks.
//!
//! Sequences iterate live by index (mutating a list while looping over it
//! behaves like CPython); dict and set iteration detects size changes and
//! raises the canonical `RuntimeError`.

use crate::{
    exception::{ExcType, RunResult},
    heap::{Heap, HeapData, HeapId},
    intern::Interns,
    resource::ResourceTracker,
    types::range::RangeIter,
    value::Value,
};

#[derive(Debug)]
pub(crate) enum ValueIter {
    List { id: HeapId, index: usize },
    Tuple { id: HeapId, index: usize },
    Str { content: String, byte_pos: usize },
    Bytes { content: Vec<u8>, pos: usize },
    Range(RangeIter),
    DictKeys { id: HeapId, index: usize, len: usize },
    Set { id: HeapId, index: usize, len: usize },
    FrozenSet { id: HeapId, index: usize },
}

impl ValueIter {
    /// `iter(value)`; raises `TypeError` for non-iterables.
    pub(crate) fn new(
        value: Value,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<Self> {
        match value {
            Value::InternString(id) => Ok(Self::Str {
                content: interns.get_str(id).to_owned(),
                byte_pos: 0,
            }),
            Value::InternBytes(id) => Ok(Self::Bytes {
                content: interns.get_bytes(id).to_owned(),
                pos: 0,
            }),
            Value::Ref(id) => match heap.get(id) {
                HeapData::List(_) => Ok(Self::List { id, index: 0 }),
                HeapData::Tuple(_) => Ok(Self::Tuple { id, index: 0 }),
                HeapData::Str(s) => Ok(Self::Str {
                    content: s.clone(),
                    byte_pos: 0,
                }),
                HeapData::Bytes(b) => Ok(Self::Bytes {
                    content: b.clone(),
                    pos: 0,
                }),
                HeapData::Range(r) => Ok(Self::Range(RangeIter::new(r))),
                HeapData::Dict(d) => Ok(Self::DictKeys {
                    id,
                    index: 0,
                    len: d.len(),
                }),
                HeapData::Set(s) => Ok(Self::Set {
                    id,
                    index: 0,
                    len: s.storage().len(),
                }),
                HeapData::FrozenSet(_) => Ok(Self::FrozenSet { id, index: 0 }),
                _ => Err(ExcType::not_iterable(value.py_type(heap))),
            },
            _ => Err(ExcType::not_iterable(value.py_type(heap))),
        }
    }

    /// Advances the iterator; `Ok(None)` is exhaustion (`StopIteration` in
    /// protocol terms).
    pub(crate) fn next(&mut self, heap: &mut Heap<impl ResourceTracker>) -> RunResult<Option<Value>> {
        match self {
            Self::List { id, index } => {
                let HeapData::List(list) = heap.get(*id) else {
                    unreachable!("list iterator over non-list");
                };
                match list.get(*index) {
                    Some(value) => {
                        *index += 1;
                        Ok(Some(value))
                    }
                    None => Ok(None),
                }
            }
            Self::Tuple { id, index } => {
                let HeapData::Tuple(tuple) = heap.get(*id) else {
                    unreachable!("tuple iterator over non-tuple");
                };
                match tuple.get(*index) {
                    Some(value) => {
                        *index += 1;
                        Ok(Some(value))
                    }
                    None => Ok(None),
                }
            }
            Self::Str { content, byte_pos } => {
                let Some(c) = content[*byte_pos..].chars().next() else {
                    return Ok(None);
                };
                *byte_pos += c.len_utf8();
                Ok(Some(heap.alloc_str(c.to_string())?))
            }
            Self::Bytes { content, pos } => match content.get(*pos) {
                Some(byte) => {
                    *pos += 1;
                    Ok(Some(Value::Int(i64::from(*byte))))
                }
                None => Ok(None),
            },
            Self::Range(range_iter) => Ok(range_iter.next()),
            Self::DictKeys { id, index, len } => {
                let HeapData::Dict(dict) = heap.get(*id) else {
                    unreachable!("dict iterator over non-dict");
                };
                if dict.len() != *len {
                    return Err(ExcType::RuntimeError.msg("dictionary changed size during iteration"));
                }
                match dict.entries().get(*index) {
                    Some(entry) => {
                        *index += 1;
                        Ok(Some(entry.key))
                    }
                    None => Ok(None),
                }
            }
            Self::Set { id, index, len } => {
                let HeapData::Set(set) = heap.get(*id) else {
                    unreachable!("set iterator over non-set");
                };
                if set.storage().len() != *len {
                    return Err(ExcType::RuntimeError.msg("Set changed size during iteration"));
                }
                match set.storage().entries().get(*index) {
                    Some(entry) => {
                        *index += 1;
                        Ok(Some(entry.value))
                    }
                    None => Ok(None),
                }
            }
            Self::FrozenSet { id, index } => {
                let HeapData::FrozenSet(set) = heap.get(*id) else {
                    unreachable!("frozenset iterator over non-frozenset");
                };
                match set.storage().entries().get(*index) {
                    Some(entry) => {
                        *index += 1;
                        Ok(Some(entry.value))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    /// Drains the iterator into a vector, charging growth to the tracker.
    pub(crate) fn collect(mut self, heap: &mut Heap<impl ResourceTracker>) -> RunResult<Vec<Value>> {
        let mut items = Vec::new();
        while let Some(value) = self.next(heap)? {
            heap.tracker().on_container_insert()?;
            items.push(value);
        }
        Ok(items)
    }
}

/// Materializes any iterable into a vector.
pub(crate) fn iterate_to_vec(
    value: Value,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Vec<Value>> {
    ValueIter::new(value, heap, interns)?.collect(heap)
}
