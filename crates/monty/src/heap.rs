//! The per-evaluation arena.
//!
//! Every mutable or sizeable runtime object lives in one [`Heap`], owned by a
//! single `run` call and dropped as a unit when it returns. Values reference
//! heap objects through stable [`HeapId`] handles; handles are plain `Copy`
//! indices with shared-reference semantics, so aliasing (`b = a` for a list)
//! and cycles (`lst.append(lst)`) fall out naturally. Nothing is freed before
//! the arena goes away; the [`ResourceTracker`] bounds growth instead.

use std::cell::Cell;

use crate::{
    exception::{ExcInstance, ExcType, RunError, RunResult},
    function::{BoundMethod, Closure},
    resource::{ResourceError, ResourceTracker},
    types::{
        datetime::{Date, DateTime, Time, Timedelta, Timezone},
        dict::Dict,
        list::List,
        range::Range,
        set::{FrozenSet, Set},
        slice::Slice,
        tuple::Tuple,
    },
    value::Value,
};

/// Maximum nesting depth for recursive data operations (equality, repr,
/// hashing, conversion). Deeper nesting raises `RecursionError`, matching
/// CPython's behavior for pathological structures like 1000 nested lists.
pub(crate) const MAX_DATA_RECURSION_DEPTH: usize = 100;

/// Handle to an object in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct HeapId(u32);

impl HeapId {
    /// Stable integer identity for `id()` and `is`.
    pub(crate) fn raw(self) -> u32 {
        self.0
    }
}

/// An object body stored in the arena.
#[derive(Debug)]
pub(crate) enum HeapData {
    Str(String),
    Bytes(Vec<u8>),
    LongInt(num_bigint::BigInt),
    List(List),
    Tuple(Tuple),
    Dict(Dict),
    Set(Set),
    FrozenSet(FrozenSet),
    Range(Range),
    Slice(Slice),
    Closure(Closure),
    /// A captured variable shared between a function and its closures.
    Cell(Value),
    BoundMethod(BoundMethod),
    Exception(ExcInstance),
    Date(Date),
    Time(Time),
    DateTime(DateTime),
    Timedelta(Timedelta),
    Timezone(Timezone),
    /// Transient placeholder while an object is temporarily moved out for a
    /// mutation that also needs heap access. Never observable from scripts.
    Moved,
}

impl HeapData {
    /// Rough size estimate in bytes for resource accounting.
    fn estimate_size(&self) -> usize {
        let payload = match self {
            Self::Str(s) => s.len(),
            Self::Bytes(b) => b.len(),
            Self::LongInt(i) => usize::try_from(i.bits()).unwrap_or(usize::MAX).saturating_add(7) / 8,
            Self::List(l) => l.len() * std::mem::size_of::<Value>(),
            Self::Tuple(t) => t.len() * std::mem::size_of::<Value>(),
            Self::Dict(d) => d.len() * 3 * std::mem::size_of::<Value>(),
            Self::Set(s) => s.storage().len() * 2 * std::mem::size_of::<Value>(),
            Self::FrozenSet(s) => s.storage().len() * 2 * std::mem::size_of::<Value>(),
            Self::Closure(c) => c.estimate_size(),
            Self::Exception(e) => e.args.len() * std::mem::size_of::<Value>() + 64,
            _ => 0,
        };
        payload + std::mem::size_of::<Self>()
    }
}

/// The arena plus its resource tracker and the per-run hash seed.
#[derive(Debug)]
pub(crate) struct Heap<T: ResourceTracker> {
    slots: Vec<HeapData>,
    tracker: T,
    hash_seed: u64,
    data_depth: Cell<usize>,
}

impl<T: ResourceTracker> Heap<T> {
    pub(crate) fn new(tracker: T, hash_seed: u64) -> Self {
        Self {
            slots: Vec::with_capacity(32),
            tracker,
            hash_seed,
            data_depth: Cell::new(0),
        }
    }

    /// Seed for str/bytes hashing; fixed for the lifetime of the run.
    pub(crate) fn hash_seed(&self) -> u64 {
        self.hash_seed
    }

    /// Allocates an object, charging its estimated size to the tracker.
    pub(crate) fn allocate(&mut self, data: HeapData) -> Result<HeapId, ResourceError> {
        self.tracker.on_allocate(|| data.estimate_size())?;
        let id = HeapId(u32::try_from(self.slots.len()).expect("arena exceeds u32 slots"));
        self.slots.push(data);
        Ok(id)
    }

    pub(crate) fn alloc_str(&mut self, s: impl Into<String>) -> Result<Value, ResourceError> {
        Ok(Value::Ref(self.allocate(HeapData::Str(s.into()))?))
    }

    pub(crate) fn alloc_bytes(&mut self, b: Vec<u8>) -> Result<Value, ResourceError> {
        Ok(Value::Ref(self.allocate(HeapData::Bytes(b))?))
    }

    pub(crate) fn alloc_list(&mut self, items: Vec<Value>) -> Result<Value, ResourceError> {
        Ok(Value::Ref(self.allocate(HeapData::List(List::new(items)))?))
    }

    pub(crate) fn alloc_tuple(&mut self, items: Vec<Value>) -> Result<Value, ResourceError> {
        Ok(Value::Ref(self.allocate(HeapData::Tuple(Tuple::new(items)))?))
    }

    pub(crate) fn get(&self, id: HeapId) -> &HeapData {
        &self.slots[id.0 as usize]
    }

    pub(crate) fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.slots[id.0 as usize]
    }

    pub(crate) fn tracker(&mut self) -> &mut T {
        &mut self.tracker
    }

    pub(crate) fn tracker_ref(&self) -> &T {
        &self.tracker
    }

    /// Temporarily moves an object out so it can be mutated while the rest of
    /// the heap stays readable (key hashing, element comparison). The caller
    /// must restore it with [`Heap::put_back`].
    pub(crate) fn take(&mut self, id: HeapId) -> HeapData {
        std::mem::replace(&mut self.slots[id.0 as usize], HeapData::Moved)
    }

    pub(crate) fn put_back(&mut self, id: HeapId, data: HeapData) {
        self.slots[id.0 as usize] = data;
    }

    /// Enters a recursive data operation; false when the depth budget is
    /// exhausted and the caller should raise `RecursionError`.
    pub(crate) fn data_depth_enter(&self) -> bool {
        let depth = self.data_depth.get();
        if depth >= MAX_DATA_RECURSION_DEPTH {
            return false;
        }
        self.data_depth.set(depth + 1);
        true
    }

    pub(crate) fn data_depth_exit(&self) {
        self.data_depth.set(self.data_depth.get().saturating_sub(1));
    }

    /// The `RecursionError` raised when a data operation nests too deeply.
    pub(crate) fn data_depth_error() -> RunError {
        ExcType::RecursionError.msg("maximum recursion depth exceeded")
    }

    /// Runs a recursive data operation under the depth guard.
    pub(crate) fn with_data_depth<R>(&self, f: impl FnOnce() -> RunResult<R>) -> RunResult<R> {
        if !self.data_depth_enter() {
            return Err(Self::data_depth_error());
        }
        let result = f();
        self.data_depth_exit();
        result
    }
}
