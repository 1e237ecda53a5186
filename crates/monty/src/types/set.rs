//! Sets and frozensets over shared storage.
//!
//! Both kinds use the same insertion-ordered, hash-indexed [`SetStorage`];
//! `set` exposes the mutating algebra, `frozenset` is immutable and hashable.
//! Cross-kind equality and ordering are by membership, so `set == frozenset`
//! holds whenever the elements match.

use hashbrown::HashTable;

use crate::{
    exception::RunResult,
    heap::Heap,
    intern::Interns,
    ops::values_eq_or_identical,
    resource::ResourceTracker,
    value::Value,
};

#[derive(Debug, Clone, Copy)]
pub(crate) struct SetEntry {
    pub hash: u64,
    pub value: Value,
}

#[derive(Debug, Default)]
pub(crate) struct SetStorage {
    entries: Vec<SetEntry>,
    index: HashTable<usize>,
}

impl SetStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entries(&self) -> &[SetEntry] {
        &self.entries
    }

    pub(crate) fn entry_hashes(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().map(|e| e.hash)
    }

    pub(crate) fn contains_hashed(
        &self,
        value: Value,
        hash: u64,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<bool> {
        Ok(self.lookup(value, hash, heap, interns)?.is_some())
    }

    fn lookup(
        &self,
        value: Value,
        hash: u64,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<Option<usize>> {
        let mut eq_error = None;
        let found = self.index.find(hash, |&idx| {
            if eq_error.is_some() {
                return false;
            }
            let entry = &self.entries[idx];
            if entry.hash != hash {
                return false;
            }
            match values_eq_or_identical(&entry.value, &value, heap, interns) {
                Ok(eq) => eq,
                Err(err) => {
                    eq_error = Some(err);
                    false
                }
            }
        });
        match eq_error {
            Some(err) => Err(err),
            None => Ok(found.copied()),
        }
    }

    /// Adds an element; no-op (returning false) when already present.
    pub(crate) fn add(
        &mut self,
        value: Value,
        hash: u64,
        heap: &mut Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<bool> {
        if self.lookup(value, hash, heap, interns)?.is_some() {
            return Ok(false);
        }
        heap.tracker().on_container_insert()?;
        let idx = self.entries.len();
        self.entries.push(SetEntry { hash, value });
        let entries = &self.entries;
        self.index.insert_unique(hash, idx, |&i| entries[i].hash);
        Ok(true)
    }

    /// Removes an element, returning whether it was present.
    pub(crate) fn remove(
        &mut self,
        value: Value,
        hash: u64,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<bool> {
        let Some(idx) = self.lookup(value, hash, heap, interns)? else {
            return Ok(false);
        };
        self.remove_index(idx);
        Ok(true)
    }

    /// Removes and returns the first element in insertion order (`set.pop`).
    pub(crate) fn pop_first(&mut self) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.remove_index(0).value)
    }

    fn remove_index(&mut self, idx: usize) -> SetEntry {
        let entry = self.entries.remove(idx);
        let removed = self
            .index
            .find_entry(entry.hash, |&i| i == idx)
            .map(hashbrown::hash_table::OccupiedEntry::remove);
        debug_assert!(removed.is_ok(), "index out of sync with entries");
        for slot in self.index.iter_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        entry
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub(crate) fn shallow_copy(&self) -> Self {
        let entries = self.entries.clone();
        let mut index = HashTable::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            index.insert_unique(entry.hash, i, |&j| entries[j].hash);
        }
        Self { entries, index }
    }

    /// True when every element of `self` is in `other`.
    pub(crate) fn is_subset(
        &self,
        other: &Self,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<bool> {
        for entry in &self.entries {
            if !other.contains_hashed(entry.value, entry.hash, heap, interns)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Membership-based equality.
    pub(crate) fn set_eq(
        &self,
        other: &Self,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<bool> {
        Ok(self.len() == other.len() && self.is_subset(other, heap, interns)?)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Set(SetStorage);

impl Set {
    pub(crate) fn new(storage: SetStorage) -> Self {
        Self(storage)
    }

    pub(crate) fn storage(&self) -> &SetStorage {
        &self.0
    }

    pub(crate) fn storage_mut(&mut self) -> &mut SetStorage {
        &mut self.0
    }

    pub(crate) fn into_storage(self) -> SetStorage {
        self.0
    }
}

#[derive(Debug, Default)]
pub(crate) struct FrozenSet(SetStorage);

impl FrozenSet {
    pub(crate) fn new(storage: SetStorage) -> Self {
        Self(storage)
    }

    pub(crate) fn storage(&self) -> &SetStorage {
        &self.0
    }
}

/// Builds storage from values, hashing and deduplicating as it goes.
pub(crate) fn storage_from_values(
    values: Vec<Value>,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<SetStorage> {
    let mut storage = SetStorage::new();
    for value in values {
        let hash = value.py_hash(heap, interns)?;
        storage.add(value, hash, heap, interns)?;
    }
    Ok(storage)
}
