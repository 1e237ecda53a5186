//! Insertion-ordered dictionaries.
//!
//! Storage is a dense entry vector (preserving insertion order for iteration
//! and repr) plus a `hashbrown::HashTable` index keyed by the stored Python
//! hash. Key equality routes through full value equality, so `d[1]`,
//! `d[True]` and `d[1.0]` address the same entry, including when the key is a
//! heap big-int with the same mathematical value.
//!
//! Methods here operate on a `Dict` that has been temporarily moved out of
//! the arena (`Heap::take`), which keeps the rest of the heap readable for
//! key hashing and comparison without aliasing the entry being mutated.

use hashbrown::HashTable;

use crate::{
    exception::{ExcType, RunResult},
    heap::Heap,
    intern::Interns,
    ops::values_eq_or_identical,
    resource::ResourceTracker,
    value::Value,
};

#[derive(Debug, Clone, Copy)]
pub(crate) struct DictEntry {
    pub hash: u64,
    pub key: Value,
    pub value: Value,
}

#[derive(Debug, Default)]
pub(crate) struct Dict {
    entries: Vec<DictEntry>,
    index: HashTable<usize>,
}

impl Dict {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entries(&self) -> &[DictEntry] {
        &self.entries
    }

    /// Finds the entry index for `key`, comparing by stored hash then full
    /// equality (identity short-circuits, which also admits NaN keys).
    pub(crate) fn lookup(
        &self,
        key: Value,
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
            match values_eq_or_identical(&entry.key, &key, heap, interns) {
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

    pub(crate) fn get(
        &self,
        key: Value,
        hash: u64,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<Option<Value>> {
        Ok(self.lookup(key, hash, heap, interns)?.map(|idx| self.entries[idx].value))
    }

    /// Inserts or replaces, returning the previous value if any. Insertion
    /// order is preserved: replacing a key keeps its original position.
    pub(crate) fn insert(
        &mut self,
        key: Value,
        hash: u64,
        value: Value,
        heap: &mut Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<Option<Value>> {
        if let Some(idx) = self.lookup(key, hash, heap, interns)? {
            let old = self.entries[idx].value;
            self.entries[idx].value = value;
            return Ok(Some(old));
        }
        heap.tracker().on_container_insert()?;
        let idx = self.entries.len();
        self.entries.push(DictEntry { hash, key, value });
        let entries = &self.entries;
        self.index.insert_unique(hash, idx, |&i| entries[i].hash);
        Ok(None)
    }

    /// Removes `key`, returning its value if it was present.
    pub(crate) fn remove(
        &mut self,
        key: Value,
        hash: u64,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<Option<Value>> {
        let Some(idx) = self.lookup(key, hash, heap, interns)? else {
            return Ok(None);
        };
        let removed = self.remove_index(idx);
        Ok(Some(removed.value))
    }

    /// Removes and returns the most recently inserted entry (`popitem`).
    pub(crate) fn pop_last(&mut self) -> Option<(Value, Value)> {
        if self.entries.is_empty() {
            return None;
        }
        let entry = self.remove_index(self.entries.len() - 1);
        Some((entry.key, entry.value))
    }

    fn remove_index(&mut self, idx: usize) -> DictEntry {
        let entry = self.entries.remove(idx);
        // drop the index slot pointing at idx, then shift the tail indices
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

    /// Clones entries into a fresh dict (`dict.copy()` — shallow).
    pub(crate) fn shallow_copy(&self) -> Self {
        let entries = self.entries.clone();
        let mut index = HashTable::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            index.insert_unique(entry.hash, i, |&j| entries[j].hash);
        }
        Self { entries, index }
    }
}

/// Hashes a prospective dict key, raising the canonical `TypeError` for
/// unhashable types.
pub(crate) fn hash_key(
    key: Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<u64> {
    key.py_hash(heap, interns)
}

/// Dict equality: same length and every key maps to an equal value; order is
/// ignored.
pub(crate) fn dicts_equal(
    a: &Dict,
    b: &Dict,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for entry in a.entries() {
        match b.lookup(entry.key, entry.hash, heap, interns)? {
            Some(idx) => {
                if !crate::ops::values_eq(&entry.value, &b.entries()[idx].value, heap, interns)? {
                    return Ok(false);
                }
            }
            None => return Ok(false),
        }
    }
    Ok(true)
}
