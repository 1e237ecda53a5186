//! Interned literal storage for compiled programs.
//!
//! Names, string/bytes literals and oversized integer literals are interned
//! once at parse time and referenced by compact ids from the prepared tree.
//! The runtime heap never owns literal data; `Value::InternString` and friends
//! point straight into the [`Interns`] table, which lives as long as the
//! compiled [`crate::Monty`] program and is shared by every run.

use ahash::AHashMap;
use num_bigint::BigInt;

use crate::expressions::FunctionDef;

/// Index of an interned string (names and string literals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub(crate) struct StringId(u32);

impl StringId {
    pub(crate) fn raw(self) -> u32 {
        self.0
    }
}

/// Index of an interned bytes literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub(crate) struct BytesId(u32);

/// Index of an interned integer literal that does not fit in `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub(crate) struct LongIntId(u32);

/// Index of a prepared function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub(crate) struct FunctionId(u32);

impl FunctionId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("function table exceeds u32"))
    }
}

/// Immutable literal and function tables produced by parse + prepare.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct Interns {
    strings: Vec<String>,
    bytes: Vec<Vec<u8>>,
    long_ints: Vec<BigInt>,
    functions: Vec<FunctionDef>,
}

impl Interns {
    pub(crate) fn get_str(&self, id: StringId) -> &str {
        &self.strings[id.0 as usize]
    }

    pub(crate) fn get_bytes(&self, id: BytesId) -> &[u8] {
        &self.bytes[id.0 as usize]
    }

    pub(crate) fn get_long_int(&self, id: LongIntId) -> &BigInt {
        &self.long_ints[id.0 as usize]
    }

    pub(crate) fn get_function(&self, id: FunctionId) -> &FunctionDef {
        &self.functions[id.0 as usize]
    }

    /// Registers a prepared function body, returning its id.
    ///
    /// Called during the prepare phase only; the table is frozen afterwards.
    pub(crate) fn add_function(&mut self, function: FunctionDef) -> FunctionId {
        let id = FunctionId::new(self.functions.len());
        self.functions.push(function);
        id
    }
}

/// Mutable interner used while parsing; deduplicates strings.
///
/// Bytes and long-int literals are appended without deduplication (repeated
/// big literals are rare enough that a lookup table is not worth carrying).
#[derive(Debug, Default)]
pub(crate) struct InternerBuilder {
    interns: Interns,
    lookup: AHashMap<String, StringId>,
}

impl InternerBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn intern(&mut self, value: &str) -> StringId {
        if let Some(id) = self.lookup.get(value) {
            return *id;
        }
        let id = StringId(u32::try_from(self.interns.strings.len()).expect("string table exceeds u32"));
        self.interns.strings.push(value.to_owned());
        self.lookup.insert(value.to_owned(), id);
        id
    }

    pub(crate) fn intern_bytes(&mut self, value: &[u8]) -> BytesId {
        let id = BytesId(u32::try_from(self.interns.bytes.len()).expect("bytes table exceeds u32"));
        self.interns.bytes.push(value.to_owned());
        id
    }

    pub(crate) fn intern_long_int(&mut self, value: BigInt) -> LongIntId {
        let id = LongIntId(u32::try_from(self.interns.long_ints.len()).expect("long-int table exceeds u32"));
        self.interns.long_ints.push(value);
        id
    }

    pub(crate) fn get_str(&self, id: StringId) -> &str {
        self.interns.get_str(id)
    }

    pub(crate) fn finish(self) -> Interns {
        self.interns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates_strings() {
        let mut builder = InternerBuilder::new();
        let a = builder.intern("hello");
        let b = builder.intern("world");
        let c = builder.intern("hello");
        assert_eq!(a, c);
        assert_ne!(a, b);
        let interns = builder.finish();
        assert_eq!(interns.get_str(a), "hello");
        assert_eq!(interns.get_str(b), "world");
    }

    #[test]
    fn bytes_and_long_ints_append() {
        let mut builder = InternerBuilder::new();
        let b1 = builder.intern_bytes(b"ab");
        let l1 = builder.intern_long_int(BigInt::from(7) << 100);
        let interns = builder.finish();
        assert_eq!(interns.get_bytes(b1), b"ab");
        assert_eq!(*interns.get_long_int(l1), BigInt::from(7) << 100);
    }
}
