//! Mutable ordered sequences.
//!
//! `List` is a thin wrapper over `Vec<Value>`; the interesting behavior
//! (negative index wrapping, `insert` clamping, slice assignment) lives in
//! the helpers below. Sorting is composed in the evaluator because `key=`
//! re-enters script code, but the underlying stable merge lives in `ops`.

use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub(crate) struct List(Vec<Value>);

impl List {
    pub(crate) fn new(items: Vec<Value>) -> Self {
        Self(items)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub(crate) fn as_vec_mut(&mut self) -> &mut Vec<Value> {
        &mut self.0
    }

    pub(crate) fn get(&self, index: usize) -> Option<Value> {
        self.0.get(index).copied()
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    /// `list.insert(i, x)`: negative indices count from the end; an index
    /// below `-len` clamps to the front, above `len` appends.
    pub(crate) fn insert_clamped(&mut self, index: i64, value: Value) {
        let len = self.0.len() as i64;
        let position = if index < 0 { (index + len).max(0) } else { index.min(len) };
        self.0.insert(position as usize, value);
    }

    pub(crate) fn reverse(&mut self) {
        self.0.reverse();
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }

    pub(crate) fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_clamps_like_python() {
        let mut list = List::new(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        list.insert_clamped(-100, Value::Int(0));
        assert!(matches!(list.get(0), Some(Value::Int(0))));
        list.insert_clamped(100, Value::Int(9));
        assert!(matches!(list.get(4), Some(Value::Int(9))));
        list.insert_clamped(-1, Value::Int(8));
        // inserted before the last element
        assert!(matches!(list.get(4), Some(Value::Int(8))));
        assert_eq!(list.len(), 6);
    }
}
