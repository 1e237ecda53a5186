//! Lazy arithmetic progressions.
//!
//! `range` never materializes: length, membership and indexing are computed
//! from `(start, stop, step)`. Iteration walks the progression one element at
//! a time (see `types::iter`).

use crate::{
    exception::{ExcType, RunResult},
    value::Value,
};

#[derive(Debug, Clone, Copy)]
pub(crate) struct Range {
    start: i64,
    stop: i64,
    step: i64,
}

impl Range {
    /// Builds a range; `step == 0` raises `ValueError`.
    pub(crate) fn new(start: i64, stop: i64, step: i64) -> RunResult<Self> {
        if step == 0 {
            return Err(ExcType::value_error("range() arg 3 must not be zero"));
        }
        Ok(Self { start, stop, step })
    }

    pub(crate) fn start(&self) -> i64 {
        self.start
    }

    pub(crate) fn stop(&self) -> i64 {
        self.stop
    }

    pub(crate) fn step(&self) -> i64 {
        self.step
    }

    /// Number of elements, computed without materializing.
    pub(crate) fn len(&self) -> usize {
        let (start, stop, step) = (i128::from(self.start), i128::from(self.stop), i128::from(self.step));
        let span = if step > 0 { stop - start } else { start - stop };
        if span <= 0 {
            return 0;
        }
        let step_mag = step.unsigned_abs();
        let count = (span.unsigned_abs() + step_mag - 1) / step_mag;
        usize::try_from(count).unwrap_or(usize::MAX)
    }

    /// The element at `index` (already non-negative and in bounds).
    pub(crate) fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        let value = i128::from(self.start) + i128::from(self.step) * index as i128;
        i64::try_from(value).ok()
    }

    /// Membership test; integer arguments only take the O(1) path.
    pub(crate) fn contains_int(&self, value: i64) -> bool {
        let (start, stop, step, v) = (
            i128::from(self.start),
            i128::from(self.stop),
            i128::from(self.step),
            i128::from(value),
        );
        let in_span = if step > 0 {
            v >= start && v < stop
        } else {
            v <= start && v > stop
        };
        in_span && (v - start) % step == 0
    }

    /// Element-wise equality, the way CPython compares ranges: two ranges are
    /// equal when they denote the same sequence.
    pub(crate) fn py_eq(&self, other: &Self) -> bool {
        let len = self.len();
        if len != other.len() {
            return false;
        }
        if len == 0 {
            return true;
        }
        if self.start != other.start {
            return false;
        }
        len == 1 || self.step == other.step
    }
}

/// Iterator state for `for i in range(...)`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RangeIter {
    current: i64,
    stop: i64,
    step: i64,
    exhausted: bool,
}

impl RangeIter {
    pub(crate) fn new(range: &Range) -> Self {
        Self {
            current: range.start(),
            stop: range.stop(),
            step: range.step(),
            exhausted: range.len() == 0,
        }
    }

    pub(crate) fn next(&mut self) -> Option<Value> {
        if self.exhausted {
            return None;
        }
        let done = if self.step > 0 {
            self.current >= self.stop
        } else {
            self.current <= self.stop
        };
        if done {
            self.exhausted = true;
            return None;
        }
        let value = self.current;
        match self.current.checked_add(self.step) {
            Some(next) => self.current = next,
            None => self.exhausted = true,
        }
        Some(Value::Int(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_matches_python() {
        assert_eq!(Range::new(0, 3, 1).unwrap().len(), 3);
        assert_eq!(Range::new(0, 0, 1).unwrap().len(), 0);
        assert_eq!(Range::new(3, 0, -1).unwrap().len(), 3);
        assert_eq!(Range::new(0, 10, 3).unwrap().len(), 4);
        assert_eq!(Range::new(10, 0, 1).unwrap().len(), 0);
    }

    #[test]
    fn contains_uses_arithmetic() {
        let r = Range::new(0, 10, 3).unwrap();
        assert!(r.contains_int(0));
        assert!(r.contains_int(9));
        assert!(!r.contains_int(10));
        assert!(!r.contains_int(1));
        let r = Range::new(10, 0, -2).unwrap();
        assert!(r.contains_int(10));
        assert!(r.contains_int(2));
        assert!(!r.contains_int(0));
    }

    #[test]
    fn equality_is_sequence_equality() {
        let empty_a = Range::new(0, 0, 1).unwrap();
        let empty_b = Range::new(5, 5, 3).unwrap();
        assert!(empty_a.py_eq(&empty_b));
        let single_a = Range::new(0, 1, 1).unwrap();
        let single_b = Range::new(0, 1, 100).unwrap();
        assert!(single_a.py_eq(&single_b));
        assert!(!Range::new(0, 3, 1).unwrap().py_eq(&Range::new(0, 4, 1).unwrap()));
    }
}
