//! Slice objects and index resolution.

use crate::{
    exception::{ExcType, RunResult},
    heap::Heap,
    intern::Interns,
    resource::ResourceTracker,
    value::Value,
};

/// A `slice(start, stop, step)` descriptor. Components keep whatever values
/// they were constructed with; validation happens when the slice is applied.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Slice {
    pub start: Value,
    pub stop: Value,
    pub step: Value,
}

/// Resolved, clamped slice indices for a sequence of length `len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResolvedSlice {
    pub start: usize,
    pub stop: usize,
    pub step: i64,
    pub len: usize,
}

impl Slice {
    /// Resolves against a sequence length using CPython's clamping rules:
    /// out-of-range bounds clamp silently, negative indices count from the
    /// end, `step == 0` raises `ValueError`.
    pub(crate) fn resolve(
        &self,
        len: usize,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<ResolvedSlice> {
        let step = match self.step {
            Value::None => 1,
            v => slice_component(&v, heap, interns)?,
        };
        if step == 0 {
            return Err(ExcType::value_error("slice step cannot be zero"));
        }

        let len_i = len as i64;
        // -1 encodes "before the first element" in the negative-step system
        let (default_start, default_stop) = if step > 0 { (0, len_i) } else { (len_i - 1, -1) };

        let clamp = |raw: i64| -> i64 {
            let adjusted = if raw < 0 { raw + len_i } else { raw };
            if step > 0 {
                adjusted.clamp(0, len_i)
            } else {
                // -1 encodes "before the first element" for negative steps
                adjusted.clamp(-1, len_i - 1)
            }
        };

        let start = match self.start {
            Value::None => default_start,
            v => clamp(slice_component(&v, heap, interns)?),
        };
        let stop = match self.stop {
            Value::None => default_stop,
            v => clamp(slice_component(&v, heap, interns)?),
        };

        let count = if step > 0 {
            if stop > start { ((stop - start - 1) / step + 1) as usize } else { 0 }
        } else if start > stop {
            ((start - stop - 1) / (-step) + 1) as usize
        } else {
            0
        };

        Ok(ResolvedSlice {
            start: start.max(0) as usize,
            stop: stop.max(0) as usize,
            step,
            len: count,
        })
    }
}

impl ResolvedSlice {
    /// Indices selected by the slice, in order.
    pub(crate) fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        let (start, step, len) = (self.start as i64, self.step, self.len);
        (0..len as i64).map(move |i| (start + i * step) as usize)
    }
}

fn slice_component(value: &Value, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> RunResult<i64> {
    value
        .as_int(heap, interns)
        .and_then(|int| match int {
            crate::value::IntRef::Small(i) => Some(i),
            // clamp astronomically large bounds to the representable range
            crate::value::IntRef::Big(b) => Some(if b.sign() == num_bigint::Sign::Minus {
                i64::MIN
            } else {
                i64::MAX
            }),
        })
        .ok_or_else(|| {
            ExcType::type_error(format!(
                "slice indices must be integers or None or have an __index__ method, got {}",
                value.py_type(heap)
            ))
        })
}

/// Resolves a single (possibly negative) index against a sequence length.
///
/// Returns `None` when out of range; the caller raises the type-appropriate
/// `IndexError`.
pub(crate) fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len_i = len as i64;
    let adjusted = if index < 0 { index + len_i } else { index };
    (0..len_i).contains(&adjusted).then_some(adjusted as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::NoLimitTracker;

    #[test]
    fn negative_index_wraps_once() {
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(-3, 3), Some(0));
        assert_eq!(resolve_index(-4, 3), None);
        assert_eq!(resolve_index(2, 3), Some(2));
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(0, 0), None);
    }

    fn resolve(start: Value, stop: Value, step: Value, len: usize) -> Vec<usize> {
        let heap = Heap::new(NoLimitTracker, 0);
        let interns = Interns::default();
        let slice = Slice { start, stop, step };
        slice.resolve(len, &heap, &interns).unwrap().indices().collect()
    }

    #[test]
    fn full_reverse_covers_every_index() {
        let picked = resolve(Value::None, Value::None, Value::Int(-1), 5);
        assert_eq!(picked, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn out_of_range_bounds_clamp_silently() {
        assert_eq!(resolve(Value::Int(1), Value::Int(100), Value::None, 4), vec![1, 2, 3]);
        assert_eq!(resolve(Value::Int(100), Value::None, Value::None, 4), Vec::<usize>::new());
        assert_eq!(resolve(Value::Int(-100), Value::Int(2), Value::None, 4), vec![0, 1]);
    }

    #[test]
    fn stepped_slices() {
        assert_eq!(resolve(Value::None, Value::None, Value::Int(2), 5), vec![0, 2, 4]);
        assert_eq!(resolve(Value::Int(4), Value::Int(0), Value::Int(-2), 5), vec![4, 2]);
    }
}
