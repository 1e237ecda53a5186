//! `sorted`, the key-less form.
//!
//! `sorted(..., key=f)` is composed in the evaluator; it computes the keys by
//! calling `f` once per element and hands the pairs to the same stable merge
//! in `ops::sort_pairs` that this module uses.

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    heap::Heap,
    intern::Interns,
    ops::sort_pairs,
    resource::ResourceTracker,
    types::iter::iterate_to_vec,
    value::Value,
};

pub(super) fn call_sorted(
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.reject_unknown_kwargs("sorted", &["key", "reverse"])?;
    args.check_arity("sorted", 1, 1)?;
    if let Some(key) = args.kwarg("key")
        && !matches!(key, Value::None)
    {
        return Err(ExcType::type_error("sorted() key function must be callable"));
    }
    let reverse = args
        .kwarg("reverse")
        .map(|v| v.py_bool(heap, interns))
        .unwrap_or(false);
    let iterable = args.pos_arg(0).expect("arity checked");
    let values = iterate_to_vec(iterable, heap, interns)?;
    let sorted = sorted_values(values, reverse, heap, interns)?;
    Ok(heap.alloc_list(sorted)?)
}

/// Stable sort comparing the values themselves (`key=None`).
pub(crate) fn sorted_values(
    values: Vec<Value>,
    reverse: bool,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Vec<Value>> {
    let pairs = values.into_iter().map(|v| (v, v)).collect();
    let sorted = sort_pairs(pairs, heap, interns, reverse)?;
    Ok(sorted.into_iter().map(|(_, v)| v).collect())
}
