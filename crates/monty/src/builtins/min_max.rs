//! `min` and `max`.
//!
//! The `key=` form is composed in the evaluator (the key function re-enters
//! script code); it feeds the computed `(key, value)` pairs back through
//! [`min_max_pick`] so both forms share the selection rule: the first
//! occurrence wins among equals.

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    heap::Heap,
    intern::Interns,
    ops::values_cmp,
    resource::ResourceTracker,
    types::iter::iterate_to_vec,
    value::Value,
};

pub(super) fn call_min_max(
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
    is_max: bool,
) -> RunResult<Value> {
    let fname = if is_max { "max" } else { "min" };
    args.reject_unknown_kwargs(fname, &["key", "default"])?;
    if let Some(key) = args.kwarg("key")
        && !matches!(key, Value::None)
    {
        // the evaluator routes key= calls before builtin dispatch
        return Err(ExcType::type_error(format!("{fname}() key function must be callable")));
    }
    let default = args.kwarg("default");
    let candidates = collect_candidates(&args, fname, default.is_some(), heap, interns)?;
    match min_max_pick(candidates.into_iter().map(|v| (v, v)).collect(), is_max, heap, interns)? {
        Some(value) => Ok(value),
        None => default.ok_or_else(|| ExcType::value_error(format!("{fname}() arg is an empty sequence"))),
    }
}

/// Gathers the values compared: either one iterable or two-plus positionals.
pub(crate) fn collect_candidates(
    args: &ArgValues,
    fname: &str,
    has_default: bool,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Vec<Value>> {
    match args.pos.len() {
        0 => Err(ExcType::type_error(format!(
            "{fname} expected at least 1 argument, got 0"
        ))),
        1 => iterate_to_vec(args.pos[0], heap, interns),
        _ => {
            if has_default {
                return Err(ExcType::type_error(format!(
                    "Cannot specify a default for {fname}() with multiple positional arguments"
                )));
            }
            Ok(args.pos.clone())
        }
    }
}

/// Selects by comparing keys with `<`/`>`; `None` for an empty input.
pub(crate) fn min_max_pick(
    pairs: Vec<(Value, Value)>,
    is_max: bool,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let mut iter = pairs.into_iter();
    let Some((mut best_key, mut best_value)) = iter.next() else {
        return Ok(None);
    };
    for (key, value) in iter {
        let ordering = values_cmp(&key, &best_key, heap, interns)?.ok_or_else(|| {
            ExcType::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                key.py_type(heap),
                best_key.py_type(heap)
            ))
        })?;
        let better = if is_max {
            ordering == std::cmp::Ordering::Greater
        } else {
            ordering == std::cmp::Ordering::Less
        };
        if better {
            best_key = key;
            best_value = value;
        }
    }
    Ok(Some(best_value))
}

