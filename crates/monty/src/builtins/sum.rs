//! `sum`, folding with the `+` operator.

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    expressions::Operator,
    heap::Heap,
    intern::Interns,
    ops::binary_op,
    resource::ResourceTracker,
    types::iter::iterate_to_vec,
    value::{Value, value_as_str},
};

pub(super) fn call_sum(
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.reject_unknown_kwargs("sum", &["start"])?;
    args.check_arity("sum", 1, 2)?;
    let iterable = args.pos_arg(0).expect("arity checked");
    let start = args.pos_or_kwarg("sum", 1, "start")?.unwrap_or(Value::Int(0));
    if value_as_str(&start, heap, interns).is_some() {
        return Err(ExcType::type_error("sum() can't sum strings [use ''.join(seq) instead]"));
    }

    let items = iterate_to_vec(iterable, heap, interns)?;
    let mut total = start;
    for item in items {
        total = binary_op(&Operator::Add, total, item, heap, interns)?;
    }
    Ok(total)
}
