//! `isinstance`, honoring the static exception hierarchy.

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    heap::{Heap, HeapData},
    intern::Interns,
    resource::ResourceTracker,
    types::Type,
    value::Value,
};

use super::Builtins;

pub(super) fn call_isinstance(
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    args.no_kwargs("isinstance")?;
    args.check_arity("isinstance", 2, 2)?;
    let value = args.pos_arg(0).expect("arity checked");
    let classinfo = args.pos_arg(1).expect("arity checked");
    Ok(Value::Bool(isinstance_check(&value, &classinfo, heap, interns)?))
}

/// `isinstance(value, classinfo)` where classinfo is a type object or a
/// (possibly nested) tuple of type objects.
pub(crate) fn isinstance_check(
    value: &Value,
    classinfo: &Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<bool> {
    match classinfo {
        Value::Builtin(Builtins::Type(t)) => Ok(matches_type(value, *t, heap)),
        Value::Builtin(Builtins::Exc(handler)) => Ok(match value.py_type(heap) {
            Type::Exception(kind) => kind.is_subclass_of(*handler),
            _ => false,
        }),
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Tuple(t) => {
                let items = t.as_slice().to_vec();
                for item in items {
                    if isinstance_check(value, &item, heap, interns)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Err(ExcType::type_error(
                "isinstance() arg 2 must be a type or tuple of types",
            )),
        },
        _ => Err(ExcType::type_error(
            "isinstance() arg 2 must be a type or tuple of types",
        )),
    }
}

fn matches_type(value: &Value, t: Type, heap: &Heap<impl ResourceTracker>) -> bool {
    let actual = value.py_type(heap);
    if actual == t {
        return true;
    }
    match (actual, t) {
        // bool is a subtype of int
        (Type::Bool, Type::Int) => true,
        // every exception instance is an instance of its base kinds; every
        // type object is an instance of `type`
        (Type::Exception(_), _) => false,
        _ => false,
    }
}
