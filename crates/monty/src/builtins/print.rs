//! `print`, writing through the host-supplied writer.

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    heap::Heap,
    intern::Interns,
    io::PrintWriter,
    repr::str_value,
    resource::ResourceTracker,
    value::{Value, value_as_str},
};

pub(crate) fn call_print(
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
    print: &mut dyn PrintWriter,
) -> RunResult<Value> {
    args.reject_unknown_kwargs("print", &["sep", "end", "file", "flush"])?;
    let sep = text_kwarg(&args, "sep", " ", heap, interns)?;
    let end = text_kwarg(&args, "end", "\n", heap, interns)?;
    // `file` and `flush` are accepted for signature parity; output always
    // goes to the writer the host supplied for this run

    for (i, value) in args.pos.iter().enumerate() {
        if i > 0 {
            print.stdout_write(&sep)?;
        }
        let text = str_value(value, heap, interns)?;
        print.stdout_write(&text)?;
    }
    print.stdout_write(&end)?;
    Ok(Value::None)
}

fn text_kwarg(
    args: &ArgValues,
    name: &str,
    default: &str,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<String> {
    match args.kwarg(name) {
        None | Some(Value::None) => Ok(default.to_owned()),
        Some(v) => value_as_str(&v, heap, interns).map(str::to_owned).ok_or_else(|| {
            ExcType::type_error(format!(
                "{name} must be None or a string, not {}",
                v.py_type(heap)
            ))
        }),
    }
}
