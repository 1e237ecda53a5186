//! The `datetime` module surface: attribute resolution for `datetime.date`,
//! `datetime.MINYEAR` and friends.

use crate::{
    builtins::Builtins,
    exception::{ExcType, RunResult},
    types::{Type, datetime},
    value::Value,
};

/// Resolves `datetime.<attr>`.
pub(crate) fn module_attr(attr: &str) -> RunResult<Value> {
    let value = match attr {
        "date" => Value::Builtin(Builtins::Type(Type::Date)),
        "time" => Value::Builtin(Builtins::Type(Type::Time)),
        "datetime" => Value::Builtin(Builtins::Type(Type::DateTime)),
        "timedelta" => Value::Builtin(Builtins::Type(Type::Timedelta)),
        "timezone" => Value::Builtin(Builtins::Type(Type::Timezone)),
        "MINYEAR" => Value::Int(i64::from(datetime::MINYEAR)),
        "MAXYEAR" => Value::Int(i64::from(datetime::MAXYEAR)),
        _ => {
            return Err(ExcType::AttributeError.msg(format!(
                "module 'datetime' has no attribute '{attr}'"
            )));
        }
    };
    Ok(value)
}

/// Names importable with `from datetime import ...`.
pub(crate) fn importable(name: &str) -> Option<Value> {
    module_attr(name).ok()
}
