//! Call-argument plumbing.
//!
//! Positional and keyword arguments are collected into [`ArgValues`] before
//! dispatch to builtins, type constructors, methods or user functions.
//! Keyword names are carried as owned strings because `**mapping` unpacking
//! can introduce names that were never interned.

use crate::{
    exception::{ExcType, RunResult},
    value::Value,
};

/// Evaluated call arguments.
#[derive(Debug, Clone, Default)]
pub(crate) struct ArgValues {
    pub pos: Vec<Value>,
    pub kwargs: Vec<(String, Value)>,
}

impl ArgValues {
    pub(crate) fn positional(pos: Vec<Value>) -> Self {
        Self { pos, kwargs: Vec::new() }
    }

    pub(crate) fn empty() -> Self {
        Self::default()
    }

    /// Errors unless the call has no keyword arguments.
    pub(crate) fn no_kwargs(&self, fname: &str) -> RunResult<()> {
        if self.kwargs.is_empty() {
            Ok(())
        } else {
            Err(ExcType::type_error(format!("{fname}() takes no keyword arguments")))
        }
    }

    /// Checks the positional count against an inclusive range.
    pub(crate) fn check_arity(&self, fname: &str, min: usize, max: usize) -> RunResult<()> {
        let given = self.pos.len();
        if given < min || given > max {
            let expected = if min == max {
                match min {
                    1 => "exactly one argument".to_owned(),
                    n => format!("exactly {n} arguments"),
                }
            } else if given < min {
                format!("at least {min} argument{}", if min == 1 { "" } else { "s" })
            } else {
                format!("at most {max} argument{}", if max == 1 { "" } else { "s" })
            };
            return Err(ExcType::type_error(format!("{fname}() takes {expected} ({given} given)")));
        }
        Ok(())
    }

    /// A single required positional argument and nothing else.
    pub(crate) fn exactly_one(mut self, fname: &str) -> RunResult<Value> {
        self.no_kwargs(fname)?;
        self.check_arity(fname, 1, 1)?;
        Ok(self.pos.remove(0))
    }

    /// No arguments at all.
    pub(crate) fn exactly_none(&self, fname: &str) -> RunResult<()> {
        self.no_kwargs(fname)?;
        self.check_arity(fname, 0, 0)
    }

    /// Looks up a keyword argument by name.
    pub(crate) fn kwarg(&self, name: &str) -> Option<Value> {
        self.kwargs.iter().find(|(k, _)| k == name).map(|(_, v)| *v)
    }

    /// Errors on keyword names outside the allowed set.
    pub(crate) fn reject_unknown_kwargs(&self, fname: &str, allowed: &[&str]) -> RunResult<()> {
        for (name, _) in &self.kwargs {
            if !allowed.contains(&name.as_str()) {
                return Err(ExcType::type_error(format!(
                    "'{name}' is an invalid keyword argument for {fname}()"
                )));
            }
        }
        Ok(())
    }

    /// Positional argument by index, if present.
    pub(crate) fn pos_arg(&self, index: usize) -> Option<Value> {
        self.pos.get(index).copied()
    }

    /// Positional-or-keyword lookup, positional winning. Errors on duplicates.
    pub(crate) fn pos_or_kwarg(&self, fname: &str, index: usize, name: &str) -> RunResult<Option<Value>> {
        match (self.pos_arg(index), self.kwarg(name)) {
            (Some(_), Some(_)) => Err(ExcType::type_error(format!(
                "{fname}() got multiple values for argument '{name}'"
            ))),
            (Some(v), None) | (None, Some(v)) => Ok(Some(v)),
            (None, None) => Ok(None),
        }
    }
}
