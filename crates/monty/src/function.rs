//! Runtime function objects.
//!
//! Defining a `def` or `lambda` evaluates its default expressions and
//! captures the cells it closes over, producing a heap [`Closure`] that pairs
//! those with the prepared body. Reading a method attribute without calling
//! it produces a [`BoundMethod`] with the receiver captured; the call goes
//! back through the same method dispatch as a direct `obj.method(...)` call.

use crate::{
    heap::HeapId,
    intern::{FunctionId, StringId},
    value::Value,
};

/// A defined function: prepared body plus per-definition runtime state.
#[derive(Debug, Clone)]
pub(crate) struct Closure {
    pub function_id: FunctionId,
    /// Default values for trailing positional-or-keyword parameters,
    /// evaluated once at definition time.
    pub defaults: Vec<Value>,
    /// Defaults for keyword-only parameters, by name.
    pub kw_defaults: Vec<(StringId, Value)>,
    /// Cells captured from the defining frame, in the order the prepared
    /// function lists its free variables.
    pub captured: Vec<HeapId>,
}

impl Closure {
    pub(crate) fn estimate_size(&self) -> usize {
        (self.defaults.len() + self.kw_defaults.len()) * std::mem::size_of::<Value>()
            + self.captured.len() * std::mem::size_of::<HeapId>()
            + 48
    }
}

/// A method with its receiver captured (`m = lst.append`).
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundMethod {
    pub receiver: Value,
    /// The method name; always interned because it comes from source text.
    pub method: StringId,
}
