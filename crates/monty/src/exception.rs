//! Script exception machinery: the closed exception hierarchy, raise payloads
//! and traceback accumulation.
//!
//! Exception kinds are a fixed enum ([`ExcType`]); there is no runtime class
//! creation. Inheritance is a static table ([`ExcType::bases`]) walked by
//! `isinstance` and `except` matching. A raised exception travels as a
//! [`RunError`] through the evaluator; the payload is either a cheap
//! type+message pair (internal errors raised where no heap is reachable) or a
//! heap-allocated [`ExcInstance`] carrying full args/cause/context state.
//! Stack frames are appended to the raise as it unwinds, outermost last.

use std::fmt;

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    heap::{Heap, HeapData},
    intern::StringId,
    parse::CodeRange,
    resource::{ResourceError, ResourceTracker},
    value::Value,
};

/// Result alias for anything that can raise a script exception.
pub(crate) type RunResult<T> = Result<T, RunError>;

/// The closed set of exception kinds.
///
/// The string form of each variant is its Python name (strum `Display`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum ExcType {
    BaseException,
    SystemExit,
    KeyboardInterrupt,
    Exception,

    // --- ArithmeticError hierarchy ---
    ArithmeticError,
    OverflowError,
    ZeroDivisionError,

    // --- LookupError hierarchy ---
    LookupError,
    IndexError,
    KeyError,

    // --- RuntimeError hierarchy ---
    RuntimeError,
    NotImplementedError,
    RecursionError,

    // --- Standalone kinds ---
    AttributeError,
    AssertionError,
    MemoryError,
    NameError,
    SyntaxError,
    TypeError,
    ValueError,
    StopIteration,

    // --- OSError hierarchy ---
    OSError,
    TimeoutError,
}

impl ExcType {
    /// Ordered base kinds, nearest first, ending with `BaseException`.
    #[must_use]
    pub fn bases(self) -> &'static [Self] {
        use ExcType::{ArithmeticError, BaseException, Exception, LookupError, OSError, RuntimeError};
        match self {
            Self::BaseException => &[],
            Self::SystemExit | Self::KeyboardInterrupt => &[BaseException],
            Self::Exception => &[BaseException],
            Self::ArithmeticError | Self::LookupError | Self::RuntimeError | Self::OSError => {
                &[Exception, BaseException]
            }
            Self::OverflowError | Self::ZeroDivisionError => &[ArithmeticError, Exception, BaseException],
            Self::IndexError | Self::KeyError => &[LookupError, Exception, BaseException],
            Self::NotImplementedError | Self::RecursionError => &[RuntimeError, Exception, BaseException],
            Self::TimeoutError => &[OSError, Exception, BaseException],
            Self::AttributeError
            | Self::AssertionError
            | Self::MemoryError
            | Self::NameError
            | Self::SyntaxError
            | Self::TypeError
            | Self::ValueError
            | Self::StopIteration => &[Exception, BaseException],
        }
    }

    /// True when `except handler:` catches an exception of this kind.
    #[must_use]
    pub fn is_subclass_of(self, handler: Self) -> bool {
        self == handler || self.bases().contains(&handler)
    }

    /// Coerces an arbitrary kind to the nearest kind in the supported set.
    ///
    /// The set is closed, so this is the identity; it exists as the single
    /// point the host bridge routes subtype coercion through.
    #[must_use]
    pub fn nearest_supported(self) -> Self {
        self
    }
}

/// Name of the function a traceback frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub(crate) enum FrameName {
    /// Module-level code; renders as `<module>`.
    Module,
    /// A function or lambda, by interned name.
    Function(StringId),
}

/// One traceback entry recorded while an exception unwinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub(crate) struct RawFrame {
    pub name: FrameName,
    pub position: CodeRange,
}

/// A materialized exception living on the heap.
///
/// Scripts observe these through `except ... as e`, `e.args`, `e.__cause__`
/// and `e.__context__`; the bridge converts them to and from host exceptions.
#[derive(Debug, Clone)]
pub(crate) struct ExcInstance {
    pub exc_type: ExcType,
    /// Constructor arguments, exposed as a tuple via `e.args`.
    pub args: Vec<Value>,
    /// Explicit chain from `raise ... from cause`; a `Ref` to an instance.
    pub cause: Option<Value>,
    /// Implicit chain set when raised while another exception was being handled.
    pub context: Option<Value>,
    /// Frames recorded so far, innermost first.
    pub traceback: Vec<RawFrame>,
}

impl ExcInstance {
    pub(crate) fn new(exc_type: ExcType, args: Vec<Value>) -> Self {
        Self {
            exc_type,
            args,
            cause: None,
            context: None,
            traceback: Vec::new(),
        }
    }
}

/// Payload of an in-flight raise.
#[derive(Debug, Clone)]
pub(crate) enum ExcPayload {
    /// Kind plus optional message; not yet on the heap. Internal errors from
    /// operators, methods and builtins start here.
    Simple(SimpleExc),
    /// A heap instance (`Value::Ref` to [`HeapData::Exception`]).
    Instance(Value),
}

/// Cheap type+message pair used before an exception is materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SimpleExc {
    pub exc_type: ExcType,
    pub message: Option<String>,
}

impl SimpleExc {
    pub(crate) fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self {
            exc_type,
            message: Some(message.into()),
        }
    }

    pub(crate) fn bare(exc_type: ExcType) -> Self {
        Self {
            exc_type,
            message: None,
        }
    }
}

/// An exception travelling up the evaluator.
#[derive(Debug, Clone)]
pub(crate) struct ExceptionRaise {
    pub payload: ExcPayload,
    /// Frames appended while unwinding, innermost first. For `Instance`
    /// payloads these extend the instance's stored traceback on re-raise.
    pub frames: Vec<RawFrame>,
    /// Implicit context captured at the raise point, attached on
    /// materialization unless suppressed by `raise ... from None`.
    pub context: Option<Value>,
    /// Set when the raise site already recorded a context decision
    /// (explicit cause, `from None`, or an instance with context attached).
    pub context_decided: bool,
}

impl ExceptionRaise {
    pub(crate) fn exc_type(&self, heap: &Heap<impl ResourceTracker>) -> ExcType {
        match &self.payload {
            ExcPayload::Simple(simple) => simple.exc_type,
            ExcPayload::Instance(value) => match value {
                Value::Ref(id) => match heap.get(*id) {
                    HeapData::Exception(instance) => instance.exc_type,
                    _ => ExcType::TypeError,
                },
                _ => ExcType::TypeError,
            },
        }
    }

    /// Appends a traceback frame as the raise unwinds through a call frame.
    pub(crate) fn push_frame(&mut self, name: FrameName, position: CodeRange) {
        self.frames.push(RawFrame { name, position });
    }

    /// Ensures the payload is a heap instance, transferring accumulated
    /// frames and the captured context onto it. Returns the instance value.
    pub(crate) fn materialize(&mut self, heap: &mut Heap<impl ResourceTracker>) -> RunResult<Value> {
        match &self.payload {
            ExcPayload::Instance(value) => {
                let value = *value;
                if let Value::Ref(id) = value
                    && let HeapData::Exception(instance) = heap.get_mut(id)
                {
                    instance.traceback.extend(self.frames.drain(..));
                    // `context_decided` only stops later implicit capture;
                    // a context already captured always lands on the instance
                    if instance.context.is_none()
                        && let Some(context) = self.context.take()
                    {
                        instance.context = Some(context);
                    }
                }
                Ok(value)
            }
            ExcPayload::Simple(simple) => {
                let args = match &simple.message {
                    Some(message) => {
                        let message_id = heap.allocate(HeapData::Str(message.clone()))?;
                        vec![Value::Ref(message_id)]
                    }
                    None => Vec::new(),
                };
                let mut instance = ExcInstance::new(simple.exc_type, args);
                instance.traceback = std::mem::take(&mut self.frames);
                instance.context = self.context.take();
                let id = heap.allocate(HeapData::Exception(instance))?;
                let value = Value::Ref(id);
                self.payload = ExcPayload::Instance(value);
                Ok(value)
            }
        }
    }
}

/// Control-flow error type of the evaluator: an in-flight exception.
///
/// Resource errors convert into ordinary script exceptions immediately
/// (`MemoryError`, `RecursionError`, `KeyboardInterrupt`) so the script's
/// `try/except` has first refusal, per the propagation policy.
#[derive(Debug, Clone)]
pub(crate) enum RunError {
    Exc(Box<ExceptionRaise>),
}

impl RunError {
    pub(crate) fn into_raise(self) -> Box<ExceptionRaise> {
        match self {
            Self::Exc(raise) => raise,
        }
    }

    pub(crate) fn as_raise_mut(&mut self) -> &mut ExceptionRaise {
        match self {
            Self::Exc(raise) => raise,
        }
    }
}

impl From<SimpleExc> for RunError {
    fn from(simple: SimpleExc) -> Self {
        Self::Exc(Box::new(ExceptionRaise {
            payload: ExcPayload::Simple(simple),
            frames: Vec::new(),
            context: None,
            context_decided: false,
        }))
    }
}

impl From<ResourceError> for RunError {
    fn from(err: ResourceError) -> Self {
        match err.exc_message() {
            Some(message) => SimpleExc::new(err.exc_type(), message).into(),
            None => SimpleExc::bare(err.exc_type()).into(),
        }
    }
}

/// Host-side failures from capability callbacks (a failing print writer)
/// re-enter the evaluator as ordinary script exceptions.
impl From<crate::exception_public::Exception> for RunError {
    fn from(exc: crate::exception_public::Exception) -> Self {
        match exc.message() {
            Some(message) => SimpleExc::new(exc.exc_type(), message).into(),
            None => SimpleExc::bare(exc.exc_type()).into(),
        }
    }
}

impl ExcType {
    /// Raises this kind with a message.
    pub(crate) fn msg(self, message: impl Into<String>) -> RunError {
        SimpleExc::new(self, message).into()
    }

    /// Raises this kind without arguments.
    pub(crate) fn bare(self) -> RunError {
        SimpleExc::bare(self).into()
    }

    pub(crate) fn type_error(message: impl Into<String>) -> RunError {
        Self::TypeError.msg(message)
    }

    pub(crate) fn value_error(message: impl Into<String>) -> RunError {
        Self::ValueError.msg(message)
    }

    pub(crate) fn overflow_error(message: impl Into<String>) -> RunError {
        Self::OverflowError.msg(message)
    }

    pub(crate) fn zero_division(message: impl Into<String>) -> RunError {
        Self::ZeroDivisionError.msg(message)
    }

    pub(crate) fn name_error(name: &str) -> RunError {
        Self::NameError.msg(format!("name '{name}' is not defined"))
    }

    pub(crate) fn unbound_local(name: &str) -> RunError {
        Self::NameError.msg(format!(
            "cannot access local variable '{name}' where it is not associated with a value"
        ))
    }

    pub(crate) fn attribute_error(type_name: impl fmt::Display, attr: &str) -> RunError {
        Self::AttributeError.msg(format!("'{type_name}' object has no attribute '{attr}'"))
    }

    pub(crate) fn not_iterable(type_name: impl fmt::Display) -> RunError {
        Self::type_error(format!("'{type_name}' object is not iterable"))
    }

    pub(crate) fn not_callable(type_name: impl fmt::Display) -> RunError {
        Self::type_error(format!("'{type_name}' object is not callable"))
    }

    pub(crate) fn not_subscriptable(type_name: impl fmt::Display) -> RunError {
        Self::type_error(format!("'{type_name}' object is not subscriptable"))
    }

    pub(crate) fn unhashable(type_name: impl fmt::Display) -> RunError {
        Self::type_error(format!("unhashable type: '{type_name}'"))
    }

    /// `KeyError` with a string key (used by `str.format` and kwargs lookup).
    pub(crate) fn key_error_str(heap: &mut Heap<impl ResourceTracker>, key: &str) -> RunError {
        match heap.alloc_str(key.to_owned()) {
            Ok(value) => Self::key_error(heap, value),
            Err(resource) => resource.into(),
        }
    }

    /// `KeyError` carrying the missing key itself as its single argument.
    pub(crate) fn key_error(heap: &mut Heap<impl ResourceTracker>, key: Value) -> RunError {
        match heap.allocate(HeapData::Exception(ExcInstance::new(Self::KeyError, vec![key]))) {
            Ok(id) => RunError::Exc(Box::new(ExceptionRaise {
                payload: ExcPayload::Instance(Value::Ref(id)),
                frames: Vec::new(),
                context: None,
                context_decided: false,
            })),
            Err(resource) => resource.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_matches_spec() {
        assert!(ExcType::ZeroDivisionError.is_subclass_of(ExcType::ArithmeticError));
        assert!(ExcType::ZeroDivisionError.is_subclass_of(ExcType::Exception));
        assert!(ExcType::ZeroDivisionError.is_subclass_of(ExcType::BaseException));
        assert!(ExcType::KeyError.is_subclass_of(ExcType::LookupError));
        assert!(ExcType::IndexError.is_subclass_of(ExcType::LookupError));
        assert!(ExcType::RecursionError.is_subclass_of(ExcType::RuntimeError));
        assert!(ExcType::TimeoutError.is_subclass_of(ExcType::OSError));
        assert!(!ExcType::KeyboardInterrupt.is_subclass_of(ExcType::Exception));
        assert!(ExcType::KeyboardInterrupt.is_subclass_of(ExcType::BaseException));
        assert!(!ExcType::ValueError.is_subclass_of(ExcType::TypeError));
        assert!(ExcType::StopIteration.is_subclass_of(ExcType::Exception));
    }

    #[test]
    fn names_round_trip_through_strum() {
        assert_eq!(ExcType::ValueError.to_string(), "ValueError");
        assert_eq!("ZeroDivisionError".parse::<ExcType>().unwrap(), ExcType::ZeroDivisionError);
    }
}
