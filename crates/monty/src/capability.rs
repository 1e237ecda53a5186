//! Host capabilities.
//!
//! The evaluator has no ambient access to the clock, filesystem, network or
//! environment. Operations that need the outside world go through an
//! [`OsAccess`] value of host-registered callbacks; an absent callback makes
//! the corresponding operation raise `OSError` naming the capability, so
//! scripts degrade predictably rather than silently reading real state.

use std::fmt;

use crate::{
    exception::{ExcType, RunError},
    types::datetime::LocalClock,
};

type ClockFn = Box<dyn Fn() -> LocalClock + Send>;
type WriteFn = Box<dyn FnMut(&[u8]) + Send>;

/// Optional host callbacks granted to one `run` call.
#[derive(Default)]
pub struct OsAccess {
    clock_local: Option<ClockFn>,
    stderr_write: Option<WriteFn>,
}

impl OsAccess {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the wall-clock callback used by `date.today()` and
    /// `datetime.now()`.
    #[must_use]
    pub fn with_clock_local(mut self, clock: impl Fn() -> LocalClock + Send + 'static) -> Self {
        self.clock_local = Some(Box::new(clock));
        self
    }

    /// Registers a stderr sink (reserved for diagnostics; nothing in the
    /// value model writes to it today).
    #[must_use]
    pub fn with_stderr_write(mut self, write: impl FnMut(&[u8]) + Send + 'static) -> Self {
        self.stderr_write = Some(Box::new(write));
        self
    }

    /// A fixed clock, handy for tests and reproducible runs.
    #[must_use]
    pub fn fixed_clock(clock: LocalClock) -> Self {
        Self::new().with_clock_local(move || clock)
    }

    pub(crate) fn clock_local(&self) -> Result<LocalClock, RunError> {
        match &self.clock_local {
            Some(clock) => Ok(clock()),
            None => Err(missing_capability("clock_local")),
        }
    }
}

/// The error raised when an operation needs a capability the host withheld.
pub(crate) fn missing_capability(name: &str) -> RunError {
    ExcType::OSError.msg(format!("os access capability '{name}' is not available"))
}

impl fmt::Debug for OsAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsAccess")
            .field("clock_local", &self.clock_local.is_some())
            .field("stderr_write", &self.stderr_write.is_some())
            .finish()
    }
}
