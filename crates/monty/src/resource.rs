//! Resource limits for sandboxed evaluation.
//!
//! Two limits are enforced inside the evaluator: arena memory (exhaustion
//! raises `MemoryError`) and call-stack depth (overflow raises
//! `RecursionError`). Wall-clock limits are the host's responsibility: the
//! host holds a [`CancelToken`] and the evaluator checks it at every loop
//! back-edge and function call, raising `KeyboardInterrupt` when it trips.
//! All three surface as ordinary script exceptions, so `try/except/finally`
//! unwinds cleanly before the error reaches the host.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::exception::ExcType;

/// Default maximum Python call-stack depth.
///
/// The evaluator walks the tree with bounded Rust recursion, so this also
/// bounds host stack usage. 200 matches the limit the parser applies to
/// nested expressions.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 200;

/// Threshold in bytes above which `check_large_result` applies.
///
/// Operations whose result size can be predicted (`2 ** huge`, `'x' * huge`,
/// large left shifts) call `check_large_result` with an estimate before
/// allocating, so a limit rejects them before the memory is committed.
pub const LARGE_RESULT_THRESHOLD: usize = 100_000;

/// Error raised when a resource limit is exceeded or the run is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResourceError {
    /// Arena memory limit exceeded.
    Memory { limit: usize, used: usize },
    /// Maximum call-stack depth exceeded.
    Recursion { limit: usize },
    /// The host signalled cancellation through a [`CancelToken`].
    Cancelled,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory { limit, used } => {
                write!(f, "memory limit exceeded: {used} bytes > {limit} bytes")
            }
            Self::Recursion { .. } => write!(f, "maximum recursion depth exceeded"),
            Self::Cancelled => write!(f, "evaluation cancelled by host"),
        }
    }
}

impl std::error::Error for ResourceError {}

impl ResourceError {
    /// The script exception kind this resource error surfaces as.
    #[must_use]
    pub(crate) fn exc_type(&self) -> ExcType {
        match self {
            Self::Memory { .. } => ExcType::MemoryError,
            Self::Recursion { .. } => ExcType::RecursionError,
            Self::Cancelled => ExcType::KeyboardInterrupt,
        }
    }

    /// The exception message, if any (`KeyboardInterrupt` carries none).
    #[must_use]
    pub(crate) fn exc_message(&self) -> Option<String> {
        match self {
            Self::Memory { .. } => Some(self.to_string()),
            Self::Recursion { .. } => Some("maximum recursion depth exceeded".to_owned()),
            Self::Cancelled => None,
        }
    }
}

/// Cancellation token shared between the host and a running evaluation.
///
/// Cloning is cheap; the host keeps one clone and passes the other in via
/// [`LimitedTracker`]. Setting it is sticky for the remainder of the run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; the evaluator raises `KeyboardInterrupt` at the
    /// next back-edge or call.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Tracks resource usage during one evaluation.
///
/// The heap consults the tracker on every allocation and container growth;
/// the evaluator consults it on every frame push and loop back-edge.
pub trait ResourceTracker: fmt::Debug {
    /// Called before each arena allocation with a size estimate.
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError>;

    /// Called before growing an existing container by one element.
    ///
    /// Routes through `on_allocate` by default; exists so in-place growth
    /// (`list.append` in a loop) still counts against the memory budget.
    fn on_container_insert(&mut self) -> Result<(), ResourceError> {
        self.on_allocate(|| std::mem::size_of::<crate::value::Value>())
    }

    /// Called before pushing a call frame. `depth` is the current stack depth.
    fn check_recursion_depth(&self, depth: usize) -> Result<(), ResourceError>;

    /// Called at loop back-edges and function calls; reports cancellation.
    fn check_interrupt(&self) -> Result<(), ResourceError>;

    /// Called before operations with a predictable result size over
    /// [`LARGE_RESULT_THRESHOLD`] bytes.
    fn check_large_result(&self, estimated_bytes: usize) -> Result<(), ResourceError>;

    /// Current approximate arena memory usage, if tracked.
    fn current_memory_bytes(&self) -> Option<usize> {
        None
    }
}

/// Tracker that enforces nothing beyond the default recursion limit.
///
/// The recursion limit is kept even here: unbounded Python recursion would
/// otherwise overflow the host stack rather than raise `RecursionError`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    fn on_allocate(&mut self, _get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        Ok(())
    }

    fn check_recursion_depth(&self, depth: usize) -> Result<(), ResourceError> {
        if depth >= DEFAULT_MAX_RECURSION_DEPTH {
            Err(ResourceError::Recursion {
                limit: DEFAULT_MAX_RECURSION_DEPTH,
            })
        } else {
            Ok(())
        }
    }

    fn check_interrupt(&self) -> Result<(), ResourceError> {
        Ok(())
    }

    fn check_large_result(&self, _estimated_bytes: usize) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// Tracker enforcing configurable memory and recursion limits plus host
/// cancellation.
#[derive(Debug, Clone, Default)]
pub struct LimitedTracker {
    max_memory: Option<usize>,
    max_recursion_depth: Option<usize>,
    cancel: Option<CancelToken>,
    used_memory: usize,
}

impl LimitedTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the arena memory limit in (approximate) bytes.
    #[must_use]
    pub fn with_max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = Some(bytes);
        self
    }

    /// Sets the maximum Python call-stack depth.
    #[must_use]
    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = Some(depth);
        self
    }

    /// Attaches a cancellation token checked at back-edges and calls.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        let Some(limit) = self.max_memory else {
            return Ok(());
        };
        let used = self.used_memory.saturating_add(get_size());
        if used > limit {
            return Err(ResourceError::Memory { limit, used });
        }
        self.used_memory = used;
        Ok(())
    }

    fn check_recursion_depth(&self, depth: usize) -> Result<(), ResourceError> {
        let limit = self.max_recursion_depth.unwrap_or(DEFAULT_MAX_RECURSION_DEPTH);
        if depth >= limit {
            Err(ResourceError::Recursion { limit })
        } else {
            Ok(())
        }
    }

    fn check_interrupt(&self) -> Result<(), ResourceError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(ResourceError::Cancelled),
            _ => Ok(()),
        }
    }

    fn check_large_result(&self, estimated_bytes: usize) -> Result<(), ResourceError> {
        let Some(limit) = self.max_memory else {
            return Ok(());
        };
        let used = self.used_memory.saturating_add(estimated_bytes);
        if used > limit {
            return Err(ResourceError::Memory { limit, used });
        }
        Ok(())
    }

    fn current_memory_bytes(&self) -> Option<usize> {
        Some(self.used_memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limited_tracker_enforces_memory() {
        let mut tracker = LimitedTracker::new().with_max_memory(100);
        assert!(tracker.on_allocate(|| 60).is_ok());
        assert!(tracker.on_allocate(|| 60).is_err());
        assert_eq!(tracker.current_memory_bytes(), Some(60));
    }

    #[test]
    fn cancel_token_trips_interrupt() {
        let token = CancelToken::new();
        let tracker = LimitedTracker::new().with_cancel_token(token.clone());
        assert!(tracker.check_interrupt().is_ok());
        token.cancel();
        assert_eq!(tracker.check_interrupt(), Err(ResourceError::Cancelled));
    }

    #[test]
    fn recursion_limits() {
        let tracker = LimitedTracker::new().with_max_recursion_depth(10);
        assert!(tracker.check_recursion_depth(9).is_ok());
        assert!(tracker.check_recursion_depth(10).is_err());
        assert!(NoLimitTracker.check_recursion_depth(DEFAULT_MAX_RECURSION_DEPTH).is_err());
    }
}
