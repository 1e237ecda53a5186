//! Output plumbing for the `print()` builtin.
//!
//! Sandboxed code never touches process stdout directly; `print` writes
//! through a [`PrintWriter`] the host passes into `run`. The provided
//! implementations cover the common cases: real stdout, capture-to-string
//! for tests, and discard.

use std::io::{self, Write as _};

use crate::exception_public::Exception;

/// Receives `print()` output, one fragment at a time.
///
/// Fragments arrive pre-formatted: argument texts, separators and the final
/// `end` string each come through a separate call, in order.
pub trait PrintWriter {
    fn stdout_write(&mut self, text: &str) -> Result<(), Exception>;
}

/// Writes to the process stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn stdout_write(&mut self, text: &str) -> Result<(), Exception> {
        let _ = io::stdout().write_all(text.as_bytes());
        Ok(())
    }
}

/// Collects all output into a string; useful for tests and captures.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The output collected so far.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.0
    }

    /// Consumes the writer, returning the collected output.
    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn stdout_write(&mut self, text: &str) -> Result<(), Exception> {
        self.0.push_str(text);
        Ok(())
    }
}

/// Discards all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _text: &str) -> Result<(), Exception> {
        Ok(())
    }
}
