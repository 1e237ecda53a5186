//! The host-facing exception type.
//!
//! Whatever goes wrong — compile error, uncaught script exception, bridge
//! conversion failure, resource exhaustion — surfaces to the embedder as one
//! [`Exception`] carrying the kind, message, resolved traceback frames and
//! any explicit/implicit chain. `Display` renders the CPython traceback
//! layout.

use std::fmt;

use crate::exception::ExcType;

/// One resolved traceback frame.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StackFrame {
    /// `<module>` for module-level code, otherwise the function name.
    pub function_name: String,
    /// 1-based source line number.
    pub line_number: u32,
    /// The source line text, trimmed, empty when unavailable.
    pub source_line: String,
}

/// An error surfaced to the host.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Exception {
    exc_type: ExcType,
    message: Option<String>,
    script_name: String,
    /// Outermost call first, matching traceback display order.
    frames: Vec<StackFrame>,
    /// `raise ... from cause`.
    cause: Option<Box<Exception>>,
    /// Implicit chain (`During handling of the above exception, ...`).
    context: Option<Box<Exception>>,
}

impl Exception {
    #[must_use]
    pub(crate) fn new(exc_type: ExcType, message: Option<String>, script_name: String, frames: Vec<StackFrame>) -> Self {
        Self {
            exc_type,
            message,
            script_name,
            frames,
            cause: None,
            context: None,
        }
    }

    pub(crate) fn with_cause(mut self, cause: Exception) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub(crate) fn with_context(mut self, context: Exception) -> Self {
        self.context = Some(Box::new(context));
        self
    }

    /// The exception kind.
    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    /// The message, typically `str(args[0])`.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Traceback frames, outermost call first.
    #[must_use]
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Explicitly chained cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&Exception> {
        self.cause.as_deref()
    }

    /// Implicitly chained context, if any.
    #[must_use]
    pub fn context(&self) -> Option<&Exception> {
        self.context.as_deref()
    }

    /// `"ValueError: message"` or just `"ValueError"`.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.message {
            Some(message) if !message.is_empty() => format!("{}: {message}", self.exc_type),
            _ => self.exc_type.to_string(),
        }
    }

    fn fmt_single(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.frames.is_empty() {
            writeln!(f, "Traceback (most recent call last):")?;
            for frame in &self.frames {
                writeln!(
                    f,
                    "  File \"{}\", line {}, in {}",
                    self.script_name, frame.line_number, frame.function_name
                )?;
                if !frame.source_line.is_empty() {
                    writeln!(f, "    {}", frame.source_line)?;
                }
            }
        }
        write!(f, "{}", self.summary())
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(cause) = &self.cause {
            cause.fmt(f)?;
            writeln!(f)?;
            writeln!(f)?;
            writeln!(f, "The above exception was the direct cause of the following exception:")?;
            writeln!(f)?;
        } else if let Some(context) = &self.context {
            context.fmt(f)?;
            writeln!(f)?;
            writeln!(f)?;
            writeln!(f, "During handling of the above exception, another exception occurred:")?;
            writeln!(f)?;
        }
        self.fmt_single(f)
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_cpython_traceback_shape() {
        let exc = Exception::new(
            ExcType::ZeroDivisionError,
            Some("division by zero".to_owned()),
            "<monty>".to_owned(),
            vec![
                StackFrame {
                    function_name: "<module>".to_owned(),
                    line_number: 3,
                    source_line: "f()".to_owned(),
                },
                StackFrame {
                    function_name: "f".to_owned(),
                    line_number: 2,
                    source_line: "return 1 / 0".to_owned(),
                },
            ],
        );
        let rendered = exc.to_string();
        assert_eq!(
            rendered,
            "Traceback (most recent call last):\n  File \"<monty>\", line 3, in <module>\n    f()\n  File \"<monty>\", line 2, in f\n    return 1 / 0\nZeroDivisionError: division by zero"
        );
    }

    #[test]
    fn summary_without_message() {
        let exc = Exception::new(ExcType::KeyboardInterrupt, None, "<monty>".to_owned(), vec![]);
        assert_eq!(exc.to_string(), "KeyboardInterrupt");
    }
}
