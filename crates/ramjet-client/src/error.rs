//! Script-visible errors.

use std::fmt;

use thiserror::Error;

use crate::stack::{StackFrame, StackTrace};

/// Kind of a script-visible error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Generic `Error`.
    Error,
    /// `TypeError`: wrong kind of value (e.g. calling a non-function).
    Type,
    /// `SecurityError` raised by the host.
    Security,
}

impl ErrorKind {
    /// Returns the error's script-visible name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Type => "TypeError",
            Self::Security => "SecurityError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised inside the host object model, as page code would see it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct HostError {
    /// Error kind.
    pub kind: ErrorKind,
    /// Error message.
    pub message: String,
    /// Frames the error was raised through, innermost first.
    pub trace: StackTrace,
}

impl HostError {
    /// Creates an error of the given kind with an empty trace.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: StackTrace::new(),
        }
    }

    /// Creates a generic `Error`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Error, message)
    }

    /// Creates a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    /// Records an outer frame.
    pub fn with_frame(mut self, frame: StackFrame) -> Self {
        self.trace.push(frame);
        self
    }

    /// Replaces the trace.
    pub fn with_trace(mut self, trace: StackTrace) -> Self {
        self.trace = trace;
        self
    }
}

/// Result type for host operations.
pub type HostResult<T> = std::result::Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_kind_name() {
        let err = HostError::type_error("x is not a function");
        assert_eq!(err.to_string(), "TypeError: x is not a function");
    }

    #[test]
    fn with_frame_appends_outer_frames() {
        let err = HostError::error("boom")
            .with_frame(StackFrame::new("inner", "https://a.test/a.js", 1, 1))
            .with_frame(StackFrame::new("outer", "https://a.test/b.js", 2, 1));
        assert_eq!(err.trace.top().map(|f| f.function.as_str()), Some("inner"));
        assert_eq!(err.trace.frames().len(), 2);
    }
}
