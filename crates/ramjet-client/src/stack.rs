//! Stack traces and the trace-origin filter.
//!
//! Errors crossing the interception boundary carry the frames they were
//! raised through. Frames whose script lives under the interception layer's
//! own location (`origin + internal path`) are internal. The filter uses them
//! to decide whether a hook error is an internal failure and strips them
//! before a trace reaches page code.

use std::fmt;

/// One frame of a script stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Function name, empty for anonymous code.
    pub function: String,
    /// Script URL the frame executes in, if known.
    pub file: Option<String>,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

impl StackFrame {
    /// Creates a frame located in `file`.
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            function: function.into(),
            file: Some(file.into()),
            line,
            column,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.function.is_empty() {
            "<anonymous>"
        } else {
            &self.function
        };
        match &self.file {
            Some(file) => write!(f, "at {} ({}:{}:{})", name, file, self.line, self.column),
            None => write!(f, "at {}", name),
        }
    }
}

/// Frames ordered innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace {
    frames: Vec<StackFrame>,
}

impl StackTrace {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the frame the error was raised in.
    pub fn top(&self) -> Option<&StackFrame> {
        self.frames.first()
    }

    /// Appends an outer frame.
    pub fn push(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }

    /// Returns all frames, innermost first.
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Returns true if the trace has no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FromIterator<StackFrame> for StackTrace {
    fn from_iter<I: IntoIterator<Item = StackFrame>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "    {}", frame)?;
        }
        Ok(())
    }
}

/// Where a hook error originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// Raised by the interception layer itself; never shown to the page.
    Internal,
    /// Raised by something the caller supplied; propagated to the page.
    Caller,
}

/// Recognizes frames belonging to the interception layer's own scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFilter {
    internal_base: String,
}

impl StackFilter {
    /// Creates a filter for scripts served under `internal_base`
    /// (`origin + internal path`).
    pub fn new(internal_base: impl Into<String>) -> Self {
        Self {
            internal_base: internal_base.into(),
        }
    }

    /// Returns the script location treated as internal.
    pub fn internal_base(&self) -> &str {
        &self.internal_base
    }

    /// Returns true if `frame` executes in an internal script.
    pub fn is_internal(&self, frame: &StackFrame) -> bool {
        frame
            .file
            .as_deref()
            .is_some_and(|file| file.starts_with(self.internal_base.as_str()))
    }

    /// Classifies an error by the frame it was raised in. Errors without
    /// frames are attributed to the caller.
    pub fn origin_of(&self, trace: &StackTrace) -> FailureOrigin {
        match trace.top() {
            Some(frame) if self.is_internal(frame) => FailureOrigin::Internal,
            _ => FailureOrigin::Caller,
        }
    }

    /// Returns `trace` with internal frames removed.
    pub fn scrub(&self, trace: &StackTrace) -> StackTrace {
        trace
            .frames()
            .iter()
            .filter(|frame| !self.is_internal(frame))
            .cloned()
            .collect()
    }

    /// Builds a frame located in the internal script for `function`.
    pub fn internal_frame(&self, function: &str) -> StackFrame {
        StackFrame::new(function, format!("{}client.js", self.internal_base), 1, 1)
    }
}
