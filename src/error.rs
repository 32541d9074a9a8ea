//! Structured diagnostics and the shared error sink.
//!
//! Readers never abort on the first problem. Every fallible helper returns
//! `Option<T>`, recording an [`Error`] on the [`Errors`] sink before returning
//! `None`. Callers short-circuit upward to the nearest resynchronization point
//! (the closing `)` of the current list in text, the next section boundary in
//! binary) and keep going, so a single parse surfaces as many problems as
//! possible.

use crate::location::Span;
use std::fmt;

/// A single frame of reader context, e.g. "function body 3".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub span: Span,
    pub desc: String,
}

/// A diagnostic produced while reading a module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{span}: {message}")]
pub struct Error {
    /// The failing byte span.
    pub span: Span,
    /// Human-readable description.
    pub message: String,
    /// Reader context frames active when the error was recorded, outermost
    /// first.
    pub context: Vec<Frame>,
}

impl Error {
    /// Render the error with its context frames, one per line.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        for frame in &self.context {
            out.push_str(&format!("{}: in {}\n", frame.span, frame.desc));
        }
        out.push_str(&format!("{}: {}", self.span, self.message));
        out
    }
}

/// Collects errors and tracks reader context frames.
///
/// The sink is shared with the caller for the duration of one parse; it must
/// not be mutated from outside while the parse runs.
#[derive(Debug, Default)]
pub struct Errors {
    errors: Vec<Error>,
    context: Vec<Frame>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a context frame describing what the reader is currently doing.
    ///
    /// Prefer [`Errors::pop_context`] via a scoped helper so the pop runs on
    /// every exit path (see `with_frame` in the readers).
    pub fn push_context(&mut self, span: Span, desc: impl Into<String>) {
        self.context.push(Frame {
            span,
            desc: desc.into(),
        });
    }

    pub fn pop_context(&mut self) {
        self.context.pop();
    }

    /// Record an error at the given location, capturing the active context.
    pub fn on_error(&mut self, span: Span, message: impl Into<String>) {
        self.errors.push(Error {
            span,
            message: message.into(),
            context: self.context.clone(),
        });
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Append an already-built error, keeping its own context.
    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// Consume the sink, yielding the collected errors ordered by input
    /// position.
    #[must_use]
    pub fn into_vec(mut self) -> Vec<Error> {
        self.errors.sort_by_key(|e| e.span.start);
        self.errors
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_errors_with_context() {
        let mut errors = Errors::new();
        errors.push_context(Span::bytes(0, 10), "code section");
        errors.push_context(Span::bytes(2, 8), "function body 0");
        errors.on_error(Span::bytes(4, 5), "unknown opcode");
        errors.pop_context();
        errors.pop_context();

        let errors = errors.into_vec();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "unknown opcode");
        assert_eq!(errors[0].context.len(), 2);
        assert_eq!(errors[0].context[0].desc, "code section");
        assert_eq!(errors[0].context[1].desc, "function body 0");
    }

    #[test]
    fn context_does_not_leak_after_pop() {
        let mut errors = Errors::new();
        errors.push_context(Span::bytes(0, 1), "outer");
        errors.pop_context();
        errors.on_error(Span::bytes(5, 6), "oops");
        assert!(errors.into_vec()[0].context.is_empty());
    }

    #[test]
    fn errors_sorted_by_position() {
        let mut errors = Errors::new();
        errors.on_error(Span::bytes(9, 10), "later");
        errors.on_error(Span::bytes(1, 2), "earlier");
        let v = errors.into_vec();
        assert_eq!(v[0].message, "earlier");
        assert_eq!(v[1].message, "later");
    }

    #[test]
    fn report_includes_frames() {
        let mut errors = Errors::new();
        errors.push_context(Span::new(0, 10, 1, 1), "import");
        errors.on_error(Span::new(3, 4, 1, 4), "Invalid UTF-8 encoding");
        let report = errors.into_vec()[0].report();
        assert!(report.contains("in import"));
        assert!(report.contains("Invalid UTF-8 encoding"));
    }
}
