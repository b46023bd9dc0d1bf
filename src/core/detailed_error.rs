//! Errors that carry a code and a stack trace captured where they happened

use super::log_level::Level;
use super::prefix::NO_ERROR_CODE;
use super::stack_trace;
use parking_lot::Mutex;
use std::error::Error as StdError;

/// Capability an error can offer to an emission.
///
/// Attached to an emission, it supplies the error code spliced into the
/// level prefix (`"Error #42: "`), a stack trace taken closer to the failure
/// than the emission's own call site, and learns which level reported it.
pub trait DetailedError: StdError + Send + Sync {
    /// Error code, [`NO_ERROR_CODE`] when there is none.
    fn code(&self) -> i32 {
        NO_ERROR_CODE
    }

    /// Stack trace captured at (or nearest to) the origin of the error.
    fn stack_trace(&self) -> Option<String>;

    /// Record the level the error is being reported at.
    fn bind_level(&self, _level: Level) {}

    /// Level the error was last reported at.
    fn bound_level(&self) -> Option<Level> {
        None
    }
}

/// A message plus optional code and wrapped cause, with a backtrace taken at
/// construction.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CodedError {
    message: String,
    code: i32,
    trace: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    level: Mutex<Option<Level>>,
}

impl CodedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: NO_ERROR_CODE,
            trace: stack_trace::capture(0),
            source: None,
            level: Mutex::new(None),
        }
    }

    /// Wrap an underlying error, keeping it reachable through `source()`.
    pub fn wrap(
        source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::new(message)
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Coded errors in the source chain, outermost first (self included).
    fn chain(&self) -> Vec<&CodedError> {
        let mut found = vec![self];
        let mut next = StdError::source(self);
        while let Some(err) = next {
            if let Some(coded) = err.downcast_ref::<CodedError>() {
                found.push(coded);
            }
            next = err.source();
        }
        found
    }
}

impl DetailedError for CodedError {
    /// Own code if set, otherwise the nearest wrapped code.
    fn code(&self) -> i32 {
        self.chain()
            .into_iter()
            .map(|e| e.code)
            .find(|code| *code > NO_ERROR_CODE)
            .unwrap_or(NO_ERROR_CODE)
    }

    /// The innermost coded error's trace, the one closest to the failure.
    fn stack_trace(&self) -> Option<String> {
        self.chain().last().map(|e| e.trace.clone())
    }

    fn bind_level(&self, level: Level) {
        *self.level.lock() = Some(level);
    }

    fn bound_level(&self) -> Option<Level> {
        *self.level.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_defaults_to_none() {
        let err = CodedError::new("plain");
        assert_eq!(err.code(), NO_ERROR_CODE);
        assert_eq!(err.to_string(), "plain");
    }

    #[test]
    fn test_code_from_wrapped() {
        let inner = CodedError::new("disk full").with_code(42);
        let outer = CodedError::wrap(inner, "save failed");
        assert_eq!(outer.code(), 42);

        let outer = CodedError::wrap(CodedError::new("x").with_code(42), "y").with_code(7);
        assert_eq!(outer.code(), 7);
    }

    #[test]
    fn test_innermost_trace() {
        let inner = CodedError::new("inner");
        let inner_trace = inner.stack_trace();
        let middle = CodedError::wrap(inner, "middle");
        let outer = CodedError::wrap(middle, "outer");
        assert_eq!(outer.stack_trace(), inner_trace);
    }

    #[test]
    fn test_bind_level() {
        let err = CodedError::new("bound");
        assert_eq!(err.bound_level(), None);
        err.bind_level(Level::Issue);
        assert_eq!(err.bound_level(), Some(Level::Issue));
    }

    #[test]
    fn test_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = CodedError::wrap(io, "config load failed");
        assert!(StdError::source(&err).is_some());
    }
}
