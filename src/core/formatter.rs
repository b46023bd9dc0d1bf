//! Formatter plugin contract

use super::log_level::Level;
use super::metadata::FlagMetadata;
use super::target::Targets;
use std::sync::Arc;

/// What a formatter wants done with one emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatResult {
    /// Replacement text for the targets in `apply`.
    pub message: String,
    /// Targets the replacement (and the two settings below) applies to;
    /// other targets keep the original message.
    pub apply: Targets,
    /// Targets that get no native output at all.
    pub suppress: Targets,
    /// Write the replacement as-is, without level prefix or leader.
    pub skip_native_decoration: bool,
}

impl FormatResult {
    /// Replace the message on `apply`, keeping native decoration.
    pub fn replace(message: impl Into<String>, apply: Targets) -> Self {
        Self {
            message: message.into(),
            apply,
            suppress: Targets::NONE,
            skip_native_decoration: false,
        }
    }

    /// Leave the emission exactly as it was.
    pub fn unchanged(message: &str) -> Self {
        Self::replace(message, Targets::NONE)
    }

    #[must_use]
    pub fn suppressing(mut self, suppress: Targets) -> Self {
        self.suppress = suppress;
        self
    }

    #[must_use]
    pub fn raw(mut self) -> Self {
        self.skip_native_decoration = true;
        self
    }
}

/// Custom output formatting attached to a level channel.
///
/// Called once per emission before any target is written. `metadata`
/// carries long file/function details, pid, level and time regardless of the
/// targets' own flags, plus the stack trace when one was resolved.
pub trait Formatter: Send + Sync {
    fn format_message(
        &self,
        message: &str,
        level: Level,
        error_code: i32,
        terminal: bool,
        metadata: &FlagMetadata,
    ) -> FormatResult;
}

impl<F> Formatter for F
where
    F: Fn(&str, Level, i32, bool, &FlagMetadata) -> FormatResult + Send + Sync,
{
    fn format_message(
        &self,
        message: &str,
        level: Level,
        error_code: i32,
        terminal: bool,
        metadata: &FlagMetadata,
    ) -> FormatResult {
        self(message, level, error_code, terminal, metadata)
    }
}

pub type SharedFormatter = Arc<dyn Formatter>;
