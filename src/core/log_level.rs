//! Output level definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::OutputError;

/// Severity of an emission, ordered from most verbose to "never emit".
///
/// `Discard` is a sentinel: used as a threshold it turns a target off, and
/// it never names a real channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Verbose = 2,
    #[default]
    Info = 3,
    Note = 4,
    Issue = 5,
    Error = 6,
    Fatal = 7,
    Discard = 8,
}

impl Level {
    /// Every level that owns a channel, in order.
    pub const CHANNELS: [Level; 8] = [
        Level::Trace,
        Level::Debug,
        Level::Verbose,
        Level::Info,
        Level::Note,
        Level::Issue,
        Level::Error,
        Level::Fatal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Verbose => "VERBOSE",
            Level::Info => "INFO",
            Level::Note => "NOTE",
            Level::Issue => "ISSUE",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
            Level::Discard => "DISCARD",
        }
    }

    /// Map a raw numeric level onto the nearest valid level.
    ///
    /// Anything at or below Trace becomes Trace, anything at or above Discard
    /// becomes Discard.
    pub fn clamp(raw: i32) -> Self {
        match raw {
            i32::MIN..=0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Verbose,
            3 => Level::Info,
            4 => Level::Note,
            5 => Level::Issue,
            6 => Level::Error,
            7 => Level::Fatal,
            _ => Level::Discard,
        }
    }

    /// Channel slot for this level, `None` for Discard.
    pub(crate) fn index(&self) -> Option<usize> {
        match self {
            Level::Discard => None,
            level => Some(*level as usize),
        }
    }

    /// Issue, Error and Fatal are the levels that may carry stack traces.
    #[inline]
    pub fn is_issue_class(&self) -> bool {
        *self >= Level::Issue && *self != Level::Discard
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `pad` keeps width/alignment specifiers working for the leader column
        f.pad(self.name())
    }
}

impl FromStr for Level {
    type Err = OutputError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "VERBOSE" => Ok(Level::Verbose),
            "INFO" | "PRINT" => Ok(Level::Info),
            "NOTE" => Ok(Level::Note),
            "ISSUE" => Ok(Level::Issue),
            "ERROR" => Ok(Level::Error),
            "FATAL" => Ok(Level::Fatal),
            "DISCARD" => Ok(Level::Discard),
            _ => Err(OutputError::InvalidLevel(s.to_string())),
        }
    }
}

/// Selects either a single level or every channel at once for bulk setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSelector {
    All,
    Only(Level),
}

impl LevelSelector {
    pub fn matches(&self, level: Level) -> bool {
        match self {
            LevelSelector::All => level != Level::Discard,
            LevelSelector::Only(only) => *only == level,
        }
    }
}

impl From<Level> for LevelSelector {
    fn from(level: Level) -> Self {
        LevelSelector::Only(level)
    }
}
