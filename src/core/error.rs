//! Error types for the output system

use super::target::Target;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, OutputError>;

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// A sink rejected a write
    #[error("{prefix}Error writing {what} to {target} output handler: {source}")]
    SinkWrite {
        target: Target,
        prefix: String,
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Log file could not be opened or created
    #[error("Failed to open log file '{}': {source}", .path.display())]
    LogFileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Level name did not parse
    #[error("Invalid level name '{0}', unable to map to a level")]
    InvalidLevel(String),

    /// Target name did not parse
    #[error("Invalid target '{0}', expected screen, logfile, both or none")]
    InvalidTarget(String),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// JSON configuration error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl OutputError {
    /// Create a sink write error for the message body
    pub fn sink_write(target: Target, prefix: impl Into<String>, source: std::io::Error) -> Self {
        OutputError::SinkWrite {
            target,
            prefix: prefix.into(),
            what: "output",
            source,
        }
    }

    /// Create a sink write error for the corrective newline
    pub fn newline_write(
        target: Target,
        prefix: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        OutputError::SinkWrite {
            target,
            prefix: prefix.into(),
            what: "newline",
            source,
        }
    }

    /// Create a sink write error for a stack trace
    pub fn stack_trace_write(
        target: Target,
        prefix: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        OutputError::SinkWrite {
            target,
            prefix: prefix.into(),
            what: "stack trace",
            source,
        }
    }

    /// Create a log file open error
    pub fn log_file_open(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        OutputError::LogFileOpen {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        OutputError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        OutputError::Other(msg.into())
    }
}
