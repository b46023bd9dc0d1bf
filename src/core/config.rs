//! Serializable output configuration

use super::error::{OutputError, Result};
use super::log_level::Level;
use super::metadata::{MetadataFlags, NameWidths};
use super::stack_trace::StackTraceConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Settings that can be loaded from a JSON file and applied in one step.
///
/// Absent fields leave the current setting alone. Flag and stack trace fields
/// use the same token vocabulary as the environment overrides:
///
/// ```
/// use rust_output_system::OutputConfig;
///
/// let config = OutputConfig::from_json_str(r#"{
///     "screen_threshold": "VERBOSE",
///     "logfile_flags": "pid,level,date,time,file",
///     "stack_trace": "both,allissues",
///     "prefixes": { "NOTE": "Heads up: " }
/// }"#).unwrap();
/// assert!(config.log_file.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub screen_threshold: Option<Level>,
    pub logfile_threshold: Option<Level>,
    pub screen_flags: Option<String>,
    pub logfile_flags: Option<String>,
    pub stack_trace: Option<String>,
    pub log_file: Option<PathBuf>,
    pub error_exit_code: Option<i32>,
    pub call_depth: Option<usize>,
    pub name_widths: Option<NameWidths>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub prefixes: BTreeMap<Level, String>,
}

impl OutputConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: OutputConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values an output cannot take: a Discard prefix, or a stack
    /// trace string that is not a two-token list.
    pub fn validate(&self) -> Result<()> {
        if self.prefixes.contains_key(&Level::Discard) {
            return Err(OutputError::config(
                "prefixes",
                "DISCARD has no channel and cannot carry a prefix",
            ));
        }
        if let Some(spec) = &self.stack_trace {
            if StackTraceConfig::parse_override(spec).is_none() {
                return Err(OutputError::config(
                    "stack_trace",
                    format!("expected two comma separated tokens, got '{}'", spec),
                ));
            }
        }
        Ok(())
    }

    pub fn screen_flags(&self) -> Option<MetadataFlags> {
        self.screen_flags.as_deref().map(MetadataFlags::from_tokens)
    }

    pub fn logfile_flags(&self) -> Option<MetadataFlags> {
        self.logfile_flags.as_deref().map(MetadataFlags::from_tokens)
    }

    pub fn stack_trace(&self) -> Option<StackTraceConfig> {
        self.stack_trace
            .as_deref()
            .and_then(StackTraceConfig::parse_override)
    }
}
