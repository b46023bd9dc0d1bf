//! Environment-style overrides
//!
//! The knobs are read once, by [`Overrides::from_env`] or
//! [`Overrides::from_lookup`], and installed on an output with
//! `Output::reload_overrides`. Emissions never look at the environment.

use super::metadata::MetadataFlags;
use super::stack_trace::StackTraceConfig;
use super::target::Target;

pub const ENV_SMART_FLAGS_PREFIX: &str = "PKG_OUT_SMART_FLAGS_PREFIX";
pub const ENV_STACK_TRACE_CONFIG: &str = "PKG_OUT_STACK_TRACE_CONFIG";
pub const ENV_SCREEN_FLAGS: &str = "PKG_OUT_SCREEN_FLAGS";
pub const ENV_LOGFILE_FLAGS: &str = "PKG_OUT_LOGFILE_FLAGS";
pub const ENV_DEBUG_SCOPE: &str = "PKG_OUT_DEBUG_SCOPE";
pub const ENV_NO_EXIT: &str = "PKG_OUT_NO_EXIT";
pub const ENV_STACK_TRACE: &str = "PKG_OUT_STACK_TRACE";

/// Runtime overrides that take precedence over programmatic settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Prefix the metadata leader on every line, even mid-line continuations.
    pub smart_prefix_disabled: bool,
    /// Replaces the configured stack trace policy.
    pub stack_trace: Option<StackTraceConfig>,
    pub screen_flags: Option<MetadataFlags>,
    pub logfile_flags: Option<MetadataFlags>,
    /// Function path substrings that Trace and Debug output is limited to.
    pub debug_scope: Vec<String>,
    /// Skip process termination; terminal emissions report the exit code.
    pub no_exit: bool,
    /// Stack traces on both targets for every issue-class emission.
    pub force_stack_trace: bool,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse the overrides from any key lookup. Empty values count as unset,
    /// malformed values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            smart_prefix_disabled: get(ENV_SMART_FLAGS_PREFIX)
                .map(|v| v.eq_ignore_ascii_case("off"))
                .unwrap_or(false),
            stack_trace: get(ENV_STACK_TRACE_CONFIG)
                .and_then(|v| StackTraceConfig::parse_override(&v)),
            screen_flags: get(ENV_SCREEN_FLAGS).map(|v| MetadataFlags::from_tokens(&v)),
            logfile_flags: get(ENV_LOGFILE_FLAGS).map(|v| MetadataFlags::from_tokens(&v)),
            debug_scope: get(ENV_DEBUG_SCOPE)
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            no_exit: get(ENV_NO_EXIT).map(|v| v == "1").unwrap_or(false),
            force_stack_trace: get(ENV_STACK_TRACE).map(|v| v == "1").unwrap_or(false),
        }
    }

    #[must_use]
    pub fn with_no_exit(mut self, no_exit: bool) -> Self {
        self.no_exit = no_exit;
        self
    }

    #[must_use]
    pub fn with_debug_scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.debug_scope = scope.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_stack_trace(mut self, config: StackTraceConfig) -> Self {
        self.stack_trace = Some(config);
        self
    }

    pub fn flags_for(&self, target: Target) -> Option<MetadataFlags> {
        match target {
            Target::Screen => self.screen_flags,
            Target::Logfile => self.logfile_flags,
        }
    }

    /// The stack trace policy in force given the programmatic `configured` one.
    pub fn stack_trace_config(&self, configured: StackTraceConfig) -> StackTraceConfig {
        if self.force_stack_trace {
            StackTraceConfig::BOTH | StackTraceConfig::ALL_ISSUES
        } else {
            self.stack_trace.unwrap_or(configured)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> Overrides {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Overrides::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_empty_lookup() {
        assert_eq!(lookup(&[]), Overrides::default());
    }

    #[test]
    fn test_parse_all_knobs() {
        let ov = lookup(&[
            (ENV_SMART_FLAGS_PREFIX, "off"),
            (ENV_STACK_TRACE_CONFIG, "screen,allissues"),
            (ENV_SCREEN_FLAGS, "pid,level"),
            (ENV_LOGFILE_FLAGS, "off"),
            (ENV_DEBUG_SCOPE, "app::db, app::net"),
            (ENV_NO_EXIT, "1"),
        ]);
        assert!(ov.smart_prefix_disabled);
        assert_eq!(
            ov.stack_trace,
            Some(StackTraceConfig::SCREEN | StackTraceConfig::ALL_ISSUES)
        );
        assert_eq!(
            ov.flags_for(Target::Screen),
            Some(MetadataFlags::PID | MetadataFlags::LEVEL)
        );
        assert_eq!(ov.flags_for(Target::Logfile), Some(MetadataFlags::NONE));
        assert_eq!(ov.debug_scope, vec!["app::db", "app::net"]);
        assert!(ov.no_exit);
    }

    #[test]
    fn test_malformed_stack_override_ignored() {
        let ov = lookup(&[(ENV_STACK_TRACE_CONFIG, "screen")]);
        assert_eq!(ov.stack_trace, None);
        assert_eq!(
            ov.stack_trace_config(StackTraceConfig::EXIT_TO_LOGFILE),
            StackTraceConfig::EXIT_TO_LOGFILE
        );
    }

    #[test]
    fn test_force_stack_trace() {
        let ov = lookup(&[(ENV_STACK_TRACE, "1"), (ENV_STACK_TRACE_CONFIG, "off,off")]);
        assert_eq!(
            ov.stack_trace_config(StackTraceConfig::OFF),
            StackTraceConfig::BOTH | StackTraceConfig::ALL_ISSUES
        );
    }

    #[test]
    fn test_no_exit_requires_one() {
        assert!(!lookup(&[(ENV_NO_EXIT, "yes")]).no_exit);
    }
}
