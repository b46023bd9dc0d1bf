//! Stack trace policy and capture
//!
//! A configuration pairs the targets that receive traces with one trigger
//! class. Triggers are checked in priority order: non-zero exit, any exit,
//! all issues.

use super::log_level::Level;
use super::target::{Target, Targets};
use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::ops::{BitOr, BitOrAssign};

/// Target selector plus trigger class, combined as one bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackTraceConfig(u8);

impl StackTraceConfig {
    pub const OFF: StackTraceConfig = StackTraceConfig(0);
    pub const SCREEN: StackTraceConfig = StackTraceConfig(1);
    pub const LOGFILE: StackTraceConfig = StackTraceConfig(1 << 1);
    pub const BOTH: StackTraceConfig = StackTraceConfig(1 | 1 << 1);
    /// Trace only when exiting with a non-zero code.
    pub const NON_ZERO_EXIT: StackTraceConfig = StackTraceConfig(1 << 2);
    /// Trace on any exit from an issue-class level.
    pub const ANY_EXIT: StackTraceConfig = StackTraceConfig(1 << 3);
    /// Trace every issue, error and fatal, exiting or not.
    pub const ALL_ISSUES: StackTraceConfig = StackTraceConfig(1 << 4);
    /// Starting configuration: logfile only, on non-zero exit.
    pub const EXIT_TO_LOGFILE: StackTraceConfig =
        StackTraceConfig(Self::NON_ZERO_EXIT.0 | Self::LOGFILE.0);

    #[inline]
    pub fn contains(&self, other: StackTraceConfig) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn targets(&self) -> Targets {
        let mut targets = Targets::NONE;
        if self.contains(Self::SCREEN) {
            targets |= Targets::SCREEN;
        }
        if self.contains(Self::LOGFILE) {
            targets |= Targets::LOGFILE;
        }
        targets
    }

    /// Parse an override such as `"screen,nonzeroerrorexit"`.
    ///
    /// Exactly two comma separated tokens are expected; anything else is
    /// rejected so the programmatic setting stays in force. Vocabulary:
    /// `screen`, `logfile`, `both`, `nonzeroerrorexit`, `errorexit`,
    /// `allissues`/`all`, `off`.
    pub fn parse_override(spec: &str) -> Option<StackTraceConfig> {
        let tokens: Vec<String> = spec.split(',').map(|t| t.trim().to_lowercase()).collect();
        if tokens.len() != 2 {
            return None;
        }
        let mut config = Self::OFF;
        for token in &tokens {
            match token.as_str() {
                "both" => config |= Self::BOTH,
                "screen" => config |= Self::SCREEN,
                "logfile" => config |= Self::LOGFILE,
                "nonzeroerrorexit" => config |= Self::NON_ZERO_EXIT,
                "errorexit" => config |= Self::ANY_EXIT,
                "allissues" | "all" => config |= Self::ALL_ISSUES,
                "off" => config = Self::OFF,
                _ => {}
            }
        }
        Some(config)
    }

    /// Decide whether an emission to `target` carries a stack trace.
    pub fn wanted(&self, terminal: bool, exit_code: i32, target: Target, level: Level) -> bool {
        if !self.targets().contains(target) {
            return false;
        }
        if self.contains(Self::NON_ZERO_EXIT) {
            terminal && exit_code != 0
        } else if self.contains(Self::ANY_EXIT) {
            terminal && level.is_issue_class()
        } else if self.contains(Self::ALL_ISSUES) {
            level.is_issue_class()
        } else {
            false
        }
    }
}

impl Default for StackTraceConfig {
    fn default() -> Self {
        Self::EXIT_TO_LOGFILE
    }
}

impl BitOr for StackTraceConfig {
    type Output = StackTraceConfig;

    fn bitor(self, rhs: StackTraceConfig) -> StackTraceConfig {
        StackTraceConfig(self.0 | rhs.0)
    }
}

impl BitOrAssign for StackTraceConfig {
    fn bitor_assign(&mut self, rhs: StackTraceConfig) {
        self.0 |= rhs.0;
    }
}

/// Capture the current thread's stack, starting at the first frame outside
/// this crate and then skipping `extra_skip` further frames.
pub fn capture(extra_skip: usize) -> String {
    let raw = Backtrace::force_capture().to_string();
    let current = std::thread::current();
    let header = match current.name() {
        Some(name) => format!("thread '{}':", name),
        None => format!("thread {:?}:", current.id()),
    };
    format!("{}\n{}", header, trim_frames(&raw, extra_skip))
}

/// Wrap a captured trace the way it is written to a target.
pub fn render(trace: &str) -> String {
    format!("Stack Trace: {}\n", trace.trim_end_matches('\n'))
}

fn is_frame_header(line: &str) -> bool {
    let trimmed = line.trim_start();
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && trimmed[digits..].starts_with(':')
}

fn frame_symbol(frame: &str) -> &str {
    let header = frame.lines().next().unwrap_or("").trim_start();
    header
        .split_once(':')
        .map(|(_, symbol)| symbol.trim())
        .unwrap_or(header)
}

fn is_internal(frame: &str) -> bool {
    let symbol = frame_symbol(frame);
    symbol.starts_with("std::backtrace")
        || symbol.contains("backtrace_rs")
        || symbol.starts_with("rust_output_system::")
        || symbol.starts_with("<rust_output_system::")
}

/// Split a rendered backtrace into one chunk per numbered frame.
fn split_frames(raw: &str) -> Vec<String> {
    let mut frames: Vec<String> = Vec::new();
    for line in raw.lines() {
        if is_frame_header(line) || frames.is_empty() {
            frames.push(String::new());
        }
        if let Some(frame) = frames.last_mut() {
            frame.push_str(line);
            frame.push('\n');
        }
    }
    frames
}

pub(crate) fn trim_frames(raw: &str, extra_skip: usize) -> String {
    let frames = split_frames(raw);
    if frames.len() <= 1 {
        return raw.to_string();
    }
    let first_foreign = frames.iter().position(|f| !is_internal(f)).unwrap_or(0);
    frames[first_foreign..]
        .iter()
        .skip(extra_skip)
        .map(String::as_str)
        .collect()
}

fn is_runtime(frame: &str) -> bool {
    let symbol = frame_symbol(frame).trim_start_matches('<');
    ["std::", "core::", "alloc::"]
        .iter()
        .any(|krate| symbol.starts_with(krate))
}

/// Strip the symbol hash and closure segments from a demangled name.
fn function_path(symbol: &str) -> &str {
    let mut path = match symbol.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) => {
            head
        }
        _ => symbol,
    };
    while let Some(outer) = path.strip_suffix("::{{closure}}") {
        path = outer;
    }
    path
}

/// Function path of the caller on the current stack: the first frame
/// outside this crate and the standard library, then `extra_skip` further
/// frames. `None` when symbols are unavailable.
pub fn caller_function(extra_skip: usize) -> Option<String> {
    let raw = Backtrace::force_capture().to_string();
    caller_in(&raw, extra_skip)
}

fn caller_in(raw: &str, extra_skip: usize) -> Option<String> {
    let frames = split_frames(raw);
    let first_foreign = frames
        .iter()
        .position(|f| !is_internal(f) && !is_runtime(f))?;
    let frame = frames.get(first_foreign + extra_skip)?;
    let path = function_path(frame_symbol(frame));
    if path.is_empty() || path.starts_with("<unknown>") {
        return None;
    }
    Some(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "   0: std::backtrace::Backtrace::force_capture
             at /rustc/library/std/src/backtrace.rs:312:13
   1: rust_output_system::core::stack_trace::capture
             at ./src/core/stack_trace.rs:120:15
   2: <rust_output_system::core::output::LevelWriter as std::io::Write>::write
             at ./src/core/output.rs:700:9
   3: app::run
             at ./src/main.rs:10:5
   4: app::main
             at ./src/main.rs:4:5
";

    #[test]
    fn test_non_zero_exit_to_logfile() {
        let cfg = StackTraceConfig::LOGFILE | StackTraceConfig::NON_ZERO_EXIT;
        assert!(cfg.wanted(true, 2, Target::Logfile, Level::Fatal));
        assert!(!cfg.wanted(true, 0, Target::Logfile, Level::Fatal));
        assert!(!cfg.wanted(false, 2, Target::Logfile, Level::Fatal));
        assert!(!cfg.wanted(true, 2, Target::Screen, Level::Fatal));
    }

    #[test]
    fn test_any_exit_requires_issue_level() {
        let cfg = StackTraceConfig::BOTH | StackTraceConfig::ANY_EXIT;
        assert!(cfg.wanted(true, 0, Target::Screen, Level::Issue));
        assert!(!cfg.wanted(true, 0, Target::Screen, Level::Info));
        assert!(!cfg.wanted(false, 1, Target::Screen, Level::Error));
    }

    #[test]
    fn test_all_issues() {
        let cfg = StackTraceConfig::SCREEN | StackTraceConfig::ALL_ISSUES;
        assert!(cfg.wanted(false, 0, Target::Screen, Level::Issue));
        assert!(!cfg.wanted(false, 0, Target::Screen, Level::Note));
        assert!(!cfg.wanted(false, 0, Target::Logfile, Level::Error));
    }

    #[test]
    fn test_no_trigger_means_no_trace() {
        assert!(!StackTraceConfig::BOTH.wanted(true, 1, Target::Screen, Level::Fatal));
        assert!(!StackTraceConfig::OFF.wanted(true, 1, Target::Screen, Level::Fatal));
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(
            StackTraceConfig::parse_override("screen,nonzeroerrorexit"),
            Some(StackTraceConfig::SCREEN | StackTraceConfig::NON_ZERO_EXIT)
        );
        assert_eq!(
            StackTraceConfig::parse_override("Both,All"),
            Some(StackTraceConfig::BOTH | StackTraceConfig::ALL_ISSUES)
        );
        assert_eq!(
            StackTraceConfig::parse_override("both,off"),
            Some(StackTraceConfig::OFF)
        );
        assert_eq!(StackTraceConfig::parse_override("both"), None);
        assert_eq!(StackTraceConfig::parse_override("both,all,screen"), None);
    }

    #[test]
    fn test_trim_frames_skips_internal() {
        let trimmed = trim_frames(RAW, 0);
        assert!(trimmed.starts_with("   3: app::run"));
        assert!(!trimmed.contains("rust_output_system"));

        let deeper = trim_frames(RAW, 1);
        assert!(deeper.starts_with("   4: app::main"));
    }

    #[test]
    fn test_caller_skips_crate_and_std_frames() {
        assert_eq!(caller_in(RAW, 0).as_deref(), Some("app::run"));
        assert_eq!(caller_in(RAW, 1).as_deref(), Some("app::main"));
        assert_eq!(caller_in(RAW, 2), None);

        let through_writer = "   0: std::backtrace::Backtrace::force_capture
   1: rust_output_system::core::output::Output::emit
   2: <rust_output_system::core::output::LevelWriter as std::io::Write>::write
   3: std::io::Write::write_all
   4: <std::io::Write::write_fmt::Adapter<T> as core::fmt::Write>::write_str
   5: core::fmt::write
   6: app::report::{{closure}}::h0123456789abcdef
   7: app::main
";
        assert_eq!(caller_in(through_writer, 0).as_deref(), Some("app::report"));
        assert_eq!(caller_in("   0: <unknown>\n", 0), None);
    }

    #[test]
    fn test_function_path() {
        assert_eq!(function_path("app::db::query::h0123456789abcdef"), "app::db::query");
        assert_eq!(function_path("app::db::helper"), "app::db::helper");
        assert_eq!(function_path("app::run::{{closure}}::{{closure}}"), "app::run");
    }

    #[test]
    fn test_trim_frames_unparseable() {
        assert_eq!(trim_frames("disabled backtrace", 3), "disabled backtrace");
    }

    #[test]
    fn test_render() {
        assert_eq!(render("thread 'main':\n   0: x\n"), "Stack Trace: thread 'main':\n   0: x\n");
    }

    #[test]
    fn test_capture_has_header() {
        let trace = capture(0);
        assert!(trace.starts_with("thread "));
    }
}
