//! Metadata leader composition
//!
//! The leader is the decoration placed in front of each line ahead of the
//! level prefix, e.g. with every flag on:
//!
//! ```text
//! [4242] INFO    2025/01/08 10:30:45.123456 main.rs:23:run       : Note: message
//! ```
//!
//! Field order is fixed: pid, level name, date, time, call site.

use super::log_level::Level;
use super::prefix::{insert_prefix, InsertMode, NO_ERROR_CODE};
use chrono::{DateTime, Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::ops::{BitOr, BitOrAssign};
use std::path::Path;

/// Placeholder used when a call site's file or function cannot be resolved.
pub const UNKNOWN_SITE: &str = "???";

/// Which pieces of metadata a target adds in front of each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MetadataFlags(u16);

impl MetadataFlags {
    pub const NONE: MetadataFlags = MetadataFlags(0);
    /// `2009/01/23`
    pub const DATE: MetadataFlags = MetadataFlags(1);
    /// `01:23:23`
    pub const TIME: MetadataFlags = MetadataFlags(1 << 1);
    /// `01:23:23.123123`, implies time
    pub const MICROSECONDS: MetadataFlags = MetadataFlags(1 << 2);
    /// full source path and line: `/a/b/c/d.rs:23`
    pub const LONG_FILE: MetadataFlags = MetadataFlags(1 << 3);
    /// file name and line: `d.rs:23`, overrides LONG_FILE
    pub const SHORT_FILE: MetadataFlags = MetadataFlags(1 << 4);
    /// full function path: `app::cmd::get`
    pub const LONG_FUNC: MetadataFlags = MetadataFlags(1 << 5);
    /// last path segment of the function: `get`
    pub const SHORT_FUNC: MetadataFlags = MetadataFlags(1 << 6);
    pub const PID: MetadataFlags = MetadataFlags(1 << 7);
    /// raw level name, `TRACE`, `DEBUG`, ...
    pub const LEVEL: MetadataFlags = MetadataFlags(1 << 8);

    pub const STD: MetadataFlags = MetadataFlags(Self::DATE.0 | Self::TIME.0);
    pub const SCREEN_DEFAULT: MetadataFlags = MetadataFlags(Self::TIME.0 | Self::MICROSECONDS.0);
    pub const LOGFILE_DEFAULT: MetadataFlags = MetadataFlags(
        Self::PID.0
            | Self::LEVEL.0
            | Self::DATE.0
            | Self::TIME.0
            | Self::MICROSECONDS.0
            | Self::SHORT_FILE.0
            | Self::SHORT_FUNC.0,
    );
    pub const DEBUG: MetadataFlags = MetadataFlags(
        Self::LEVEL.0 | Self::TIME.0 | Self::MICROSECONDS.0 | Self::SHORT_FILE.0 | Self::SHORT_FUNC.0,
    );
    pub const LONG_ALL: MetadataFlags = MetadataFlags(
        Self::PID.0
            | Self::LEVEL.0
            | Self::DATE.0
            | Self::TIME.0
            | Self::MICROSECONDS.0
            | Self::LONG_FILE.0
            | Self::LONG_FUNC.0,
    );

    const CALL_SITE: MetadataFlags = MetadataFlags(
        Self::LONG_FILE.0 | Self::SHORT_FILE.0 | Self::LONG_FUNC.0 | Self::SHORT_FUNC.0,
    );

    #[inline]
    pub fn contains(&self, other: MetadataFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn intersects(&self, other: MetadataFlags) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether composing a leader with these flags needs the call site.
    #[inline]
    pub fn wants_call_site(&self) -> bool {
        self.intersects(Self::CALL_SITE)
    }

    #[inline]
    pub fn wants_function(&self) -> bool {
        self.intersects(Self::LONG_FUNC | Self::SHORT_FUNC)
    }

    /// Parse a comma separated token list.
    ///
    /// Tokens: `pid`, `level`, `date`, `time`, `micro`/`microseconds`,
    /// `file`/`shortfile`, `longfile`, `func`/`shortfunc`, `longfunc`,
    /// `debug`, `all`, `longall` and `off` (clears what came before it).
    /// Unknown tokens are ignored.
    pub fn from_tokens(spec: &str) -> MetadataFlags {
        let mut flags = MetadataFlags::NONE;
        for token in spec.split(',').map(|t| t.trim().to_lowercase()) {
            match token.as_str() {
                "debug" => flags |= Self::DEBUG,
                "all" => flags |= Self::LOGFILE_DEFAULT,
                "longall" => flags |= Self::LONG_ALL,
                "pid" => flags |= Self::PID,
                "level" => flags |= Self::LEVEL,
                "date" => flags |= Self::DATE,
                "time" => flags |= Self::TIME,
                "micro" | "microseconds" => flags |= Self::MICROSECONDS,
                "file" | "shortfile" => flags |= Self::SHORT_FILE,
                "longfile" => flags |= Self::LONG_FILE,
                "func" | "shortfunc" => flags |= Self::SHORT_FUNC,
                "longfunc" => flags |= Self::LONG_FUNC,
                "off" => flags = Self::NONE,
                _ => {}
            }
        }
        flags
    }
}

impl BitOr for MetadataFlags {
    type Output = MetadataFlags;

    fn bitor(self, rhs: MetadataFlags) -> MetadataFlags {
        MetadataFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for MetadataFlags {
    fn bitor_assign(&mut self, rhs: MetadataFlags) {
        self.0 |= rhs.0;
    }
}

/// Column widths used to align the call-site segment of the leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameWidths {
    pub short_file: usize,
    pub long_file: usize,
    pub short_func: usize,
    pub long_func: usize,
}

impl Default for NameWidths {
    fn default() -> Self {
        Self {
            short_file: 16,
            long_file: 55,
            short_func: 14,
            long_func: 30,
        }
    }
}

/// Where an emission came from.
///
/// The function is a static path when a macro captured it, or a symbol
/// resolved from the call stack at emission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
    pub function: Cow<'static, str>,
}

impl CallSite {
    pub const fn new(file: &'static str, line: u32, function: &'static str) -> Self {
        Self {
            file,
            line,
            function: Cow::Borrowed(function),
        }
    }

    /// Site of a `#[track_caller]` call. The function is left unresolved
    /// until an emission needs it.
    pub fn from_location(location: &'static std::panic::Location<'static>) -> Self {
        Self::new(location.file(), location.line(), UNKNOWN_SITE)
    }

    pub fn is_resolved(&self) -> bool {
        self.function != UNKNOWN_SITE
    }

    /// Replace the function with a path found on the call stack.
    #[must_use]
    pub fn with_function(mut self, function: String) -> Self {
        self.function = Cow::Owned(function);
        self
    }

    pub const fn unknown() -> Self {
        Self::new(UNKNOWN_SITE, 0, UNKNOWN_SITE)
    }

    /// Turn the type name of a marker fn nested in the caller into the
    /// caller's path, dropping the marker and any closure segments.
    #[doc(hidden)]
    pub fn enclosing_function(marker: &'static str) -> &'static str {
        let mut path = marker.rsplit_once("::").map_or(marker, |(head, _)| head);
        while let Some(outer) = path.strip_suffix("::{{closure}}") {
            path = outer;
        }
        path
    }

    /// Last `::` segment of the function path, `???` when there is none.
    pub fn short_function(&self) -> &str {
        self.function
            .rsplit_once("::")
            .map(|(_, name)| name)
            .unwrap_or(UNKNOWN_SITE)
    }

    pub fn file_name(&self) -> &'static str {
        self.file.rsplit(['/', '\\']).next().unwrap_or(self.file)
    }
}

/// Metadata gathered for one emission, handed to formatters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub file: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub func: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub line: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub level: String,
    pub pid: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stack: String,
}

fn is_zero(line: &u32) -> bool {
    *line == 0
}

/// Everything the leader depends on besides the flags themselves.
#[derive(Debug, Clone)]
pub struct LeaderContext<'a> {
    pub level: Level,
    pub site: &'a CallSite,
    pub now: DateTime<Local>,
    pub widths: NameWidths,
    pub pid: u32,
}

/// Result of decorating a message for one target.
#[derive(Debug, Clone)]
pub struct Decorated {
    pub text: String,
    pub metadata: FlagMetadata,
    /// Set when the debug-scope filter rejects this emission.
    pub suppressed: bool,
}

/// Build the leader string for `flags`; empty when no flag is set.
pub fn compose_leader(flags: MetadataFlags, ctx: &LeaderContext<'_>) -> String {
    let mut buf = String::new();
    if flags.contains(MetadataFlags::PID) {
        let _ = write!(buf, "[{}] ", ctx.pid);
    }
    if flags.contains(MetadataFlags::LEVEL) {
        let _ = write!(buf, "{:<8}", ctx.level);
    }
    if flags.contains(MetadataFlags::DATE) {
        let _ = write!(
            buf,
            "{:04}/{:02}/{:02} ",
            ctx.now.year(),
            ctx.now.month(),
            ctx.now.day()
        );
    }
    if flags.intersects(MetadataFlags::TIME | MetadataFlags::MICROSECONDS) {
        let _ = write!(
            buf,
            "{:02}:{:02}:{:02}",
            ctx.now.hour(),
            ctx.now.minute(),
            ctx.now.second()
        );
        if flags.contains(MetadataFlags::MICROSECONDS) {
            // leap seconds push nanoseconds past 1e9, keep six digits
            let _ = write!(buf, ".{:06}", (ctx.now.nanosecond() / 1_000) % 1_000_000);
        }
        buf.push(' ');
    }
    if flags.wants_call_site() {
        let short_file =
            flags.contains(MetadataFlags::SHORT_FILE) || !flags.contains(MetadataFlags::LONG_FILE);
        let (file, mut width) = if short_file {
            (ctx.site.file_name(), ctx.widths.short_file)
        } else {
            (ctx.site.file, ctx.widths.long_file)
        };
        let mut segment = format!("{}:{}", file, ctx.site.line);
        if flags.contains(MetadataFlags::SHORT_FUNC) {
            width += ctx.widths.short_func;
            segment.push(':');
            segment.push_str(ctx.site.short_function());
        } else if flags.contains(MetadataFlags::LONG_FUNC) {
            width += ctx.widths.long_func;
            segment.push(':');
            segment.push_str(&ctx.site.function);
        } else {
            segment.push(' ');
        }
        let _ = write!(buf, "{:<width$}: ", segment, width = width);
    }
    buf
}

/// Whether the debug-scope filter hides this emission.
///
/// Only Trace and Debug are filtered, and only when the function resolved:
/// the emission survives if its function path contains any scope entry.
pub fn scope_suppresses(level: Level, function: &str, debug_scope: &[String]) -> bool {
    if debug_scope.is_empty() || function == UNKNOWN_SITE {
        return false;
    }
    if level != Level::Trace && level != Level::Debug {
        return false;
    }
    !debug_scope
        .iter()
        .any(|scope| function.contains(scope.as_str()))
}

/// Put the leader for `flags` in front of every line of `s` per `mode`.
pub fn insert_metadata(
    s: &str,
    flags: MetadataFlags,
    ctx: &LeaderContext<'_>,
    mode: InsertMode,
    debug_scope: &[String],
) -> Decorated {
    let mut metadata = FlagMetadata {
        time: Some(ctx.now),
        level: ctx.level.name().to_string(),
        pid: ctx.pid,
        ..FlagMetadata::default()
    };

    let mut suppressed = false;
    if flags.wants_call_site() || !debug_scope.is_empty() {
        suppressed = scope_suppresses(ctx.level, &ctx.site.function, debug_scope);
        let path = Path::new(ctx.site.file);
        metadata.func = ctx.site.function.to_string();
        metadata.file = ctx.site.file_name().to_string();
        metadata.path = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string());
        metadata.line = ctx.site.line;
    }

    let leader = compose_leader(flags, ctx);
    let text = if leader.is_empty() {
        s.to_string()
    } else {
        insert_prefix(s, &leader, mode, NO_ERROR_CODE)
    };

    Decorated {
        text,
        metadata,
        suppressed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    static SITE: CallSite = CallSite::new("src/cmd/get.rs", 75, "app::cmd::get");

    fn fixed_now() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2015, 7, 25, 1, 5, 1)
            .single()
            .expect("valid datetime")
            + chrono::Duration::microseconds(886736)
    }

    fn ctx(level: Level) -> LeaderContext<'static> {
        LeaderContext {
            level,
            site: &SITE,
            now: fixed_now(),
            widths: NameWidths::default(),
            pid: 616,
        }
    }

    #[test]
    fn test_empty_flags_no_leader() {
        assert_eq!(compose_leader(MetadataFlags::NONE, &ctx(Level::Info)), "");
        let decorated = insert_metadata(
            "msg\n",
            MetadataFlags::NONE,
            &ctx(Level::Info),
            InsertMode::SMART,
            &[],
        );
        assert_eq!(decorated.text, "msg\n");
        assert!(!decorated.suppressed);
    }

    #[test]
    fn test_pid_level_date_time() {
        let flags = MetadataFlags::PID
            | MetadataFlags::LEVEL
            | MetadataFlags::DATE
            | MetadataFlags::TIME
            | MetadataFlags::MICROSECONDS;
        assert_eq!(
            compose_leader(flags, &ctx(Level::Info)),
            "[616] INFO    2015/07/25 01:05:01.886736 "
        );
    }

    #[test]
    fn test_time_without_micro() {
        assert_eq!(
            compose_leader(MetadataFlags::TIME, &ctx(Level::Info)),
            "01:05:01 "
        );
    }

    #[test]
    fn test_short_file_and_func_padding() {
        let flags = MetadataFlags::SHORT_FILE | MetadataFlags::SHORT_FUNC;
        let leader = compose_leader(flags, &ctx(Level::Info));
        assert_eq!(leader, format!("{:<30}: ", "get.rs:75:get"));
    }

    #[test]
    fn test_long_file_no_func() {
        let leader = compose_leader(MetadataFlags::LONG_FILE, &ctx(Level::Info));
        assert_eq!(leader, format!("{:<55}: ", "src/cmd/get.rs:75 "));
    }

    #[test]
    fn test_func_alone_uses_short_file() {
        let leader = compose_leader(MetadataFlags::LONG_FUNC, &ctx(Level::Info));
        assert_eq!(leader, format!("{:<46}: ", "get.rs:75:app::cmd::get"));
    }

    #[test]
    fn test_tokens() {
        assert_eq!(MetadataFlags::from_tokens("pid,level"), MetadataFlags::PID | MetadataFlags::LEVEL);
        assert_eq!(MetadataFlags::from_tokens("all"), MetadataFlags::LOGFILE_DEFAULT);
        assert_eq!(MetadataFlags::from_tokens("date,off,time"), MetadataFlags::TIME);
        assert_eq!(MetadataFlags::from_tokens("bogus"), MetadataFlags::NONE);
        assert_eq!(
            MetadataFlags::from_tokens("file, Func"),
            MetadataFlags::SHORT_FILE | MetadataFlags::SHORT_FUNC
        );
        assert!(MetadataFlags::LOGFILE_DEFAULT.wants_function());
        assert!(!MetadataFlags::SCREEN_DEFAULT.wants_function());
        assert!(!MetadataFlags::SHORT_FILE.wants_function());
    }

    #[test]
    fn test_scope_filter() {
        let scope = vec!["cmd::".to_string()];
        assert!(!scope_suppresses(Level::Debug, "app::cmd::get", &scope));
        assert!(scope_suppresses(Level::Debug, "app::net::fetch", &scope));
        assert!(scope_suppresses(Level::Trace, "app::net::fetch", &scope));
        assert!(!scope_suppresses(Level::Info, "app::net::fetch", &scope));
        assert!(!scope_suppresses(Level::Debug, UNKNOWN_SITE, &scope));
        assert!(!scope_suppresses(Level::Debug, "app::net::fetch", &[]));
    }

    #[test]
    fn test_insert_metadata_multiline_skip_first() {
        let decorated = insert_metadata(
            "rest\nnext\n",
            MetadataFlags::TIME,
            &ctx(Level::Note),
            InsertMode::SKIP_FIRST_LINE,
            &[],
        );
        assert_eq!(decorated.text, "rest\n01:05:01 next\n");
        assert_eq!(decorated.metadata.level, "NOTE");
        assert_eq!(decorated.metadata.pid, 616);
        assert!(decorated.metadata.file.is_empty());
    }

    #[test]
    fn test_metadata_record_call_site() {
        let decorated = insert_metadata(
            "x",
            MetadataFlags::SHORT_FILE,
            &ctx(Level::Debug),
            InsertMode::NONE,
            &[],
        );
        assert_eq!(decorated.metadata.file, "get.rs");
        assert_eq!(decorated.metadata.path, "src/cmd");
        assert_eq!(decorated.metadata.func, "app::cmd::get");
        assert_eq!(decorated.metadata.line, 75);
    }

    #[test]
    fn test_call_site_helpers() {
        assert_eq!(SITE.short_function(), "get");
        assert_eq!(SITE.file_name(), "get.rs");
        assert_eq!(CallSite::unknown().short_function(), UNKNOWN_SITE);
        assert!(!CallSite::unknown().is_resolved());

        let resolved = CallSite::unknown().with_function("app::db::query".to_string());
        assert!(resolved.is_resolved());
        assert_eq!(resolved.short_function(), "query");
    }

    #[test]
    fn test_enclosing_function() {
        assert_eq!(
            CallSite::enclosing_function("app::cmd::get::__here"),
            "app::cmd::get"
        );
        assert_eq!(
            CallSite::enclosing_function("app::run::{{closure}}::{{closure}}::__here"),
            "app::run"
        );
    }
}
