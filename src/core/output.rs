//! Output context: level channels, routing, emission and termination

use super::{
    channel::LevelChannel,
    config::OutputConfig,
    detailed_error::DetailedError,
    error::{OutputError, Result},
    formatter::SharedFormatter,
    log_level::{Level, LevelSelector},
    metadata::{insert_metadata, CallSite, FlagMetadata, LeaderContext, MetadataFlags, NameWidths},
    overrides::Overrides,
    prefix::{insert_prefix, InsertMode, NO_ERROR_CODE},
    sink::{SharedSink, Sink},
    stack_trace::{self, StackTraceConfig},
    target::{Target, Targets},
};
use crate::sinks::{DiscardSink, FileSink};
use chrono::Local;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::io;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Exit value used by Fatal and by terminal emissions whose writes failed.
pub const DEFAULT_ERROR_EXIT_CODE: i32 = -1;

/// Callback run right before the process terminates, given the exit code.
///
/// It must not emit a terminal message itself.
pub type DeferredHook = Arc<dyn Fn(i32) + Send + Sync>;

/// Outcome of a successful emission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Emitted {
    /// Bytes written across both targets, decoration included.
    pub bytes: usize,
    /// Exit code of a terminal emission whose termination was skipped.
    pub exit_code: Option<i32>,
}

/// One message on its way to a level channel.
pub struct Emission<'a> {
    level: Level,
    message: String,
    terminal: bool,
    exit_code: i32,
    site: CallSite,
    detailed: Option<&'a dyn DetailedError>,
}

impl<'a> Emission<'a> {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            terminal: false,
            exit_code: 0,
            site: CallSite::unknown(),
            detailed: None,
        }
    }

    /// Make this emission end the process with `exit_code`.
    #[must_use]
    pub fn terminal(mut self, exit_code: i32) -> Self {
        self.terminal = true;
        self.exit_code = exit_code;
        self
    }

    #[must_use]
    pub fn at(mut self, site: CallSite) -> Self {
        self.site = site;
        self
    }

    #[must_use]
    pub fn with_error(mut self, err: &'a dyn DetailedError) -> Self {
        self.detailed = Some(err);
        self
    }
}

struct Routing {
    screen_threshold: Level,
    logfile_threshold: Level,
    log_file_name: Option<PathBuf>,
    stack_trace: StackTraceConfig,
}

impl Default for Routing {
    fn default() -> Self {
        Self {
            screen_threshold: Level::Info,
            logfile_threshold: Level::Discard,
            log_file_name: None,
            stack_trace: StackTraceConfig::default(),
        }
    }
}

/// Text headed for one target, after any formatter replacement.
struct TargetText<'m> {
    text: &'m str,
    raw: bool,
    suppressed: bool,
}

/// Per-emission values shared by both targets.
struct Pass<'e> {
    channel: &'e LevelChannel,
    site: &'e CallSite,
    terminal: bool,
    error_code: i32,
    overrides: &'e Overrides,
    widths: NameWidths,
    now: chrono::DateTime<Local>,
    pid: u32,
}

/// The output context.
///
/// Holds one channel per level, the per-target thresholds and the two
/// shared newline-continuation flags. One instance per process is the usual
/// arrangement, shared by reference or `Arc`.
///
/// # Example
/// ```
/// use rust_output_system::prelude::*;
/// use std::sync::Arc;
///
/// let screen = Arc::new(MemorySink::new());
/// let out = Output::builder()
///     .sink(LevelSelector::All, screen.clone(), Targets::SCREEN)
///     .build();
///
/// out.noteln("disk almost full").unwrap();
/// assert_eq!(screen.contents(), "Note: disk almost full\n");
/// ```
pub struct Output {
    channels: [RwLock<LevelChannel>; 8],
    routing: RwLock<Routing>,
    /// Newline-continuation state per target, held across compose and write.
    streams: [Mutex<bool>; 2],
    overrides: RwLock<Arc<Overrides>>,
    deferred: RwLock<Option<DeferredHook>>,
    widths: RwLock<NameWidths>,
    call_depth: AtomicUsize,
    error_exit_code: AtomicI32,
}

macro_rules! level_methods {
    ($level:expr, $plain:ident, $line:ident, $fmt:ident) => {
        #[doc = concat!("Emit at ", stringify!($plain), " level, no newline added.")]
        #[track_caller]
        pub fn $plain(&self, message: impl Into<String>) -> Result<Emitted> {
            self.emit_here($level, message.into(), None, Location::caller())
        }

        #[doc = concat!("Emit a line at ", stringify!($plain), " level.")]
        #[track_caller]
        pub fn $line(&self, message: impl Into<String>) -> Result<Emitted> {
            let mut message = message.into();
            message.push('\n');
            self.emit_here($level, message, None, Location::caller())
        }

        #[doc = concat!("Emit preformatted arguments at ", stringify!($plain), " level, no newline added.")]
        #[track_caller]
        pub fn $fmt(&self, args: fmt::Arguments<'_>) -> Result<Emitted> {
            self.emit_here($level, fmt::format(args), None, Location::caller())
        }
    };
}

macro_rules! exit_methods {
    ($level:expr, $plain:ident, $line:ident, $fmt:ident) => {
        #[doc = concat!("Emit at ", stringify!($level), ", no newline added, then terminate with `exit_code`.")]
        #[track_caller]
        pub fn $plain(&self, exit_code: i32, message: impl Into<String>) -> Result<Emitted> {
            self.emit_here($level, message.into(), Some(exit_code), Location::caller())
        }

        #[doc = concat!("Emit a line at ", stringify!($level), ", then terminate with `exit_code`.")]
        #[track_caller]
        pub fn $line(&self, exit_code: i32, message: impl Into<String>) -> Result<Emitted> {
            let mut message = message.into();
            message.push('\n');
            self.emit_here($level, message, Some(exit_code), Location::caller())
        }

        #[doc = concat!("Emit preformatted arguments at ", stringify!($level), ", then terminate with `exit_code`.")]
        #[track_caller]
        pub fn $fmt(&self, exit_code: i32, args: fmt::Arguments<'_>) -> Result<Emitted> {
            self.emit_here($level, fmt::format(args), Some(exit_code), Location::caller())
        }
    };
}

impl Output {
    /// Create an output with the starting configuration: screen threshold
    /// Info, logfile threshold Discard, stack traces to the logfile on
    /// non-zero exit, and no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: Level::CHANNELS.map(|level| RwLock::new(LevelChannel::default_for(level))),
            routing: RwLock::new(Routing::default()),
            streams: [Mutex::new(true), Mutex::new(true)],
            overrides: RwLock::new(Arc::new(Overrides::default())),
            deferred: RwLock::new(None),
            widths: RwLock::new(NameWidths::default()),
            call_depth: AtomicUsize::new(0),
            error_exit_code: AtomicI32::new(DEFAULT_ERROR_EXIT_CODE),
        }
    }

    #[must_use]
    pub fn builder() -> OutputBuilder {
        OutputBuilder::new()
    }

    fn channel(&self, level: Level) -> Option<&RwLock<LevelChannel>> {
        level.index().map(|idx| &self.channels[idx])
    }

    /// Channels picked by `selector`; a Discard selector picks none and is
    /// reported through the fatal path.
    fn selected(&self, selector: LevelSelector, op: &str) -> Vec<&RwLock<LevelChannel>> {
        if selector == LevelSelector::Only(Level::Discard) {
            self.config_fatal(op, Level::Discard);
            return Vec::new();
        }
        Level::CHANNELS
            .iter()
            .filter(|level| selector.matches(**level))
            .filter_map(|level| self.channel(*level))
            .collect()
    }

    /// Report a configuration call naming a level that has no channel.
    fn config_fatal(&self, op: &str, level: Level) {
        let message = format!(
            "Invalid level {} given to {}(), no such output channel\n",
            level, op
        );
        let _ = self.emit(Emission::new(Level::Fatal, message).terminal(self.error_exit_code()));
    }

    // ---- emission ---------------------------------------------------------

    fn emit_here(
        &self,
        level: Level,
        message: String,
        exit_code: Option<i32>,
        location: &'static Location<'static>,
    ) -> Result<Emitted> {
        let mut emission = Emission::new(level, message).at(CallSite::from_location(location));
        if let Some(code) = exit_code {
            emission = emission.terminal(code);
        }
        self.emit(emission)
    }

    /// Route one emission through its level channel.
    ///
    /// Each target is decided independently. A target is skipped when the
    /// level is below its threshold, its sink discards, a formatter
    /// suppressed it, or the debug scope filtered the call site. A write
    /// failure is reported on stderr and returned; a terminal emission still
    /// terminates, with the error exit code.
    pub fn emit(&self, emission: Emission<'_>) -> Result<Emitted> {
        let Emission {
            level,
            message,
            terminal,
            exit_code,
            mut site,
            detailed,
        } = emission;
        let Some(slot) = self.channel(level) else {
            return Ok(Emitted::default());
        };
        let channel = slot.read().clone();
        let (thresholds, configured_trace) = {
            let routing = self.routing.read();
            (
                [routing.screen_threshold, routing.logfile_threshold],
                routing.stack_trace,
            )
        };
        let overrides = Arc::clone(&*self.overrides.read());
        let trace_config = overrides.stack_trace_config(configured_trace);

        if !site.is_resolved() && needs_function(&channel, &thresholds, &overrides) {
            if let Some(function) = stack_trace::caller_function(self.call_depth()) {
                site = site.with_function(function);
            }
        }

        let error_code = detailed.map_or(NO_ERROR_CODE, |err| err.code());
        if let Some(err) = detailed {
            err.bind_level(level);
        }

        let pass = Pass {
            channel: &channel,
            site: &site,
            terminal,
            error_code,
            overrides: &overrides,
            widths: *self.widths.read(),
            now: Local::now(),
            pid: std::process::id(),
        };

        let wants_trace = |target: Target| trace_config.wanted(terminal, exit_code, target, level);
        let formatting = channel.formatter.as_ref().filter(|_| !message.is_empty());
        let trace = if Target::ALL.iter().any(|t| wants_trace(*t))
            || (formatting.is_some() && level.is_issue_class())
        {
            Some(
                detailed
                    .and_then(|err| err.stack_trace())
                    .unwrap_or_else(|| stack_trace::capture(self.call_depth())),
            )
        } else {
            None
        };

        let formatted;
        let mut texts = [
            TargetText {
                text: &message,
                raw: false,
                suppressed: false,
            },
            TargetText {
                text: &message,
                raw: false,
                suppressed: false,
            },
        ];
        if let Some(formatter) = formatting {
            let mut metadata = pass.formatter_metadata(&message);
            if level.is_issue_class() {
                if let Some(trace) = &trace {
                    metadata.stack = trace.clone();
                }
            }
            formatted =
                formatter.format_message(&message, level, error_code, terminal, &metadata);
            for target in formatted.apply.iter() {
                texts[target.index()] = TargetText {
                    text: &formatted.message,
                    raw: formatted.skip_native_decoration,
                    suppressed: formatted.suppress.contains(target),
                };
            }
        }

        let mut bytes = 0;
        let mut failure: Option<OutputError> = None;
        for target in Target::ALL {
            let idx = target.index();
            let sink = channel.sink(target);
            if level < thresholds[idx] || texts[idx].suppressed || sink.is_discard() {
                continue;
            }
            let trace = trace.as_deref().filter(|_| wants_trace(target));
            match self.write_target(&pass, target, sink.as_ref(), &texts[idx], trace) {
                Ok(n) => bytes += n,
                Err(e) => {
                    eprintln!("[OUTPUT ERROR] {}", e);
                    failure.get_or_insert(e);
                }
            }
        }

        if terminal {
            let code = if failure.is_some() {
                self.error_exit_code()
            } else {
                exit_code
            };
            self.terminate(&channel, &overrides, code);
            return match failure {
                Some(e) => Err(e),
                None => Ok(Emitted {
                    bytes,
                    exit_code: Some(code),
                }),
            };
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(Emitted {
                bytes,
                exit_code: None,
            }),
        }
    }

    /// Compose and write one target while holding its stream lock, so that
    /// the continuation decision and the write happen as one unit.
    fn write_target(
        &self,
        pass: &Pass<'_>,
        target: Target,
        sink: &dyn Sink,
        text: &TargetText<'_>,
        trace: Option<&str>,
    ) -> Result<usize> {
        let prefix = &pass.channel.prefix;
        let flags = pass
            .overrides
            .flags_for(target)
            .unwrap_or_else(|| pass.channel.flags(target));
        let ctx = LeaderContext {
            level: pass.channel.level,
            site: pass.site,
            now: pass.now,
            widths: pass.widths,
            pid: pass.pid,
        };

        let mut at_newline = self.streams[target.index()].lock();
        let mut mode = InsertMode::SMART;
        if !*at_newline {
            mode |= InsertMode::SKIP_FIRST_LINE;
        }
        let leader_mode = if pass.overrides.smart_prefix_disabled {
            InsertMode::ALWAYS
        } else {
            mode
        };

        let decorated = if text.raw {
            // formatter output goes out verbatim, the scope filter still applies
            let mut checked = insert_metadata(
                text.text,
                MetadataFlags::NONE,
                &ctx,
                leader_mode,
                &pass.overrides.debug_scope,
            );
            checked.text = text.text.to_string();
            checked
        } else {
            let prefixed = insert_prefix(text.text, prefix, mode, pass.error_code);
            insert_metadata(
                &prefixed,
                flags,
                &ctx,
                leader_mode,
                &pass.overrides.debug_scope,
            )
        };
        if decorated.suppressed {
            return Ok(0);
        }

        let mut written = 0;
        if !decorated.text.is_empty() {
            let n = write_tracking(sink, decorated.text.as_bytes(), &mut at_newline)
                .map_err(|e| OutputError::sink_write(target, prefix.as_str(), e))?;
            written += n;
        }

        if (pass.terminal || trace.is_some()) && !*at_newline {
            written += write_tracking(sink, b"\n", &mut at_newline)
                .map_err(|e| OutputError::newline_write(target, prefix.as_str(), e))?;
        }

        if let Some(trace) = trace {
            let rendered = stack_trace::render(trace);
            let trace_text = if text.raw {
                rendered
            } else {
                let prefixed = insert_prefix(&rendered, prefix, InsertMode::BLANK, pass.error_code);
                insert_metadata(&prefixed, flags, &ctx, InsertMode::BLANK, &[]).text
            };
            written += write_tracking(sink, trace_text.as_bytes(), &mut at_newline)
                .map_err(|e| OutputError::stack_trace_write(target, prefix.as_str(), e))?;
        }

        Ok(written)
    }

    /// Flush the channel's sinks, run the deferred hook, then exit unless
    /// exits are disabled.
    fn terminate(&self, channel: &LevelChannel, overrides: &Overrides, code: i32) {
        for target in Target::ALL {
            if let Err(e) = channel.sink(target).flush() {
                eprintln!("[OUTPUT ERROR] Failed to flush {} output: {}", target, e);
            }
        }
        let hook = self.deferred.read().clone();
        if let Some(hook) = hook {
            hook(code);
        }
        if !overrides.no_exit {
            std::process::exit(code);
        }
    }

    level_methods!(Level::Trace, trace, traceln, tracef);
    level_methods!(Level::Debug, debug, debugln, debugf);
    level_methods!(Level::Verbose, verbose, verboseln, verbosef);
    level_methods!(Level::Info, info, infoln, infof);
    level_methods!(Level::Info, print, println, printf);
    level_methods!(Level::Note, note, noteln, notef);
    level_methods!(Level::Issue, issue, issueln, issuef);
    level_methods!(Level::Error, error, errorln, errorf);

    exit_methods!(Level::Issue, issue_exit, issue_exitln, issue_exitf);
    exit_methods!(Level::Error, error_exit, error_exitln, error_exitf);

    /// Emit at Fatal and terminate with the error exit code.
    #[track_caller]
    pub fn fatal(&self, message: impl Into<String>) -> Result<Emitted> {
        let code = self.error_exit_code();
        self.emit_here(Level::Fatal, message.into(), Some(code), Location::caller())
    }

    #[track_caller]
    pub fn fatalln(&self, message: impl Into<String>) -> Result<Emitted> {
        let mut message = message.into();
        message.push('\n');
        let code = self.error_exit_code();
        self.emit_here(Level::Fatal, message, Some(code), Location::caller())
    }

    #[track_caller]
    pub fn fatalf(&self, args: fmt::Arguments<'_>) -> Result<Emitted> {
        let code = self.error_exit_code();
        self.emit_here(Level::Fatal, fmt::format(args), Some(code), Location::caller())
    }

    /// Report `err` at `level`, using its code and stack trace.
    #[track_caller]
    pub fn log_error(&self, level: Level, err: &dyn DetailedError) -> Result<Emitted> {
        let site = CallSite::from_location(Location::caller());
        self.emit(
            Emission::new(level, format!("{}\n", err))
                .at(site)
                .with_error(err),
        )
    }

    /// Terminate with `code`, writing only a stack trace if one is wanted.
    ///
    /// A non-zero code goes through the Fatal channel, zero through Info.
    #[track_caller]
    pub fn exit(&self, code: i32) -> Result<Emitted> {
        let level = if code != 0 { Level::Fatal } else { Level::Info };
        self.emit_here(level, String::new(), Some(code), Location::caller())
    }

    /// An `io::Write` adapter emitting through `level` (Info for Discard).
    pub fn level_writer(&self, level: Level) -> LevelWriter<'_> {
        let level = if level == Level::Discard {
            Level::Info
        } else {
            level
        };
        LevelWriter {
            output: self,
            level,
            pending: Vec::new(),
        }
    }

    // ---- channel configuration -------------------------------------------

    pub fn prefix(&self, level: Level) -> String {
        match self.channel(level) {
            Some(channel) => channel.read().prefix.clone(),
            None => {
                self.config_fatal("prefix", level);
                String::new()
            }
        }
    }

    pub fn set_prefix(&self, level: Level, prefix: impl Into<String>) {
        match self.channel(level) {
            Some(channel) => channel.write().prefix = prefix.into(),
            None => self.config_fatal("set_prefix", level),
        }
    }

    pub fn flags(&self, level: Level, target: Target) -> MetadataFlags {
        match self.channel(level) {
            Some(channel) => channel.read().flags(target),
            None => {
                self.config_fatal("flags", level);
                MetadataFlags::NONE
            }
        }
    }

    pub fn set_flags(
        &self,
        selector: impl Into<LevelSelector>,
        flags: MetadataFlags,
        targets: Targets,
    ) {
        for channel in self.selected(selector.into(), "set_flags") {
            let mut channel = channel.write();
            for target in targets.iter() {
                channel.set_flags(target, flags);
            }
        }
    }

    pub fn sink(&self, level: Level, target: Target) -> SharedSink {
        match self.channel(level) {
            Some(channel) => Arc::clone(channel.read().sink(target)),
            None => {
                self.config_fatal("sink", level);
                Arc::new(DiscardSink)
            }
        }
    }

    pub fn set_sink(&self, selector: impl Into<LevelSelector>, sink: SharedSink, targets: Targets) {
        for channel in self.selected(selector.into(), "set_sink") {
            let mut channel = channel.write();
            for target in targets.iter() {
                channel.set_sink(target, Arc::clone(&sink));
            }
        }
    }

    pub fn formatter(&self, level: Level) -> Option<SharedFormatter> {
        self.channel(level)
            .and_then(|channel| channel.read().formatter.clone())
    }

    pub fn set_formatter(
        &self,
        selector: impl Into<LevelSelector>,
        formatter: Option<SharedFormatter>,
    ) {
        for channel in self.selected(selector.into(), "set_formatter") {
            channel.write().formatter = formatter.clone();
        }
    }

    // ---- routing ---------------------------------------------------------

    pub fn threshold(&self, target: Target) -> Level {
        let routing = self.routing.read();
        match target {
            Target::Screen => routing.screen_threshold,
            Target::Logfile => routing.logfile_threshold,
        }
    }

    pub fn set_threshold(&self, level: Level, targets: Targets) {
        let mut routing = self.routing.write();
        if targets.contains(Target::Screen) {
            routing.screen_threshold = level;
        }
        if targets.contains(Target::Logfile) {
            routing.logfile_threshold = level;
        }
    }

    /// Stop all output to `targets`.
    pub fn discard(&self, targets: Targets) {
        self.set_threshold(Level::Discard, targets);
    }

    pub fn should_emit(&self, level: Level, target: Target) -> bool {
        level != Level::Discard && level >= self.threshold(target)
    }

    pub fn stack_trace_config(&self) -> StackTraceConfig {
        self.routing.read().stack_trace
    }

    pub fn set_stack_trace_config(&self, config: StackTraceConfig) {
        self.routing.write().stack_trace = config;
    }

    /// Declare whether `targets` are at the start of a line, e.g. after the
    /// user answered a prompt.
    pub fn reset_newline(&self, at_newline: bool, targets: Targets) {
        for target in targets.iter() {
            *self.streams[target.index()].lock() = at_newline;
        }
    }

    pub fn at_newline(&self, target: Target) -> bool {
        *self.streams[target.index()].lock()
    }

    // ---- log file ----------------------------------------------------------

    /// Open (or create) `path` in append mode and send every level's
    /// logfile output there. Logging still needs a logfile threshold.
    pub fn set_log_file(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let sink = FileSink::open(path.as_ref())?;
        Ok(self.install_log_file(sink))
    }

    /// Like [`set_log_file`](Self::set_log_file) with a fresh file in the
    /// temp dir whose name starts with `prefix`. The file is kept on disk.
    pub fn use_temp_log_file(&self, prefix: &str) -> Result<PathBuf> {
        let sink = FileSink::temp(prefix)?;
        Ok(self.install_log_file(sink))
    }

    fn install_log_file(&self, sink: FileSink) -> PathBuf {
        let path = sink.path().to_path_buf();
        let sink: SharedSink = Arc::new(sink);
        for channel in &self.channels {
            channel.write().set_sink(Target::Logfile, Arc::clone(&sink));
        }
        self.routing.write().log_file_name = Some(path.clone());
        path
    }

    pub fn log_file_name(&self) -> Option<PathBuf> {
        self.routing.read().log_file_name.clone()
    }

    // ---- tuning ------------------------------------------------------------

    pub fn name_widths(&self) -> NameWidths {
        *self.widths.read()
    }

    pub fn set_name_widths(&self, widths: NameWidths) {
        *self.widths.write() = widths;
    }

    pub fn call_depth(&self) -> usize {
        self.call_depth.load(Ordering::Relaxed)
    }

    /// Extra stack frames skipped when capturing a trace at the call site.
    pub fn set_call_depth(&self, depth: usize) {
        self.call_depth.store(depth, Ordering::Relaxed);
    }

    pub fn error_exit_code(&self) -> i32 {
        self.error_exit_code.load(Ordering::Relaxed)
    }

    pub fn set_error_exit_code(&self, code: i32) {
        self.error_exit_code.store(code, Ordering::Relaxed);
    }

    pub fn deferred_hook(&self) -> Option<DeferredHook> {
        self.deferred.read().clone()
    }

    /// Register the hook run before termination, replacing any previous one.
    pub fn set_deferred_hook(&self, hook: Option<DeferredHook>) {
        *self.deferred.write() = hook;
    }

    // ---- overrides and bulk configuration ---------------------------------

    pub fn overrides(&self) -> Arc<Overrides> {
        Arc::clone(&*self.overrides.read())
    }

    /// Install a new set of overrides; later emissions use it.
    pub fn reload_overrides(&self, overrides: Overrides) {
        *self.overrides.write() = Arc::new(overrides);
    }

    /// Re-read the overrides from the process environment.
    pub fn reload_from_env(&self) {
        self.reload_overrides(Overrides::from_env());
    }

    /// Apply every setting present in `config`.
    pub fn apply_config(&self, config: &OutputConfig) -> Result<()> {
        config.validate()?;
        if let Some(path) = &config.log_file {
            self.set_log_file(path)?;
        }
        if let Some(level) = config.screen_threshold {
            self.set_threshold(level, Targets::SCREEN);
        }
        if let Some(level) = config.logfile_threshold {
            self.set_threshold(level, Targets::LOGFILE);
        }
        if let Some(flags) = config.screen_flags() {
            self.set_flags(LevelSelector::All, flags, Targets::SCREEN);
        }
        if let Some(flags) = config.logfile_flags() {
            self.set_flags(LevelSelector::All, flags, Targets::LOGFILE);
        }
        if let Some(stack_trace) = config.stack_trace() {
            self.set_stack_trace_config(stack_trace);
        }
        if let Some(code) = config.error_exit_code {
            self.set_error_exit_code(code);
        }
        if let Some(depth) = config.call_depth {
            self.set_call_depth(depth);
        }
        if let Some(widths) = config.name_widths {
            self.set_name_widths(widths);
        }
        for (level, prefix) in &config.prefixes {
            self.set_prefix(*level, prefix.clone());
        }
        Ok(())
    }

    /// Flush every distinct sink.
    pub fn flush(&self) -> Result<()> {
        let mut seen: Vec<SharedSink> = Vec::new();
        for channel in &self.channels {
            let channel = channel.read();
            for target in Target::ALL {
                let sink = channel.sink(target);
                if !seen.iter().any(|s| Arc::ptr_eq(s, sink)) {
                    seen.push(Arc::clone(sink));
                }
            }
        }
        for sink in seen {
            sink.flush()?;
        }
        Ok(())
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routing = self.routing.read();
        f.debug_struct("Output")
            .field("screen_threshold", &routing.screen_threshold)
            .field("logfile_threshold", &routing.logfile_threshold)
            .field("log_file_name", &routing.log_file_name)
            .field("stack_trace", &routing.stack_trace)
            .field("error_exit_code", &self.error_exit_code())
            .finish_non_exhaustive()
    }
}

impl Pass<'_> {
    /// Metadata handed to a formatter: long file and function, whatever the
    /// targets' own flags say.
    fn formatter_metadata(&self, message: &str) -> FlagMetadata {
        let ctx = LeaderContext {
            level: self.channel.level,
            site: self.site,
            now: self.now,
            widths: self.widths,
            pid: self.pid,
        };
        insert_metadata(
            message,
            MetadataFlags::LONG_FILE | MetadataFlags::LONG_FUNC,
            &ctx,
            InsertMode::ALWAYS,
            &[],
        )
        .metadata
    }
}

/// Whether any target that will be written shows the function, filters on
/// it, or hands it to a formatter.
fn needs_function(channel: &LevelChannel, thresholds: &[Level; 2], overrides: &Overrides) -> bool {
    if channel.formatter.is_some() {
        return true;
    }
    let scoped = !overrides.debug_scope.is_empty()
        && matches!(channel.level, Level::Trace | Level::Debug);
    Target::ALL.iter().any(|&target| {
        if channel.level < thresholds[target.index()] || channel.sink(target).is_discard() {
            return false;
        }
        let flags = overrides
            .flags_for(target)
            .unwrap_or_else(|| channel.flags(target));
        scoped || flags.wants_function()
    })
}

/// Write `buf` and record whether the last byte accepted was a newline.
fn write_tracking(sink: &dyn Sink, buf: &[u8], at_newline: &mut bool) -> io::Result<usize> {
    let n = sink.write(buf)?;
    if n > 0 {
        *at_newline = buf[n.min(buf.len()) - 1] == b'\n';
    }
    Ok(n)
}

/// `io::Write` adapter for one level, see [`Output::level_writer`].
///
/// ```
/// use rust_output_system::prelude::*;
/// use std::io::Write;
/// use std::sync::Arc;
///
/// let screen = Arc::new(MemorySink::new());
/// let out = Output::builder()
///     .sink(LevelSelector::All, screen.clone(), Targets::SCREEN)
///     .build();
/// writeln!(out.level_writer(Level::Issue), "low on memory").unwrap();
/// assert_eq!(screen.contents(), "Issue: low on memory\n");
/// ```
pub struct LevelWriter<'a> {
    output: &'a Output,
    level: Level,
    /// Tail of a UTF-8 sequence split across writes.
    pending: Vec<u8>,
}

impl LevelWriter<'_> {
    pub fn level(&self) -> Level {
        self.level
    }

    fn emit_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        let message = String::from_utf8_lossy(bytes).into_owned();
        self.output
            .emit(Emission::new(self.level, message))
            .map(|_| ())
            .map_err(io::Error::other)
    }
}

/// Length of the prefix of `bytes` that does not end inside an incomplete
/// UTF-8 sequence. Invalid bytes count as complete.
fn complete_utf8_len(bytes: &[u8]) -> usize {
    let mut offset = 0;
    loop {
        match std::str::from_utf8(&bytes[offset..]) {
            Ok(_) => return bytes.len(),
            Err(e) => match e.error_len() {
                Some(bad) => offset += e.valid_up_to() + bad,
                None => return offset + e.valid_up_to(),
            },
        }
    }
}

impl io::Write for LevelWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        let complete = complete_utf8_len(&self.pending);
        if complete > 0 {
            let chunk: Vec<u8> = self.pending.drain(..complete).collect();
            self.emit_bytes(&chunk)?;
        }
        Ok(buf.len())
    }

    /// Emit any held partial sequence as-is, then flush the sinks.
    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let chunk = std::mem::take(&mut self.pending);
            self.emit_bytes(&chunk)?;
        }
        self.output.flush().map_err(io::Error::other)
    }
}

impl Drop for LevelWriter<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            let chunk = std::mem::take(&mut self.pending);
            let _ = self.emit_bytes(&chunk);
        }
    }
}

/// Builder for [`Output`].
///
/// # Example
/// ```
/// use rust_output_system::prelude::*;
/// use std::sync::Arc;
///
/// let out = Output::builder()
///     .threshold(Level::Verbose, Targets::SCREEN)
///     .prefix(Level::Issue, "Warning: ")
///     .flags(LevelSelector::All, MetadataFlags::TIME, Targets::SCREEN)
///     .stack_trace(StackTraceConfig::BOTH | StackTraceConfig::ALL_ISSUES)
///     .error_exit_code(2)
///     .deferred_hook(Arc::new(|code| eprintln!("exiting with {}", code)))
///     .build();
/// assert_eq!(out.prefix(Level::Issue), "Warning: ");
/// ```
pub struct OutputBuilder {
    thresholds: Vec<(Level, Targets)>,
    prefixes: Vec<(Level, String)>,
    sinks: Vec<(LevelSelector, SharedSink, Targets)>,
    flags: Vec<(LevelSelector, MetadataFlags, Targets)>,
    formatters: Vec<(LevelSelector, SharedFormatter)>,
    stack_trace: Option<StackTraceConfig>,
    error_exit_code: i32,
    call_depth: usize,
    name_widths: NameWidths,
    deferred: Option<DeferredHook>,
    overrides: Overrides,
}

impl OutputBuilder {
    pub fn new() -> Self {
        Self {
            thresholds: Vec::new(),
            prefixes: Vec::new(),
            sinks: Vec::new(),
            flags: Vec::new(),
            formatters: Vec::new(),
            stack_trace: None,
            error_exit_code: DEFAULT_ERROR_EXIT_CODE,
            call_depth: 0,
            name_widths: NameWidths::default(),
            deferred: None,
            overrides: Overrides::default(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn threshold(mut self, level: Level, targets: Targets) -> Self {
        self.thresholds.push((level, targets));
        self
    }

    /// Set a level's prefix; Discard has no channel and is ignored here.
    #[must_use = "builder methods return a new value"]
    pub fn prefix(mut self, level: Level, prefix: impl Into<String>) -> Self {
        self.prefixes.push((level, prefix.into()));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn sink(
        mut self,
        selector: impl Into<LevelSelector>,
        sink: SharedSink,
        targets: Targets,
    ) -> Self {
        self.sinks.push((selector.into(), sink, targets));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn flags(
        mut self,
        selector: impl Into<LevelSelector>,
        flags: MetadataFlags,
        targets: Targets,
    ) -> Self {
        self.flags.push((selector.into(), flags, targets));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn formatter(mut self, selector: impl Into<LevelSelector>, formatter: SharedFormatter) -> Self {
        self.formatters.push((selector.into(), formatter));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn stack_trace(mut self, config: StackTraceConfig) -> Self {
        self.stack_trace = Some(config);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn error_exit_code(mut self, code: i32) -> Self {
        self.error_exit_code = code;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn call_depth(mut self, depth: usize) -> Self {
        self.call_depth = depth;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn name_widths(mut self, widths: NameWidths) -> Self {
        self.name_widths = widths;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn deferred_hook(mut self, hook: DeferredHook) -> Self {
        self.deferred = Some(hook);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Shorthand for overrides with termination disabled.
    #[must_use = "builder methods return a new value"]
    pub fn no_exit(mut self) -> Self {
        self.overrides.no_exit = true;
        self
    }

    pub fn build(self) -> Output {
        let output = Output::new();
        for (level, targets) in self.thresholds {
            output.set_threshold(level, targets);
        }
        for (level, prefix) in self.prefixes {
            if let Some(channel) = output.channel(level) {
                channel.write().prefix = prefix;
            }
        }
        for (selector, sink, targets) in self.sinks {
            output.set_sink(selector, sink, targets);
        }
        for (selector, flags, targets) in self.flags {
            output.set_flags(selector, flags, targets);
        }
        for (selector, formatter) in self.formatters {
            output.set_formatter(selector, Some(formatter));
        }
        if let Some(config) = self.stack_trace {
            output.set_stack_trace_config(config);
        }
        output.set_error_exit_code(self.error_exit_code);
        output.set_call_depth(self.call_depth);
        output.set_name_widths(self.name_widths);
        output.set_deferred_hook(self.deferred);
        output.reload_overrides(self.overrides);
        output
    }
}

impl Default for OutputBuilder {
    fn default() -> Self {
        Self::new()
    }
}
