//! # Rust Output System
//!
//! Leveled output for command-line tools. Every level from Trace to Fatal
//! owns a channel with its own prefix, a screen sink and a logfile sink, and
//! metadata flags per sink; global thresholds decide which targets hear it.
//!
//! ## Features
//!
//! - **Multi-line aware prefixing**: continuation output is not re-prefixed
//!   mid-line, trailing newlines are preserved
//! - **Metadata leaders**: pid, level, date, time and call site per target
//! - **Stack traces on exit**: configurable per target and trigger
//! - **Controlled termination**: a deferred hook runs before the process
//!   exits, and a test mode reports the exit code instead
//! - **Thread safe**: concurrent emissions interleave at line granularity
//!
//! ```
//! use rust_output_system::prelude::*;
//! use std::sync::Arc;
//!
//! let screen = Arc::new(MemorySink::new());
//! let out = Output::builder()
//!     .sink(LevelSelector::All, screen.clone(), Targets::SCREEN)
//!     .no_exit()
//!     .build();
//!
//! out.noteln("build finished").unwrap();
//! let emitted = out.error_exitln(2, "tests failed").unwrap();
//!
//! assert_eq!(emitted.exit_code, Some(2));
//! assert_eq!(screen.contents(), "Note: build finished\nError: tests failed\n");
//! ```

pub mod core;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        CallSite, CodedError, DeferredHook, DetailedError, Emission, Emitted, FlagMetadata,
        FormatResult, Formatter, InsertMode, Level, LevelSelector, LevelWriter, MetadataFlags,
        NameWidths, Output, OutputBuilder, OutputConfig, OutputError, Overrides, Result,
        SharedFormatter, SharedSink, Sink, StackTraceConfig, Target, Targets, NO_ERROR_CODE,
    };
    pub use crate::sinks::{ConsoleSink, DiscardSink, FileSink, MemorySink};
}

pub use crate::core::{
    insert_prefix, CallSite, CodedError, DeferredHook, DetailedError, Emission, Emitted,
    FlagMetadata, FormatResult, Formatter, InsertMode, Level, LevelChannel, LevelSelector,
    LevelWriter, MetadataFlags, NameWidths, Output, OutputBuilder, OutputConfig, OutputError,
    Overrides, Result, SharedFormatter, SharedSink, Sink, StackTraceConfig, Target, Targets,
    DEFAULT_ERROR_EXIT_CODE, NO_ERROR_CODE, UNKNOWN_SITE,
};
pub use sinks::{ConsoleSink, DiscardSink, FileSink, MemorySink};
