//! Core output types and traits

pub mod channel;
pub mod config;
pub mod detailed_error;
pub mod error;
pub mod formatter;
pub mod log_level;
pub mod metadata;
pub mod output;
pub mod overrides;
pub mod prefix;
pub mod sink;
pub mod stack_trace;
pub mod target;

pub use channel::LevelChannel;
pub use config::OutputConfig;
pub use detailed_error::{CodedError, DetailedError};
pub use error::{OutputError, Result};
pub use formatter::{FormatResult, Formatter, SharedFormatter};
pub use log_level::{Level, LevelSelector};
pub use metadata::{CallSite, FlagMetadata, MetadataFlags, NameWidths, UNKNOWN_SITE};
pub use output::{
    DeferredHook, Emission, Emitted, LevelWriter, Output, OutputBuilder, DEFAULT_ERROR_EXIT_CODE,
};
pub use overrides::Overrides;
pub use prefix::{insert_prefix, InsertMode, NO_ERROR_CODE};
pub use sink::{SharedSink, Sink};
pub use stack_trace::StackTraceConfig;
pub use target::{Target, Targets};
