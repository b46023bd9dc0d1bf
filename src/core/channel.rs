//! Per-level channel configuration

use super::formatter::SharedFormatter;
use super::log_level::Level;
use super::metadata::MetadataFlags;
use super::sink::SharedSink;
use super::target::Target;
use crate::sinks::{ConsoleSink, DiscardSink};
use std::fmt;
use std::sync::Arc;

/// Everything one level needs to decorate and route a message.
#[derive(Clone)]
pub struct LevelChannel {
    pub level: Level,
    pub prefix: String,
    pub screen: SharedSink,
    pub screen_flags: MetadataFlags,
    pub logfile: SharedSink,
    pub logfile_flags: MetadataFlags,
    pub formatter: Option<SharedFormatter>,
}

impl LevelChannel {
    /// Starting configuration for `level`.
    ///
    /// Trace and Debug carry a timestamp on screen, Verbose and Info are
    /// unprefixed, Error and Fatal go to stderr. Every logfile sink discards
    /// until a log file is configured.
    pub fn default_for(level: Level) -> Self {
        let (prefix, screen_flags) = match level {
            Level::Trace => ("Trace: ", MetadataFlags::SCREEN_DEFAULT),
            Level::Debug => ("Debug: ", MetadataFlags::SCREEN_DEFAULT),
            Level::Verbose | Level::Info | Level::Discard => ("", MetadataFlags::NONE),
            Level::Note => ("Note: ", MetadataFlags::NONE),
            Level::Issue => ("Issue: ", MetadataFlags::NONE),
            Level::Error => ("Error: ", MetadataFlags::NONE),
            Level::Fatal => ("Fatal: ", MetadataFlags::NONE),
        };
        let screen: SharedSink = match level {
            Level::Error | Level::Fatal => Arc::new(ConsoleSink::stderr()),
            _ => Arc::new(ConsoleSink::stdout()),
        };
        Self {
            level,
            prefix: prefix.to_string(),
            screen,
            screen_flags,
            logfile: Arc::new(DiscardSink),
            logfile_flags: MetadataFlags::LOGFILE_DEFAULT,
            formatter: None,
        }
    }

    pub fn sink(&self, target: Target) -> &SharedSink {
        match target {
            Target::Screen => &self.screen,
            Target::Logfile => &self.logfile,
        }
    }

    pub fn flags(&self, target: Target) -> MetadataFlags {
        match target {
            Target::Screen => self.screen_flags,
            Target::Logfile => self.logfile_flags,
        }
    }

    pub(crate) fn set_sink(&mut self, target: Target, sink: SharedSink) {
        match target {
            Target::Screen => self.screen = sink,
            Target::Logfile => self.logfile = sink,
        }
    }

    pub(crate) fn set_flags(&mut self, target: Target, flags: MetadataFlags) {
        match target {
            Target::Screen => self.screen_flags = flags,
            Target::Logfile => self.logfile_flags = flags,
        }
    }
}

impl fmt::Debug for LevelChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelChannel")
            .field("level", &self.level)
            .field("prefix", &self.prefix)
            .field("screen", &self.screen.name())
            .field("screen_flags", &self.screen_flags)
            .field("logfile", &self.logfile.name())
            .field("logfile_flags", &self.logfile_flags)
            .field("formatter", &self.formatter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let info = LevelChannel::default_for(Level::Info);
        assert_eq!(info.prefix, "");
        assert_eq!(info.screen.name(), "stdout");
        assert!(info.logfile.is_discard());
        assert_eq!(info.flags(Target::Logfile), MetadataFlags::LOGFILE_DEFAULT);

        let fatal = LevelChannel::default_for(Level::Fatal);
        assert_eq!(fatal.prefix, "Fatal: ");
        assert_eq!(fatal.sink(Target::Screen).name(), "stderr");

        let debug = LevelChannel::default_for(Level::Debug);
        assert_eq!(debug.flags(Target::Screen), MetadataFlags::SCREEN_DEFAULT);
    }

    #[test]
    fn test_set_per_target() {
        let mut note = LevelChannel::default_for(Level::Note);
        note.set_flags(Target::Screen, MetadataFlags::PID);
        note.set_sink(Target::Logfile, Arc::new(ConsoleSink::stderr()));
        assert_eq!(note.screen_flags, MetadataFlags::PID);
        assert_eq!(note.logfile.name(), "stderr");
    }
}
