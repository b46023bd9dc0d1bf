//! Console sinks for the process's standard streams

use crate::core::Sink;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Writes to stdout or stderr, flushing after every write so that output
/// from both streams interleaves in emission order.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    stream: Stream,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self {
            stream: Stream::Stdout,
        }
    }

    pub fn stderr() -> Self {
        Self {
            stream: Stream::Stderr,
        }
    }
}

impl Sink for ConsoleSink {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        match self.stream {
            Stream::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(buf)?;
                out.flush()?;
            }
            Stream::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(buf)?;
                err.flush()?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&self) -> io::Result<()> {
        match self.stream {
            Stream::Stdout => io::stdout().flush(),
            Stream::Stderr => io::stderr().flush(),
        }
    }

    fn name(&self) -> &str {
        match self.stream {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}
