//! Sink that drops everything

use crate::core::Sink;
use std::io;

/// Accepts and drops all bytes. Targets backed by it are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl Sink for DiscardSink {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn name(&self) -> &str {
        "discard"
    }

    fn is_discard(&self) -> bool {
        true
    }
}
