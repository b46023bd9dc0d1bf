//! Sink trait for output destinations

use std::io;
use std::sync::Arc;

/// Byte destination behind a target.
///
/// The engine only writes; it never reads from or closes a sink. Sinks are
/// shared between levels, so writes take `&self`.
pub trait Sink: Send + Sync {
    /// Write `buf`, returning how many bytes were accepted.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;

    /// A discarding sink is skipped entirely, leaving newline state alone.
    fn is_discard(&self) -> bool {
        false
    }
}

pub type SharedSink = Arc<dyn Sink>;
