//! In-memory sink, mostly for tests and for capturing output

use crate::core::Sink;
use parking_lot::Mutex;
use std::io;

/// Buffers everything written to it.
#[derive(Debug, Default)]
pub struct MemorySink {
    buffer: Mutex<Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    /// Return the contents and empty the buffer.
    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.buffer.lock());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }
}

impl Sink for MemorySink {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
