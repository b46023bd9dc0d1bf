//! Log file sink

use crate::core::{OutputError, Result, Sink};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Appends to a file, creating it if needed.
///
/// Writes are unbuffered so a crash or early exit never loses a line. With the
/// `file` feature each write also holds an exclusive advisory lock, keeping
/// lines whole when several processes share one log.
#[derive(Debug)]
pub struct FileSink {
    file: Mutex<File>,
    path: PathBuf,
}

impl FileSink {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| OutputError::log_file_open(&path, e))?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    /// Create a uniquely named file in the system temp dir that outlives the
    /// process, named `<prefix>.<random>.log`.
    pub fn temp(prefix: &str) -> Result<Self> {
        let named = tempfile::Builder::new()
            .prefix(&format!("{}.", prefix))
            .suffix(".log")
            .tempfile()?;
        let (file, path) = named.keep().map_err(|e| e.error)?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.file.lock();
        #[cfg(feature = "file")]
        fs2::FileExt::lock_exclusive(&*file)?;
        let written = file.write_all(buf);
        #[cfg(feature = "file")]
        fs2::FileExt::unlock(&*file)?;
        written.map(|()| buf.len())
    }

    fn flush(&self) -> io::Result<()> {
        self.file.lock().flush()
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_appends() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("tool.log");

        let sink = FileSink::open(&path).unwrap();
        sink.write(b"first\n").unwrap();
        drop(sink);

        let sink = FileSink::open(&path).unwrap();
        sink.write(b"second\n").unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_open_missing_dir() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("no/such/dir/tool.log");
        let err = FileSink::open(&path).unwrap_err();
        assert!(matches!(err, OutputError::LogFileOpen { .. }));
    }

    #[test]
    fn test_temp_file_named_by_prefix() {
        let sink = FileSink::temp("mytool").unwrap();
        let name = sink
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap()
            .to_string();
        assert!(name.starts_with("mytool."));
        assert!(name.ends_with(".log"));
        sink.write(b"kept\n").unwrap();
        let content = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content, "kept\n");
        std::fs::remove_file(sink.path()).ok();
    }
}
