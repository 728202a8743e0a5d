// src/logfile/sink.rs

//! The process-wide "current log file" cell.
//!
//! Both `tracing` and the relay output pumps write through a [`LogSink`].
//! Each write locks the cell and uses whatever handle is in it at that
//! moment, so after [`LogSink::reopen`] swaps in a fresh file nobody keeps
//! writing into the renamed one.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

/// Cloneable handle to the shared log output.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    /// `None` for sinks that wrap an arbitrary writer; those never reopen.
    path: Option<PathBuf>,
    target: Mutex<Box<dyn Write + Send>>,
}

impl LogSink {
    /// Open (or create) `path` in append mode.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        Ok(Self {
            inner: Arc::new(SinkInner {
                path: Some(path),
                target: Mutex::new(Box::new(file)),
            }),
        })
    }

    /// Wrap any writer, e.g. stderr or an in-memory buffer.
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                path: None,
                target: Mutex::new(Box::new(writer)),
            }),
        }
    }

    /// Re-open the sink's path and swap the new handle in.
    ///
    /// The file is opened before the lock is taken; the swap itself is a
    /// single assignment under the lock.
    pub fn reopen(&self) -> io::Result<()> {
        let Some(path) = self.inner.path.as_deref() else {
            return Ok(());
        };
        let file = open_append(path)?;

        let mut target = self.lock();
        // Best effort: the old handle points at a rotated generation now.
        let _ = target.flush();
        *target = Box::new(file);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        // A panic mid-write leaves at worst a torn line; keep logging.
        self.inner
            .target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        // One lock for the whole buffer, so a line is never split by another
        // writer.
        self.lock().write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
