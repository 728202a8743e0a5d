// src/exec/capture.rs

//! Capturing relay output into the shared log sink.

use std::io::{self, Write};

use chrono::Local;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::types::StreamKind;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A partial line this long is emitted as-is instead of waiting for its end.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

/// ffmpeg redraws its progress line with `\r`; treat that as a line end too.
fn is_line_break(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

/// `Write` adapter that turns a byte stream into prefixed log lines:
///
/// ```text
/// [2024-05-01 12:00:00] [cam-1] frame=  120 fps= 25 ...
/// ```
///
/// Partial lines are buffered until their `\n` or `\r` arrives, so a line
/// split across several writes still becomes a single entry. A partial line
/// reaching [`MAX_PENDING_BYTES`] is emitted early. Empty lines are dropped.
/// Every finished line reaches the sink in one `write_all`, which keeps
/// lines from different writers sharing a sink intact.
///
/// Use one instance per (worker, output stream).
#[derive(Debug)]
pub struct LineTimestampWriter<W: Write> {
    worker_id: String,
    sink: W,
    buf: Vec<u8>,
}

impl<W: Write> LineTimestampWriter<W> {
    pub fn new(worker_id: impl Into<String>, sink: W) -> Self {
        Self {
            worker_id: worker_id.into(),
            sink,
            buf: Vec::new(),
        }
    }

    /// Bytes received after the last newline.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Emit whatever is left in the buffer as a final line.
    pub fn finish(&mut self) -> io::Result<()> {
        let rest = std::mem::take(&mut self.buf);
        self.emit(&rest)?;
        self.sink.flush()
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn emit(&mut self, line: &[u8]) -> io::Result<()> {
        if line.is_empty() {
            return Ok(());
        }

        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let mut out = Vec::with_capacity(line.len() + self.worker_id.len() + 26);
        write!(out, "[{timestamp}] [{}] ", self.worker_id)?;
        out.extend_from_slice(line);
        out.push(b'\n');

        self.sink.write_all(&out)
    }
}

impl<W: Write> Write for LineTimestampWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        for piece in data.split_inclusive(|&b| is_line_break(b)) {
            match piece.split_last() {
                Some((&last, line)) if is_line_break(last) => {
                    self.buf.extend_from_slice(line);
                    let line = std::mem::take(&mut self.buf);
                    self.emit(&line)?;
                }
                _ => {
                    self.buf.extend_from_slice(piece);
                    if self.buf.len() >= MAX_PENDING_BYTES {
                        let line = std::mem::take(&mut self.buf);
                        self.emit(&line)?;
                    }
                }
            }
        }

        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// Copy one output pipe of a relay into `writer` until the pipe closes.
///
/// The pipe closes when the relay exits or is killed. A sink error ends the
/// pump early; the reader is dropped, so the relay sees a broken pipe rather
/// than blocking on a full one.
pub async fn pump_output<R, W>(mut reader: R, mut writer: LineTimestampWriter<W>, kind: StreamKind)
where
    R: AsyncRead + Unpin,
    W: Write,
{
    let mut chunk = [0u8; 4096];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = writer.write_all(&chunk[..n]) {
                    warn!(
                        stream_id = %writer.worker_id,
                        stream = %kind,
                        error = %e,
                        "failed to copy relay output"
                    );
                    return;
                }
            }
            Err(e) => {
                warn!(
                    stream_id = %writer.worker_id,
                    stream = %kind,
                    error = %e,
                    "failed to read relay output"
                );
                break;
            }
        }
    }

    if let Err(e) = writer.finish() {
        warn!(
            stream_id = %writer.worker_id,
            stream = %kind,
            error = %e,
            "failed to flush relay output"
        );
    }
    debug!(stream_id = %writer.worker_id, stream = %kind, "output pump finished");
}
