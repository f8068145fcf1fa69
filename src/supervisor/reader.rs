//! Line splitting for downloader output
//!
//! Progress bars are redrawn with `\r`, so both `\r` and `\n` end a line.
//! Bytes are decoded lossily; console code pages are not always UTF-8.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Longest run of bytes without a line break before it is emitted anyway
const MAX_LINE_BYTES: usize = 64 * 1024;

const CHUNK_BYTES: usize = 4096;

/// Splits a child's output stream into lines
///
/// `next_line` is cancel-safe: a read interrupted by `select!` or a timeout
/// loses no bytes, since buffered data only changes after a read completes.
#[derive(Debug)]
pub(crate) struct OutputReader<R> {
    inner: R,
    pending: Vec<u8>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> OutputReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            eof: false,
        }
    }

    /// Next non-empty line, or `None` once the stream is exhausted
    pub(crate) async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.take_line() {
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(line));
            }

            if self.eof {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let rest = std::mem::take(&mut self.pending);
                return Ok(Some(String::from_utf8_lossy(&rest).into_owned()));
            }

            let mut chunk = [0u8; CHUNK_BYTES];
            let read = self.inner.read(&mut chunk).await?;
            if read == 0 {
                self.eof = true;
            } else {
                self.pending.extend_from_slice(&chunk[..read]);
            }
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let (end, consumed) = match self.pending.iter().position(|b| matches!(b, b'\r' | b'\n')) {
            Some(end) => (end, end + 1),
            None if self.pending.len() >= MAX_LINE_BYTES => (MAX_LINE_BYTES, MAX_LINE_BYTES),
            None => return None,
        };
        let line = String::from_utf8_lossy(&self.pending[..end]).into_owned();
        self.pending.drain(..consumed);
        Some(line)
    }
}
