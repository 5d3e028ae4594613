//! Line and Data Block Reader
//!
//! The text protocol interleaves two kinds of input: CRLF-terminated command
//! lines and raw data blocks whose length was announced on the previous line.
//! [`LineReader`] wraps the read half of a connection in a large buffer and
//! offers one method for each.
//!
//! The buffer is sized so that a data block of up to 1 MiB is served straight
//! from it without growing anything per read. Lines are capped at the same
//! size: a longer line comes back in pieces, the way a fixed `bufio` buffer
//! hands them out.

use bytes::Bytes;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// Capacity of the read buffer (1 MiB)
pub const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Longest line returned in one piece
pub const MAX_LINE_LENGTH: usize = READ_BUFFER_SIZE;

/// Initial capacity for a single command line
const LINE_CAPACITY: usize = 256;

/// Buffered reader producing command lines and data blocks.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: BufReader<R>,
    line: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wraps `reader` with the default 1 MiB buffer.
    pub fn new(reader: R) -> Self {
        Self::with_capacity(READ_BUFFER_SIZE, reader)
    }

    /// Wraps `reader` with a buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        Self {
            inner: BufReader::with_capacity(capacity, reader),
            line: Vec::with_capacity(LINE_CAPACITY),
        }
    }

    /// Reads the next line, without its terminator.
    ///
    /// Accepts `\r\n` as well as a bare `\n`. Returns `Ok(None)` when the peer
    /// closed the stream before sending anything. A final line without a
    /// terminator is returned as-is.
    ///
    /// At most [`MAX_LINE_LENGTH`] bytes are taken per call. Whatever is left
    /// of a longer line is returned by the following calls.
    pub async fn read_line(&mut self) -> io::Result<Option<Bytes>> {
        self.line.clear();
        let n = (&mut self.inner)
            .take(MAX_LINE_LENGTH as u64)
            .read_until(b'\n', &mut self.line)
            .await?;
        if n == 0 {
            return Ok(None);
        }

        let mut end = self.line.len();
        if self.line[..end].ends_with(b"\n") {
            end -= 1;
            if self.line[..end].ends_with(b"\r") {
                end -= 1;
            }
        }

        let line = Bytes::copy_from_slice(&self.line[..end]);
        if self.line.capacity() > LINE_CAPACITY * 16 {
            self.line = Vec::with_capacity(LINE_CAPACITY);
        }
        Ok(Some(line))
    }

    /// Reads exactly `n` bytes.
    ///
    /// The block grows as data arrives, so a large declared length costs
    /// nothing until the bytes are actually sent. If the stream ends first
    /// this fails with [`io::ErrorKind::UnexpectedEof`]; a half-delivered
    /// block is an error, not a clean close.
    pub async fn read_exact(&mut self, n: usize) -> io::Result<Bytes> {
        let mut block = Vec::with_capacity(n.min(READ_BUFFER_SIZE));
        (&mut self.inner)
            .take(n as u64)
            .read_to_end(&mut block)
            .await?;

        if block.len() < n {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended after {} of {} bytes", block.len(), n),
            ));
        }
        Ok(Bytes::from(block))
    }

    /// Discards input up to and including the next `\n`.
    ///
    /// Used to get back in step after a malformed data block. Returns the
    /// number of bytes thrown away, 0 at end of stream. Nothing is kept, so
    /// the line may be arbitrarily long.
    pub async fn skip_line(&mut self) -> io::Result<usize> {
        let mut skipped = 0;
        loop {
            let buf = self.inner.fill_buf().await?;
            if buf.is_empty() {
                return Ok(skipped);
            }

            let (n, found) = match buf.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (buf.len(), false),
            };
            self.inner.consume(n);
            skipped += n;

            if found {
                return Ok(skipped);
            }
        }
    }
}
