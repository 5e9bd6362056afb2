//! Read-side buffering over a raw duplex channel.
//!
//! [`BufferedStream`] batches reads from the inner channel into a fixed-size
//! buffer and offers byte-level [`read`](BufferedStream::read) and CRLF-framed
//! [`read_line`](BufferedStream::read_line). Writes, flushes and seeks go
//! straight to the inner channel.
//!
//! The wrapper owns the read side: anything that reads the inner channel
//! directly while the wrapper is in use loses whatever is still buffered.

mod error;

pub use error::FramingError;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncWrite};

/// Default capacity of the internal read buffer.
pub const BUFFER_SIZE: usize = 2048;

/// Longest line `read_line` accepts, terminator excluded.
pub const MAX_LINE_LEN: usize = 8 * 1024;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Buffering wrapper that owns an inner channel.
pub struct BufferedStream<S> {
    inner: S,
    buf: Box<[u8]>,
    /// Start of unconsumed bytes in `buf`.
    offset: usize,
    /// Number of unconsumed bytes; `offset + count <= buf.len()`.
    count: usize,
}

impl<S> BufferedStream<S> {
    pub fn new(inner: S) -> Self {
        Self::with_capacity(BUFFER_SIZE, inner)
    }

    /// A zero capacity is bumped to one byte so every underlying read can make progress.
    pub fn with_capacity(capacity: usize, inner: S) -> Self {
        Self {
            inner,
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
            offset: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes read from the channel but not yet handed out.
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.offset..self.offset + self.count]
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwraps the inner channel, discarding any buffered bytes.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn copy_buffered(&mut self, dst: &mut [u8]) -> usize {
        let n = self.count.min(dst.len());
        dst[..n].copy_from_slice(&self.buf[self.offset..self.offset + n]);
        self.offset += n;
        self.count -= n;
        n
    }
}

impl<S: AsyncRead + Unpin> BufferedStream<S> {
    /// Copies up to `dst.len()` buffered bytes into `dst`.
    ///
    /// When the buffer is empty, performs exactly one read on the inner channel
    /// first. `Ok(0)` means no data is available (end of stream); callers decide
    /// what that means, nothing is retried here.
    pub async fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        if self.count == 0 {
            self.offset = 0;
            self.count = self.inner.read(&mut self.buf).await?;
        }
        Ok(self.copy_buffered(dst))
    }

    /// Reads one byte at a time until CR LF and returns the line without its terminator.
    ///
    /// A CR that is not followed by LF is kept as part of the line.
    pub async fn read_line(&mut self) -> Result<String, FramingError> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        let mut cr_found = false;
        loop {
            if self.read(&mut byte).await? == 0 {
                return Err(FramingError::UnexpectedEof);
            }
            if cr_found && byte[0] == LF {
                line.pop();
                return String::from_utf8(line).map_err(|_| FramingError::InvalidUtf8);
            }
            // One slot of slack for the CR we strip on completion.
            if line.len() > MAX_LINE_LEN {
                return Err(FramingError::LineTooLong(MAX_LINE_LEN));
            }
            line.push(byte[0]);
            cr_found = byte[0] == CR;
        }
    }

    /// Reads exactly `len` bytes; end of stream before that is a framing error.
    pub async fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>, FramingError> {
        let mut out = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self.read(&mut out[filled..]).await?;
            if n == 0 {
                return Err(FramingError::UnexpectedEof);
            }
            filled += n;
        }
        Ok(out)
    }

    /// Reads until the channel reports end of stream, failing past `limit` bytes.
    pub async fn read_to_end_limited(&mut self, limit: usize) -> Result<Vec<u8>, FramingError> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 512];
        loop {
            let n = self.read(&mut chunk).await?;
            if n == 0 {
                return Ok(out);
            }
            if out.len() + n > limit {
                return Err(FramingError::BodyTooLarge(out.len() + n));
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for BufferedStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl<S: AsyncSeek + Unpin> AsyncSeek for BufferedStream<S> {
    fn start_seek(self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
        Pin::new(&mut self.get_mut().inner).start_seek(position)
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Pin::new(&mut self.get_mut().inner).poll_complete(cx)
    }
}
