//! Framing errors raised while reading an HTTP-style response off a byte stream.

use std::io;
use thiserror::Error;

/// The channel ended early or produced bytes that do not form a valid response.
///
/// Fatal for the exchange that hit it; retrying is decided one layer up.
#[derive(Debug, Error)]
pub enum FramingError {
    /// End of stream before a line terminator or before the declared body length.
    #[error("unexpected end of stream")]
    UnexpectedEof,
    /// A single line exceeded [`MAX_LINE_LEN`](super::MAX_LINE_LEN) bytes.
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
    #[error("malformed status line: {0:?}")]
    StatusLine(String),
    #[error("malformed header line: {0:?}")]
    Header(String),
    #[error("malformed chunk size: {0:?}")]
    ChunkSize(String),
    /// Declared body larger than we are willing to buffer.
    #[error("body of {0} bytes exceeds limit")]
    BodyTooLarge(usize),
    /// Body arrived intact but its content could not be decoded.
    #[error("malformed body: {0}")]
    Body(String),
    /// The underlying channel failed (reset, broken pipe, ...).
    #[error(transparent)]
    Io(#[from] io::Error),
}
