//! Response framing: status line, header lines, then a length-delimited,
//! chunked, or stream-terminated body.

use crate::stream::{BufferedStream, FramingError};
use tokio::io::AsyncRead;

/// Largest response body accepted.
pub const MAX_BODY_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Header names as received; look them up with [`RawResponse::header`].
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Reads one complete response.
pub async fn read_response<S>(reader: &mut BufferedStream<S>) -> Result<RawResponse, FramingError>
where
    S: AsyncRead + Unpin,
{
    // Interim 1xx responses (100 Continue, 102 Processing) precede the final one.
    let (status, headers) = loop {
        let status_line = reader.read_line().await?;
        let status = parse_status_line(&status_line)?;
        let headers = read_headers(reader).await?;
        match status {
            101 => return Err(FramingError::StatusLine(status_line)),
            100..=199 => continue,
            _ => break (status, headers),
        }
    };

    let mut response = RawResponse {
        status,
        headers,
        body: Vec::new(),
    };
    if status == 204 || status == 304 {
        return Ok(response);
    }

    let chunked = response
        .header("transfer-encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));
    response.body = if chunked {
        read_chunked(reader).await?
    } else if let Some(len) = response.header("content-length") {
        let len: usize = len
            .parse()
            .map_err(|_| FramingError::Header(format!("Content-Length: {}", len)))?;
        if len > MAX_BODY_LEN {
            return Err(FramingError::BodyTooLarge(len));
        }
        reader.read_exact_vec(len).await?
    } else {
        reader.read_to_end_limited(MAX_BODY_LEN).await?
    };
    Ok(response)
}

/// Header lines up to and including the blank line that ends the head.
async fn read_headers<S>(reader: &mut BufferedStream<S>) -> Result<Vec<(String, String)>, FramingError>
where
    S: AsyncRead + Unpin,
{
    let mut headers = Vec::new();
    loop {
        let line = reader.read_line().await?;
        if line.is_empty() {
            return Ok(headers);
        }
        headers.push(parse_header(&line)?);
    }
}

/// Parses `HTTP/1.x <code> [reason]` into the status code.
fn parse_status_line(line: &str) -> Result<u16, FramingError> {
    let bad = || FramingError::StatusLine(line.to_string());
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or_else(bad)?;
    if !version.starts_with("HTTP/") {
        return Err(bad());
    }
    let code = parts.next().ok_or_else(bad)?;
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let status: u16 = code.parse().map_err(|_| bad())?;
    if status < 100 {
        return Err(bad());
    }
    Ok(status)
}

fn parse_header(line: &str) -> Result<(String, String), FramingError> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| FramingError::Header(line.to_string()))?;
    if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace()) {
        return Err(FramingError::Header(line.to_string()));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

async fn read_chunked<S>(reader: &mut BufferedStream<S>) -> Result<Vec<u8>, FramingError>
where
    S: AsyncRead + Unpin,
{
    let mut body = Vec::new();
    loop {
        let line = reader.read_line().await?;
        let size_text = line.split_once(';').map_or(line.as_str(), |(s, _)| s).trim();
        let size = usize::from_str_radix(size_text, 16)
            .map_err(|_| FramingError::ChunkSize(line.clone()))?;
        if size == 0 {
            // Trailer section ends with an empty line.
            while !reader.read_line().await?.is_empty() {}
            return Ok(body);
        }
        if body.len().saturating_add(size) > MAX_BODY_LEN {
            return Err(FramingError::BodyTooLarge(body.len().saturating_add(size)));
        }
        body.extend_from_slice(&reader.read_exact_vec(size).await?);
        let terminator = reader.read_line().await?;
        if !terminator.is_empty() {
            return Err(FramingError::ChunkSize(terminator));
        }
    }
}
