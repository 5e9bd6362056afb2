//! Request serialization.

use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Writes a `POST` with a JSON body in a single buffer, then flushes.
pub async fn write_request<W>(writer: &mut W, host: &str, target: &str, body: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let head = format!(
        "POST {} HTTP/1.1\r\n\
         Host: {}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        target,
        host,
        body.len()
    );
    let mut message = Vec::with_capacity(head.len() + body.len());
    message.extend_from_slice(head.as_bytes());
    message.extend_from_slice(body);
    writer.write_all(&message).await?;
    writer.flush().await
}
