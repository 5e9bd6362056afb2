//! In-memory channels for unit tests.

use crate::transport::Connect;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Replays canned read chunks (one chunk per read call at most) and records writes.
///
/// Once the chunks run out every read reports end of stream, unless the
/// stream was built with [`ScriptedStream::stalling`], in which case reads
/// never complete.
#[derive(Debug, Default)]
pub struct ScriptedStream {
    chunks: VecDeque<Vec<u8>>,
    stall_when_empty: bool,
    pub reads: Arc<AtomicUsize>,
    pub written: Arc<Mutex<Vec<u8>>>,
}

impl ScriptedStream {
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// One chunk holding the whole response.
    pub fn response(raw: &str) -> Self {
        Self::new([raw.as_bytes().to_vec()])
    }

    pub fn stalling() -> Self {
        Self {
            stall_when_empty: true,
            ..Self::default()
        }
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.reads.fetch_add(1, Ordering::SeqCst);
        match this.chunks.pop_front() {
            Some(mut chunk) => {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..n]);
                if n < chunk.len() {
                    this.chunks.push_front(chunk.split_off(n));
                }
                Poll::Ready(Ok(()))
            }
            None if this.stall_when_empty => Poll::Pending,
            None => Poll::Ready(Ok(())),
        }
    }
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.written
            .lock()
            .map_err(|_| io::Error::other("poisoned"))?
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Hands out one scripted stream per connect, in order; refuses once exhausted.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    streams: Mutex<VecDeque<ScriptedStream>>,
    pub connects: AtomicUsize,
    pub written: Arc<Mutex<Vec<u8>>>,
}

impl ScriptedConnector {
    pub fn new(streams: impl IntoIterator<Item = ScriptedStream>) -> Self {
        Self {
            streams: Mutex::new(streams.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Connector whose streams each return one full raw response.
    pub fn responses<'a>(raw: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(raw.into_iter().map(ScriptedStream::response))
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn written_text(&self) -> String {
        let bytes = self.written.lock().map(|w| w.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Connect for ScriptedConnector {
    type Stream = ScriptedStream;

    async fn connect(&self) -> io::Result<ScriptedStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self
            .streams
            .lock()
            .map_err(|_| io::Error::other("poisoned"))?
            .pop_front();
        match next {
            Some(mut stream) => {
                stream.written = Arc::clone(&self.written);
                Ok(stream)
            }
            None => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "no scripted stream left",
            )),
        }
    }
}
