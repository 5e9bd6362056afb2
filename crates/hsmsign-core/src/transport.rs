//! Channel establishment: one fresh duplex byte stream per exchange attempt.

use crate::endpoint::{Endpoint, EndpointAddress};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

/// Opens channels to the HSM.
///
/// Connectors and their streams are `Send` so a client can be shared across
/// tasks of a multi-threaded runtime.
pub trait Connect: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    fn connect(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Connects to whatever an [`Endpoint`] names: a Unix socket or a TCP address.
#[derive(Debug, Clone)]
pub struct EndpointConnector {
    address: EndpointAddress,
}

impl EndpointConnector {
    pub fn new(endpoint: &Endpoint) -> Self {
        Self {
            address: endpoint.address().clone(),
        }
    }
}

impl Connect for EndpointConnector {
    type Stream = EndpointStream;

    async fn connect(&self) -> io::Result<EndpointStream> {
        match &self.address {
            EndpointAddress::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                stream.set_nodelay(true)?;
                Ok(EndpointStream::Tcp(stream))
            }
            #[cfg(unix)]
            EndpointAddress::Unix(path) => Ok(EndpointStream::Unix(UnixStream::connect(path).await?)),
            #[cfg(not(unix))]
            EndpointAddress::Unix(path) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unix sockets are not supported here: {}", path.display()),
            )),
        }
    }
}

/// Stream returned by [`EndpointConnector`].
#[derive(Debug)]
pub enum EndpointStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl AsyncRead for EndpointStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            EndpointStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            EndpointStream::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for EndpointStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            EndpointStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            EndpointStream::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            EndpointStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            EndpointStream::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            EndpointStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            EndpointStream::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
