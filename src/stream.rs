use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// A TCP socket, optionally overlayed with a TLS session. Both variants are
/// `Unpin` (`TcpStream` and `tokio_rustls`'s `TlsStream` both are), so the
/// enum itself is `Unpin` and the `AsyncRead`/`AsyncWrite` impls below can
/// project through it without pinning machinery.
pub enum SocketFlowStream {
    Plain(TcpStream),
    Secure(TlsStream<TcpStream>),
}

impl SocketFlowStream {
    pub fn peer_addr(&self) -> io::Result<std::net::SocketAddr> {
        match self {
            SocketFlowStream::Plain(stream) => stream.peer_addr(),
            SocketFlowStream::Secure(stream) => stream.get_ref().0.peer_addr(),
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, SocketFlowStream::Secure(_))
    }
}

impl AsyncRead for SocketFlowStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SocketFlowStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            SocketFlowStream::Secure(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SocketFlowStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            SocketFlowStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            SocketFlowStream::Secure(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SocketFlowStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            SocketFlowStream::Secure(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SocketFlowStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            SocketFlowStream::Secure(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
