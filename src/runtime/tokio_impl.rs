//! Tokio runtime implementation.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket as TokioUdpSocket;

use super::{AsyncUdpSocket, TimedOut};

/// Tokio-based UDP socket.
pub struct UdpSocket(TokioUdpSocket);

impl AsyncUdpSocket for UdpSocket {
    async fn bind(addr: &str) -> io::Result<Self> {
        TokioUdpSocket::bind(addr).await.map(UdpSocket)
    }

    async fn send_to(&self, buf: &[u8], addr: &str) -> io::Result<usize> {
        self.0.send_to(buf, addr).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.0.recv_from(buf).await
    }
}

/// Internal instant type for tokio. Follows paused test time.
#[derive(Debug, Clone, Copy)]
pub struct InstantInner(tokio::time::Instant);

impl InstantInner {
    pub fn now() -> Self {
        InstantInner(tokio::time::Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Sleep for the specified duration using tokio.
pub async fn sleep_impl(duration: Duration) {
    tokio::time::sleep(duration).await
}

/// Run a future with a timeout using tokio.
pub async fn timeout_impl<F, T>(duration: Duration, future: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimedOut)
}
