//! Network utilities

use crate::{Error, Result};
use socket2::SockRef;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;

/// Buffer size for relay copy loops and body streaming
pub const RELAY_BUF_SIZE: usize = 4096;

#[inline]
pub fn configure_tcp_stream(stream: &TcpStream) {
    let _ = stream.set_nodelay(true);
    let sock = SockRef::from(stream);
    let _ = sock.set_keepalive(true);
}

/// A connectable `host:port` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
        }
    }

    /// Parse `host[:port]`, falling back to `default_port` when no port is given
    pub fn parse(authority: &str, default_port: u16) -> Result<Self> {
        if authority.is_empty() {
            return Err(Error::parse("Empty authority"));
        }
        // Bracketed IPv6 literal without a port
        if authority.ends_with(']') {
            return Ok(Endpoint::new(authority, default_port));
        }
        match authority.rfind(':') {
            Some(idx) => {
                let port = authority[idx + 1..]
                    .parse()
                    .map_err(|_| Error::parse(format!("Invalid port in '{}'", authority)))?;
                Ok(Endpoint::new(&authority[..idx], port))
            }
            None => Ok(Endpoint::new(authority, default_port)),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

async fn pump<S, D>(mut src: ReadHalf<S>, mut dst: WriteHalf<D>, copied: Arc<AtomicU64>)
where
    S: AsyncRead,
    D: AsyncWrite,
{
    let mut buf = [0u8; RELAY_BUF_SIZE];
    loop {
        let n = match src.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if dst.write_all(&buf[..n]).await.is_err() {
            break;
        }
        copied.fetch_add(n as u64, Ordering::Relaxed);
    }
    let _ = dst.shutdown().await;
}

/// Copy data between two streams bidirectionally until either side closes.
///
/// Each direction runs as its own task with a fixed-size buffer; a direction
/// ends on a zero-length read or any read/write error. The first direction to
/// stop tears down the whole session: the peer task is aborted, which drops
/// its socket halves, so both sockets close and a blocked read is released.
/// Returns the byte counts copied client-to-backend and backend-to-client.
pub async fn relay_bidirectional<A, B>(client: A, backend: B) -> (u64, u64)
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_read, client_write) = io::split(client);
    let (backend_read, backend_write) = io::split(backend);

    let sent = Arc::new(AtomicU64::new(0));
    let received = Arc::new(AtomicU64::new(0));

    let mut up = tokio::spawn(pump(client_read, backend_write, sent.clone()));
    let mut down = tokio::spawn(pump(backend_read, client_write, received.clone()));

    tokio::select! {
        _ = &mut up => {
            down.abort();
            let _ = down.await;
        }
        _ = &mut down => {
            up.abort();
            let _ = up.await;
        }
    }

    (sent.load(Ordering::Relaxed), received.load(Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_endpoint_parse() {
        let ep = Endpoint::parse("example.com:443", 80).unwrap();
        assert_eq!(ep, Endpoint::new("example.com", 443));

        let ep = Endpoint::parse("example.com", 80).unwrap();
        assert_eq!(ep, Endpoint::new("example.com", 80));
        assert_eq!(ep.to_string(), "example.com:80");

        assert!(Endpoint::parse("example.com:http", 80).is_err());
        assert!(Endpoint::parse("", 80).is_err());
    }

    #[tokio::test]
    async fn test_relay_copies_both_directions() {
        let (mut client, client_far) = io::duplex(64);
        let (mut backend, backend_far) = io::duplex(64);

        let relay = tokio::spawn(relay_bidirectional(client_far, backend_far));

        client.write_all(b"hello backend").await.unwrap();
        let mut buf = [0u8; 13];
        backend.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello backend");

        backend.write_all(b"hello client").await.unwrap();
        let mut buf = [0u8; 12];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello client");

        drop(client);
        let (sent, received) = tokio::time::timeout(Duration::from_secs(5), relay)
            .await
            .expect("relay did not terminate")
            .unwrap();
        assert_eq!(sent, 13);
        assert_eq!(received, 12);
    }

    #[tokio::test]
    async fn test_relay_closes_peer_when_one_side_drops() {
        let (client, client_far) = io::duplex(64);
        let (mut backend, backend_far) = io::duplex(64);

        let relay = tokio::spawn(relay_bidirectional(client_far, backend_far));
        drop(client);

        tokio::time::timeout(Duration::from_secs(5), relay)
            .await
            .expect("relay did not terminate")
            .unwrap();

        // Backend side must observe end-of-stream once the client is gone
        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(Duration::from_secs(5), backend.read(&mut buf))
            .await
            .expect("backend read did not unblock")
            .unwrap();
        assert_eq!(n, 0);
    }
}
