//! CONNECT tunneling
//!
//! A CONNECT request asks for an opaque byte stream to `host:port`. The
//! backend connection is dialed through the resolver like any other request;
//! after the establishment response the proxy only moves bytes.

use crate::common::net::{configure_tcp_stream, relay_bidirectional, Endpoint};
use crate::resolver::Resolve;
use crate::{Error, Result};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Establish a tunnel to `target` and relay until either side closes.
///
/// A failed resolve or connect propagates without writing an HTTP response;
/// the CONNECT handshake has not completed, so the caller just drops the
/// client connection.
pub(crate) async fn tunnel<C>(resolver: &dyn Resolve, target: &str, mut client: C) -> Result<()>
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let endpoint = Endpoint::parse(target, 80).map_err(|e| Error::target(e.to_string()))?;
    let endpoint = resolver.resolve(&endpoint).await?;

    let backend = TcpStream::connect(endpoint.to_string())
        .await
        .map_err(|e| Error::unreachable(format!("{}: {}", endpoint, e)))?;
    configure_tcp_stream(&backend);

    client
        .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
        .await?;
    client.flush().await?;

    debug!("tunnel established to {}", endpoint);
    let (sent, received) = relay_bidirectional(client, backend).await;
    debug!(
        "tunnel to {} closed (sent: {}, received: {})",
        endpoint, sent, received
    );

    Ok(())
}
