//! Proxy engine: request translation and dispatch
//!
//! One engine instance serves all connections. A connection is parsed into a
//! request head here; CONNECT requests go to the tunnel forwarder, everything
//! else to the request forwarder.

mod forward;
mod response;
mod tunnel;
mod url;

pub use response::ResponseHead;
pub use url::{reconstruct, Target};

use crate::resolver::Resolve;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tracing::debug;

/// Parsed request line and headers of an inbound request
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: String,
    /// Request target: absolute URL, origin-form path, or `host:port` for CONNECT
    pub target: String,
    pub version: String,
    /// Header names lower-cased, order received
    pub headers: Vec<(String, String)>,
}

/// The proxy engine
pub struct ProxyEngine {
    resolver: Arc<dyn Resolve>,
    server_name: String,
}

impl ProxyEngine {
    pub fn new(resolver: Arc<dyn Resolve>, server_name: String) -> Self {
        ProxyEngine {
            resolver,
            server_name,
        }
    }

    /// Serve one client connection end to end
    pub async fn serve_connection<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut reader = BufReader::new(stream);
        let head = read_request_head(&mut reader).await?;
        debug!("{} {}", head.method, head.target);

        if head.method == "CONNECT" {
            // The client sends nothing until the establishment response, so
            // the buffer is empty and the raw stream can be taken back.
            tunnel::tunnel(self.resolver.as_ref(), &head.target, reader.into_inner()).await
        } else {
            forward::forward(self.resolver.as_ref(), &self.server_name, &head, &mut reader).await
        }
    }
}

/// Read the request line and headers
pub async fn read_request_head<R>(reader: &mut R) -> Result<RequestHead>
where
    R: AsyncBufRead + Unpin,
{
    let mut first_line = String::new();
    reader.read_line(&mut first_line).await?;
    let first_line = first_line.trim();

    if first_line.is_empty() {
        return Err(Error::protocol("Empty request"));
    }

    // Request line: METHOD TARGET HTTP/VERSION
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(Error::protocol("Invalid HTTP request line"));
    }
    let method = parts[0].to_string();
    let target = parts[1].to_string();
    let version = parts[2].to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let line = line.trim();

        if line.is_empty() {
            break;
        }

        if let Some(colon) = line.find(':') {
            let name = line[..colon].trim().to_lowercase();
            let value = line[colon + 1..].trim().to_string();
            headers.push((name, value));
        }
    }

    Ok(RequestHead {
        method,
        target,
        version,
        headers,
    })
}
