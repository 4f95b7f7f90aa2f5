//! Plain HTTP request forwarding
//!
//! Owns the non-CONNECT path: reconstructs the absolute target, resolves the
//! authority, opens a backend connection, emits the rewritten request and
//! relays the response back. Failures on the way to the backend never leave
//! this module as errors; the client gets a synthetic gateway error response
//! instead.

use super::{response, url, RequestHead};
use crate::common::headers::{header_value, is_hop_by_hop};
use crate::common::net::{configure_tcp_stream, Endpoint};
use crate::resolver::Resolve;
use crate::{Error, Result};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

const GATEWAY_ERROR_BODY: &str = "<H1>Could not connect</H1>";

/// Forward one plain request and write the response to the client.
///
/// Returns an error only for client-side IO failures; backend failures are
/// converted into a 501 response.
pub(crate) async fn forward<C>(
    resolver: &dyn Resolve,
    server_name: &str,
    head: &RequestHead,
    client: &mut C,
) -> Result<()>
where
    C: AsyncBufRead + AsyncWrite + Unpin,
{
    let body = read_request_body(head, client).await?;

    let mut backend = match open_backend(resolver, server_name, head, body.as_deref()).await {
        Ok(backend) => backend,
        Err(e) => {
            warn!("{} {} failed: {}", head.method, head.target, e);
            return write_gateway_error(client).await;
        }
    };

    let (response_head, leftover) = match response::read_head(&mut backend).await {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("{} {} failed: {}", head.method, head.target, e);
            return write_gateway_error(client).await;
        }
    };

    // Once the status line has been relayed the exchange is committed; a
    // relay failure just ends the connection early.
    match response::relay(&response_head, leftover, &mut backend, client).await {
        Ok(written) => debug!(
            "{} {} -> {} ({} body bytes)",
            head.method, head.target, response_head.status_code, written
        ),
        Err(e) => debug!("{} {} relay ended early: {}", head.method, head.target, e),
    }

    Ok(())
}

/// Resolve the target, connect and send the rewritten request
async fn open_backend(
    resolver: &dyn Resolve,
    server_name: &str,
    head: &RequestHead,
    body: Option<&[u8]>,
) -> Result<TcpStream> {
    let (raw_path, query) = match head.target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (head.target.as_str(), None),
    };
    let host = header_value(&head.headers, "host").unwrap_or("");
    let target = url::reconstruct(raw_path, "http", host, query)?;

    let endpoint = Endpoint::parse(&target.authority, 80)
        .map_err(|e| Error::target(e.to_string()))?;
    let endpoint = resolver.resolve(&endpoint).await?;

    let mut backend = TcpStream::connect(endpoint.to_string())
        .await
        .map_err(|e| Error::unreachable(format!("{}: {}", endpoint, e)))?;
    configure_tcp_stream(&backend);

    debug!("{} {} -> {}", head.method, target.path, endpoint);

    let headers = build_outbound_headers(&head.headers, server_name, body.map(<[u8]>::len));
    let mut request = format!("{} {} HTTP/1.1\r\n", head.method, target.path);
    for (name, value) in &headers {
        request.push_str(name);
        request.push_str(": ");
        request.push_str(value);
        request.push_str("\r\n");
    }
    request.push_str("connection: close\r\n\r\n");

    backend
        .write_all(request.as_bytes())
        .await
        .map_err(|e| Error::backend(e.to_string()))?;
    if let Some(body) = body {
        backend
            .write_all(body)
            .await
            .map_err(|e| Error::backend(e.to_string()))?;
    }

    Ok(backend)
}

/// Build the outbound header list: hop-by-hop headers dropped, names
/// lower-cased, `host` defaulted and `content-length` re-emitted from the
/// body actually read.
pub(crate) fn build_outbound_headers(
    headers: &[(String, String)],
    server_name: &str,
    body_len: Option<usize>,
) -> Vec<(String, String)> {
    let mut out = Vec::with_capacity(headers.len() + 2);
    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        if is_hop_by_hop(&name) || name == "content-length" {
            continue;
        }
        out.push((name, value.clone()));
    }

    if header_value(&out, "host").is_none() {
        out.push(("host".to_string(), server_name.to_string()));
    }
    if let Some(len) = body_len {
        out.push(("content-length".to_string(), len.to_string()));
    }

    out
}

/// Read the request body when a parseable Content-Length is present.
///
/// Bodies without one (including chunked uploads) are treated as absent.
async fn read_request_body<C>(head: &RequestHead, client: &mut C) -> Result<Option<Vec<u8>>>
where
    C: AsyncRead + Unpin,
{
    let length = match header_value(&head.headers, "content-length")
        .and_then(|value| value.parse::<usize>().ok())
    {
        Some(length) => length,
        None => return Ok(None),
    };

    let mut body = vec![0u8; length];
    client.read_exact(&mut body).await?;
    Ok(Some(body))
}

async fn write_gateway_error<W: AsyncWrite + Unpin>(client: &mut W) -> Result<()> {
    let response = format!(
        "HTTP/1.1 501 Gateway Error\r\n\
         Content-Type: text/html\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n\
         {}",
        GATEWAY_ERROR_BODY.len(),
        GATEWAY_ERROR_BODY
    );
    client.write_all(response.as_bytes()).await?;
    client.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_outbound_headers_strip_hop_by_hop() {
        let out = build_outbound_headers(
            &headers(&[("connection", "keep-alive"), ("x-custom", "v")]),
            "proxy.local",
            None,
        );
        assert_eq!(header_value(&out, "x-custom"), Some("v"));
        assert_eq!(header_value(&out, "connection"), None);
    }

    #[test]
    fn test_outbound_headers_default_host() {
        let out = build_outbound_headers(&headers(&[("accept", "*/*")]), "proxy.local", None);
        assert_eq!(header_value(&out, "host"), Some("proxy.local"));

        let out = build_outbound_headers(
            &headers(&[("host", "example.com")]),
            "proxy.local",
            None,
        );
        assert_eq!(header_value(&out, "host"), Some("example.com"));
    }

    #[test]
    fn test_outbound_headers_reemit_content_length() {
        let out = build_outbound_headers(
            &headers(&[("content-length", "999")]),
            "proxy.local",
            Some(4),
        );
        assert_eq!(header_value(&out, "content-length"), Some("4"));

        let out = build_outbound_headers(&headers(&[("content-length", "bogus")]), "p", None);
        assert_eq!(header_value(&out, "content-length"), None);
    }
}
