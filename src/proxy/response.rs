//! Backend response parsing and relay
//!
//! Reads the backend's status line and headers into a bounded buffer, strips
//! hop-by-hop headers, canonicalizes the rest and streams the body to the
//! client in fixed-size chunks. Chunked bodies are decoded here: the chunked
//! framing is connection-scoped, its header never crosses the proxy, and the
//! relayed connection is close-delimited.

use crate::common::headers::{canonicalize, is_hop_by_hop};
use crate::common::net::RELAY_BUF_SIZE;
use crate::{Error, Result};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Maximum response head size (32KB)
const MAX_RESPONSE_HEAD_SIZE: usize = 32 * 1024;

/// Parsed backend status line and headers
#[derive(Debug)]
pub struct ResponseHead {
    pub status_code: u16,
    pub reason: String,
    /// Header names lower-cased, order received
    pub headers: Vec<(String, String)>,
    pub content_length: Option<u64>,
    pub chunked: bool,
}

/// Read and parse the backend's status line and headers.
///
/// Returns the head plus any body bytes read past it.
pub async fn read_head<R>(backend: &mut R) -> Result<(ResponseHead, BytesMut)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(8 * 1024);

    let head_end = loop {
        if let Some(end) = find_head_end(&buf) {
            break end;
        }
        if buf.len() >= MAX_RESPONSE_HEAD_SIZE {
            return Err(Error::backend("Response head too large"));
        }
        let mut tmp = [0u8; RELAY_BUF_SIZE];
        let n = backend
            .read(&mut tmp)
            .await
            .map_err(|e| Error::backend(e.to_string()))?;
        if n == 0 {
            return Err(Error::backend("Connection closed before response head"));
        }
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = parse_head(&buf[..head_end])?;
    let leftover = buf.split_off(head_end + 4);

    trace!(
        "response: status={}, content_length={:?}, chunked={}",
        head.status_code,
        head.content_length,
        head.chunked
    );

    Ok((head, leftover))
}

fn parse_head(raw: &[u8]) -> Result<ResponseHead> {
    let text = std::str::from_utf8(raw).map_err(|_| Error::backend("Response head not UTF-8"))?;
    let mut lines = text.lines();

    // Status line: HTTP/1.1 200 OK
    let status_line = lines
        .next()
        .ok_or_else(|| Error::backend("Missing status line"))?;
    let mut parts = status_line.splitn(3, ' ');
    let _version = parts
        .next()
        .ok_or_else(|| Error::backend("Missing HTTP version"))?;
    let status_code: u16 = parts
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| Error::backend(format!("Bad status line: '{}'", status_line)))?;
    let reason = parts.next().unwrap_or("").to_string();

    let mut headers = Vec::new();
    let mut content_length = None;
    let mut chunked = false;

    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name.trim().to_lowercase(), value.trim().to_string()),
            None => continue,
        };
        if name == "content-length" {
            content_length = value.parse().ok();
        } else if name == "transfer-encoding" {
            chunked = value.eq_ignore_ascii_case("chunked");
        }
        headers.push((name, value));
    }

    // Responses without body: 1xx, 204, 304
    if status_code < 200 || status_code == 204 || status_code == 304 {
        content_length = Some(0);
    }

    Ok(ResponseHead {
        status_code,
        reason,
        headers,
        content_length,
        chunked,
    })
}

/// Find \r\n\r\n in buffer, returns index of first \r
fn find_head_end(buf: &[u8]) -> Option<usize> {
    if buf.len() < 4 {
        return None;
    }
    (0..buf.len() - 3)
        .find(|&i| &buf[i..i + 4] == b"\r\n\r\n")
}

/// Relay the response head and body to the client.
///
/// Hop-by-hop headers are dropped, the rest are re-emitted with canonical
/// casing. Returns the number of body bytes written.
pub async fn relay<R, W>(
    head: &ResponseHead,
    leftover: BytesMut,
    backend: &mut R,
    client: &mut W,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut out = format!("HTTP/1.1 {} {}\r\n", head.status_code, head.reason);
    for (name, value) in &head.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        out.push_str(&canonicalize(name));
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\r\n");
    }
    out.push_str("Connection: close\r\n\r\n");
    client.write_all(out.as_bytes()).await?;

    let written = if let Some(length) = head.content_length {
        relay_fixed_body(backend, client, leftover, length).await?
    } else if head.chunked {
        relay_chunked_body(backend, client, leftover).await?
    } else {
        relay_until_eof(backend, client, &leftover).await?
    };

    client.flush().await?;
    Ok(written)
}

/// Copy exactly `length` body bytes
async fn relay_fixed_body<R, W>(
    backend: &mut R,
    client: &mut W,
    leftover: BytesMut,
    length: u64,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut remaining = length;

    let buffered = std::cmp::min(leftover.len() as u64, remaining) as usize;
    if buffered > 0 {
        client.write_all(&leftover[..buffered]).await?;
        remaining -= buffered as u64;
    }

    let mut buf = [0u8; RELAY_BUF_SIZE];
    while remaining > 0 {
        let want = std::cmp::min(buf.len() as u64, remaining) as usize;
        let n = backend
            .read(&mut buf[..want])
            .await
            .map_err(|e| Error::backend(e.to_string()))?;
        if n == 0 {
            return Err(Error::backend("Connection closed before body complete"));
        }
        client.write_all(&buf[..n]).await?;
        remaining -= n as u64;
    }

    Ok(length - remaining)
}

/// Decode a chunked body and relay the data bytes only
async fn relay_chunked_body<R, W>(
    backend: &mut R,
    client: &mut W,
    mut buf: BytesMut,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    loop {
        // Chunk size line, hex, possibly followed by extensions
        let line_end = loop {
            match find_line_end(&buf) {
                Some(end) => break end,
                None => fill(backend, &mut buf).await?,
            }
        };
        let size_line = std::str::from_utf8(&buf[..line_end])
            .map_err(|_| Error::backend("Invalid chunk header"))?;
        let size_str = size_line.split(';').next().unwrap_or(size_line).trim();
        let chunk_size = u64::from_str_radix(size_str, 16)
            .map_err(|_| Error::backend(format!("Invalid chunk size: '{}'", size_str)))?;
        let _ = buf.split_to(line_end + 2);

        if chunk_size == 0 {
            // Trailers, if any, are hop-by-hop and end at the final CRLF
            break;
        }

        // Chunk data, from the buffer first, then from the socket
        let mut remaining = chunk_size;
        let buffered = std::cmp::min(buf.len() as u64, remaining) as usize;
        if buffered > 0 {
            client.write_all(&buf[..buffered]).await?;
            let _ = buf.split_to(buffered);
            remaining -= buffered as u64;
            written += buffered as u64;
        }
        let mut tmp = [0u8; RELAY_BUF_SIZE];
        while remaining > 0 {
            let want = std::cmp::min(tmp.len() as u64, remaining) as usize;
            let n = backend
                .read(&mut tmp[..want])
                .await
                .map_err(|e| Error::backend(e.to_string()))?;
            if n == 0 {
                return Err(Error::backend("Connection closed in chunk data"));
            }
            client.write_all(&tmp[..n]).await?;
            remaining -= n as u64;
            written += n as u64;
        }

        // CRLF after the chunk data
        while buf.len() < 2 {
            fill(backend, &mut buf).await?;
        }
        let _ = buf.split_to(2);
    }

    Ok(written)
}

/// Copy body bytes until the backend closes the connection
async fn relay_until_eof<R, W>(backend: &mut R, client: &mut W, leftover: &[u8]) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    if !leftover.is_empty() {
        client.write_all(leftover).await?;
        written += leftover.len() as u64;
    }

    let mut buf = [0u8; RELAY_BUF_SIZE];
    loop {
        let n = backend
            .read(&mut buf)
            .await
            .map_err(|e| Error::backend(e.to_string()))?;
        if n == 0 {
            break;
        }
        client.write_all(&buf[..n]).await?;
        written += n as u64;
    }

    Ok(written)
}

async fn fill<R: AsyncRead + Unpin>(backend: &mut R, buf: &mut BytesMut) -> Result<()> {
    let mut tmp = [0u8; RELAY_BUF_SIZE];
    let n = backend
        .read(&mut tmp)
        .await
        .map_err(|e| Error::backend(e.to_string()))?;
    if n == 0 {
        return Err(Error::backend("Connection closed in chunked body"));
    }
    buf.extend_from_slice(&tmp[..n]);
    Ok(())
}

fn find_line_end(buf: &[u8]) -> Option<usize> {
    (0..buf.len().saturating_sub(1)).find(|&i| buf[i] == b'\r' && buf[i + 1] == b'\n')
}
