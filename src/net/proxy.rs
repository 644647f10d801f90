//! HTTP proxy support.
//!
//! # Responsibilities
//! - Establish a CONNECT tunnel for TLS targets
//! - Rewrite the request line to absolute-form for plain HTTP targets
//!
//! # Design Decisions
//! - Tunnel success is recognised solely by `200 Connection` in the status line
//! - Plain HTTP is proxied with a full-URL request line, never CONNECT

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{ChainError, ChainResult};
use crate::net::connection::Stream;

const TUNNEL_OK: &str = "200 Connection";

/// The CONNECT preamble sent to the proxy.
pub fn connect_request(host: &str, port: u16) -> String {
    format!(
        "CONNECT {host}:{port} HTTP/1.1\r\n\
         Host: {host}:{port}\r\n\
         Proxy-Connection: keep-alive\r\n\r\n"
    )
}

/// Ask the proxy to open a tunnel to `host:port` over `stream`.
pub async fn establish_tunnel<S>(
    stream: &mut S,
    host: &str,
    port: u16,
    timeout: Duration,
) -> ChainResult<()>
where
    S: Stream,
{
    stream.write_all(connect_request(host, port).as_bytes()).await?;

    let mut reply = Vec::new();
    let mut chunk = [0u8; 4096];
    while !contains(&reply, b"\r\n\r\n") {
        let n = match tokio::time::timeout(timeout, stream.read(&mut chunk)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ChainError::ProxyTunnel(format!(
                    "no reply to CONNECT {host}:{port} within {:.1}s",
                    timeout.as_secs_f64()
                )))
            }
        };
        if n == 0 {
            return Err(ChainError::ProxyTunnel(
                "proxy closed the connection during CONNECT".to_string(),
            ));
        }
        reply.extend_from_slice(&chunk[..n]);
    }

    let status_line = String::from_utf8_lossy(reply.split(|b| *b == b'\n').next().unwrap_or_default())
        .trim_end()
        .to_string();
    if !status_line.contains(TUNNEL_OK) {
        return Err(ChainError::ProxyTunnel(status_line));
    }

    tracing::debug!(target_host = %host, target_port = port, "CONNECT tunnel established");
    Ok(())
}

/// Rewrite `METHOD /path VERSION` into `METHOD http://host:port/path VERSION`.
pub fn absolute_form(raw: &[u8], host: &str, port: u16) -> ChainResult<Vec<u8>> {
    let line_end = raw
        .windows(2)
        .position(|w| w == b"\r\n")
        .ok_or_else(|| ChainError::Parse("request has no line terminator".to_string()))?;
    let line = std::str::from_utf8(&raw[..line_end])
        .map_err(|e| ChainError::Parse(format!("request line is not UTF-8: {e}")))?;

    let mut parts = line.splitn(3, ' ');
    let (Some(method), Some(path), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(ChainError::Parse(format!("malformed request line: {line:?}")));
    };

    let mut out = format!("{method} http://{host}:{port}{path} {version}").into_bytes();
    out.extend_from_slice(&raw[line_end..]);
    Ok(out)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
