//! HTTP message model.
//!
//! # Data Flow
//! ```text
//! raw request bytes (from disk)
//!     → request.rs (start line, host/port resolution)
//!         → header.rs (ordered header store)
//!         → body.rs (content type, JSON field access via json_path.rs)
//!     → raw() with recomputed Content-Length → transport
//!
//! raw response bytes (from transport)
//!     → response.rs (status line, headers, body)
//! ```

pub mod body;
pub mod header;
pub mod json_path;
pub mod request;
pub mod response;

pub use body::{Body, ContentType};
pub use header::HeaderStore;
pub use json_path::JsonPath;
pub use request::{Request, RequestRules};
pub use response::Response;

use crate::error::{ChainError, ChainResult};

const SEPARATOR: &[u8] = b"\r\n\r\n";

/// Split a raw message at the first blank line into header block and body.
pub(crate) fn split_message(raw: &[u8]) -> ChainResult<(&[u8], &[u8])> {
    raw.windows(SEPARATOR.len())
        .position(|w| w == SEPARATOR)
        .map(|idx| (&raw[..idx], &raw[idx + SEPARATOR.len()..]))
        .ok_or_else(|| ChainError::Parse("missing CRLFCRLF header terminator".to_string()))
}

/// First line of a header block.
pub(crate) fn start_line(head: &[u8]) -> ChainResult<&str> {
    let end = head
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(head.len());
    std::str::from_utf8(&head[..end])
        .map_err(|e| ChainError::Parse(format!("start line is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_message() {
        let (head, body) = split_message(b"A\r\nB: c\r\n\r\nbody\r\n\r\nmore").unwrap();
        assert_eq!(head, b"A\r\nB: c");
        assert_eq!(body, b"body\r\n\r\nmore");
        assert!(split_message(b"A\r\nB: c\r\n").is_err());
    }

    #[test]
    fn test_start_line() {
        assert_eq!(start_line(b"GET / HTTP/1.1\r\nHost: x").unwrap(), "GET / HTTP/1.1");
        assert_eq!(start_line(b"HTTP/1.1 200 OK").unwrap(), "HTTP/1.1 200 OK");
    }
}
