//! Response model.
//!
//! Built once per socket round-trip and never mutated afterwards. No
//! chunked-transfer decoding: the body is whatever followed the blank line.

use crate::error::{ChainError, ChainResult};
use crate::http::body::Body;
use crate::http::header::HeaderStore;
use crate::http::{split_message, start_line};

/// A parsed HTTP/1.x response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: String,
    /// Status code exactly as it appeared on the wire.
    pub status: String,
    pub reason: String,
    pub headers: HeaderStore,
    pub body: Body,
}

impl Response {
    pub fn parse(raw: &[u8]) -> ChainResult<Self> {
        let (head, raw_body) = split_message(raw)?;
        let headers = HeaderStore::parse(head)?;

        let line = start_line(head)?;
        let mut parts = line.splitn(3, ' ');
        let (Some(version), Some(status)) = (parts.next(), parts.next()) else {
            return Err(ChainError::Parse(format!("malformed status line: {line:?}")));
        };
        let reason = parts.next().unwrap_or_default();

        let body = Body::new(raw_body, headers.get("Content-Type"));
        Ok(Self {
            version: version.to_string(),
            status: status.to_string(),
            reason: reason.to_string(),
            headers,
            body,
        })
    }

    /// Numeric status code, when the status token is a valid number.
    pub fn status_code(&self) -> Option<u16> {
        self.status.parse().ok()
    }
}
