//! Outgoing request model.
//!
//! # Responsibilities
//! - Parse raw request bytes into start line, headers and body
//! - Resolve target host/port ("auto" mode reads the `Host` header)
//! - Serialize back to wire bytes with a recomputed `Content-Length`
//! - Produce independent copies so a definition survives many runs
//!
//! # Design Decisions
//! - GET requests carry no body; their `Content-Length` is left untouched
//! - Per-request rules (TLS, timeout, import/export, events) are immutable
//!   and shared through an `Arc` between a definition and its copies
//! - Original request preserved; runs mutate a copy

use std::sync::Arc;
use std::time::Duration;

use crate::chain::event::Event;
use crate::config::schema::{ExportConfig, ImportConfig};
use crate::error::{ChainError, ChainResult};
use crate::http::body::Body;
use crate::http::header::HeaderStore;
use crate::http::response::Response;
use crate::http::{split_message, start_line};

/// Default per-request socket timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Keyword selecting host/port resolution from the `Host` header.
pub const AUTO: &str = "auto";

/// Immutable per-request behaviour attached to a request definition.
#[derive(Debug, Clone)]
pub struct RequestRules {
    /// Wrap the connection in TLS.
    pub use_tls: bool,
    /// Connect and per-read timeout.
    pub timeout: Duration,
    /// Templates rendered into the request before sending.
    pub import: Option<ImportConfig>,
    /// Values captured into the variable store after the exchange.
    pub export: Option<ExportConfig>,
    /// Response-inspection rules, in declaration order.
    pub events: Vec<Event>,
}

impl Default for RequestRules {
    fn default() -> Self {
        Self {
            use_tls: true,
            timeout: DEFAULT_TIMEOUT,
            import: None,
            export: None,
            events: Vec::new(),
        }
    }
}

/// A raw HTTP/1.x request plus the rules that drive its execution.
#[derive(Debug, Clone)]
pub struct Request {
    pub host: String,
    pub port: u16,
    pub method: String,
    pub path: String,
    pub version: String,
    pub headers: HeaderStore,
    /// Absent for GET requests.
    pub body: Option<Body>,
    pub rules: Arc<RequestRules>,
    /// Attached once the request has been sent.
    pub response: Option<Response>,
}

impl Request {
    /// Parse raw request bytes.
    ///
    /// `host` of `None`, empty or `"auto"` is taken from the `Host` header;
    /// `port` of `None` is taken from the `Host` header, else 443/80
    /// depending on `rules.use_tls`.
    pub fn parse(
        raw: &[u8],
        host: Option<&str>,
        port: Option<u16>,
        rules: Arc<RequestRules>,
    ) -> ChainResult<Self> {
        let (head, raw_body) = split_message(raw)?;
        let headers = HeaderStore::parse(head)?;

        let line = start_line(head)?;
        let mut parts = line.splitn(3, ' ');
        let (Some(method), Some(path), Some(version)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ChainError::Parse(format!("malformed request line: {line:?}")));
        };

        let host = match host {
            Some(h) if !h.is_empty() && h != AUTO => h.to_string(),
            _ => {
                let host_header = required_host_header(&headers)?;
                host_header.split(':').next().unwrap_or_default().to_string()
            }
        };

        let port = match port {
            Some(p) => p,
            None => {
                let host_header = required_host_header(&headers)?;
                let pieces: Vec<&str> = host_header.split(':').collect();
                if pieces.len() == 2 {
                    pieces[1].trim().parse::<u16>().map_err(|_| {
                        ChainError::Parse(format!("invalid port in Host header: {host_header:?}"))
                    })?
                } else if rules.use_tls {
                    443
                } else {
                    80
                }
            }
        };

        let body = if method.eq_ignore_ascii_case("get") {
            None
        } else {
            Some(Body::new(raw_body, headers.get("Content-Type")))
        };

        Ok(Self {
            host,
            port,
            method: method.to_string(),
            path: path.to_string(),
            version: version.to_string(),
            headers,
            body,
            rules,
            response: None,
        })
    }

    pub fn add_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.add(name, value);
    }

    pub fn remove_header(&mut self, name: &str) -> ChainResult<String> {
        self.headers.remove(name)
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// `METHOD PATH VERSION`.
    pub fn request_line(&self) -> String {
        format!("{} {} {}", self.method, self.path, self.version)
    }

    /// Bring `Content-Length` in line with the current body.
    pub fn update_content_length(&mut self) {
        if let Some(body) = &self.body {
            let len = body.len().to_string();
            self.headers.add("Content-Length", len);
        }
    }

    /// Serialize to wire bytes, recomputing `Content-Length` from the body.
    pub fn raw(&self) -> Vec<u8> {
        let mut headers = self.headers.clone();
        if let Some(body) = &self.body {
            headers.add("Content-Length", body.len().to_string());
        }

        let mut out = self.request_line().into_bytes();
        out.extend_from_slice(b"\r\n");
        if !headers.is_empty() {
            out.extend_from_slice(&headers.raw());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        if let Some(body) = &self.body {
            out.extend_from_slice(body.raw());
        }
        out
    }

    /// Build an independent request by re-parsing the serialized form with
    /// the same resolved target and rules. The response is not carried over.
    pub fn copy(&self) -> ChainResult<Self> {
        Self::parse(
            &self.raw(),
            Some(&self.host),
            Some(self.port),
            Arc::clone(&self.rules),
        )
    }
}

fn required_host_header(headers: &HeaderStore) -> ChainResult<&str> {
    headers
        .get("Host")
        .ok_or_else(|| ChainError::Parse("auto host/port requires a Host header".to_string()))
}
