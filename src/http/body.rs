//! Message body storage and content-type aware field access.
//!
//! # Responsibilities
//! - Keep the body as decoded text, or raw bytes when it is not UTF-8
//! - Classify the content type once, at construction
//! - Structured get/set for JSON bodies
//!
//! # Design Decisions
//! - A declared `Content-Type` wins unless it is octet-stream, in which case
//!   the body is sniffed: JSON, then XML, then form
//! - Other declared types are kept opaque and get no structured access
//! - Field access on non-JSON bodies is a no-op reported as unsupported
//! - JSON rewrites are re-serialized compactly

use std::fmt;

use serde_json::Value;

use crate::error::{ChainError, ChainResult};
use crate::http::json_path::JsonPath;

/// Content classification of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    FormUrlEncoded,
    Json,
    Xml,
    OctetStream,
}

impl ContentType {
    /// Canonical MIME type string.
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::FormUrlEncoded => "application/x-www-form-urlencoded",
            ContentType::Json => "application/json",
            ContentType::Xml => "application/xml",
            ContentType::OctetStream => "application/octet-stream",
        }
    }

    /// Map a declared header value (parameters after `;` ignored).
    /// Returns `None` when the body has to be sniffed instead; unrecognized
    /// types are treated as opaque bytes.
    fn from_declared(declared: &str) -> Option<Self> {
        let mime = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/x-www-form-urlencoded" => Some(ContentType::FormUrlEncoded),
            "application/json" => Some(ContentType::Json),
            "application/xml" | "text/xml" => Some(ContentType::Xml),
            m if m.ends_with("+json") => Some(ContentType::Json),
            m if m.ends_with("+xml") => Some(ContentType::Xml),
            "application/octet-stream" => None,
            _ => Some(ContentType::OctetStream),
        }
    }

    fn sniff(payload: &Payload) -> Self {
        match payload {
            Payload::Text(text) => {
                if serde_json::from_str::<Value>(text).is_ok() {
                    ContentType::Json
                } else if roxmltree::Document::parse(text).is_ok() {
                    ContentType::Xml
                } else {
                    ContentType::FormUrlEncoded
                }
            }
            Payload::Binary(_) => ContentType::OctetStream,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

/// A message body with its content classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    payload: Payload,
    content_type: ContentType,
}

impl Body {
    /// Build a body from raw bytes and an optional declared content type.
    pub fn new(raw: &[u8], declared: Option<&str>) -> Self {
        let payload = match std::str::from_utf8(raw) {
            Ok(text) => Payload::Text(text.trim().to_string()),
            Err(_) => Payload::Binary(raw.to_vec()),
        };
        let content_type = declared
            .and_then(ContentType::from_declared)
            .unwrap_or_else(|| ContentType::sniff(&payload));
        Self {
            payload,
            content_type,
        }
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Decoded text, if the body was valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }

    /// Evaluate `path` against a JSON body.
    ///
    /// Returns `Ok(None)` for non-JSON bodies and for JSON bodies that fail
    /// to parse; otherwise every match in order (possibly none).
    pub fn get(&self, path: &JsonPath) -> ChainResult<Option<Vec<Value>>> {
        match self.content_type {
            ContentType::Json => match self.parse_json() {
                Some(doc) => path.query(&doc).map(Some),
                None => Ok(None),
            },
            ContentType::FormUrlEncoded | ContentType::Xml | ContentType::OctetStream => Ok(None),
        }
    }

    /// Set the value at `path` to the string `value` in a JSON body.
    ///
    /// Returns `Ok(false)` when the body is not JSON (or not parseable) and
    /// nothing was changed.
    pub fn add(&mut self, path: &JsonPath, value: &str) -> ChainResult<bool> {
        match self.content_type {
            ContentType::Json => {
                let Some(mut doc) = self.parse_json() else {
                    return Ok(false);
                };
                path.set(&mut doc, &Value::String(value.to_string()))?;
                let compact = serde_json::to_string(&doc)
                    .map_err(|e| ChainError::JsonPath(e.to_string()))?;
                self.payload = Payload::Text(compact);
                Ok(true)
            }
            ContentType::FormUrlEncoded | ContentType::Xml | ContentType::OctetStream => Ok(false),
        }
    }

    fn parse_json(&self) -> Option<Value> {
        match &self.payload {
            Payload::Text(text) => serde_json::from_str(text).ok(),
            Payload::Binary(bytes) => serde_json::from_slice(bytes).ok(),
        }
    }

    /// Bytes as they go on the wire.
    pub fn raw(&self) -> &[u8] {
        match &self.payload {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.raw().len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw().is_empty()
    }
}
