//! Ordered header storage.
//!
//! # Responsibilities
//! - Parse a raw CRLF-delimited header block (start line excluded)
//! - Case-insensitive lookup fallback
//! - Serialize back in insertion order
//!
//! # Design Decisions
//! - Backed by a `Vec` so wire order survives a parse/serialize cycle
//! - New names are stored lowercased; existing names keep their spelling
//! - No header folding or continuation lines

use crate::error::{ChainError, ChainResult};

/// Ordered mapping of header name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderStore {
    entries: Vec<(String, String)>,
}

impl HeaderStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw header block. The first line is the start line and is
    /// skipped; the caller parses it.
    pub fn parse(raw: &[u8]) -> ChainResult<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| ChainError::Parse(format!("header block is not UTF-8: {e}")))?;

        let mut store = Self::new();
        for line in text.split("\r\n").skip(1) {
            let (name, value) = line
                .split_once(": ")
                .ok_or_else(|| ChainError::Parse(format!("malformed header line: {line:?}")))?;
            store.insert_raw(name, value);
        }
        Ok(store)
    }

    /// Insert exactly as parsed; a repeated name overwrites the earlier value.
    fn insert_raw(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        let lower = name.to_lowercase();
        self.entries
            .iter()
            .position(|(k, _)| k == name)
            .or_else(|| self.entries.iter().position(|(k, _)| *k == lower))
            .or_else(|| {
                self.entries
                    .iter()
                    .position(|(k, _)| k.eq_ignore_ascii_case(name))
            })
    }

    /// Set a header. Overwrites an existing entry matched exactly, then by
    /// lowercased name; otherwise inserts under the lowercased name.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.position(name) {
            Some(idx) => self.entries[idx].1 = value,
            None => self.entries.push((name.to_lowercase(), value)),
        }
    }

    /// Delete the header stored under exactly `name`.
    pub fn remove(&mut self, name: &str) -> ChainResult<String> {
        let idx = self
            .entries
            .iter()
            .position(|(k, _)| k == name)
            .ok_or_else(|| ChainError::HeaderNotFound(name.to_string()))?;
        Ok(self.entries.remove(idx).1)
    }

    /// Look up a header: exact name, then lowercased name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.entries[idx].1.as_str())
    }

    /// Iterate headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize as `name: value` lines joined by CRLF, without a trailing CRLF.
    pub fn raw(&self) -> Vec<u8> {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\r\n")
            .trim()
            .as_bytes()
            .to_vec()
    }
}
