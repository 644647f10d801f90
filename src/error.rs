//! Error taxonomy for message parsing, transport and chain execution.
//!
//! # Design Decisions
//! - Parse and transport failures abort the current run
//! - Chain-engine configuration errors are fatal (bad definition, not transient)
//! - `MissingVariable` is recovered by the importer; it only escapes `render`
//! - A read timeout is never an error; it ends response accumulation

use thiserror::Error;

/// Errors produced while building, sending or evaluating requests.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Malformed start line, header line or missing CRLFCRLF separator.
    #[error("Parse error: {0}")]
    Parse(String),

    /// TCP connection to the target or proxy failed or timed out.
    #[error("Failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// TLS handshake or TLS configuration failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Proxy refused or mangled the CONNECT tunnel.
    #[error("Proxy CONNECT failed: {0}")]
    ProxyTunnel(String),

    /// Header removal targeted a name that is not stored.
    #[error("Header {0} not found")]
    HeaderNotFound(String),

    /// I/O failure after the connection was established.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Event definition is unusable (unknown kind, missing chains list).
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// A trigger or step referenced a chain missing from the registry.
    #[error("Chain {0} not found")]
    ChainNotFound(String),

    /// An export key matched more than one value.
    #[error("Export key {key} must be unique, matched {matches} values")]
    AmbiguousKey { key: String, matches: usize },

    /// Response export requested before the request was sent.
    #[error("The request has not been run yet")]
    NotRun,

    /// Template referenced a variable absent from the store.
    #[error("Missing variable: {0}")]
    MissingVariable(String),

    /// Declared feature without an implementation yet.
    #[error("{0} not implemented yet")]
    Unsupported(String),

    /// JSON path expression could not be parsed or applied.
    #[error("JSON path error: {0}")]
    JsonPath(String),

    /// Template failed for a reason other than a missing variable.
    #[error("Template error: {0}")]
    Template(String),

    /// Nested chain invocation exceeded the configured depth.
    #[error("Chain {chain} exceeded maximum nesting depth {max_depth}")]
    RecursionLimit { chain: String, max_depth: usize },

    /// Variable store could not be persisted.
    #[error("Failed to persist variables: {0}")]
    Persistence(String),
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChainError::ChainNotFound("ghost".into());
        assert_eq!(err.to_string(), "Chain ghost not found");

        let err = ChainError::AmbiguousKey {
            key: ".items[]".into(),
            matches: 2,
        };
        assert!(err.to_string().contains("matched 2 values"));

        let err = ChainError::Unsupported("header condition".into());
        assert_eq!(err.to_string(), "header condition not implemented yet");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: ChainError = io.into();
        assert!(matches!(err, ChainError::Io(_)));
    }
}
