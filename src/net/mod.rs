//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Serialized request
//!     → connection.rs (TCP connect with deadline, connection ID)
//!     → proxy.rs (CONNECT tunnel or absolute-form rewrite, optional)
//!     → tls.rs (TLS upgrade without peer verification, optional)
//!     → connection.rs (write request, read until EOF/timeout, close)
//!     → raw response bytes
//! ```
//!
//! # Design Decisions
//! - One connection per request; nothing is pooled
//! - Every blocking step is bounded by the request timeout
//! - A read timeout terminates the response instead of failing it

pub mod connection;
pub mod proxy;
pub mod tls;
pub mod transport;

pub use transport::send_http_request;
