//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → spans per chain run (name, depth) and per CLI run (run_id)
//!
//! Consumers:
//!     → stdout via tracing-subscriber fmt layer
//! ```
//!
//! # Design Decisions
//! - Structured key/value fields rather than formatted messages
//! - Run ID flows through every event of a CLI invocation

pub mod logging;
