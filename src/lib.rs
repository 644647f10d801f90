//! Raw HTTP request chaining library

pub mod chain;
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod observability;

pub use chain::{ChainRegistry, GlobalVars};
pub use config::{load_config, LoadedConfig};
pub use error::{ChainError, ChainResult};
pub use http::{Request, Response};
