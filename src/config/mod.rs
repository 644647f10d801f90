//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! chain file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → loader.rs (read request files, build ChainRegistry)
//!     → LoadedConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All settings have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, peek_log_level, ConfigError, LoadedConfig};
pub use schema::ChainFileConfig;
pub use schema::ProxyConfig;
pub use schema::RequestConfig;
pub use schema::Settings;
