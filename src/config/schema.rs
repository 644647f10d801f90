//! Configuration schema definitions.
//!
//! This module defines the chain file structure. All types derive Serde
//! traits for deserialization from TOML. Tables whose key order carries
//! meaning (imports, event conditions) are read into ordered pair lists.

use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::chain::event::Triggers;

/// Default nesting limit for chains that trigger chains.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 8;

/// Root configuration for a chain file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ChainFileConfig {
    /// Global settings (paths, limits, logging).
    pub settings: Settings,

    /// Optional upstream HTTP proxy applied to every request.
    pub proxy: Option<ProxyConfig>,

    /// Seed values for the variable store.
    pub vars: serde_json::Map<String, serde_json::Value>,

    /// Named chain definitions.
    pub chains: Vec<ChainConfig>,
}

/// Global settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding raw request files, relative to the config file.
    pub request_dir: PathBuf,

    /// JSON file the variable store is loaded from and saved to.
    pub vars_file: Option<PathBuf>,

    /// Maximum nesting of triggered chains.
    pub max_chain_depth: usize,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_dir: PathBuf::from("."),
            vars_file: None,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            log_level: "info".to_string(),
        }
    }
}

/// Upstream HTTP proxy address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

/// A named, ordered list of steps.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub name: String,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// One step of a chain: a request to send, or another chain to run.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StepConfig {
    Chain(ChainStepConfig),
    Request(Box<RequestConfig>),
}

/// Reference to another chain by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainStepConfig {
    pub chain: String,
}

/// Per-request configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    /// Request file name, relative to `settings.request_dir`.
    pub name: String,

    /// Target host; `"auto"` or absent reads it from the Host header.
    #[serde(default)]
    pub host: Option<String>,

    /// Target port; `"auto"` or absent derives it from the Host header.
    #[serde(default)]
    pub port: Option<PortSetting>,

    #[serde(default = "default_use_tls")]
    pub use_tls: bool,

    /// Per-operation timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    #[serde(default)]
    pub import: Option<ImportConfig>,

    #[serde(default)]
    pub export: Option<ExportConfig>,

    #[serde(default)]
    pub events: Vec<EventConfig>,
}

fn default_use_tls() -> bool {
    true
}

fn default_timeout() -> f64 {
    30.0
}

/// Port as a number or a keyword (`"auto"`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PortSetting {
    Number(u16),
    Keyword(String),
}

/// Templates rendered into the request before it is sent.
///
/// Header entries map a header name to a template; body entries map a JSON
/// path to a template. Both are applied in file order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImportConfig {
    #[serde(default, deserialize_with = "ordered_pairs")]
    pub headers: Vec<(String, String)>,

    #[serde(default, deserialize_with = "ordered_pairs")]
    pub body: Vec<(String, String)>,
}

/// Values captured into the variable store after a request completes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExportConfig {
    /// Read from the request as it was sent.
    #[serde(default)]
    pub request: Option<ExportSection>,

    /// Read from the response.
    #[serde(default)]
    pub response: Option<ExportSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExportSection {
    #[serde(default)]
    pub body: Option<ExportTarget>,

    #[serde(default)]
    pub header: Option<ExportTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExportTarget {
    #[serde(default)]
    pub vars: Vec<VarBinding>,
}

/// Binds a source key (JSON path or header name) to a variable name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VarBinding {
    pub key: String,
    pub name: String,
}

/// Raw event as written in the file.
///
/// Both fields are optional here so validation can report every missing
/// piece at once.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventConfig {
    #[serde(default, deserialize_with = "ordered_pairs_opt")]
    pub conditions: Option<Vec<(String, toml::Value)>>,

    #[serde(default)]
    pub triggers: Option<Triggers>,
}

fn ordered_pairs<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct PairsVisitor<V>(PhantomData<V>);

    impl<'de, V> Visitor<'de> for PairsVisitor<V>
    where
        V: Deserialize<'de>,
    {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a table")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, V>()? {
                pairs.push((key, value));
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(PairsVisitor(PhantomData))
}

fn ordered_pairs_opt<'de, D, V>(deserializer: D) -> Result<Option<Vec<(String, V)>>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    ordered_pairs(deserializer).map(Some)
}
