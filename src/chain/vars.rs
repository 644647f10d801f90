//! Shared variable store.
//!
//! # Responsibilities
//! - Hold name → JSON value bindings for one run
//! - Persist the bindings through an injected backend
//! - Carry the orchestration flags (skip, delay) between a request and
//!   the chain running it
//!
//! # Design Decisions
//! - Passed explicitly (`&mut GlobalVars`) rather than living in a global
//! - Persistence is a trait object so tests and one-shot runs need no disk

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{ChainError, ChainResult};

/// Set when a request asks its chain to stop.
pub const SKIP_KEY: &str = "skip_the_chain";

/// Seconds the chain should wait before its next step.
pub const DELAY_KEY: &str = "delay_time";

/// Storage backend for the variable store.
pub trait Persistence: Send + Sync + fmt::Debug {
    fn save(&self, vars: &Map<String, Value>) -> ChainResult<()>;
}

/// Keeps everything in memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPersistence;

impl Persistence for NoPersistence {
    fn save(&self, _vars: &Map<String, Value>) -> ChainResult<()> {
        Ok(())
    }
}

/// Stores the variables as a pretty-printed JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read previously saved variables. A missing file yields an empty map.
    pub fn load(&self) -> ChainResult<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        let mut vars: Map<String, Value> = serde_json::from_str(&content).map_err(|e| {
            ChainError::Persistence(format!("{}: {e}", self.path.display()))
        })?;
        vars.retain(|name, _| !is_flag(name));
        Ok(vars)
    }
}

impl Persistence for JsonFilePersistence {
    fn save(&self, vars: &Map<String, Value>) -> ChainResult<()> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, vars)
            .map_err(|e| ChainError::Persistence(format!("{}: {e}", self.path.display())))?;
        writer.flush()?;
        tracing::debug!(path = %self.path.display(), count = vars.len(), "Variables saved");
        Ok(())
    }
}

/// Name → value bindings shared by every request in a run.
#[derive(Debug)]
pub struct GlobalVars {
    values: Map<String, Value>,
    persistence: Box<dyn Persistence>,
}

impl Default for GlobalVars {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl GlobalVars {
    pub fn new(values: Map<String, Value>, persistence: Box<dyn Persistence>) -> Self {
        Self {
            values,
            persistence,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Map::new(), Box::new(NoPersistence))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// All bindings, used as the template rendering context.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Merge `seed` in, keeping values already present.
    pub fn seed(&mut self, seed: Map<String, Value>) {
        for (name, value) in seed {
            self.values.entry(name).or_insert(value);
        }
    }

    /// Persist every binding except the orchestration flags.
    pub fn save(&self) -> ChainResult<()> {
        let persisted: Map<String, Value> = self
            .values
            .iter()
            .filter(|(name, _)| !is_flag(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        self.persistence.save(&persisted)
    }

    pub fn mark_skipped(&mut self) {
        self.set(SKIP_KEY, true);
    }

    /// Consume the skip flag.
    pub fn take_skipped(&mut self) -> bool {
        matches!(self.remove(SKIP_KEY), Some(Value::Bool(true)))
    }

    pub fn record_delay(&mut self, seconds: f64) {
        self.set(DELAY_KEY, seconds);
    }

    /// Consume the pending delay, if any.
    pub fn take_delay(&mut self) -> Option<Duration> {
        let seconds = self.remove(DELAY_KEY)?.as_f64()?;
        if seconds <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(seconds)
            .map_err(|e| tracing::warn!(seconds, error = %e, "Ignoring unrepresentable delay"))
            .ok()
    }
}

fn is_flag(name: &str) -> bool {
    name == SKIP_KEY || name == DELAY_KEY
}
