//! Response-inspection rules.
//!
//! # Responsibilities
//! - Closed set of condition kinds (status, header, body)
//! - Trigger block: nested chains, skip, delay
//! - Conversion from the loosely typed config form
//!
//! # Design Decisions
//! - Unknown condition kinds are rejected when the event is built
//! - Conditions keep their declaration order
//! - `header` conditions are accepted but fail fast when evaluated

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::schema::EventConfig;
use crate::error::{ChainError, ChainResult};
use crate::http::response::Response;

/// What part of the response a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    /// Status code equals one of a comma-separated list.
    Status,
    /// Header inspection; declared but not supported yet.
    Header,
    /// Raw body contains a literal substring.
    Body,
}

impl FromStr for ConditionKind {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(ConditionKind::Status),
            "header" => Ok(ConditionKind::Header),
            "body" => Ok(ConditionKind::Body),
            other => Err(ChainError::InvalidEvent(format!(
                "condition must be one of [status, header, body], got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConditionKind::Status => "status",
            ConditionKind::Header => "header",
            ConditionKind::Body => "body",
        })
    }
}

/// A single condition and its expected value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub kind: ConditionKind,
    pub expected: String,
}

impl Condition {
    pub fn new(kind: ConditionKind, expected: impl Into<String>) -> Self {
        Self {
            kind,
            expected: expected.into(),
        }
    }

    /// True if the response status is one of the comma-separated values.
    pub fn status_matches(&self, response: &Response) -> bool {
        self.expected
            .split(',')
            .map(str::trim)
            .any(|code| code == response.status)
    }

    /// True if the raw response body contains the expected substring.
    pub fn body_matches(&self, response: &Response) -> bool {
        let needle = self.expected.as_bytes();
        let haystack = response.body.raw();
        needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
    }
}

/// Actions fired when a condition matches.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Triggers {
    /// Chains to run, in order, before the request is resent.
    #[serde(default)]
    pub chains: Option<Vec<String>>,

    /// Stop the rest of the current chain.
    #[serde(default)]
    pub skip: bool,

    /// Seconds the orchestrator should wait before the next request.
    #[serde(default)]
    pub delay: f64,
}

/// Conditions to test plus the triggers to fire on a match.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub conditions: Vec<Condition>,
    pub triggers: Triggers,
}

impl TryFrom<EventConfig> for Event {
    type Error = ChainError;

    fn try_from(config: EventConfig) -> ChainResult<Self> {
        let raw_conditions = config
            .conditions
            .ok_or_else(|| ChainError::InvalidEvent("event must have conditions".to_string()))?;
        let triggers = config
            .triggers
            .ok_or_else(|| ChainError::InvalidEvent("event must have triggers".to_string()))?;

        let conditions = raw_conditions
            .into_iter()
            .map(|(kind, expected)| {
                let kind: ConditionKind = kind.parse()?;
                let expected = match expected {
                    toml::Value::String(s) => s,
                    toml::Value::Integer(i) => i.to_string(),
                    other => {
                        return Err(ChainError::InvalidEvent(format!(
                            "{kind} condition expects a string or integer, got {}",
                            other.type_str()
                        )))
                    }
                };
                Ok(Condition { kind, expected })
            })
            .collect::<ChainResult<Vec<_>>>()?;

        Ok(Self {
            conditions,
            triggers,
        })
    }
}
