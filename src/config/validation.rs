//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (chain steps and triggers name real chains)
//! - Validate value ranges (timeouts > 0, depth > 0, ports valid)
//! - Check event shape (conditions and triggers present, known kinds)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ChainFileConfig → Result<(), Vec<ValidationError>>
//! - Runs before any request file is read

use std::collections::HashSet;
use std::fmt;

use crate::chain::event::ConditionKind;
use crate::config::schema::{ChainFileConfig, EventConfig, PortSetting, RequestConfig, StepConfig};
use crate::http::json_path::JsonPath;
use crate::http::request::AUTO;

/// A single semantic problem, located by a dotted path into the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub location: String,
    pub message: String,
}

impl ValidationError {
    fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check `config` for semantic errors.
pub fn validate_config(config: &ChainFileConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.settings.max_chain_depth == 0 {
        errors.push(ValidationError::new(
            "settings.max_chain_depth",
            "must be greater than 0",
        ));
    }

    if let Some(proxy) = &config.proxy {
        if proxy.host.trim().is_empty() {
            errors.push(ValidationError::new("proxy.host", "must not be empty"));
        }
        if proxy.port == 0 {
            errors.push(ValidationError::new("proxy.port", "must be greater than 0"));
        }
    }

    let mut names = HashSet::new();
    for (i, chain) in config.chains.iter().enumerate() {
        if chain.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("chains[{i}].name"), "must not be empty"));
        } else if !names.insert(chain.name.as_str()) {
            errors.push(ValidationError::new(
                format!("chains[{i}].name"),
                format!("duplicate chain name {:?}", chain.name),
            ));
        }
    }

    for (i, chain) in config.chains.iter().enumerate() {
        for (j, step) in chain.steps.iter().enumerate() {
            let location = format!("chains[{i}].steps[{j}]");
            match step {
                StepConfig::Chain(reference) => {
                    if !names.contains(reference.chain.as_str()) {
                        errors.push(ValidationError::new(
                            format!("{location}.chain"),
                            format!("unknown chain {:?}", reference.chain),
                        ));
                    }
                }
                StepConfig::Request(request) => {
                    validate_request(request, &location, &names, &mut errors);
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_request(
    request: &RequestConfig,
    location: &str,
    chains: &HashSet<&str>,
    errors: &mut Vec<ValidationError>,
) {
    if request.name.trim().is_empty() {
        errors.push(ValidationError::new(format!("{location}.name"), "must not be empty"));
    }

    if !(request.timeout.is_finite() && request.timeout > 0.0) {
        errors.push(ValidationError::new(
            format!("{location}.timeout"),
            "must be a positive number of seconds",
        ));
    }

    match &request.port {
        Some(PortSetting::Number(0)) => {
            errors.push(ValidationError::new(format!("{location}.port"), "must be greater than 0"));
        }
        Some(PortSetting::Keyword(word)) if word != AUTO => {
            errors.push(ValidationError::new(
                format!("{location}.port"),
                format!("must be a number or {AUTO:?}, got {word:?}"),
            ));
        }
        _ => {}
    }

    if let Some(import) = &request.import {
        for (path, _) in &import.body {
            check_path(path, &format!("{location}.import.body"), errors);
        }
    }

    if let Some(export) = &request.export {
        for (section_name, section) in [("request", &export.request), ("response", &export.response)] {
            let Some(body) = section.as_ref().and_then(|s| s.body.as_ref()) else {
                continue;
            };
            for binding in &body.vars {
                check_path(
                    &binding.key,
                    &format!("{location}.export.{section_name}.body"),
                    errors,
                );
            }
        }
    }

    for (k, event) in request.events.iter().enumerate() {
        validate_event(event, &format!("{location}.events[{k}]"), chains, errors);
    }
}

fn validate_event(
    event: &EventConfig,
    location: &str,
    chains: &HashSet<&str>,
    errors: &mut Vec<ValidationError>,
) {
    match &event.conditions {
        None => errors.push(ValidationError::new(location, "event must have conditions")),
        Some(conditions) => {
            for (kind, expected) in conditions {
                if let Err(e) = kind.parse::<ConditionKind>() {
                    errors.push(ValidationError::new(
                        format!("{location}.conditions"),
                        e.to_string(),
                    ));
                }
                if !matches!(expected, toml::Value::String(_) | toml::Value::Integer(_)) {
                    errors.push(ValidationError::new(
                        format!("{location}.conditions.{kind}"),
                        format!("expected a string or integer, got {}", expected.type_str()),
                    ));
                }
            }
        }
    }

    let Some(triggers) = &event.triggers else {
        errors.push(ValidationError::new(location, "event must have triggers"));
        return;
    };

    for name in triggers.chains.iter().flatten() {
        if !chains.contains(name.as_str()) {
            errors.push(ValidationError::new(
                format!("{location}.triggers.chains"),
                format!("unknown chain {name:?}"),
            ));
        }
    }

    let has_body_condition = event
        .conditions
        .iter()
        .flatten()
        .any(|(kind, _)| kind == "body");
    if has_body_condition && triggers.chains.is_none() {
        errors.push(ValidationError::new(
            format!("{location}.triggers"),
            "a body condition requires a chains trigger",
        ));
    }

    if !triggers.delay.is_finite() || triggers.delay < 0.0 {
        errors.push(ValidationError::new(
            format!("{location}.triggers.delay"),
            "must be a non-negative number of seconds",
        ));
    }
}

fn check_path(path: &str, location: &str, errors: &mut Vec<ValidationError>) {
    if let Err(e) = path.parse::<JsonPath>() {
        errors.push(ValidationError::new(location, e.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ChainFileConfig {
        toml::from_str(source).unwrap()
    }

    #[test]
    fn test_valid_config() {
        let config = parse(
            r#"
            [[chains]]
            name = "auth"
            [[chains.steps]]
            name = "login.txt"

            [[chains]]
            name = "main"
            [[chains.steps]]
            chain = "auth"
            [[chains.steps]]
            name = "profile.txt"
            events = [{ conditions = { status = "401" }, triggers = { chains = ["auth"] } }]
            "#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let config = parse(
            r#"
            [settings]
            max_chain_depth = 0

            [[chains]]
            name = "main"
            [[chains.steps]]
            chain = "nowhere"
            [[chains.steps]]
            name = "a.txt"
            timeout = 0.0
            port = "sometimes"
            events = [
                { conditions = { cookie = "x" }, triggers = { skip = true } },
                { conditions = { body = "retry" }, triggers = { skip = true } },
                { triggers = { chains = ["ghost"] } },
            ]
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        let locations: Vec<&str> = errors.iter().map(|e| e.location.as_str()).collect();
        assert!(locations.contains(&"settings.max_chain_depth"));
        assert!(locations.contains(&"chains[0].steps[0].chain"));
        assert!(locations.contains(&"chains[0].steps[1].timeout"));
        assert!(locations.contains(&"chains[0].steps[1].port"));
        assert!(locations.contains(&"chains[0].steps[1].events[0].conditions"));
        assert!(locations.contains(&"chains[0].steps[1].events[1].triggers"));
        assert!(locations.contains(&"chains[0].steps[1].events[2]"));
        assert!(locations.contains(&"chains[0].steps[1].events[2].triggers.chains"));
    }

    #[test]
    fn test_duplicate_chain_names() {
        let config = parse(
            r#"
            [[chains]]
            name = "a"
            [[chains]]
            name = "a"
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "chains[1].name: duplicate chain name \"a\"");
    }

    #[test]
    fn test_bad_export_path() {
        let config = parse(
            r#"
            [[chains]]
            name = "a"
            [[chains.steps]]
            name = "a.txt"
            export.response.body.vars = [{ key = "token", name = "t" }]
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].location, "chains[0].steps[0].export.response.body");
    }
}
