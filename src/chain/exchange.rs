//! Moving values between the variable store and a request.
//!
//! # Data Flow
//! ```text
//! import:  GlobalVars → render templates → request headers / JSON body
//! export:  request or response (body path, header name) → GlobalVars → save
//! ```
//!
//! # Design Decisions
//! - An import whose template references an unbound variable is skipped
//!   with a warning; the remaining imports still apply
//! - An export path matching nothing is a warning; matching more than one
//!   value is an error

use std::sync::Arc;

use crate::chain::template;
use crate::chain::vars::GlobalVars;
use crate::config::schema::{ExportSection, VarBinding};
use crate::error::{ChainError, ChainResult};
use crate::http::body::Body;
use crate::http::header::HeaderStore;
use crate::http::json_path::JsonPath;
use crate::http::request::Request;

impl Request {
    /// Render the configured import templates into this request.
    pub fn importer(&mut self, vars: &GlobalVars) -> ChainResult<()> {
        let rules = Arc::clone(&self.rules);
        let Some(import) = &rules.import else {
            return Ok(());
        };

        for (name, source) in &import.headers {
            match template::render(source, vars.values()) {
                Ok(value) => self.add_header(name, value),
                Err(ChainError::MissingVariable(missing)) => {
                    tracing::warn!(header = %name, missing = %missing, "Key not found, skipping header import");
                }
                Err(e) => return Err(e),
            }
        }

        for (key, source) in &import.body {
            let value = match template::render(source, vars.values()) {
                Ok(value) => value,
                Err(ChainError::MissingVariable(missing)) => {
                    tracing::warn!(path = %key, missing = %missing, "Key not found, skipping body import");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let path: JsonPath = key.parse()?;
            let Some(body) = self.body.as_mut() else {
                tracing::warn!(path = %key, method = %self.method, "Request has no body, skipping body import");
                continue;
            };
            if !body.add(&path, &value)? {
                tracing::debug!(
                    path = %key,
                    content_type = %body.content_type(),
                    "Body type does not support imports"
                );
            }
        }

        self.update_content_length();
        Ok(())
    }

    /// Capture the configured values into `vars` and persist them.
    pub fn exporter(&self, vars: &mut GlobalVars) -> ChainResult<()> {
        let Some(export) = &self.rules.export else {
            return Ok(());
        };

        if let Some(section) = &export.request {
            export_section(section, &self.headers, self.body.as_ref(), vars)?;
        }
        if let Some(section) = &export.response {
            let response = self.response.as_ref().ok_or(ChainError::NotRun)?;
            export_section(section, &response.headers, Some(&response.body), vars)?;
        }

        vars.save()
    }
}

fn export_section(
    section: &ExportSection,
    headers: &HeaderStore,
    body: Option<&Body>,
    vars: &mut GlobalVars,
) -> ChainResult<()> {
    if let Some(target) = &section.body {
        for binding in &target.vars {
            export_body_var(binding, body, vars)?;
        }
    }
    if let Some(target) = &section.header {
        for binding in &target.vars {
            match headers.get(&binding.key) {
                Some(value) => vars.set(binding.name.as_str(), value),
                None => {
                    tracing::warn!(header = %binding.key, var = %binding.name, "Key not found, nothing exported");
                }
            }
        }
    }
    Ok(())
}

fn export_body_var(
    binding: &VarBinding,
    body: Option<&Body>,
    vars: &mut GlobalVars,
) -> ChainResult<()> {
    let path: JsonPath = binding.key.parse()?;
    let found = match body {
        Some(body) => body.get(&path)?,
        None => None,
    };

    let mut values = found.unwrap_or_default();
    match values.len() {
        0 => {
            tracing::warn!(path = %binding.key, var = %binding.name, "Key not found, nothing exported");
            Ok(())
        }
        1 => {
            let value = values.remove(0);
            tracing::debug!(path = %binding.key, var = %binding.name, "Exported body value");
            vars.set(binding.name.as_str(), value);
            Ok(())
        }
        matches => Err(ChainError::AmbiguousKey {
            key: binding.key.clone(),
            matches,
        }),
    }
}
