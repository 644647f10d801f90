//! Single-request execution.
//!
//! # Data Flow
//! ```text
//! definition ──copy──▶ working request
//!     → import (render templates)
//!     → send / receive / parse response
//!     → evaluate events in order
//!         status match: run chains (→ resend) | skip (→ stop) | record delay
//!         body match:   run chains (→ resend)
//!         header match: unsupported
//!     → [resend: import again, send again, once]
//!     → export
//! ```
//!
//! # Design Decisions
//! - The definition is never mutated; each run works on a fresh copy
//! - At most one resend, no matter how many events fired
//! - Skip and delay are reported through the variable store so the
//!   orchestrating chain decides what to do with them

use std::sync::Arc;

use crate::chain::event::ConditionKind;
use crate::chain::registry::RunContext;
use crate::chain::vars::GlobalVars;
use crate::error::{ChainError, ChainResult};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::net::send_http_request;

/// How a single request run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The exchange finished; holds the working copy with its response.
    Completed(Box<Request>),
    /// A status event asked for the rest of the chain to be skipped.
    Skipped,
}

impl Request {
    /// Execute this request once, including event handling and a possible
    /// single resend.
    pub async fn run(&self, vars: &mut GlobalVars, ctx: &RunContext<'_>) -> ChainResult<RunOutcome> {
        let mut active = self.copy()?;
        active.importer(vars)?;
        active.exchange(ctx).await?;

        let rules = Arc::clone(&active.rules);
        let mut resend = false;
        {
            let response = active.response.as_ref().ok_or(ChainError::NotRun)?;
            for event in &rules.events {
                for condition in &event.conditions {
                    match condition.kind {
                        ConditionKind::Status => {
                            if !condition.status_matches(response) {
                                continue;
                            }
                            if let Some(chains) = &event.triggers.chains {
                                run_chains(chains, vars, ctx).await?;
                                resend = true;
                            } else if event.triggers.skip {
                                tracing::error!(
                                    request = %active.request_line(),
                                    status = %response.status,
                                    "Status matched, skipping the rest of the chain"
                                );
                                vars.mark_skipped();
                                return Ok(RunOutcome::Skipped);
                            } else if event.triggers.delay > 0.0 {
                                tracing::debug!(delay_secs = event.triggers.delay, "Delay requested");
                                vars.record_delay(event.triggers.delay);
                            }
                        }
                        ConditionKind::Body => {
                            if !condition.body_matches(response) {
                                continue;
                            }
                            let chains = event.triggers.chains.as_ref().ok_or_else(|| {
                                ChainError::InvalidEvent(
                                    "a body condition requires a chains trigger".to_string(),
                                )
                            })?;
                            run_chains(chains, vars, ctx).await?;
                            resend = true;
                        }
                        ConditionKind::Header => {
                            return Err(ChainError::Unsupported("header condition".to_string()));
                        }
                    }
                }
            }
        }

        if resend {
            tracing::info!(request = %active.request_line(), "Resending after triggered chains");
            active.importer(vars)?;
            active.exchange(ctx).await?;
        }

        active.exporter(vars)?;
        Ok(RunOutcome::Completed(Box::new(active)))
    }

    /// Send the serialized request and attach the parsed response.
    pub async fn exchange(&mut self, ctx: &RunContext<'_>) -> ChainResult<&Response> {
        let raw = self.raw();
        let reply = send_http_request(
            &self.host,
            self.port,
            &raw,
            self.rules.timeout,
            self.rules.use_tls,
            ctx.proxy,
        )
        .await?;

        let response = Response::parse(&reply)?;
        tracing::info!(
            request = %self.request_line(),
            host = %self.host,
            port = self.port,
            status = %response.status,
            bytes = reply.len(),
            "Response received"
        );
        Ok(self.response.insert(response))
    }
}

async fn run_chains(names: &[String], vars: &mut GlobalVars, ctx: &RunContext<'_>) -> ChainResult<()> {
    for name in names {
        let chain = ctx
            .registry
            .lookup(name)
            .ok_or_else(|| ChainError::ChainNotFound(name.clone()))?;
        chain.run(vars, ctx.nested(name)?).await?;
    }
    Ok(())
}
