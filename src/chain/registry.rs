//! Named chains and their orchestration.
//!
//! # Responsibilities
//! - Resolve chain names to definitions
//! - Run a chain's steps in order, nesting referenced chains
//! - Honour skip and delay requests raised by individual requests
//! - Bound nesting depth so cyclic chain references terminate
//!
//! # Design Decisions
//! - The registry is immutable once built; runs borrow it
//! - Each chain run gets its own span carrying the chain name and depth

use std::collections::HashMap;

use futures_util::future::{BoxFuture, FutureExt};
use tracing::Instrument;

use crate::chain::engine::RunOutcome;
use crate::chain::vars::GlobalVars;
use crate::config::schema::{ProxyConfig, DEFAULT_MAX_CHAIN_DEPTH};
use crate::error::{ChainError, ChainResult};
use crate::http::request::Request;

/// One step of a chain.
#[derive(Debug, Clone)]
pub enum Step {
    Request(Box<Request>),
    /// Run another chain, by name, in place.
    Chain(String),
}

/// An ordered list of steps under a name.
#[derive(Debug, Clone)]
pub struct Chain {
    pub name: String,
    pub steps: Vec<Step>,
}

/// How a chain run ended. Both variants carry the completed requests with
/// their responses, nested chains included.
#[derive(Debug)]
pub enum ChainOutcome {
    Completed { requests: Vec<Request> },
    /// A request stopped the chain early.
    Skipped { requests: Vec<Request> },
}

impl ChainOutcome {
    pub fn requests(&self) -> &[Request] {
        match self {
            ChainOutcome::Completed { requests } | ChainOutcome::Skipped { requests } => requests,
        }
    }

    pub fn into_requests(self) -> Vec<Request> {
        match self {
            ChainOutcome::Completed { requests } | ChainOutcome::Skipped { requests } => requests,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ChainOutcome::Skipped { .. })
    }
}

/// Shared, read-only state threaded through a run.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub registry: &'a ChainRegistry,
    pub proxy: Option<&'a ProxyConfig>,
    pub depth: usize,
    pub max_depth: usize,
}

impl<'a> RunContext<'a> {
    pub fn new(registry: &'a ChainRegistry, proxy: Option<&'a ProxyConfig>) -> Self {
        Self {
            registry,
            proxy,
            depth: 0,
            max_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Context for running `chain` one level deeper.
    pub fn nested(&self, chain: &str) -> ChainResult<Self> {
        let depth = self.depth + 1;
        if depth > self.max_depth {
            return Err(ChainError::RecursionLimit {
                chain: chain.to_string(),
                max_depth: self.max_depth,
            });
        }
        Ok(Self { depth, ..*self })
    }
}

impl Chain {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Run every step in order.
    pub fn run<'a>(
        &'a self,
        vars: &'a mut GlobalVars,
        ctx: RunContext<'a>,
    ) -> BoxFuture<'a, ChainResult<ChainOutcome>> {
        let span = tracing::info_span!("chain", name = %self.name, depth = ctx.depth);
        async move {
            tracing::info!(steps = self.steps.len(), "Running chain");
            let mut requests = Vec::new();

            for step in &self.steps {
                match step {
                    Step::Request(request) => match request.run(vars, &ctx).await? {
                        RunOutcome::Completed(done) => requests.push(*done),
                        RunOutcome::Skipped => {
                            vars.take_skipped();
                            tracing::info!(
                                request = %request.request_line(),
                                completed = requests.len(),
                                "Chain skipped"
                            );
                            return Ok(ChainOutcome::Skipped { requests });
                        }
                    },
                    Step::Chain(name) => {
                        let chain = ctx
                            .registry
                            .lookup(name)
                            .ok_or_else(|| ChainError::ChainNotFound(name.clone()))?;
                        let nested = chain.run(vars, ctx.nested(name)?).await?;
                        requests.extend(nested.into_requests());
                    }
                }

                if let Some(delay) = vars.take_delay() {
                    tracing::info!(delay_secs = delay.as_secs_f64(), "Delaying next step");
                    tokio::time::sleep(delay).await;
                }
            }

            tracing::info!(completed = requests.len(), "Chain finished");
            Ok(ChainOutcome::Completed { requests })
        }
        .instrument(span)
        .boxed()
    }
}

/// All chains known to a run, by name.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<String, Chain>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `chain`, replacing any chain of the same name.
    pub fn insert(&mut self, chain: Chain) -> Option<Chain> {
        self.chains.insert(chain.name.clone(), chain)
    }

    pub fn lookup(&self, name: &str) -> Option<&Chain> {
        self.chains.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Run the chain called `name` from the top level.
    pub async fn run(
        &self,
        name: &str,
        vars: &mut GlobalVars,
        proxy: Option<&ProxyConfig>,
        max_depth: usize,
    ) -> ChainResult<ChainOutcome> {
        let chain = self
            .lookup(name)
            .ok_or_else(|| ChainError::ChainNotFound(name.to_string()))?;
        let ctx = RunContext::new(self, proxy).with_max_depth(max_depth);
        chain.run(vars, ctx).await
    }
}
