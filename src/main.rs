//! http-chain command line.
//!
//! # Architecture Overview
//!
//! ```text
//!   chain file (TOML) ──▶ config loader ──▶ ChainRegistry
//!                                              │
//!                                              ▼
//!   GlobalVars ◀──── import / export ──── chain engine ──── events ──▶ nested chains
//!                                              │
//!                                              ▼
//!                                     transport (TCP, TLS, proxy)
//!                                              │
//!                                              ▼
//!                                         target server
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use http_chain::chain::ChainOutcome;
use http_chain::config::{load_config, peek_log_level, ProxyConfig};
use http_chain::observability::logging;

#[derive(Parser)]
#[command(name = "http-chain")]
#[command(about = "Send raw HTTP requests as chains, threading captured values between them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a named chain from a chain file
    Run {
        /// Chain file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Name of the chain to run
        #[arg(long)]
        chain: String,

        /// Upstream proxy, e.g. http://127.0.0.1:8080 (overrides the file)
        #[arg(long, value_parser = parse_proxy)]
        proxy: Option<ProxyConfig>,

        /// Variable binding, repeatable (key=value; JSON values are decoded)
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, Value)>,

        /// Log level (overrides the file; RUST_LOG wins over both)
        #[arg(long)]
        log_level: Option<String>,
    },
    /// Load a chain file and every request it references
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            chain,
            proxy,
            vars: overrides,
            log_level,
        } => {
            // Logging starts before the load so loader events are kept.
            let level = log_level
                .or_else(|| peek_log_level(&config))
                .unwrap_or_else(|| logging::DEFAULT_LEVEL.to_string());
            logging::init(&level);
            let loaded = load_config(&config)?;

            let run_id = Uuid::new_v4();
            let proxy = proxy.or_else(|| loaded.proxy.clone());
            tracing::info!(
                run_id = %run_id,
                config = %config.display(),
                chains = loaded.registry.len(),
                proxy = ?proxy.as_ref().map(|p| format!("{}:{}", p.host, p.port)),
                "http-chain v{} starting",
                env!("CARGO_PKG_VERSION")
            );

            let mut vars = loaded.global_vars()?;
            for (name, value) in overrides {
                vars.set(name, value);
            }

            let outcome = loaded
                .registry
                .run(&chain, &mut vars, proxy.as_ref(), loaded.settings.max_chain_depth)
                .instrument(tracing::info_span!("run", run_id = %run_id))
                .await?;

            for request in outcome.requests() {
                let status = request
                    .response
                    .as_ref()
                    .map(|r| format!("{} {}", r.status, r.reason))
                    .unwrap_or_default();
                println!("{} {} -> {}", request.method, request.path, status.trim_end());
            }
            if let ChainOutcome::Skipped { .. } = outcome {
                println!("chain {chain} skipped");
            }
        }
        Commands::Validate { config } => {
            logging::init(logging::DEFAULT_LEVEL);
            let loaded = load_config(&config)?;
            let mut names: Vec<&str> = loaded.registry.names().collect();
            names.sort_unstable();
            println!("{}: OK ({} chains: {})", config.display(), names.len(), names.join(", "));
        }
    }

    Ok(())
}

fn parse_proxy(raw: &str) -> Result<ProxyConfig, String> {
    let url = url::Url::parse(raw).map_err(|e| format!("invalid proxy URL {raw:?}: {e}"))?;
    let host = url
        .host_str()
        .ok_or_else(|| format!("proxy URL {raw:?} has no host"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| format!("proxy URL {raw:?} has no port"))?;
    Ok(ProxyConfig {
        host: host.to_string(),
        port,
    })
}

fn parse_var(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    if name.is_empty() {
        return Err(format!("empty variable name in {raw:?}"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proxy() {
        let proxy = parse_proxy("http://127.0.0.1:8080").unwrap();
        assert_eq!(proxy, ProxyConfig { host: "127.0.0.1".into(), port: 8080 });
        assert_eq!(parse_proxy("http://proxy.local").unwrap().port, 80);
        assert!(parse_proxy("not a url").is_err());
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(parse_var("user=alice").unwrap(), ("user".into(), Value::String("alice".into())));
        assert_eq!(parse_var("count=3").unwrap(), ("count".into(), Value::from(3)));
        assert_eq!(parse_var("eq=a=b").unwrap().1, Value::String("a=b".into()));
        assert!(parse_var("novalue").is_err());
    }

    #[test]
    fn test_cli_shape() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
