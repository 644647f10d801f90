//! Configuration loading from disk.
//!
//! Reads the chain file, validates it, then reads every referenced request
//! file and assembles the chain registry.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::chain::event::Event;
use crate::chain::registry::{Chain, ChainRegistry, Step};
use crate::chain::vars::{GlobalVars, JsonFilePersistence, NoPersistence};
use crate::config::schema::{ChainFileConfig, PortSetting, ProxyConfig, RequestConfig, Settings, StepConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::error::ChainError;
use crate::http::request::{Request, RequestRules, AUTO};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
    Chain(ChainError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "IO error reading {}: {}", path.display(), source),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::Chain(e) => write!(f, "Request error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
            ConfigError::Chain(e) => Some(e),
        }
    }
}

impl From<ChainError> for ConfigError {
    fn from(e: ChainError) -> Self {
        ConfigError::Chain(e)
    }
}

/// A validated chain file with every request loaded.
#[derive(Debug)]
pub struct LoadedConfig {
    pub settings: Settings,
    pub proxy: Option<ProxyConfig>,
    pub vars: serde_json::Map<String, serde_json::Value>,
    pub registry: ChainRegistry,
    /// Directory the chain file lives in; relative paths resolve against it.
    pub base_dir: PathBuf,
}

impl LoadedConfig {
    /// Build the variable store: persisted values first, then config seeds
    /// for anything not yet bound.
    pub fn global_vars(&self) -> Result<GlobalVars, ConfigError> {
        let mut vars = match &self.settings.vars_file {
            Some(file) => {
                let store = JsonFilePersistence::new(self.base_dir.join(file));
                GlobalVars::new(store.load()?, Box::new(store))
            }
            None => GlobalVars::new(serde_json::Map::new(), Box::new(NoPersistence)),
        };
        vars.seed(self.vars.clone());
        Ok(vars)
    }
}

/// Parse and validate a chain file without touching request files.
pub fn parse_config(content: &str) -> Result<ChainFileConfig, ConfigError> {
    let config: ChainFileConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Read just the configured log level, so logging can start before the
/// full load. Unreadable or unparsable files yield `None`; `load_config`
/// reports those properly.
pub fn peek_log_level(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    toml::from_str::<ChainFileConfig>(&content)
        .ok()
        .map(|config| config.settings.log_level)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&content)?;

    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let request_dir = base_dir.join(&config.settings.request_dir);

    let mut registry = ChainRegistry::new();
    for chain in config.chains {
        let mut steps = Vec::with_capacity(chain.steps.len());
        for step in chain.steps {
            steps.push(match step {
                StepConfig::Chain(reference) => Step::Chain(reference.chain),
                StepConfig::Request(request) => {
                    Step::Request(Box::new(load_request(*request, &request_dir)?))
                }
            });
        }
        tracing::debug!(chain = %chain.name, steps = steps.len(), "Chain loaded");
        registry.insert(Chain::new(chain.name, steps));
    }

    tracing::info!(path = %path.display(), chains = registry.len(), "Configuration loaded");

    Ok(LoadedConfig {
        settings: config.settings,
        proxy: config.proxy,
        vars: config.vars,
        registry,
        base_dir,
    })
}

/// Read a request file and attach its rules.
pub fn load_request(config: RequestConfig, request_dir: &Path) -> Result<Request, ConfigError> {
    let path = request_dir.join(&config.name);
    let raw = fs::read(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;

    // A missing host or port makes both automatic; otherwise each field is
    // resolved on its own and "auto" defers to the Host header.
    let (host, port) = match (&config.host, &config.port) {
        (Some(host), Some(port)) => (
            Some(host.as_str()).filter(|h| *h != AUTO),
            match port {
                PortSetting::Number(port) => Some(*port),
                PortSetting::Keyword(_) => None,
            },
        ),
        _ => (None, None),
    };

    let events = config
        .events
        .into_iter()
        .map(Event::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let timeout = Duration::try_from_secs_f64(config.timeout).map_err(|e| {
        ChainError::Parse(format!("invalid timeout {} for {}: {e}", config.timeout, config.name))
    })?;

    let rules = Arc::new(RequestRules {
        use_tls: config.use_tls,
        timeout,
        import: config.import,
        export: config.export,
        events,
    });

    Ok(Request::parse(&raw, host, port, rules)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_load_builds_registry() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("requests")).unwrap();
        write(
            &dir.path().join("requests"),
            "login.txt",
            "POST /login HTTP/1.1\r\nHost: api.local:8080\r\nContent-Type: application/json\r\n\r\n{\"user\":\"u\"}",
        );
        write(
            dir.path(),
            "chains.toml",
            r#"
            [settings]
            request_dir = "requests"

            [vars]
            user = "alice"

            [[chains]]
            name = "auth"
            [[chains.steps]]
            name = "login.txt"
            use_tls = false
            timeout = 2.5
            import.body = { ".user" = "{{ user }}" }

            [[chains]]
            name = "main"
            [[chains.steps]]
            chain = "auth"
            "#,
        );

        let loaded = load_config(&dir.path().join("chains.toml")).unwrap();
        assert_eq!(loaded.registry.len(), 2);

        let auth = loaded.registry.lookup("auth").unwrap();
        let Step::Request(request) = &auth.steps[0] else {
            panic!("expected a request step");
        };
        assert_eq!((request.host.as_str(), request.port), ("api.local", 8080));
        assert!(!request.rules.use_tls);
        assert_eq!(request.rules.timeout, Duration::from_millis(2500));

        let main = loaded.registry.lookup("main").unwrap();
        assert!(matches!(&main.steps[0], Step::Chain(name) if name == "auth"));

        let vars = loaded.global_vars().unwrap();
        assert_eq!(vars.get("user"), Some(&serde_json::json!("alice")));
    }

    #[test]
    fn test_host_without_port_is_auto() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "GET / HTTP/1.1\r\nHost: from-header:81\r\n\r\n");
        let config: RequestConfig = toml::from_str(
            r#"
            name = "a.txt"
            host = "ignored.example"
            "#,
        )
        .unwrap();
        let request = load_request(config, dir.path()).unwrap();
        assert_eq!((request.host.as_str(), request.port), ("from-header", 81));
    }

    #[test]
    fn test_auto_host_keeps_explicit_port() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
        let config: RequestConfig = toml::from_str(
            r#"
            name = "a.txt"
            host = "auto"
            port = 8443
            "#,
        )
        .unwrap();
        let request = load_request(config, dir.path()).unwrap();
        assert_eq!((request.host.as_str(), request.port), ("example.com", 8443));
    }

    #[test]
    fn test_explicit_host_with_auto_port() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "GET / HTTP/1.1\r\nHost: example.com:9000\r\n\r\n");
        let config: RequestConfig = toml::from_str(
            r#"
            name = "a.txt"
            host = "10.0.0.5"
            port = "auto"
            "#,
        )
        .unwrap();
        let request = load_request(config, dir.path()).unwrap();
        assert_eq!((request.host.as_str(), request.port), ("10.0.0.5", 9000));
    }

    #[test]
    fn test_missing_request_file() {
        let dir = tempfile::tempdir().unwrap();
        let config: RequestConfig = toml::from_str(r#"name = "absent.txt""#).unwrap();
        let err = load_request(config, dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_validation_errors_surface() {
        let err = parse_config(
            r#"
            [[chains]]
            name = "a"
            [[chains.steps]]
            chain = "b"
            "#,
        )
        .unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_peek_log_level() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "debug.toml", "[settings]\nlog_level = \"debug\"\n");
        write(dir.path(), "default.toml", "");
        write(dir.path(), "broken.toml", "[[chains]");

        assert_eq!(peek_log_level(&dir.path().join("debug.toml")).as_deref(), Some("debug"));
        assert_eq!(peek_log_level(&dir.path().join("default.toml")).as_deref(), Some("info"));
        assert_eq!(peek_log_level(&dir.path().join("broken.toml")), None);
        assert_eq!(peek_log_level(&dir.path().join("absent.toml")), None);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(parse_config("[[chains]"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_persisted_vars_win_over_seeds() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "vars.json", r#"{"user":"bob"}"#);
        write(
            dir.path(),
            "chains.toml",
            r#"
            [settings]
            vars_file = "vars.json"

            [vars]
            user = "alice"
            region = "eu"
            "#,
        );
        let loaded = load_config(&dir.path().join("chains.toml")).unwrap();
        let vars = loaded.global_vars().unwrap();
        assert_eq!(vars.get("user"), Some(&serde_json::json!("bob")));
        assert_eq!(vars.get("region"), Some(&serde_json::json!("eu")));
    }
}
