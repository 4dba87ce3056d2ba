//! TOML configuration for the `sq` binary.
//!
//! ```toml
//! [client]
//! url = "https://siem.example.org/"
//! username = "analyst"
//! password = "..."
//!
//! [executor]
//! poll_interval_ms = 200
//! wait_timeout_ms = 120000
//!
//! [query]
//! time_range = "LAST_24_HOURS"
//! fields = ["SrcIP", "DstIP"]
//! filters = [["SrcIP", ["10.0.0.0/8"]]]
//! max_depth = 2
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use sq_client::ClientConfig;
use sq_core::request::DecompositionRequest;
use sq_core::window::TimeRange;
use sq_runner::ExecutorSettings;

const CONFIG_ENV: &str = "SQ_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub executor: ExecutorSettings,
    #[serde(default = "default_query")]
    pub query: DecompositionRequest,
}

fn default_query() -> DecompositionRequest {
    DecompositionRequest::new(TimeRange::default())
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sq")
        .join("config.toml")
}

/// Explicit path, then `$SQ_CONFIG`, then `<config_dir>/sq/config.toml`.
pub fn resolve_config_path(raw_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = raw_path {
        return path;
    }
    if let Ok(value) = std::env::var(CONFIG_ENV) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    default_config_path()
}

pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read config {}", path.as_ref().display()))?;
    let cfg: AppConfig = toml::from_str(&content).context("failed to parse TOML config")?;
    validate(&cfg)?;
    Ok(cfg)
}

/// A standalone query document: the body of a `[query]` table.
pub fn load_query(path: impl AsRef<Path>) -> Result<DecompositionRequest> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read query {}", path.as_ref().display()))?;
    let query: DecompositionRequest =
        toml::from_str(&content).context("failed to parse TOML query")?;
    query.validate().context("invalid query")?;
    Ok(query)
}

fn validate(cfg: &AppConfig) -> Result<()> {
    cfg.query.validate().context("invalid [query] table")?;
    if cfg.executor.poll_interval_ms == 0 {
        anyhow::bail!("[executor] poll_interval_ms must be positive");
    }
    Ok(())
}
