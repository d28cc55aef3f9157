//! Application configuration
//!
//! Loaded from ~/.folio/config.toml. Every field has a default so the tool
//! works out of the box; the file is only needed to change the home
//! currency, the default benchmark or the rebalancing targets.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOME_CURRENCY: &str = "EUR";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Currency all valuations are reported in.
    pub home_currency: String,

    /// Benchmark ticker used when `benchmark run` is called without one.
    pub default_benchmark: Option<String>,

    /// Rebalancing targets: category -> target percentage of the portfolio.
    pub targets: BTreeMap<String, Decimal>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home_currency: DEFAULT_HOME_CURRENCY.to_string(),
            default_benchmark: None,
            targets: BTreeMap::new(),
        }
    }
}

/// Get the default config path (~/.folio/config.toml)
pub fn get_default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".folio").join("config.toml"))
}

impl Config {
    /// Load configuration, falling back to defaults when the file is absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => get_default_config_path()?,
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config at {:?}", path))?;
        Ok(config)
    }
}
