use crate::aggregation::{DEFAULT_WINDOW_MINUTES, SourcePolicy};
use crate::geo::DEFAULT_RADIUS_KM;
use crate::store::DEFAULT_FETCH_LIMIT;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub aggregation: Option<AggregationSection>,
    #[serde(default)]
    pub nearby: Option<NearbySection>,
    #[serde(default)]
    pub data: Option<DataSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AggregationSection {
    /// Trailing window in minutes (default: 60)
    pub window_minutes: Option<u32>,
    /// `override` (default) or `blend`
    pub source_policy: Option<SourcePolicy>,
    /// Reports fetched per office before aggregation (default: 10)
    pub report_fetch_limit: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NearbySection {
    pub default_radius_km: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSection {
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.window_minutes() == 0 {
            return Err(ConfigError::Invalid(
                "aggregation.window_minutes must be greater than zero".to_string(),
            ));
        }
        if self.report_fetch_limit() == 0 {
            return Err(ConfigError::Invalid(
                "aggregation.report_fetch_limit must be greater than zero".to_string(),
            ));
        }
        let radius = self.default_radius_km();
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "nearby.default_radius_km must be positive, got {radius}"
            )));
        }
        Ok(())
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn window_minutes(&self) -> u32 {
        self.aggregation
            .as_ref()
            .and_then(|a| a.window_minutes)
            .unwrap_or(DEFAULT_WINDOW_MINUTES)
    }

    pub fn source_policy(&self) -> SourcePolicy {
        self.aggregation
            .as_ref()
            .and_then(|a| a.source_policy)
            .unwrap_or_default()
    }

    pub fn report_fetch_limit(&self) -> usize {
        self.aggregation
            .as_ref()
            .and_then(|a| a.report_fetch_limit)
            .unwrap_or(DEFAULT_FETCH_LIMIT)
    }

    pub fn default_radius_km(&self) -> f64 {
        self.nearby
            .as_ref()
            .and_then(|n| n.default_radius_km)
            .unwrap_or(DEFAULT_RADIUS_KM)
    }

    /// Empty paths are treated as unset.
    pub fn seed_path(&self) -> Option<&Path> {
        let path = self.data.as_ref()?.seed_path.as_deref()?;
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }
}
