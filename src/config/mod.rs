//! Application Configuration
//!
//! Loaded from TOML, every section optional.
//!
//! ## Loading Order
//!
//! 1. `ROADWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `roadwatch.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])

pub mod defaults;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Errors raised while reading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

/// A non-fatal config warning (suspicious value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: defaults::SERVER_ADDR.to_string(),
        }
    }
}

/// Which store backs incidents, submissions and routes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    Sled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: PathBuf::from(defaults::DATA_DIR),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Submissions allowed per subject per window
    pub limit: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Evict windows older than `eviction_multiplier × window_ms`
    pub eviction_multiplier: u32,
    pub sweep_interval_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            limit: defaults::ADMISSION_LIMIT,
            window_ms: defaults::ADMISSION_WINDOW_MS,
            eviction_multiplier: defaults::ADMISSION_EVICTION_MULTIPLIER,
            sweep_interval_secs: defaults::ADMISSION_SWEEP_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: defaults::DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::GEOCODER_BASE_URL.to_string(),
            user_agent: format!("roadwatch/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: defaults::GEOCODER_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Load configuration using the standard search order.
    ///
    /// Never fails: unreadable or invalid files fall back with a warning.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("ROADWATCH_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from ROADWATCH_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from ROADWATCH_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "ROADWATCH_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("roadwatch.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./roadwatch.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./roadwatch.toml, using defaults");
                }
            }
        }

        info!("No roadwatch.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Range checks. Warnings only; the service still starts.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.admission.limit == 0 {
            warnings.push(ConfigWarning {
                field: "admission.limit",
                message: "0 admits only the first submission of each window".to_string(),
            });
        }
        if self.admission.window_ms == 0 {
            warnings.push(ConfigWarning {
                field: "admission.window_ms",
                message: "0 ms window never limits anything".to_string(),
            });
        }
        if self.admission.eviction_multiplier == 0 {
            warnings.push(ConfigWarning {
                field: "admission.eviction_multiplier",
                message: "0 evicts windows that are still active".to_string(),
            });
        }
        if self.refresh.interval_ms < defaults::MIN_REFRESH_INTERVAL_MS {
            warnings.push(ConfigWarning {
                field: "refresh.interval_ms",
                message: format!(
                    "{} ms is below the {} ms floor",
                    self.refresh.interval_ms,
                    defaults::MIN_REFRESH_INTERVAL_MS
                ),
            });
        }

        warnings
    }
}
