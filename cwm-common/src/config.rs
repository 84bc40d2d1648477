//! Configuration loading and config file resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CLASSWATCH_CONFIG";

/// Hub configuration
///
/// Every field has a default, so an empty (or missing) TOML file yields a
/// working configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HubConfig {
    pub bind_addr: String,
    pub port: u16,
    pub database_path: PathBuf,

    /// Attention classifier endpoint (POST)
    pub classifier_url: String,
    pub classifier_timeout_ms: u64,

    /// Frames scoring below this SSIM are treated as a noticeable change
    pub similarity_threshold: f64,
    pub similarity_cache_capacity: usize,
    pub similarity_cache_ttl_secs: u64,
    /// Side length of the normalized grayscale fingerprint
    pub roi_size: u32,
    /// Fractional margin added around the located region
    pub roi_margin: f64,

    /// Consecutive identical labels needed to promote a stable state
    pub frame_threshold: u32,
    /// Inattentive ratio at which the class alert fires
    pub alert_threshold: f64,

    /// Broadcast channel capacity for hub events
    pub event_capacity: usize,
    /// CORS origin for the dashboard (None = permissive)
    pub allowed_origin: Option<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 5800,
            database_path: default_data_folder().join("classwatch.db"),
            classifier_url: "http://127.0.0.1:8000/api/attention/analyze".to_string(),
            classifier_timeout_ms: 10_000,
            similarity_threshold: 0.65,
            similarity_cache_capacity: 100,
            similarity_cache_ttl_secs: 600,
            roi_size: 160,
            roi_margin: 0.2,
            frame_threshold: 6,
            alert_threshold: 0.5,
            event_capacity: 100,
            allowed_origin: None,
        }
    }
}

impl HubConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration following the resolution order:
    /// 1. Command-line argument (highest priority)
    /// 2. Environment variable
    /// 3. Per-user config file
    /// 4. Built-in defaults
    ///
    /// An explicitly named file must exist; the per-user file is optional.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let config = match resolve_config_path(cli_path) {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(Error::Config(format!(
                "similarity_threshold must be in (0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if !(self.alert_threshold > 0.0 && self.alert_threshold <= 1.0) {
            return Err(Error::Config(format!(
                "alert_threshold must be in (0, 1], got {}",
                self.alert_threshold
            )));
        }
        if self.frame_threshold == 0 {
            return Err(Error::Config("frame_threshold must be at least 1".to_string()));
        }
        if self.similarity_cache_capacity == 0 {
            return Err(Error::Config(
                "similarity_cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.roi_size < 8 {
            return Err(Error::Config(format!("roi_size must be at least 8, got {}", self.roi_size)));
        }
        if !(0.0..=1.0).contains(&self.roi_margin) {
            return Err(Error::Config(format!(
                "roi_margin must be in [0, 1], got {}",
                self.roi_margin
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Find the config file to load, if any
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("classwatch").join("config.toml"))
        .filter(|p| p.exists())
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("classwatch"))
        .unwrap_or_else(|| PathBuf::from("./classwatch_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HubConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_threshold, 6);
        assert_eq!(config.similarity_cache_capacity, 100);
        assert_eq!(config.similarity_cache_ttl_secs, 600);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HubConfig::from_toml_str("port = 9000\nframe_threshold = 3\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.frame_threshold, 3);
        assert_eq!(config.similarity_threshold, 0.65);
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let config = HubConfig {
            alert_threshold: 1.5,
            ..HubConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = HubConfig {
            frame_threshold: 0,
            ..HubConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
