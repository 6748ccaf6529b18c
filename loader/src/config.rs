//! Loader configuration.

use std::path::PathBuf;
use std::time::Duration;

use pivotfx_common::constants;
use serde::{Deserialize, Serialize};

/// Configuration for [`crate::ResourceLoader`] and [`crate::LoaderScheduler`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory of the persistent resource cache. `None` keeps the cache in memory.
    pub cache_dir: Option<PathBuf>,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Refresh period for scheduled resources without a `period` property, in seconds.
    pub default_period_secs: u64,
    /// Substrings that mark a remote payload as the server's rejection page.
    pub rejection_sentinels: Vec<String>,
    /// Never touch the network: every resource is treated as `NEVER`.
    pub offline: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            cache_dir: Some(std::env::temp_dir().join("pivotfx-cache")),
            request_timeout_secs: constants::REQUEST_TIMEOUT.as_secs(),
            default_period_secs: constants::DEFAULT_REFRESH_PERIOD.as_secs(),
            rejection_sentinels: vec!["Request Rejected".to_string()],
            offline: false,
        }
    }
}

impl LoaderConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("PIVOTFX_CACHE_DIR") {
            self.cache_dir = if dir.is_empty() { None } else { Some(PathBuf::from(dir)) };
        }

        if let Ok(secs) = std::env::var("PIVOTFX_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                self.request_timeout_secs = secs;
            }
        }

        if let Ok(offline) = std::env::var("PIVOTFX_OFFLINE") {
            self.offline = matches!(offline.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn default_period(&self) -> Duration {
        Duration::from_secs(self.default_period_secs)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_secs == 0 {
            return Err("Request timeout cannot be 0".to_string());
        }

        if self.default_period_secs == 0 {
            return Err("Default refresh period cannot be 0".to_string());
        }

        if self.rejection_sentinels.iter().any(|s| s.trim().is_empty()) {
            return Err("Rejection sentinels cannot be blank".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.default_period(), Duration::from_secs(3 * 3600));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = LoaderConfig::default();
        config.default_period_secs = 0;
        assert!(config.validate().is_err());

        let mut config = LoaderConfig::default();
        config.rejection_sentinels.push("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: LoaderConfig = serde_json::from_str(r#"{"offline": true, "cache_dir": null}"#).unwrap();
        assert!(config.offline);
        assert!(config.cache_dir.is_none());
        assert_eq!(config.rejection_sentinels, vec!["Request Rejected".to_string()]);
    }
}
