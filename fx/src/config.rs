//! Provider and engine configuration.

use std::time::Duration;

use pivotfx_common::{constants, Currency};
use pivotfx_loader::LoaderConfig;
use serde::{Deserialize, Serialize};

use crate::strategy::PivotStrategy;

/// How a provider performs its first load when connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialLoad {
    /// `connect` returns after the first load attempt finished.
    Blocking,
    /// `connect` returns immediately; queries wait on the load gate.
    Background,
}

/// Configuration of one [`crate::PivotRateProvider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name matched against query filters.
    pub name: String,
    /// Loader resource feeding this provider.
    pub resource_id: String,
    /// Currency every quote is expressed against.
    pub pivot: Currency,
    pub strategy: PivotStrategy,
    pub initial_load: InitialLoad,
    /// Maximum wait for the first load, in seconds.
    pub load_timeout_secs: u64,
}

impl ProviderConfig {
    pub fn new(
        name: impl Into<String>,
        resource_id: impl Into<String>,
        pivot: Currency,
        strategy: PivotStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            resource_id: resource_id.into(),
            pivot,
            strategy,
            initial_load: InitialLoad::Background,
            load_timeout_secs: constants::INITIAL_LOAD_TIMEOUT.as_secs(),
        }
    }

    pub fn with_initial_load(mut self, initial_load: InitialLoad) -> Self {
        self.initial_load = initial_load;
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout_secs = timeout.as_secs();
        self
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Provider name cannot be empty".to_string());
        }

        if self.resource_id.trim().is_empty() {
            return Err(format!("Provider {} has no resource id", self.name));
        }

        if self.load_timeout_secs == 0 {
            return Err(format!("Provider {} load timeout cannot be 0", self.name));
        }

        Ok(())
    }
}

/// Configuration of a [`crate::RateEngine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Providers to enable, in query order.
    pub providers: Vec<String>,
    /// How long the first query waits for each provider's data, in seconds.
    pub load_timeout_secs: u64,
    /// Whether resolved rates are memoised.
    pub use_cache: bool,
    /// Lifetime of memoised rates, in milliseconds.
    pub cache_ttl_ms: u64,
    /// Upper bound on memoised rates.
    pub cache_max_entries: usize,
    /// Resource loading.
    pub loader: LoaderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            providers: crate::catalog::DEFAULT_CHAIN.iter().map(|s| s.to_string()).collect(),
            load_timeout_secs: constants::INITIAL_LOAD_TIMEOUT.as_secs(),
            use_cache: true,
            cache_ttl_ms: 60_000,
            cache_max_entries: 10_000,
            loader: LoaderConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from environment variables.
    pub fn apply_env(&mut self) {
        self.loader.apply_env();

        if let Ok(providers) = std::env::var("PIVOTFX_PROVIDERS") {
            let providers: Vec<String> = providers
                .split(',')
                .map(|p| p.trim().to_uppercase())
                .filter(|p| !p.is_empty())
                .collect();
            if !providers.is_empty() {
                self.providers = providers;
            }
        }

        if let Ok(secs) = std::env::var("PIVOTFX_LOAD_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                self.load_timeout_secs = secs;
            }
        }
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.loader.validate()?;

        if self.providers.is_empty() {
            return Err("At least one provider must be enabled".to_string());
        }

        for name in &self.providers {
            if !crate::catalog::is_known(name) {
                return Err(format!("Unknown provider: {name}"));
            }
        }

        if self.load_timeout_secs == 0 {
            return Err("Load timeout cannot be 0".to_string());
        }

        if self.use_cache && self.cache_max_entries == 0 {
            return Err("Cache max entries cannot be 0 when caching is enabled".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.providers, vec!["IDENT", "ECB", "IMF", "ECB-HIST90", "ECB-HIST"]);
        assert_eq!(config.load_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = EngineConfig::default();
        config.providers = vec!["BOGUS".to_string()];
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.providers.clear();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.load_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_config_from_json() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"providers": ["ECB"], "use_cache": false, "loader": {"offline": true}}"#,
        )
        .unwrap();
        assert_eq!(config.providers, vec!["ECB"]);
        assert!(!config.use_cache);
        assert!(config.loader.offline);
        assert_eq!(config.load_timeout_secs, 30);
    }

    #[test]
    fn test_provider_config() {
        let config = ProviderConfig::new("IMF", "IMF", Currency::sdr(), PivotStrategy::DualPivot)
            .with_initial_load(InitialLoad::Blocking)
            .with_load_timeout(Duration::from_secs(5));
        assert!(config.validate().is_ok());
        assert_eq!(config.load_timeout(), Duration::from_secs(5));

        let bad = ProviderConfig::new("", "IMF", Currency::sdr(), PivotStrategy::DualPivot);
        assert!(bad.validate().is_err());
    }
}
