//! Explicitly constructed rate engine.

use std::collections::HashMap;
use std::sync::Arc;

use pivotfx_common::{system_clock, SharedClock};
use pivotfx_loader::{LoaderMetricsSnapshot, LoaderScheduler, ResourceLoader};
use tracing::{debug, info, instrument};

use crate::cache::{CacheStats, RateCacheConfig, ResolvedRateCache};
use crate::catalog;
use crate::compound::CompoundRateProvider;
use crate::config::EngineConfig;
use crate::currency_names::CurrencyNames;
use crate::error::{FxError, FxResult};
use crate::identity::{IdentityRateProvider, IDENT};
use crate::pivot::{PivotRateProvider, ProviderStats};
use crate::provider::RateProvider;
use crate::rate::{RateQuery, RateRecord};

/// The rate engine.
///
/// Owns the resource loader, its scheduler and every enabled provider.
/// Queries go through the providers in configuration order and the first
/// answer wins.
pub struct RateEngine {
    config: EngineConfig,
    scheduler: LoaderScheduler,
    chain: CompoundRateProvider,
    feeds: HashMap<String, Arc<PivotRateProvider>>,
    cache: Option<ResolvedRateCache>,
}

impl RateEngine {
    /// Build an engine with a loader created from `config.loader` and the
    /// system clock.
    pub async fn bootstrap(config: EngineConfig) -> FxResult<Self> {
        config.validate().map_err(FxError::InvalidConfig)?;
        let loader = Arc::new(ResourceLoader::new(config.loader.clone())?);
        Self::bootstrap_with(config, loader, system_clock()).await
    }

    /// Build an engine around an existing loader and clock.
    ///
    /// Each provider listens on its resource before the resource is
    /// registered with the scheduler, so the load started by the update
    /// policy is the provider's initial load. Resources the loader already
    /// knows are loaded by the provider itself.
    #[instrument(skip_all, fields(providers = ?config.providers))]
    pub async fn bootstrap_with(
        config: EngineConfig,
        loader: Arc<ResourceLoader>,
        clock: SharedClock,
    ) -> FxResult<Self> {
        config.validate().map_err(FxError::InvalidConfig)?;

        let scheduler = LoaderScheduler::new(Arc::clone(&loader));
        let names = Arc::new(CurrencyNames::with_defaults());
        let mut chain: Vec<Arc<dyn RateProvider>> = Vec::with_capacity(config.providers.len());
        let mut feeds = HashMap::new();

        for name in &config.providers {
            if name.eq_ignore_ascii_case(IDENT) {
                chain.push(Arc::new(IdentityRateProvider::new()));
                continue;
            }

            let definition = catalog::definition(name)
                .ok_or_else(|| FxError::InvalidConfig(format!("Unknown provider: {name}")))?;

            let provider = Arc::new(PivotRateProvider::new(
                definition.provider_config(config.load_timeout()),
                definition.parser(&names),
                Arc::clone(&clock),
            ));

            if loader.is_registered(definition.resource_id) {
                provider.connect(&loader).await?;
            } else {
                provider.attach(&loader);
                let registration = scheduler.register(definition.descriptor()?).await?;
                provider.follow(&loader, registration).await;
            }

            debug!(provider = definition.name, resource_id = definition.resource_id, "Provider connected");
            feeds.insert(definition.name.to_string(), Arc::clone(&provider));
            chain.push(provider);
        }

        let cache = config.use_cache.then(|| {
            ResolvedRateCache::with_config(RateCacheConfig::from_std(
                config.cache_ttl(),
                config.cache_max_entries,
            ))
        });

        let engine = Self {
            scheduler,
            chain: CompoundRateProvider::new(chain),
            feeds,
            cache,
            config,
        };

        info!(
            providers = ?engine.provider_names(),
            scheduled = engine.scheduler.scheduled_count(),
            offline = engine.loader().config().offline,
            "Rate engine started"
        );
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn loader(&self) -> &Arc<ResourceLoader> {
        self.scheduler.loader()
    }

    /// Resolve a rate through the provider chain.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn get_exchange_rate(&self, query: &RateQuery) -> FxResult<RateRecord> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(query) {
                return Ok(cached);
            }
        }

        let rate = self.chain.get_rate(query).await?;

        if let Some(cache) = &self.cache {
            cache.insert(query.clone(), rate.clone());
        }
        Ok(rate)
    }

    /// The rate opposite to `record`, from the provider that produced it.
    pub async fn get_reversed(&self, record: &RateRecord) -> FxResult<RateRecord> {
        self.chain.get_reversed(record).await
    }

    /// Whether any enabled provider passes the query's provider filter.
    pub fn is_available(&self, query: &RateQuery) -> bool {
        self.chain.is_available(query)
    }

    pub fn provider(&self, name: &str) -> Option<&Arc<dyn RateProvider>> {
        self.chain.find(name)
    }

    /// Enabled provider names, in query order.
    pub fn provider_names(&self) -> Vec<String> {
        self.chain.provider_names()
    }

    /// Statistics of the feed-backed providers, in query order.
    pub fn provider_stats(&self) -> Vec<ProviderStats> {
        self.config
            .providers
            .iter()
            .filter_map(|name| {
                self.feeds
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, provider)| provider.stats())
            })
            .collect()
    }

    pub fn loader_metrics(&self) -> LoaderMetricsSnapshot {
        self.loader().metrics()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }

    /// Stop scheduled refreshes. Loads already running still complete.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        info!("Rate engine stopped");
    }
}
