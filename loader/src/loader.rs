//! Layered resource loading: remote locations, then local cache, then backup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{FileResourceCache, MemoryResourceCache, ResourceCache};
use crate::config::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};
use crate::fetch::{DefaultFetcher, ResourceFetcher};
use crate::listener::{ListenerRegistry, LoaderListener};
use crate::metrics::{LoaderMetrics, LoaderMetricsSnapshot};
use crate::resource::{ResourceDescriptor, ResourceLocation, UpdatePolicy};

/// Which layer served a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fresh data from a remote location.
    Remote,
    /// Previously fetched data from the local cache.
    Cache,
    /// The bundled backup payload.
    Backup,
}

impl LoadOutcome {
    /// Whether fresh data was obtained from the network.
    pub fn is_fresh(&self) -> bool {
        matches!(self, LoadOutcome::Remote)
    }
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadOutcome::Remote => f.write_str("remote"),
            LoadOutcome::Cache => f.write_str("cache"),
            LoadOutcome::Backup => f.write_str("backup"),
        }
    }
}

/// A registered resource and the lock serialising its loads.
struct LoadableResource {
    descriptor: ResourceDescriptor,
    lock: Mutex<()>,
}

/// Loads registered resources and notifies bound listeners.
pub struct ResourceLoader {
    config: LoaderConfig,
    resources: DashMap<String, Arc<LoadableResource>>,
    listeners: Arc<ListenerRegistry>,
    cache: Arc<dyn ResourceCache>,
    fetcher: Arc<dyn ResourceFetcher>,
    metrics: LoaderMetrics,
}

impl ResourceLoader {
    /// Create a loader with the cache and fetcher described by `config`.
    pub fn new(config: LoaderConfig) -> LoaderResult<Self> {
        let cache: Arc<dyn ResourceCache> = match &config.cache_dir {
            Some(dir) => Arc::new(FileResourceCache::new(dir)?),
            None => Arc::new(MemoryResourceCache::new()),
        };
        let fetcher = Arc::new(DefaultFetcher::new(config.request_timeout())?);
        Ok(Self::with_parts(config, cache, fetcher))
    }

    /// Create a loader with explicit cache and fetcher implementations.
    pub fn with_parts(
        config: LoaderConfig,
        cache: Arc<dyn ResourceCache>,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Self {
        Self {
            config,
            resources: DashMap::new(),
            listeners: Arc::new(ListenerRegistry::new()),
            cache,
            fetcher,
            metrics: LoaderMetrics::new(),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Register a resource. Registration does not load anything; see
    /// [`crate::LoaderScheduler::register`] for policy-driven loading.
    pub fn register(&self, descriptor: ResourceDescriptor) -> LoaderResult<()> {
        descriptor.validate()?;
        let id = descriptor.resource_id().to_string();
        if self.resources.contains_key(&id) {
            return Err(LoaderError::AlreadyRegistered(id));
        }

        info!(
            resource_id = %id,
            policy = %descriptor.update_policy(),
            remotes = descriptor.remote_locations().len(),
            has_backup = descriptor.backup().is_some(),
            "Registered resource"
        );

        self.resources.insert(
            id,
            Arc::new(LoadableResource {
                descriptor,
                lock: Mutex::new(()),
            }),
        );
        Ok(())
    }

    pub fn is_registered(&self, resource_id: &str) -> bool {
        self.resources.contains_key(resource_id)
    }

    /// Registered resource ids, sorted.
    pub fn resource_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.resources.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn descriptor(&self, resource_id: &str) -> LoaderResult<ResourceDescriptor> {
        Ok(self.resource(resource_id)?.descriptor.clone())
    }

    pub fn update_policy(&self, resource_id: &str) -> LoaderResult<UpdatePolicy> {
        Ok(self.resource(resource_id)?.descriptor.update_policy())
    }

    pub fn properties(&self, resource_id: &str) -> LoaderResult<BTreeMap<String, String>> {
        Ok(self.resource(resource_id)?.descriptor.properties().clone())
    }

    /// Bind a listener to resources; an empty slice binds it to all resources.
    pub fn add_listener(&self, listener: Arc<dyn LoaderListener>, resource_ids: &[&str]) {
        self.listeners.add(listener, resource_ids);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn LoaderListener>, resource_ids: &[&str]) {
        self.listeners.remove(listener, resource_ids);
    }

    pub fn metrics(&self) -> LoaderMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Load a resource: each remote location in order, then the local cache,
    /// then the backup payload. Remote data is written through to the cache.
    /// Listeners receive the payload of whichever layer succeeded.
    #[instrument(skip(self))]
    pub async fn load(&self, resource_id: &str) -> LoaderResult<LoadOutcome> {
        if self.config.offline {
            debug!("Offline mode, loading locally");
            return self.load_local(resource_id).await;
        }

        let resource = self.resource(resource_id)?;
        self.metrics.load_started();
        let _guard = resource.lock.lock().await;

        let mut failures = Vec::new();
        for location in resource.descriptor.remote_locations() {
            match self.fetch_remote(location).await {
                Ok(data) => {
                    if let Err(e) = self.cache.write(resource_id, &data).await {
                        warn!(error = %e, "Failed to update resource cache");
                    }
                    self.metrics.remote_hit();
                    info!(location = %location, bytes = data.len(), "Loaded resource from remote");
                    self.dispatch(resource_id, data).await;
                    return Ok(LoadOutcome::Remote);
                }
                Err(e) => {
                    warn!(location = %location, error = %e, "Remote fetch failed");
                    failures.push(e.to_string());
                }
            }
        }

        self.load_fallback(&resource, failures).await
    }

    /// Schedule [`ResourceLoader::load`] on a background task.
    pub fn load_async(self: &Arc<Self>, resource_id: &str) -> JoinHandle<LoaderResult<LoadOutcome>> {
        let loader = Arc::clone(self);
        let resource_id = resource_id.to_string();
        tokio::spawn(async move {
            let result = loader.load(&resource_id).await;
            if let Err(e) = &result {
                error!(resource_id = %resource_id, error = %e, "Background load failed");
            }
            result
        })
    }

    /// Load from the local cache or backup only, never touching the network.
    #[instrument(skip(self))]
    pub async fn load_local(&self, resource_id: &str) -> LoaderResult<LoadOutcome> {
        let resource = self.resource(resource_id)?;
        self.metrics.load_started();
        let _guard = resource.lock.lock().await;
        self.load_fallback(&resource, Vec::new()).await
    }

    /// Replace the current data with the backup payload.
    #[instrument(skip(self))]
    pub async fn reset(&self, resource_id: &str) -> LoaderResult<()> {
        let resource = self.resource(resource_id)?;
        let _guard = resource.lock.lock().await;

        let backup = resource.descriptor.backup().ok_or_else(|| LoaderError::ResourceUnavailable {
            resource_id: resource_id.to_string(),
            reason: "no backup location".to_string(),
        })?;
        let data = self.fetcher.fetch(backup).await?;
        info!(location = %backup, "Reset resource to backup data");
        self.dispatch(resource_id, data).await;
        Ok(())
    }

    // --- Private methods ---

    fn resource(&self, resource_id: &str) -> LoaderResult<Arc<LoadableResource>> {
        self.resources
            .get(resource_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| LoaderError::UnknownResource(resource_id.to_string()))
    }

    async fn fetch_remote(&self, location: &ResourceLocation) -> LoaderResult<Vec<u8>> {
        let result = self.fetcher.fetch(location).await.and_then(|data| {
            self.check_payload(location, &data)?;
            Ok(data)
        });
        match &result {
            Err(LoaderError::RequestRejected { .. }) => self.metrics.payload_rejected(),
            Err(_) => self.metrics.fetch_failed(),
            Ok(_) => {}
        }
        result
    }

    /// Reject empty payloads and the server's rejection page.
    fn check_payload(&self, location: &ResourceLocation, data: &[u8]) -> LoaderResult<()> {
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(LoaderError::fetch(location, "empty payload"));
        }

        let first_line_end = data.iter().position(|b| *b == b'\n').unwrap_or(data.len());
        let first_line = String::from_utf8_lossy(&data[..first_line_end]);
        if self
            .config
            .rejection_sentinels
            .iter()
            .any(|sentinel| first_line.contains(sentinel.as_str()))
        {
            return Err(LoaderError::RequestRejected {
                location: location.to_string(),
            });
        }
        Ok(())
    }

    /// Cache, then backup. Caller holds the resource lock.
    async fn load_fallback(
        &self,
        resource: &LoadableResource,
        mut failures: Vec<String>,
    ) -> LoaderResult<LoadOutcome> {
        let resource_id = resource.descriptor.resource_id();

        match self.cache.read(resource_id).await {
            Ok(Some(data)) if !data.is_empty() => {
                self.metrics.cache_hit();
                info!(resource_id, bytes = data.len(), "Loaded resource from local cache");
                self.dispatch(resource_id, data).await;
                return Ok(LoadOutcome::Cache);
            }
            Ok(_) => failures.push("no cached data".to_string()),
            Err(e) => {
                warn!(resource_id, error = %e, "Failed to read resource cache");
                failures.push(e.to_string());
            }
        }

        if let Some(backup) = resource.descriptor.backup() {
            match self.fetcher.fetch(backup).await {
                Ok(data) => {
                    self.metrics.backup_hit();
                    info!(resource_id, location = %backup, "Loaded resource from backup");
                    self.dispatch(resource_id, data).await;
                    return Ok(LoadOutcome::Backup);
                }
                Err(e) => {
                    warn!(resource_id, location = %backup, error = %e, "Backup fetch failed");
                    failures.push(e.to_string());
                }
            }
        } else {
            failures.push("no backup location".to_string());
        }

        self.metrics.load_failed();
        Err(LoaderError::ResourceUnavailable {
            resource_id: resource_id.to_string(),
            reason: failures.join("; "),
        })
    }

    /// Hand the payload to listeners on the blocking pool; parsing can be heavy.
    async fn dispatch(&self, resource_id: &str, data: Vec<u8>) {
        let registry = Arc::clone(&self.listeners);
        let id = resource_id.to_string();
        match tokio::task::spawn_blocking(move || registry.dispatch(&id, &data)).await {
            Ok(report) => {
                if report.failed > 0 {
                    self.metrics.listener_failed(report.failed);
                }
                debug!(resource_id, delivered = report.delivered, failed = report.failed, "Dispatched resource data");
            }
            Err(e) => {
                self.metrics.listener_failed(1);
                error!(resource_id, error = %e, "Listener dispatch panicked");
            }
        }
    }
}
