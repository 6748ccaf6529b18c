//! Policy-driven loading and periodic refresh of registered resources.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::LoaderResult;
use crate::loader::{LoadOutcome, ResourceLoader};
use crate::resource::{ResourceDescriptor, UpdatePolicy};

/// Handle of a load started by the scheduler.
pub type LoadHandle = JoinHandle<LoaderResult<LoadOutcome>>;

/// What registering a resource did about its first load.
#[derive(Debug)]
pub enum Registration {
    /// Loaded from cache or backup before `register` returned.
    Loaded(LoaderResult<LoadOutcome>),
    /// A load is running on its own task.
    Started(LoadHandle),
    /// Nothing was loaded.
    Deferred,
}

impl Registration {
    /// The background load, if one was started.
    pub fn into_handle(self) -> Option<LoadHandle> {
        match self {
            Registration::Started(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Registers resources with a [`ResourceLoader`] and drives their refresh.
///
/// Each scheduled resource owns one ticker task. Ticks start loads on
/// separate tasks so that stopping a ticker never interrupts a load in flight.
pub struct LoaderScheduler {
    loader: Arc<ResourceLoader>,
    tickers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl LoaderScheduler {
    pub fn new(loader: Arc<ResourceLoader>) -> Self {
        Self {
            loader,
            tickers: Mutex::new(HashMap::new()),
        }
    }

    pub fn loader(&self) -> &Arc<ResourceLoader> {
        &self.loader
    }

    /// Register a resource and act on its update policy:
    ///
    /// * `NEVER`: load from cache or backup before returning.
    /// * `ONSTARTUP`: start one background load.
    /// * `SCHEDULED`: start one background load and a periodic refresh.
    /// * `LAZY`: nothing.
    ///
    /// Listeners bound before the call receive the first load.
    pub async fn register(&self, descriptor: ResourceDescriptor) -> LoaderResult<Registration> {
        let resource_id = descriptor.resource_id().to_string();
        let policy = self.effective_policy(&descriptor);
        self.loader.register(descriptor.clone())?;
        self.apply_policy(&resource_id, policy, &descriptor).await
    }

    /// Replace the refresh schedule. All tickers are stopped, descriptors not
    /// yet known to the loader are registered, and every `SCHEDULED`
    /// descriptor gets a fresh ticker. Loads already running are unaffected.
    pub async fn reconfigure(&self, descriptors: Vec<ResourceDescriptor>) -> LoaderResult<()> {
        self.stop_tickers();

        for descriptor in descriptors {
            let resource_id = descriptor.resource_id().to_string();
            if self.loader.is_registered(&resource_id) {
                if self.effective_policy(&descriptor) == UpdatePolicy::Scheduled {
                    self.schedule(&descriptor);
                }
            } else {
                self.register(descriptor).await?;
            }
        }

        info!(scheduled = self.scheduled_count(), "Loader schedule reconfigured");
        Ok(())
    }

    /// Stop every ticker.
    pub fn shutdown(&self) {
        self.stop_tickers();
        info!("Loader scheduler stopped");
    }

    /// Number of resources with an active ticker.
    pub fn scheduled_count(&self) -> usize {
        self.tickers.lock().len()
    }

    pub fn is_scheduled(&self, resource_id: &str) -> bool {
        self.tickers.lock().contains_key(resource_id)
    }

    fn effective_policy(&self, descriptor: &ResourceDescriptor) -> UpdatePolicy {
        match descriptor.update_policy() {
            UpdatePolicy::Lazy => UpdatePolicy::Lazy,
            _ if self.loader.config().offline => UpdatePolicy::Never,
            policy => policy,
        }
    }

    async fn apply_policy(
        &self,
        resource_id: &str,
        policy: UpdatePolicy,
        descriptor: &ResourceDescriptor,
    ) -> LoaderResult<Registration> {
        match policy {
            UpdatePolicy::Never => {
                let result = self.loader.load_local(resource_id).await;
                if let Err(e) = &result {
                    warn!(resource_id, error = %e, "No local data for resource");
                }
                Ok(Registration::Loaded(result))
            }
            UpdatePolicy::OnStartup => Ok(Registration::Started(self.loader.load_async(resource_id))),
            UpdatePolicy::Scheduled => {
                let handle = self.loader.load_async(resource_id);
                self.schedule(descriptor);
                Ok(Registration::Started(handle))
            }
            UpdatePolicy::Lazy => {
                debug!(resource_id, "Lazy resource, not loading");
                Ok(Registration::Deferred)
            }
        }
    }

    fn schedule(&self, descriptor: &ResourceDescriptor) {
        let resource_id = descriptor.resource_id().to_string();
        let period = descriptor
            .period()
            .filter(|p| !p.is_zero())
            .unwrap_or_else(|| self.loader.config().default_period());
        let delay = descriptor.delay().unwrap_or(Duration::ZERO);

        let loader = Arc::clone(&self.loader);
        let id = resource_id.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + delay + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!(resource_id = %id, "Scheduled reload");
                loader.load_async(&id);
            }
        });

        info!(
            resource_id = %resource_id,
            period_secs = period.as_secs(),
            delay_secs = delay.as_secs(),
            "Scheduled resource refresh"
        );

        if let Some(previous) = self.tickers.lock().insert(resource_id, handle) {
            previous.abort();
        }
    }

    fn stop_tickers(&self) {
        for (_, handle) in self.tickers.lock().drain() {
            handle.abort();
        }
    }
}

impl Drop for LoaderScheduler {
    fn drop(&mut self) {
        self.stop_tickers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryResourceCache;
    use crate::config::LoaderConfig;
    use crate::listener::tests::RecordingListener;
    use crate::loader::tests::ScriptedFetcher;
    use crate::resource::{ResourceLocation, PROPERTY_PERIOD};

    const REMOTE: &str = "https://rates.example/daily";

    fn scheduler(offline: bool) -> (LoaderScheduler, Arc<ScriptedFetcher>, Arc<RecordingListener>) {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.serve(REMOTE, b"remote data");
        let loader = Arc::new(ResourceLoader::with_parts(
            LoaderConfig { cache_dir: None, offline, ..Default::default() },
            Arc::new(MemoryResourceCache::new()),
            fetcher.clone(),
        ));
        let listener = Arc::new(RecordingListener::default());
        loader.add_listener(listener.clone(), &[]);
        (LoaderScheduler::new(loader), fetcher, listener)
    }

    fn descriptor(id: &str, policy: UpdatePolicy) -> ResourceDescriptor {
        ResourceDescriptor::builder(id)
            .policy(policy)
            .remote(REMOTE)
            .unwrap()
            .backup(ResourceLocation::embedded("backup", b"backup data"))
            .property(PROPERTY_PERIOD, "60")
            .build()
    }

    async fn wait_for_count(listener: &RecordingListener, expected: usize) {
        for _ in 0..200 {
            if listener.count() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("expected {expected} loads, saw {}", listener.count());
    }

    #[tokio::test]
    async fn test_never_loads_locally_before_returning() {
        let (scheduler, _fetcher, listener) = scheduler(false);

        let registration = scheduler.register(descriptor("R", UpdatePolicy::Never)).await.unwrap();

        assert!(matches!(registration, Registration::Loaded(Ok(LoadOutcome::Backup))));
        assert_eq!(listener.received.lock()[0].1, b"backup data".to_vec());
        assert!(!scheduler.is_scheduled("R"));
    }

    #[tokio::test]
    async fn test_on_startup_loads_once() {
        let (scheduler, _fetcher, listener) = scheduler(false);

        let registration = scheduler.register(descriptor("R", UpdatePolicy::OnStartup)).await.unwrap();
        let outcome = registration.into_handle().unwrap().await.unwrap().unwrap();

        assert_eq!(outcome, LoadOutcome::Remote);
        assert_eq!(listener.count(), 1);
        assert!(!scheduler.is_scheduled("R"));
    }

    #[tokio::test]
    async fn test_lazy_does_nothing() {
        let (scheduler, fetcher, listener) = scheduler(false);

        let registration = scheduler.register(descriptor("R", UpdatePolicy::Lazy)).await.unwrap();

        assert!(matches!(registration, Registration::Deferred));
        assert_eq!(listener.count(), 0);
        assert_eq!(fetcher.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(scheduler.loader().is_registered("R"));
    }

    #[tokio::test]
    async fn test_offline_treats_policies_as_never() {
        let (scheduler, _fetcher, listener) = scheduler(true);

        let registration = scheduler.register(descriptor("R", UpdatePolicy::Scheduled)).await.unwrap();

        assert!(matches!(registration, Registration::Loaded(Ok(LoadOutcome::Backup))));
        assert!(!scheduler.is_scheduled("R"));
        assert_eq!(listener.received.lock()[0].1, b"backup data".to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_reloads_periodically() {
        let (scheduler, _fetcher, listener) = scheduler(false);

        let registration = scheduler.register(descriptor("R", UpdatePolicy::Scheduled)).await.unwrap();
        registration.into_handle().unwrap().await.unwrap().unwrap();
        assert_eq!(listener.count(), 1);
        assert!(scheduler.is_scheduled("R"));

        tokio::time::sleep(Duration::from_secs(61)).await;
        wait_for_count(&listener, 2).await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        wait_for_count(&listener, 3).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_refresh() {
        let (scheduler, _fetcher, listener) = scheduler(false);

        let registration = scheduler.register(descriptor("R", UpdatePolicy::Scheduled)).await.unwrap();
        registration.into_handle().unwrap().await.unwrap().unwrap();

        scheduler.shutdown();
        assert_eq!(scheduler.scheduled_count(), 0);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(listener.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_replaces_schedule() {
        let (scheduler, _fetcher, listener) = scheduler(false);

        let registration = scheduler.register(descriptor("A", UpdatePolicy::Scheduled)).await.unwrap();
        registration.into_handle().unwrap().await.unwrap().unwrap();

        scheduler
            .reconfigure(vec![
                descriptor("A", UpdatePolicy::Lazy),
                descriptor("B", UpdatePolicy::Scheduled),
            ])
            .await
            .unwrap();

        assert!(!scheduler.is_scheduled("A"));
        assert!(scheduler.is_scheduled("B"));
        assert!(scheduler.loader().is_registered("B"));

        // initial load of B
        wait_for_count(&listener, 2).await;
        tokio::time::sleep(Duration::from_secs(61)).await;
        wait_for_count(&listener, 3).await;

        let a_loads = listener.received.lock().iter().filter(|(id, _)| id == "A").count();
        assert_eq!(a_loads, 1);
    }
}
