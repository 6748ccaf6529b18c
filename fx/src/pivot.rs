//! The query-facing provider over one loaded feed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use pivotfx_common::SharedClock;
use pivotfx_loader::{
    ListenerError, LoadHandle, LoadOutcome, LoaderError, LoaderListener, LoaderResult, Registration,
    ResourceLoader,
};
use serde::Serialize;
use tokio::task::JoinError;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{InitialLoad, ProviderConfig};
use crate::error::{FxError, FxResult};
use crate::gate::{GateState, LoadGate};
use crate::parser::{FeedParser, ParseContext};
use crate::provider::RateProvider;
use crate::rate::{RateQuery, RateRecord};
use crate::strategy::{self, PivotStrategy};
use crate::table::{RateTable, TableSummary};

/// Provider lifecycle. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderState {
    /// Not yet connected to a loader.
    Uninitialized,
    /// Connected, no table installed yet.
    Loading,
    /// A table is installed.
    Ready,
}

impl ProviderState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProviderState::Ready)
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderState::Uninitialized => "UNINITIALIZED",
            ProviderState::Loading => "LOADING",
            ProviderState::Ready => "READY",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStats {
    pub name: String,
    pub state: ProviderState,
    pub strategy: PivotStrategy,
    pub table: TableSummary,
    pub successful_loads: u64,
    pub failed_loads: u64,
    pub last_error: Option<String>,
}

/// Rate provider answering arbitrary pairs from a feed quoted against one
/// pivot currency.
///
/// The provider listens on its loader resource. Every payload is parsed into
/// a new table that replaces the current one in a single swap; readers keep
/// whatever table they already hold. Until the first table is installed,
/// queries wait on a one-shot [`LoadGate`].
pub struct PivotRateProvider {
    config: ProviderConfig,
    parser: Arc<dyn FeedParser>,
    clock: SharedClock,
    table: RwLock<Arc<RateTable>>,
    /// Serialises table rebuilds; readers never take it.
    install: Mutex<()>,
    state: RwLock<ProviderState>,
    gate: LoadGate,
    last_error: RwLock<Option<String>>,
    successful_loads: AtomicU64,
    failed_loads: AtomicU64,
}

impl PivotRateProvider {
    pub fn new(config: ProviderConfig, parser: Arc<dyn FeedParser>, clock: SharedClock) -> Self {
        Self {
            config,
            parser,
            clock,
            table: RwLock::new(Arc::new(RateTable::Empty)),
            install: Mutex::new(()),
            state: RwLock::new(ProviderState::Uninitialized),
            gate: LoadGate::new(),
            last_error: RwLock::new(None),
            successful_loads: AtomicU64::new(0),
            failed_loads: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn state(&self) -> ProviderState {
        *self.state.read()
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// The currently installed table.
    pub fn table(&self) -> Arc<RateTable> {
        self.table.read().clone()
    }

    /// Listen on the provider's resource and run the initial load.
    ///
    /// With [`InitialLoad::Blocking`] this returns after the load attempt;
    /// with [`InitialLoad::Background`] the load runs on its own task. Load
    /// failures are recorded, not returned: queries report them on timeout.
    #[instrument(skip(self, loader), fields(provider = %self.config.name))]
    pub async fn connect(self: &Arc<Self>, loader: &Arc<ResourceLoader>) -> FxResult<()> {
        if !loader.is_registered(&self.config.resource_id) {
            return Err(LoaderError::UnknownResource(self.config.resource_id.clone()).into());
        }

        self.attach(loader);
        self.track(loader.load_async(&self.config.resource_id)).await;
        Ok(())
    }

    /// Bind the provider to its resource without loading anything.
    ///
    /// The resource does not have to be registered yet, so the provider can
    /// receive the load a [`LoaderScheduler`](pivotfx_loader::LoaderScheduler)
    /// starts on registration.
    pub fn attach(self: &Arc<Self>, loader: &ResourceLoader) {
        let listener: Arc<dyn LoaderListener> = self.clone();
        loader.add_listener(listener, &[self.config.resource_id.as_str()]);
        self.advance(ProviderState::Loading);
    }

    /// Adopt the first load started when the resource was registered.
    ///
    /// Only a registration that loaded nothing makes the provider load by
    /// itself.
    pub async fn follow(self: &Arc<Self>, loader: &Arc<ResourceLoader>, registration: Registration) {
        match registration {
            Registration::Loaded(Ok(outcome)) => {
                debug!(provider = %self.config.name, ?outcome, "Initial data loaded on registration");
            }
            Registration::Loaded(Err(e)) => {
                warn!(provider = %self.config.name, error = %e, "Initial load failed");
                self.record_failure(e.to_string());
            }
            Registration::Started(handle) => self.track(handle).await,
            Registration::Deferred => self.track(loader.load_async(&self.config.resource_id)).await,
        }
    }

    /// Record the result of an initial load, waiting for it only in
    /// blocking mode.
    async fn track(self: &Arc<Self>, handle: LoadHandle) {
        match self.config.initial_load {
            InitialLoad::Blocking => self.record_initial(handle.await),
            InitialLoad::Background => {
                let provider = Arc::clone(self);
                tokio::spawn(async move { provider.record_initial(handle.await) });
            }
        }
    }

    fn record_initial(&self, result: Result<LoaderResult<LoadOutcome>, JoinError>) {
        let error = match result {
            Ok(Ok(_)) => return,
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };
        warn!(provider = %self.config.name, error = %error, "Initial load failed");
        self.record_failure(error);
    }

    /// Parse a payload and install the resulting table.
    ///
    /// On failure the installed table is left untouched.
    pub fn apply(&self, data: &[u8]) -> FxResult<TableSummary> {
        let ctx = ParseContext {
            provider: &self.config.name,
            today: self.clock.today(),
        };

        let fresh = match self.parser.parse(data, &ctx).and_then(|table| self.check_layout(table)) {
            Ok(table) => table,
            Err(e) => {
                error!(provider = %self.config.name, format = self.parser.format(), error = %e, "Feed parse failed");
                self.record_failure(e.to_string());
                return Err(e);
            }
        };

        let summary = {
            let _install = self.install.lock();
            let current = self.table();
            let next = Arc::new(current.merged(fresh));
            let summary = next.summary();
            *self.table.write() = next;
            summary
        };

        self.successful_loads.fetch_add(1, Ordering::Relaxed);
        self.advance(ProviderState::Ready);
        if self.gate.open() {
            info!(provider = %self.config.name, days = summary.days, "Initial rate data available");
        }

        info!(
            provider = %self.config.name,
            days = summary.days,
            currencies = summary.currencies,
            latest = ?summary.latest,
            "Installed rate table"
        );
        Ok(summary)
    }

    pub fn stats(&self) -> ProviderStats {
        ProviderStats {
            name: self.config.name.clone(),
            state: self.state(),
            strategy: self.config.strategy,
            table: self.table().summary(),
            successful_loads: self.successful_loads.load(Ordering::Relaxed),
            failed_loads: self.failed_loads.load(Ordering::Relaxed),
            last_error: self.last_error(),
        }
    }

    /// Reject a table whose layout or pivot disagrees with the configuration.
    fn check_layout(&self, table: RateTable) -> FxResult<RateTable> {
        match (table.strategy(), table.pivot()) {
            (Some(strategy), Some(pivot))
                if strategy != self.config.strategy || pivot != &self.config.pivot =>
            {
                Err(FxError::feed_parse(
                    &self.config.name,
                    format!(
                        "{} feed quotes against {pivot} ({strategy:?}), provider expects {} ({:?})",
                        self.parser.format(),
                        self.config.pivot,
                        self.config.strategy
                    ),
                ))
            }
            _ => Ok(table),
        }
    }

    fn advance(&self, to: ProviderState) {
        let mut state = self.state.write();
        if to > *state {
            debug!(provider = %self.config.name, from = %*state, to = %to, "Provider state change");
            *state = to;
        }
    }

    fn record_failure(&self, message: String) {
        self.failed_loads.fetch_add(1, Ordering::Relaxed);
        *self.last_error.write() = Some(message);
    }
}

#[async_trait]
impl RateProvider for PivotRateProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn get_rate(&self, query: &RateQuery) -> FxResult<RateRecord> {
        if !self.is_available(query) {
            return Err(FxError::unavailable(query.pair(), &self.config.name));
        }

        if !self.gate.is_open() && !self.gate.wait(self.config.load_timeout()).await {
            self.gate.force_open();
            let last_error = self.last_error();
            warn!(
                provider = %self.config.name,
                last_error = ?last_error,
                "Gave up waiting for initial rate data"
            );
            return Err(FxError::DataLoadTimeout {
                provider: self.config.name.clone(),
                last_error,
            });
        }

        let table = self.table();
        strategy::resolve(&table, &self.config.name, query, self.clock.today())
    }

    async fn get_reversed(&self, record: &RateRecord) -> FxResult<RateRecord> {
        let mut query = RateQuery::new(record.term().clone(), record.base().clone())
            .with_provider(self.config.name.clone());
        query.as_of = record.as_of();
        self.get_rate(&query).await
    }
}

impl LoaderListener for PivotRateProvider {
    fn listener_name(&self) -> &str {
        &self.config.name
    }

    fn on_data_loaded(&self, _resource_id: &str, data: &[u8]) -> Result<(), ListenerError> {
        self.apply(data).map(|_| ()).map_err(|e| Box::new(e) as ListenerError)
    }
}
