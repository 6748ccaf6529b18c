//! Listener bindings notified when resource data is loaded.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Error returned by a listener that could not consume a payload.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives freshly loaded resource payloads.
pub trait LoaderListener: Send + Sync {
    /// Name used in logs.
    fn listener_name(&self) -> &str;

    /// Consume a payload loaded for `resource_id`.
    fn on_data_loaded(&self, resource_id: &str, data: &[u8]) -> Result<(), ListenerError>;
}

/// Resource id that binds a listener to every resource.
pub const WILDCARD: &str = "";

/// Many-to-many binding of resource ids to listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    bindings: DashMap<String, Vec<Arc<dyn LoaderListener>>>,
}

/// Outcome of dispatching one payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a listener to resources; an empty slice binds it to all resources.
    pub fn add(&self, listener: Arc<dyn LoaderListener>, resource_ids: &[&str]) {
        if resource_ids.is_empty() {
            self.bind(WILDCARD, listener);
        } else {
            for id in resource_ids {
                self.bind(id, listener.clone());
            }
        }
    }

    fn bind(&self, resource_id: &str, listener: Arc<dyn LoaderListener>) {
        let mut entry = self.bindings.entry(resource_id.to_string()).or_default();
        if !entry.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            entry.push(listener);
        }
    }

    /// Unbind a listener; an empty slice removes the wildcard binding.
    pub fn remove(&self, listener: &Arc<dyn LoaderListener>, resource_ids: &[&str]) {
        let ids: Vec<&str> = if resource_ids.is_empty() {
            vec![WILDCARD]
        } else {
            resource_ids.to_vec()
        };
        for id in ids {
            if let Some(mut entry) = self.bindings.get_mut(id) {
                entry.retain(|l| !Arc::ptr_eq(l, listener));
            }
        }
    }

    /// Listeners bound to `resource_id` followed by wildcard listeners.
    pub fn listeners_for(&self, resource_id: &str) -> Vec<Arc<dyn LoaderListener>> {
        let mut listeners: Vec<Arc<dyn LoaderListener>> = self
            .bindings
            .get(resource_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();

        if resource_id != WILDCARD {
            if let Some(wildcard) = self.bindings.get(WILDCARD) {
                for l in wildcard.iter() {
                    if !listeners.iter().any(|existing| Arc::ptr_eq(existing, l)) {
                        listeners.push(l.clone());
                    }
                }
            }
        }
        listeners
    }

    /// Hand a payload to every bound listener. Listener failures are logged
    /// and do not stop delivery to the others.
    pub fn dispatch(&self, resource_id: &str, data: &[u8]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for listener in self.listeners_for(resource_id) {
            match listener.on_data_loaded(resource_id, data) {
                Ok(()) => {
                    debug!(resource_id, listener = listener.listener_name(), "Listener notified");
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(
                        resource_id,
                        listener = listener.listener_name(),
                        error = %e,
                        "Listener failed to consume loaded data"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }
}
