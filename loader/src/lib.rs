//! pivotfx Resource Loader
//!
//! Fetches named data resources from remote locations with a layered
//! fallback (remote, local cache, bundled backup), notifies listeners with the
//! payload, and refreshes resources according to their update policy.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pivotfx_loader::{LoaderConfig, LoaderScheduler, ResourceDescriptor, ResourceLoader, UpdatePolicy};
//!
//! let loader = Arc::new(ResourceLoader::new(LoaderConfig::default())?);
//! let scheduler = LoaderScheduler::new(loader.clone());
//!
//! let descriptor = ResourceDescriptor::builder("ECB")
//!     .policy(UpdatePolicy::Scheduled)
//!     .remote("https://www.ecb.europa.eu/stats/eurofxref/eurofxref-daily.xml")?
//!     .build();
//! scheduler.register(descriptor).await?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod listener;
pub mod loader;
pub mod metrics;
pub mod resource;
pub mod scheduler;

pub use cache::{FileResourceCache, MemoryResourceCache, ResourceCache};
pub use config::LoaderConfig;
pub use error::{LoaderError, LoaderResult};
pub use fetch::{DefaultFetcher, ResourceFetcher};
pub use listener::{ListenerError, ListenerRegistry, LoaderListener};
pub use loader::{LoadOutcome, ResourceLoader};
pub use metrics::{LoaderMetrics, LoaderMetricsSnapshot};
pub use resource::{ResourceDescriptor, ResourceDescriptorBuilder, ResourceLocation, UpdatePolicy};
pub use scheduler::{LoadHandle, LoaderScheduler, Registration};
