//! pivotfx Rate Engine
//!
//! Exchange rates between arbitrary currency pairs, bridged through the pivot
//! currency of periodically refreshed reference feeds.
//!
//! # Features
//!
//! - ECB reference rates (daily, 90 days, full history) quoted against EUR
//! - IMF SDR rates with independent quotes in both directions
//! - Cross rates chained through the pivot, with the nearest earlier trading day
//! - Remote, cached and bundled data with scheduled refresh
//!
//! # Example
//!
//! ```rust,ignore
//! use pivotfx_common::Currency;
//! use pivotfx_fx::{EngineConfig, RateEngine, RateQuery};
//!
//! let engine = RateEngine::bootstrap(EngineConfig::from_env()).await?;
//!
//! let query = RateQuery::new(Currency::usd(), Currency::new("BRL"));
//! let rate = engine.get_exchange_rate(&query).await?;
//! println!("{rate}");
//! ```

pub mod builder;
pub mod cache;
pub mod catalog;
pub mod compound;
pub mod config;
pub mod currency_names;
pub mod engine;
pub mod error;
pub mod gate;
pub mod identity;
pub mod parser;
pub mod pivot;
pub mod provider;
pub mod rate;
pub mod strategy;
pub mod table;

pub use builder::RateBuilder;
pub use cache::ResolvedRateCache;
pub use compound::CompoundRateProvider;
pub use config::{EngineConfig, InitialLoad, ProviderConfig};
pub use currency_names::CurrencyNames;
pub use engine::RateEngine;
pub use error::{FxError, FxResult};
pub use gate::{GateState, LoadGate};
pub use identity::IdentityRateProvider;
pub use parser::{EcbFeedParser, FeedParser, ImfFeedParser, ParseContext};
pub use pivot::{PivotRateProvider, ProviderState, ProviderStats};
pub use provider::RateProvider;
pub use rate::{RateContext, RateKind, RateQuery, RateRecord};
pub use strategy::PivotStrategy;
pub use table::{DirectRateTable, DualPivotTable, RateTable, TableSummary};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateProvider;
