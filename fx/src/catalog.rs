//! Built-in provider definitions.

use std::sync::Arc;
use std::time::Duration;

use pivotfx_common::Currency;
use pivotfx_loader::resource::PROPERTY_PERIOD;
use pivotfx_loader::{LoaderResult, ResourceDescriptor, ResourceLocation, UpdatePolicy};

use crate::config::{InitialLoad, ProviderConfig};
use crate::currency_names::CurrencyNames;
use crate::identity::IDENT;
use crate::parser::{EcbFeedParser, FeedParser, ImfFeedParser};
use crate::strategy::PivotStrategy;

/// Providers enabled by default, in query order.
pub const DEFAULT_CHAIN: &[&str] = &["IDENT", "ECB", "IMF", "ECB-HIST90", "ECB-HIST"];

/// Wire format of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    EcbXml,
    ImfTsv,
}

/// A feed-backed provider shipped with the library.
#[derive(Debug, Clone, Copy)]
pub struct ProviderDefinition {
    pub name: &'static str,
    pub resource_id: &'static str,
    pub url: &'static str,
    pub backup_name: &'static str,
    pub backup: &'static [u8],
    pub policy: UpdatePolicy,
    /// Refresh period, `HH:MM`.
    pub period: &'static str,
    pub pivot: &'static str,
    pub strategy: PivotStrategy,
    pub format: FeedFormat,
}

static DEFINITIONS: &[ProviderDefinition] = &[
    ProviderDefinition {
        name: "ECB",
        resource_id: "ECB",
        url: "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-daily.xml",
        backup_name: "ecb-current.xml",
        backup: include_bytes!("../data/ecb-current.xml"),
        policy: UpdatePolicy::Scheduled,
        period: "03:00",
        pivot: "EUR",
        strategy: PivotStrategy::Direct,
        format: FeedFormat::EcbXml,
    },
    ProviderDefinition {
        name: "IMF",
        resource_id: "IMF",
        url: "https://www.imf.org/external/np/fin/data/rms_five.aspx?tsvflag=Y",
        backup_name: "imf.tsv",
        backup: include_bytes!("../data/imf.tsv"),
        policy: UpdatePolicy::Scheduled,
        period: "06:00",
        pivot: "SDR",
        strategy: PivotStrategy::DualPivot,
        format: FeedFormat::ImfTsv,
    },
    ProviderDefinition {
        name: "ECB-HIST90",
        resource_id: "ECB-HIST90",
        url: "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-hist-90d.xml",
        backup_name: "ecb-hist90.xml",
        backup: include_bytes!("../data/ecb-hist90.xml"),
        policy: UpdatePolicy::Scheduled,
        period: "03:00",
        pivot: "EUR",
        strategy: PivotStrategy::Direct,
        format: FeedFormat::EcbXml,
    },
    ProviderDefinition {
        name: "ECB-HIST",
        resource_id: "ECB-HIST",
        url: "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-hist.xml",
        backup_name: "ecb-hist90.xml",
        backup: include_bytes!("../data/ecb-hist90.xml"),
        policy: UpdatePolicy::Scheduled,
        period: "24:00",
        pivot: "EUR",
        strategy: PivotStrategy::Direct,
        format: FeedFormat::EcbXml,
    },
];

/// All feed-backed definitions.
pub fn definitions() -> &'static [ProviderDefinition] {
    DEFINITIONS
}

pub fn definition(name: &str) -> Option<&'static ProviderDefinition> {
    DEFINITIONS.iter().find(|d| d.name.eq_ignore_ascii_case(name))
}

/// Whether `name` is a provider this library can build.
pub fn is_known(name: &str) -> bool {
    name.eq_ignore_ascii_case(IDENT) || definition(name).is_some()
}

impl ProviderDefinition {
    /// Loader descriptor: the remote URL, the bundled backup and the refresh period.
    pub fn descriptor(&self) -> LoaderResult<ResourceDescriptor> {
        Ok(ResourceDescriptor::builder(self.resource_id)
            .policy(self.policy)
            .remote(self.url)?
            .backup(ResourceLocation::embedded(self.backup_name, self.backup))
            .property(PROPERTY_PERIOD, self.period)
            .build())
    }

    pub fn provider_config(&self, load_timeout: Duration) -> ProviderConfig {
        ProviderConfig::new(self.name, self.resource_id, Currency::new(self.pivot), self.strategy)
            .with_initial_load(InitialLoad::Background)
            .with_load_timeout(load_timeout)
    }

    pub fn parser(&self, names: &Arc<CurrencyNames>) -> Arc<dyn FeedParser> {
        match self.format {
            FeedFormat::EcbXml => Arc::new(EcbFeedParser::new()),
            FeedFormat::ImfTsv => Arc::new(ImfFeedParser::new(Arc::clone(names))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseContext;
    use chrono::NaiveDate;

    #[test]
    fn test_known_providers() {
        for name in DEFAULT_CHAIN {
            assert!(is_known(name), "{name}");
        }
        assert!(is_known("ecb-hist90"));
        assert!(!is_known("BOGUS"));
        assert!(definition("IDENT").is_none());
    }

    #[test]
    fn test_descriptors() {
        let descriptor = definition("ECB-HIST").unwrap().descriptor().unwrap();
        assert_eq!(descriptor.resource_id(), "ECB-HIST");
        assert_eq!(descriptor.update_policy(), UpdatePolicy::Scheduled);
        assert_eq!(descriptor.period(), Some(Duration::from_secs(24 * 3600)));
        assert_eq!(descriptor.remote_locations().len(), 1);
        assert!(descriptor.backup().is_some());
    }

    #[test]
    fn test_bundled_backups_parse() {
        let names = Arc::new(CurrencyNames::with_defaults());
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        for definition in definitions() {
            let ctx = ParseContext { provider: definition.name, today };
            let table = definition.parser(&names).parse(definition.backup, &ctx).unwrap();
            assert!(!table.is_empty(), "{}", definition.name);
        }
    }
}
