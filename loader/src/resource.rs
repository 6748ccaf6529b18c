//! Resource descriptors, locations and update policies.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use pivotfx_common::parse_period;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, LoaderResult};

/// Property naming the refresh period of a scheduled resource.
pub const PROPERTY_PERIOD: &str = "period";
/// Property naming the delay before the first scheduled refresh.
pub const PROPERTY_DELAY: &str = "delay";

/// When and how often a resource is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdatePolicy {
    /// Never touch the network; load once from cache or backup.
    Never,
    /// One remote load when registered.
    OnStartup,
    /// One remote load when registered, then periodic reloads.
    Scheduled,
    /// Nothing is loaded until explicitly requested.
    Lazy,
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdatePolicy::Never => "NEVER",
            UpdatePolicy::OnStartup => "ONSTARTUP",
            UpdatePolicy::Scheduled => "SCHEDULED",
            UpdatePolicy::Lazy => "LAZY",
        };
        f.write_str(name)
    }
}

/// Where the bytes of a resource live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocation {
    /// Remote HTTP(S) endpoint.
    Http(Url),
    /// Local file.
    File(PathBuf),
    /// Payload compiled into the binary.
    Embedded {
        name: &'static str,
        data: &'static [u8],
    },
}

impl ResourceLocation {
    /// Parse a location string: `http(s)://` URLs, `file://` URLs or bare paths.
    pub fn parse(value: &str) -> LoaderResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(LoaderError::InvalidConfig("empty resource location".to_string()));
        }

        if value.starts_with("http://") || value.starts_with("https://") {
            let url = Url::parse(value)
                .map_err(|e| LoaderError::InvalidConfig(format!("{value}: {e}")))?;
            return Ok(ResourceLocation::Http(url));
        }

        if let Some(path) = value.strip_prefix("file://") {
            return Ok(ResourceLocation::File(PathBuf::from(path)));
        }

        Ok(ResourceLocation::File(PathBuf::from(value)))
    }

    /// Create an embedded location.
    pub fn embedded(name: &'static str, data: &'static [u8]) -> Self {
        ResourceLocation::Embedded { name, data }
    }

    /// Whether fetching this location goes over the network.
    pub fn is_remote(&self) -> bool {
        matches!(self, ResourceLocation::Http(_))
    }
}

impl fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceLocation::Http(url) => write!(f, "{url}"),
            ResourceLocation::File(path) => write!(f, "file://{}", path.display()),
            ResourceLocation::Embedded { name, .. } => write!(f, "embedded:{name}"),
        }
    }
}

/// Immutable description of a loadable resource.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    resource_id: String,
    update_policy: UpdatePolicy,
    remote_locations: Vec<ResourceLocation>,
    backup: Option<ResourceLocation>,
    properties: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    /// Start building a descriptor.
    pub fn builder(resource_id: impl Into<String>) -> ResourceDescriptorBuilder {
        ResourceDescriptorBuilder::new(resource_id)
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn update_policy(&self) -> UpdatePolicy {
        self.update_policy
    }

    pub fn remote_locations(&self) -> &[ResourceLocation] {
        &self.remote_locations
    }

    pub fn backup(&self) -> Option<&ResourceLocation> {
        self.backup.as_ref()
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Refresh period from the `period` property.
    pub fn period(&self) -> Option<Duration> {
        self.properties.get(PROPERTY_PERIOD).and_then(|p| parse_period(p))
    }

    /// Initial delay from the `delay` property.
    pub fn delay(&self) -> Option<Duration> {
        self.properties.get(PROPERTY_DELAY).and_then(|p| parse_period(p))
    }

    /// Check that the `period` and `delay` properties, when present, parse.
    pub fn validate(&self) -> LoaderResult<()> {
        for key in [PROPERTY_PERIOD, PROPERTY_DELAY] {
            if let Some(value) = self.properties.get(key) {
                if parse_period(value).is_none() {
                    return Err(LoaderError::InvalidConfig(format!(
                        "{}: invalid {key} {value:?}",
                        self.resource_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Copy of this descriptor with a different update policy.
    pub fn with_policy(&self, policy: UpdatePolicy) -> Self {
        Self {
            update_policy: policy,
            ..self.clone()
        }
    }
}

/// Builder for [`ResourceDescriptor`].
#[derive(Debug)]
pub struct ResourceDescriptorBuilder {
    resource_id: String,
    update_policy: UpdatePolicy,
    remote_locations: Vec<ResourceLocation>,
    backup: Option<ResourceLocation>,
    properties: BTreeMap<String, String>,
}

impl ResourceDescriptorBuilder {
    fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            update_policy: UpdatePolicy::OnStartup,
            remote_locations: Vec::new(),
            backup: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    /// Append a remote location, parsed from a string.
    pub fn remote(mut self, location: &str) -> LoaderResult<Self> {
        self.remote_locations.push(ResourceLocation::parse(location)?);
        Ok(self)
    }

    /// Append an already parsed location.
    pub fn location(mut self, location: ResourceLocation) -> Self {
        self.remote_locations.push(location);
        self
    }

    pub fn backup(mut self, location: ResourceLocation) -> Self {
        self.backup = Some(location);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> ResourceDescriptor {
        ResourceDescriptor {
            resource_id: self.resource_id,
            update_policy: self.update_policy,
            remote_locations: self.remote_locations,
            backup: self.backup,
            properties: self.properties,
        }
    }
}
