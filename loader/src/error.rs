//! Loader error types.

use thiserror::Error;

/// Errors that can occur while registering or loading resources.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Every fetch layer (remote, cache, backup) failed for the resource.
    #[error("Resource unavailable: {resource_id} ({reason})")]
    ResourceUnavailable { resource_id: String, reason: String },

    /// No resource registered under this id.
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// A resource with this id is already registered.
    #[error("Resource already registered: {0}")]
    AlreadyRegistered(String),

    /// A single location could not be fetched.
    #[error("Fetch failed for {location}: {message}")]
    Fetch { location: String, message: String },

    /// The remote server answered with its rejection page instead of data.
    #[error("Request rejected by {location}")]
    RequestRejected { location: String },

    /// Local cache read or write failed.
    #[error("Resource cache error: {0}")]
    Cache(#[from] std::io::Error),

    /// Malformed location or configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LoaderError {
    /// Create a fetch error for a location.
    pub fn fetch(location: impl ToString, message: impl ToString) -> Self {
        LoaderError::Fetch {
            location: location.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether a later attempt (next layer or next scheduled tick) may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LoaderError::Fetch { .. }
                | LoaderError::RequestRejected { .. }
                | LoaderError::ResourceUnavailable { .. }
                | LoaderError::Cache(_)
        )
    }
}

/// Result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;
