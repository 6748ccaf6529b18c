//! Rate resolution error types.

use pivotfx_common::CurrencyPair;
use pivotfx_loader::LoaderError;
use thiserror::Error;

/// Errors that can occur while loading or resolving rates.
#[derive(Debug, Error)]
pub enum FxError {
    /// No rate path exists for the pair on the requested or probed days.
    #[error("Conversion {pair} not available from {provider}")]
    ConversionUnavailable { pair: CurrencyPair, provider: String },

    /// A rate record violated a builder invariant.
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    /// The provider never completed a load within the initial wait.
    #[error("{provider} has not loaded rate data in time{}", .last_error.as_ref().map(|e| format!(": {e}")).unwrap_or_default())]
    DataLoadTimeout {
        provider: String,
        last_error: Option<String>,
    },

    /// A feed payload could not be parsed.
    #[error("Failed to parse {provider} feed: {message}")]
    FeedParse { provider: String, message: String },

    /// Engine or provider configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Loader error.
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),
}

impl FxError {
    pub fn unavailable(pair: CurrencyPair, provider: impl Into<String>) -> Self {
        FxError::ConversionUnavailable {
            pair,
            provider: provider.into(),
        }
    }

    pub fn feed_parse(provider: impl Into<String>, message: impl ToString) -> Self {
        FxError::FeedParse {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Whether this is the plain "no such rate" answer.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, FxError::ConversionUnavailable { .. })
    }
}

/// Result type for rate operations.
pub type FxResult<T> = Result<T, FxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pivotfx_common::Currency;

    #[test]
    fn test_timeout_message_includes_last_error() {
        let err = FxError::DataLoadTimeout {
            provider: "IMF".to_string(),
            last_error: Some("connection refused".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "IMF has not loaded rate data in time: connection refused"
        );

        let err = FxError::DataLoadTimeout {
            provider: "IMF".to_string(),
            last_error: None,
        };
        assert_eq!(err.to_string(), "IMF has not loaded rate data in time");
    }

    #[test]
    fn test_is_unavailable() {
        let pair = CurrencyPair::new(Currency::usd(), Currency::new("BRL"));
        assert!(FxError::unavailable(pair, "ECB").is_unavailable());
        assert!(!FxError::InvalidRate("x".to_string()).is_unavailable());
    }
}
