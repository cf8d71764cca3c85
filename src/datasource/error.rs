//! Error types for rate source operations

use thiserror::Error;

use crate::models::CurrencyCode;

/// Errors that can occur while fetching rates from a remote provider
///
/// # Error Categories
///
/// - **Transport Errors**: `Transport` (connection refused, DNS, TLS, client timeout)
/// - **Remote Errors**: `Remote` (non-2xx status), `Api` (2xx with `success: false`)
/// - **Decode Errors**: `Decode`, `BaseMismatch`
#[derive(Debug, Error)]
pub enum SourceError {
    /// Client was constructed with missing settings
    #[error("Invalid rate source configuration: {0}")]
    Configuration(String),

    /// Request never produced a response (or the body could not be read).
    /// The request URL is stripped because it carries the API key.
    #[error("Transport error while {context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Provider answered with a non-2xx status
    #[error("Response returned non-2xx status code {status} {reason}: {body}")]
    Remote {
        status: u16,
        reason: String,
        body: String,
    },

    /// Provider answered 2xx but flagged the request as failed
    #[error("Provider rejected request (code {code}, {kind}): {info}")]
    Api {
        code: i64,
        kind: String,
        info: String,
    },

    /// Body did not match the expected shape or carried invalid values
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Provider returned rates against a different base than requested
    #[error("Base currency mismatch: expected {expected}, got {actual}")]
    BaseMismatch {
        expected: CurrencyCode,
        actual: String,
    },
}

impl SourceError {
    pub(crate) fn transport(context: &'static str, source: reqwest::Error) -> Self {
        SourceError::Transport {
            context,
            source: source.without_url(),
        }
    }

    /// Returns true if the request never reached the provider or timed out
    pub fn is_transport_error(&self) -> bool {
        matches!(self, SourceError::Transport { .. })
    }

    /// Returns true if the provider answered but refused the request
    pub fn is_remote_error(&self) -> bool {
        matches!(self, SourceError::Remote { .. } | SourceError::Api { .. })
    }

    /// Returns true if the response could not be turned into a snapshot
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            SourceError::Decode(_) | SourceError::BaseMismatch { .. }
        )
    }
}

/// Result type for rate source operations
pub type SourceResult<T> = Result<T, SourceError>;
