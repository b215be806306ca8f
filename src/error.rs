//! Error types for catalog-forge
//!
//! This module provides error handling for the pipeline, split by severity:
//! - Fatal errors (configuration, corrupt or unwritable state) abort the run
//! - Provider errors fail a single producer batch (handled as a stall)
//! - Artifact errors fail a single record's fetch (recorded, never fatal)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for catalog-forge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for catalog-forge
///
/// Each variant carries enough context to decide whether the run must abort
/// (configuration/persistence) or whether the failure is scoped to a single
/// batch or record.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "provider_endpoint")
        key: Option<String>,
    },

    /// Persisted catalog exists but cannot be parsed
    ///
    /// The caller decides whether to abort or start fresh; the pipeline never
    /// silently discards a catalog it cannot read.
    #[error("corrupt catalog at {path}: {source}")]
    CorruptCatalog {
        /// Path of the unreadable catalog file
        path: PathBuf,
        /// The underlying parse failure
        #[source]
        source: serde_json::Error,
    },

    /// Writing the catalog (or its backup) to durable storage failed
    #[error("failed to persist {path}: {source}")]
    Persistence {
        /// Path that could not be written
        path: PathBuf,
        /// The underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider (batch generation) error
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Artifact fetch error
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Run cancelled before this operation was admitted
    #[error("run cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors from the structured-generation provider boundary
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider returned a non-success HTTP status
    #[error("provider returned status {status}: {message}")]
    Api {
        /// HTTP status code returned by the provider
        status: u16,
        /// Response body or status text
        message: String,
    },

    /// Provider response could not be interpreted as the expected envelope
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Errors from a single artifact fetch attempt
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Provider rejected the request itself (bad prompt, bad size, etc.)
    #[error("invalid artifact request: {0}")]
    InvalidRequest(String),

    /// Response was well-formed but carried no artifact payload
    #[error("artifact response contained no data")]
    MissingData,

    /// Artifact payload could not be decoded
    #[error("failed to decode artifact payload: {0}")]
    Decode(String),
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_catalog_display_includes_path() {
        let source = serde_json::from_str::<Vec<u8>>("not json").unwrap_err();
        let err = Error::CorruptCatalog {
            path: PathBuf::from("/data/catalog.json"),
            source,
        };
        assert!(err.to_string().contains("/data/catalog.json"));
    }

    #[test]
    fn provider_api_error_display_includes_status() {
        let err = Error::Provider(ProviderError::Api {
            status: 429,
            message: "rate limited".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn io_error_converts_via_from() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn artifact_missing_data_display() {
        let err = Error::Artifact(ArtifactError::MissingData);
        assert_eq!(
            err.to_string(),
            "artifact error: artifact response contained no data"
        );
    }
}
