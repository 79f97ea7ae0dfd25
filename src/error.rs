//! Error types for admission operations.
//!
//! Field-level rule violations are reported through
//! [`crate::validation::AdmissionError`]; this enum covers the operational
//! failures around them (object-store reads, key generation, configuration).

use std::time::Duration;
use thiserror::Error;

/// Error type for admission operations
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// The owning object does not exist (yet)
    #[error("{kind} {namespace}/{name} not found")]
    OwnerNotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// The owner could not be read within the retry budget
    #[error("failed to get owner {kind} {namespace}/{name} after {attempts} attempts")]
    LookupExhausted {
        kind: String,
        namespace: String,
        name: String,
        attempts: u32,
    },

    /// A single object-store read exceeded its deadline
    #[error("request to the API server timed out after {0:?}")]
    Timeout(Duration),

    /// A label the admission flow needs is missing
    #[error("object is missing the {0} label")]
    MissingLabel(String),

    /// SSH key pair generation failed
    #[error("failed to generate SSH key: {0}")]
    KeyGeneration(String),

    /// Invalid runtime configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::OwnerNotFound { .. })
            || matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 404)
    }

    /// Check if another attempt at the same read could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(e) => {
                matches!(
                    e,
                    kube::Error::Api(api_err) if api_err.code >= 500 || api_err.code == 429
                ) || matches!(e, kube::Error::Service(_))
            }
            // Owners are frequently created in the same apply as their children.
            Error::OwnerNotFound { .. } | Error::Timeout(_) => true,
            Error::LookupExhausted { .. }
            | Error::MissingLabel(_)
            | Error::KeyGeneration(_)
            | Error::Config(_)
            | Error::Serialization(_) => false,
        }
    }
}

/// Result type alias for admission operations
pub type Result<T> = std::result::Result<T, Error>;
