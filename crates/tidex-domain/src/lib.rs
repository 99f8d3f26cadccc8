//! tidex Domain Layer - Pure Business Logic
//!
//! This crate contains the request-scoped domain model of the tidex export
//! service with no I/O of its own.
//!
//! ## Architecture
//!
//! - **Entities**: records flowing through the export (`Datum`, `Bucket`,
//!   `Sample`, `SynthesizedDatum`)
//! - **Value Objects**: validated request concepts (`RequestWindow`,
//!   `DateWindow`, `TraceId`, `UploadIdSet`)
//! - **TIR**: time-in-range categories, thresholds and per-user results
//!
//! Everything here lives for the handling of one HTTP call; nothing is
//! persisted by this crate.

#![warn(missing_docs)]

pub mod entities;
pub mod tir;
pub mod value_objects;

// Re-export core types
pub use entities::{Bucket, BucketSeries, Datum, Sample, SynthesizedDatum};
pub use tir::{TirAggregateResult, TirCategories, TirCategory, TirThresholds};
pub use value_objects::{DataRange, DateWindow, RequestWindow, TraceId, UploadIdSet};

/// Domain Result type
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-specific errors
///
/// Store and remote collaborators report failures through these variants so
/// callers can branch on the kind of failure instead of comparing messages.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum DomainError {
    /// A date parameter could not be parsed
    #[error("Invalid date '{value}': {reason}")]
    InvalidDate {
        /// Raw value received
        value: String,
        /// Parser message
        reason: String,
    },

    /// The request window violates `end >= start`
    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    /// A stored document could not be decoded into a record
    #[error("Decode error: {0}")]
    Decode(String),

    /// A record could not be encoded to JSON
    #[error("Encode error: {0}")]
    Encode(String),

    /// The document store failed to execute a query
    #[error("Query error: {0}")]
    Query(String),

    /// The requested data does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote bucket service failed
    #[error("Remote service error: {0}")]
    Remote(String),

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DomainError {
    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    /// Create a remote service error
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Whether this error means "no data" rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_creation() {
        let err = DomainError::query("connection reset");
        assert!(matches!(err, DomainError::Query(_)));
        assert!(!err.is_not_found());

        let err = DomainError::not_found("no data for user");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_serde_error_maps_to_decode() {
        let err: DomainError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, DomainError::Decode(_)));
    }

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidDate {
            value: "yesterday".to_string(),
            reason: "input contains invalid characters".to_string(),
        };
        assert!(err.to_string().contains("yesterday"));
    }
}
