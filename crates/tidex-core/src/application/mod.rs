//! Application layer - Use cases and orchestration
//!
//! Turns validated requests into one JSON body: authorization, concurrent
//! fetch, sequential merge and the all-or-nothing response buffer.

pub mod dto;
pub mod queries;
pub mod services;

pub use queries::*;

use crate::domain::DomainError;

/// Application Result type
pub type ApplicationResult<T> = Result<T, ApplicationError>;

/// Errors surfaced to the client as an error envelope
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApplicationError {
    /// Malformed date or window
    #[error("{0}")]
    InvalidParameters(String),

    /// Authorization denied
    #[error("{0}")]
    Forbidden(String),

    /// No data in range
    #[error("{0}")]
    NotFound(String),

    /// Primary store failure
    #[error("{0}")]
    UpstreamQuery(String),

    /// Remote bucket service failure
    #[error("{0}")]
    RemoteService(String),

    /// JSON encode failure at the envelope level
    #[error("{0}")]
    Serialization(String),
}

impl ApplicationError {
    /// HTTP status mirrored in the envelope
    pub fn status(&self) -> u16 {
        match self {
            ApplicationError::InvalidParameters(_) => 400,
            ApplicationError::Forbidden(_) => 403,
            ApplicationError::NotFound(_) => 404,
            ApplicationError::UpstreamQuery(_)
            | ApplicationError::RemoteService(_)
            | ApplicationError::Serialization(_) => 500,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ApplicationError::InvalidParameters(_) => "invalid-parameters",
            ApplicationError::Forbidden(_) => "forbidden",
            ApplicationError::NotFound(_) => "data-not-found",
            ApplicationError::UpstreamQuery(_) => "upstream-query-error",
            ApplicationError::RemoteService(_) => "remote-service-error",
            ApplicationError::Serialization(_) => "serialization-error",
        }
    }

    /// Message shown to the client.
    ///
    /// Backend failures get a fixed text; their detail is only in the
    /// `Display` output that goes to the logs.
    pub fn message(&self) -> String {
        match self {
            ApplicationError::UpstreamQuery(_) => "failed to query the data store".to_string(),
            ApplicationError::RemoteService(_) => {
                "failed to fetch data from the remote service".to_string()
            }
            ApplicationError::Serialization(_) => "failed to encode the response".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<DomainError> for ApplicationError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidDate { .. }
            | DomainError::InvalidWindow(_)
            | DomainError::InvalidInput(_) => ApplicationError::InvalidParameters(err.to_string()),
            DomainError::NotFound(message) => ApplicationError::NotFound(message),
            DomainError::Remote(message) => ApplicationError::RemoteService(message),
            DomainError::Encode(message) => ApplicationError::Serialization(message),
            other => ApplicationError::UpstreamQuery(other.to_string()),
        }
    }
}
