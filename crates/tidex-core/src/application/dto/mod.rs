//! Data Transfer Objects for the HTTP boundary

pub mod error_envelope;

pub use error_envelope::ErrorEnvelope;

use serde::Serialize;

/// Liveness response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    /// Always `ok` while the process serves requests
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

impl Default for StatusResponse {
    fn default() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
