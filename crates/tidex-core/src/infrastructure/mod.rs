//! Infrastructure layer - External concerns and adapters
//!
//! In-process stores, the remote bucket HTTP client and the axum server.

pub mod adapters;
#[cfg(feature = "http-server")]
pub mod http;

pub use adapters::*;
