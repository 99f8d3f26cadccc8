//! # tidex
//!
//! Streaming export of one user's health records as a single JSON document.
//! Records come concurrently from a primary document store and a remote
//! bucket service, are unified into one flat schema, optionally enriched,
//! and written into an all-or-nothing response buffer. A separate pipeline
//! builder computes per-user time-in-range statistics.
//!
//! ## Layers
//!
//! - [`domain`]: ports (`gat_port!` traits) and the TIR pipeline builder on
//!   top of the `tidex-domain` model
//! - [`application`]: authorization gate, source orchestrator, record merger,
//!   response accumulator and the export service
//! - [`infrastructure`]: in-memory adapters, the remote bucket HTTP client
//!   and the axum router
//! - [`config`]: service configuration

#![warn(rust_2018_idioms)]

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{
    ApplicationError, ApplicationResult,
    dto::ErrorEnvelope,
    services::{DataExportService, ResponseAccumulator},
};
pub use config::{ConfigError, ServiceConfig};
pub use domain::{
    DomainError, DomainResult,
    ports::{
        AuthorizationPolicy, AuxDataServiceGat, DocumentStoreGat, RemoteBucketClientGat,
        SessionValidator,
    },
    services::{TirPipeline, TirQuery},
};
#[cfg(feature = "http-server")]
pub use infrastructure::http::{TidexAppState, create_tidex_router};
