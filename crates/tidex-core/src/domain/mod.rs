//! Domain layer - pure business logic
//!
//! Re-exports the `tidex-domain` model and adds what the export service
//! needs on top of it: collaborator ports and the analytic pipeline builder.
//! No dependencies on infrastructure concerns.

pub mod macros;
pub mod ports;
pub mod services;

pub use tidex_domain::{
    Bucket, BucketSeries, DataRange, DateWindow, Datum, DomainError, DomainResult, RequestWindow,
    Sample, SynthesizedDatum, TirAggregateResult, TirCategories, TirCategory, TirThresholds,
    TraceId, UploadIdSet, entities, tir, value_objects,
};
