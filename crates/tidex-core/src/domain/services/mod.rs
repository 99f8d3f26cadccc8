//! Domain services
//!
//! Pure computations over the domain model.

pub mod tir_pipeline;

pub use tir_pipeline::{
    CBG_TYPE, DEFAULT_SAMPLING_INTERVAL_MINUTES, PipelineStage, TirPipeline, TirQuery,
};
