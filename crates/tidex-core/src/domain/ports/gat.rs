//! GAT-based collaborator ports
//!
//! Declared with the `gat_port!` macro; every future resolves to a
//! `DomainResult` so failures keep their typed kind across the boundary.

use bytes::Bytes;
use serde_json::Value;

use super::requests::{DataQuery, DocumentStream, SeriesRequest};
use crate::domain::{Bucket, BucketSeries, DataRange, TirAggregateResult, services::TirPipeline};
use crate::gat_port;

gat_port! {
    /// Primary per-event document store
    pub trait DocumentStoreGat {
        /// Records of one user within a window, minus excluded types
        async fn find_user_data(&self, query: DataQuery) -> DocumentStream;

        /// Most recent `pumpSettings` record of a user
        async fn find_latest_pump_settings(&self, user_id: String) -> Option<Bytes>;

        /// Records of one user whose `id` is in `upload_ids`
        async fn find_by_upload_ids(&self, user_id: String, upload_ids: Vec<String>) -> DocumentStream;

        /// Earliest and latest record time of a user
        async fn find_data_range(&self, user_id: String) -> Option<DataRange>;

        /// Execute a time-in-range pipeline
        async fn aggregate_tir(&self, pipeline: TirPipeline) -> Vec<TirAggregateResult>;
    }
}

gat_port! {
    /// Remote service returning pre-bucketed samples
    pub trait RemoteBucketClientGat {
        /// Buckets of one series
        async fn fetch_buckets(&self, series: BucketSeries, request: SeriesRequest) -> Vec<Bucket>;
    }
}

gat_port! {
    /// Best-effort auxiliary data used to enrich pump settings
    pub trait AuxDataServiceGat {
        /// Device parameter change history restricted to `levels`
        async fn parameter_history(&self, user_id: String, levels: Vec<i64>) -> Option<Value>;

        /// Basal security profile of the user
        async fn basal_security_profile(&self, user_id: String) -> Option<Value>;
    }
}
