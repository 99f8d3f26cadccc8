//! Queries - read use cases handled by the export service

use crate::domain::{DateWindow, RequestWindow, TraceId, ports::AuthRequest};

/// Stream the merged records of one user
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDataQuery {
    /// Validated target, window and options
    pub request: RequestWindow,
    /// Caller identifiers
    pub auth: AuthRequest,
    /// Merge the remote bucket series
    pub include_buckets: bool,
}

/// Earliest and latest record time of one user
#[derive(Debug, Clone, PartialEq)]
pub struct GetRangeQuery {
    /// Target user
    pub user_id: String,
    /// Caller identifiers
    pub auth: AuthRequest,
}

/// Time-in-range summary of one user
#[derive(Debug, Clone, PartialEq)]
pub struct GetTirSummaryQuery {
    /// Target user
    pub user_id: String,
    /// Requested bounds; missing ones fall back to the configured window
    pub window: DateWindow,
    /// Caller identifiers
    pub auth: AuthRequest,
}

impl ExportDataQuery {
    /// Correlation id of the request
    pub fn trace_id(&self) -> TraceId {
        self.request.trace_id
    }
}
