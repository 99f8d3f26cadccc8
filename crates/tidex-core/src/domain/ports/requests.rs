//! Request values passed across the ports

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::domain::{DateWindow, DomainResult, TraceId};

/// Forward-only stream of raw stored documents.
///
/// Each item is one JSON document; an `Err` item means the cursor failed and
/// no further items are meaningful.
pub type DocumentStream = BoxStream<'static, DomainResult<Bytes>>;

/// Primary store query for one user
#[derive(Debug, Clone, PartialEq)]
pub struct DataQuery {
    /// Owner of the records
    pub user_id: String,
    /// Inclusive bounds on `time`
    pub window: DateWindow,
    /// Record types to leave out
    pub exclude_types: Vec<String>,
}

impl DataQuery {
    /// Query over `window` with nothing excluded
    pub fn new(user_id: impl Into<String>, window: DateWindow) -> Self {
        Self {
            user_id: user_id.into(),
            window,
            exclude_types: Vec::new(),
        }
    }

    /// Add excluded types, skipping duplicates
    pub fn excluding<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for t in types {
            let t = t.into();
            if !self.exclude_types.contains(&t) {
                self.exclude_types.push(t);
            }
        }
        self
    }

    /// Whether records of `datum_type` are left out
    pub fn excludes(&self, datum_type: &str) -> bool {
        self.exclude_types.iter().any(|t| t == datum_type)
    }
}

/// One remote bucket series call
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRequest {
    /// Owner of the buckets
    pub user_id: String,
    /// Caller credential, forwarded verbatim
    pub session_token: Option<String>,
    /// Lower bound
    pub start: Option<DateTime<Utc>>,
    /// Upper bound
    pub end: Option<DateTime<Utc>>,
    /// Correlation id
    pub trace_id: TraceId,
}

/// Identifiers extracted from the incoming request before any work is done
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRequest {
    /// Identity resolved from the session token; `None` when unauthenticated
    pub caller_id: Option<String>,
    /// Caller credential
    pub session_token: Option<String>,
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Correlation id
    pub trace_id: TraceId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluding_deduplicates() {
        let query = DataQuery::new("u1", DateWindow::default())
            .excluding(["pumpSettings"])
            .excluding(vec!["pumpSettings".to_string(), "food".to_string()]);

        assert_eq!(query.exclude_types, vec!["pumpSettings", "food"]);
        assert!(query.excludes("food"));
        assert!(!query.excludes("cbg"));
    }
}
