//! Request windows and date ranges

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer, ser::SerializeTuple};

use super::TraceId;
use crate::{DomainError, DomainResult};

/// Optional `[start, end]` bounds, both inclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    /// Lower bound
    pub start: Option<DateTime<Utc>>,
    /// Upper bound
    pub end: Option<DateTime<Utc>>,
}

impl DateWindow {
    /// Build a window, enforcing `end >= start` when both are present
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> DomainResult<Self> {
        if let (Some(start), Some(end)) = (start, end)
            && end < start
        {
            return Err(DomainError::InvalidWindow(format!(
                "endDate {} is before startDate {}",
                format_time(end),
                format_time(start)
            )));
        }
        Ok(Self { start, end })
    }

    /// Closed window on both ends
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        Self::new(Some(start), Some(end))
    }

    /// Parse optional RFC3339 bounds; empty strings count as absent
    pub fn parse(start: Option<&str>, end: Option<&str>) -> DomainResult<Self> {
        Self::new(parse_optional_date(start)?, parse_optional_date(end)?)
    }

    /// Whether `time` falls inside the window
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| time >= start) && self.end.is_none_or(|end| time <= end)
    }

    /// Length of the window in seconds when both bounds are known
    pub fn span_seconds(&self) -> Option<i64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }

    /// Expected export size for this window at `bytes_per_second`, capped
    /// at `ceiling`.
    ///
    /// `None` when the window is open or the estimate rounds to zero.
    pub fn estimated_bytes(&self, bytes_per_second: f64, ceiling: usize) -> Option<usize> {
        let span = self.span_seconds()?;
        let estimate = (span as f64 * bytes_per_second).ceil();
        if estimate.is_nan() || estimate < 1.0 {
            return None;
        }
        if !estimate.is_finite() || estimate >= ceiling as f64 {
            return (ceiling > 0).then_some(ceiling);
        }
        Some(estimate as usize)
    }
}

/// Parse one RFC3339 date parameter
pub fn parse_date(value: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| DomainError::InvalidDate {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_optional_date(value: Option<&str>) -> DomainResult<Option<DateTime<Utc>>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value).map(Some),
    }
}

/// RFC3339 rendering used across the export (millisecond precision, `Z`)
pub fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Everything the export needs to know about one request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestWindow {
    /// Target user
    pub user_id: String,
    /// Correlation id
    pub trace_id: TraceId,
    /// Validated date bounds
    pub window: DateWindow,
    /// Emit the latest pump settings first
    pub include_pump_settings: bool,
}

impl RequestWindow {
    /// Validate raw request parameters
    pub fn new(
        user_id: impl Into<String>,
        trace_id: TraceId,
        start_date: Option<&str>,
        end_date: Option<&str>,
        include_pump_settings: bool,
    ) -> DomainResult<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(DomainError::InvalidInput("userID must not be empty".to_string()));
        }

        Ok(Self {
            user_id,
            trace_id,
            window: DateWindow::parse(start_date, end_date)?,
            include_pump_settings,
        })
    }
}

/// Earliest and latest record time for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRange {
    /// Earliest `time`
    pub start: DateTime<Utc>,
    /// Latest `time`
    pub end: DateTime<Utc>,
}

impl DataRange {
    /// Fold one more record time into an optional range
    pub fn extend(range: Option<Self>, time: DateTime<Utc>) -> Self {
        match range {
            None => Self {
                start: time,
                end: time,
            },
            Some(range) => Self {
                start: range.start.min(time),
                end: range.end.max(time),
            },
        }
    }
}

impl Serialize for DataRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&format_time(self.start))?;
        tuple.serialize_element(&format_time(self.end))?;
        tuple.end()
    }
}
