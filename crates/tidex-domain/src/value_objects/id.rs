//! Request trace identifier

use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Per-request correlation identifier propagated through logs, the error
/// envelope and the outbound remote calls.
///
/// ```
/// # use tidex_domain::value_objects::TraceId;
/// let trace_id = TraceId::new();
/// let parsed = TraceId::from_string(&trace_id.to_string()).unwrap();
/// assert_eq!(trace_id, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Fresh random v4 id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a header value; surrounding whitespace is ignored
    ///
    /// # Errors
    ///
    /// Returns `uuid::Error` if the value is not a UUID.
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s.trim()).map(Self)
    }

    /// Underlying UUID
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TraceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl From<Uuid> for TraceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_random_v4() {
        let id1 = TraceId::new();
        let id2 = TraceId::new();

        assert_ne!(id1, id2);
        assert_eq!(id1.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_parse_header_value() {
        let id: TraceId = " 550e8400-e29b-41d4-a716-446655440000 ".parse().unwrap();
        assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn test_malformed_value_rejected() {
        assert!(TraceId::from_string("not-a-trace").is_err());
        assert!(TraceId::from_string("").is_err());
    }
}
