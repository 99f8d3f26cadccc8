//! Canonical error body

use serde::{Deserialize, Serialize};

use crate::{application::ApplicationError, domain::TraceId};

/// `{"status","id","code","message"}` written as the whole body on failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// HTTP status, mirrored from the response line
    pub status: u16,
    /// Trace id of the failed request
    pub id: String,
    /// Stable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ErrorEnvelope {
    /// Envelope for `err` raised while serving `trace_id`
    pub fn new(trace_id: TraceId, err: &ApplicationError) -> Self {
        Self {
            status: err.status(),
            id: trace_id.to_string(),
            code: err.code().to_string(),
            message: err.message(),
        }
    }

    /// Serialized envelope.
    ///
    /// Falls back to a fixed literal so an error body is always produced.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| {
            format!(
                r#"{{"status":{},"id":"{}","code":"serialization-error","message":"error envelope could not be encoded"}}"#,
                self.status, self.id
            )
            .into_bytes()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_fields() {
        let trace_id = TraceId::new();
        let err = ApplicationError::Forbidden("access denied".into());
        let envelope = ErrorEnvelope::new(trace_id, &err);

        let json: serde_json::Value = serde_json::from_slice(&envelope.to_bytes()).unwrap();
        assert_eq!(json["status"], 403);
        assert_eq!(json["id"], trace_id.to_string());
        assert_eq!(json["code"], "forbidden");
        assert_eq!(json["message"], "access denied");
    }
}
