//! Generic per-event record produced by the primary document store

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{DomainError, DomainResult};

/// `type` of ingestion batch records
pub const TYPE_UPLOAD: &str = "upload";
/// `type` of device event records
pub const TYPE_DEVICE_EVENT: &str = "deviceEvent";
/// `subType` of device parameter change events
pub const SUBTYPE_DEVICE_PARAMETER: &str = "deviceParameter";
/// `type` of pump settings records
pub const TYPE_PUMP_SETTINGS: &str = "pumpSettings";
/// Payload sub-key receiving the parameter history
pub const PAYLOAD_HISTORY: &str = "history";
/// Payload sub-key receiving the basal security profile
pub const PAYLOAD_BASAL_SECURITY_PROFILE: &str = "basalsecurityprofile";

/// One flat health-event record.
///
/// The identifying fields are typed; every other key of the stored document
/// is kept verbatim in `fields` and written back at the top level, so the
/// record round-trips without a rigid payload schema.
///
/// Decoding fails when `id`, `type` or `uploadId` is absent. Present-but-empty
/// identifiers decode fine and are rejected by [`Datum::has_required_fields`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    /// Record identifier
    pub id: String,

    /// Record type tag (`cbg`, `upload`, `pumpSettings`, ...)
    #[serde(rename = "type")]
    pub datum_type: String,

    /// Optional sub-type tag
    #[serde(rename = "subType", default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,

    /// Identifier of the upload record this datum belongs to
    #[serde(rename = "uploadId")]
    pub upload_id: String,

    /// RFC3339 event time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,

    /// Remaining document keys, untouched
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Datum {
    /// Decode a raw stored document
    pub fn decode(raw: &[u8]) -> DomainResult<Self> {
        serde_json::from_slice(raw).map_err(|e| DomainError::Decode(e.to_string()))
    }

    /// Encode this record as a standalone JSON object
    pub fn encode(&self) -> DomainResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| DomainError::Encode(e.to_string()))
    }

    /// `id`, `type` and `uploadId` are all non-empty
    pub fn has_required_fields(&self) -> bool {
        !self.id.is_empty() && !self.datum_type.is_empty() && !self.upload_id.is_empty()
    }

    /// Whether this record describes an upload
    pub fn is_upload(&self) -> bool {
        self.datum_type == TYPE_UPLOAD
    }

    /// An upload record pointing at itself
    pub fn is_self_referential_upload(&self) -> bool {
        self.is_upload() && self.upload_id == self.id
    }

    /// Whether this is a `deviceEvent`/`deviceParameter` record
    pub fn is_device_parameter(&self) -> bool {
        self.datum_type == TYPE_DEVICE_EVENT
            && self.sub_type.as_deref() == Some(SUBTYPE_DEVICE_PARAMETER)
    }

    /// Whether this is a `pumpSettings` record
    pub fn is_pump_settings(&self) -> bool {
        self.datum_type == TYPE_PUMP_SETTINGS
    }

    /// Level filter for device parameter events.
    ///
    /// Non-parameter records and parameter records without a `level` key
    /// always pass. A present level passes only when it is numeric (or a
    /// numeric string) contained in `allowed`.
    pub fn passes_level_filter(&self, allowed: &[i64]) -> bool {
        if !self.is_device_parameter() {
            return true;
        }

        match self.fields.get("level") {
            None => true,
            Some(level) => level_value(level).is_some_and(|level| allowed.contains(&level)),
        }
    }

    /// Insert `payload.<key> = value`.
    ///
    /// Creates the `payload` object when missing. Returns `false` and leaves
    /// the record untouched when `payload` exists but is not an object.
    pub fn inject_payload(&mut self, key: &str, value: Value) -> bool {
        let payload = self
            .fields
            .entry("payload")
            .or_insert_with(|| Value::Object(Map::new()));

        match payload {
            Value::Object(map) => {
                map.insert(key.to_string(), value);
                true
            }
            _ => false,
        }
    }

    /// Lookup of `payload.<key>`
    pub fn payload_field(&self, key: &str) -> Option<&Value> {
        self.fields.get("payload").and_then(|payload| payload.get(key))
    }
}

fn level_value(level: &Value) -> Option<i64> {
    match level {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn datum(value: Value) -> Datum {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decode_keeps_unknown_fields() {
        let raw = br#"{"id":"d1","type":"cbg","uploadId":"u1","time":"2020-01-01T00:00:00Z","value":5.5,"units":"mmol/L"}"#;
        let datum = Datum::decode(raw).unwrap();

        assert_eq!(datum.id, "d1");
        assert_eq!(datum.datum_type, "cbg");
        assert_eq!(datum.fields.get("value"), Some(&json!(5.5)));
        assert!(datum.has_required_fields());
    }

    #[test]
    fn test_decode_missing_id_fails() {
        let raw = br#"{"type":"cbg","uploadId":"u1"}"#;
        assert!(matches!(Datum::decode(raw), Err(DomainError::Decode(_))));
    }

    #[test]
    fn test_empty_identifier_is_not_valid() {
        let datum = datum(json!({"id": "", "type": "cbg", "uploadId": "u1"}));
        assert!(!datum.has_required_fields());
    }

    #[test]
    fn test_self_referential_upload() {
        let upload = datum(json!({"id": "u1", "type": "upload", "uploadId": "u1"}));
        assert!(upload.is_self_referential_upload());

        let other = datum(json!({"id": "u2", "type": "upload", "uploadId": "u1"}));
        assert!(other.is_upload());
        assert!(!other.is_self_referential_upload());
    }

    #[test]
    fn test_level_filter() {
        let allowed = [1, 2];
        let base = json!({"id": "p", "type": "deviceEvent", "subType": "deviceParameter", "uploadId": "u"});

        assert!(datum(base.clone()).passes_level_filter(&allowed));

        let mut level1 = base.clone();
        level1["level"] = json!(1);
        assert!(datum(level1).passes_level_filter(&allowed));

        let mut level3 = base.clone();
        level3["level"] = json!(3);
        assert!(!datum(level3).passes_level_filter(&allowed));

        let mut level_str = base.clone();
        level_str["level"] = json!("2");
        assert!(datum(level_str).passes_level_filter(&allowed));

        let mut level_bad = base;
        level_bad["level"] = json!("high");
        assert!(!datum(level_bad).passes_level_filter(&allowed));
    }

    #[test]
    fn test_level_filter_ignores_other_types() {
        let cbg = datum(json!({"id": "c", "type": "cbg", "uploadId": "u", "level": 9}));
        assert!(cbg.passes_level_filter(&[1, 2]));
    }

    #[test]
    fn test_inject_payload_creates_object() {
        let mut settings = datum(json!({"id": "s", "type": "pumpSettings", "uploadId": "u"}));
        assert!(settings.inject_payload(PAYLOAD_HISTORY, json!([{"level": 1}])));
        assert_eq!(
            settings.payload_field(PAYLOAD_HISTORY),
            Some(&json!([{"level": 1}]))
        );
    }

    #[test]
    fn test_inject_payload_preserves_existing_keys() {
        let mut settings = datum(json!({
            "id": "s", "type": "pumpSettings", "uploadId": "u",
            "payload": {"parameters": [{"name": "x"}]}
        }));
        assert!(settings.inject_payload(PAYLOAD_BASAL_SECURITY_PROFILE, json!({"a": 1})));
        assert!(settings.payload_field("parameters").is_some());
        assert!(settings.payload_field(PAYLOAD_BASAL_SECURITY_PROFILE).is_some());
    }

    #[test]
    fn test_inject_payload_rejects_non_object() {
        let mut settings = datum(json!({"id": "s", "type": "pumpSettings", "uploadId": "u", "payload": 3}));
        assert!(!settings.inject_payload(PAYLOAD_HISTORY, json!([])));
        assert_eq!(settings.fields.get("payload"), Some(&json!(3)));
    }

    #[test]
    fn test_encode_flattens_fields() {
        let datum = datum(json!({"id": "d", "type": "smbg", "uploadId": "u", "value": 7}));
        let encoded: Value = serde_json::from_slice(&datum.encode().unwrap()).unwrap();
        assert_eq!(encoded["value"], json!(7));
        assert!(encoded.get("subType").is_none());
        assert!(encoded.get("fields").is_none());
    }
}
