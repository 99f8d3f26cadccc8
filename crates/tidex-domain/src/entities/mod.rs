//! Domain entities
//!
//! Records that flow through one export request.

pub mod bucket;
pub mod datum;

pub use bucket::{Bucket, BucketSeries, Sample, SynthesizedDatum};
pub use datum::{
    Datum, PAYLOAD_BASAL_SECURITY_PROFILE, PAYLOAD_HISTORY, SUBTYPE_DEVICE_PARAMETER,
    TYPE_DEVICE_EVENT, TYPE_PUMP_SETTINGS, TYPE_UPLOAD,
};
