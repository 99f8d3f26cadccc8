//! Pre-bucketed samples returned by the remote bucket service

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One measurement inside a bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Measured value
    pub value: f64,
    /// Unit of `value`
    pub units: String,
    /// Measurement instant
    pub timestamp: DateTime<Utc>,
    /// IANA timezone of the device
    #[serde(default)]
    pub timezone: String,
    /// Offset from UTC in minutes
    #[serde(default)]
    pub timezone_offset: i32,
}

/// A batch of time-ordered samples for one user-day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Bucket identifier
    pub id: String,
    /// Owner of the samples
    pub user_id: String,
    /// Calendar day covered by the bucket
    pub day: NaiveDate,
    /// When the bucket was created remotely
    pub creation_timestamp: DateTime<Utc>,
    /// Samples, owned by this bucket
    #[serde(default)]
    pub samples: Vec<Sample>,
}

impl Bucket {
    /// Unify every sample of this bucket into the flat record schema
    pub fn synthesize(&self, series: BucketSeries) -> impl Iterator<Item = SynthesizedDatum> + '_ {
        self.samples
            .iter()
            .enumerate()
            .map(move |(index, sample)| SynthesizedDatum::from_sample(self, index, sample, series))
    }
}

/// Remote bucket series, in the order they are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketSeries {
    /// Continuous glucose samples
    Cbg,
    /// Basal delivery samples
    Basal,
}

impl BucketSeries {
    /// Every series, in merge order
    pub const ALL: [BucketSeries; 2] = [BucketSeries::Cbg, BucketSeries::Basal];

    /// `type` tag given to synthesized records of this series
    pub fn type_tag(self) -> &'static str {
        match self {
            BucketSeries::Cbg => "cbg",
            BucketSeries::Basal => "basal",
        }
    }

    /// Stage name used for timing and logging
    pub fn stage_name(self) -> &'static str {
        match self {
            BucketSeries::Cbg => "fetch_cbg_buckets",
            BucketSeries::Basal => "fetch_basal_buckets",
        }
    }
}

impl std::fmt::Display for BucketSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// A flat record derived from one `(Bucket, sample index)` pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesizedDatum {
    /// `"{bucket.id}_{index}"`
    pub id: String,
    /// Series type tag
    #[serde(rename = "type")]
    pub datum_type: &'static str,
    /// Sample value
    pub value: f64,
    /// Sample units
    pub units: String,
    /// Sample timestamp, RFC3339 with milliseconds
    pub time: String,
    /// Sample timezone
    pub timezone: String,
}

impl SynthesizedDatum {
    /// Build the record for `bucket.samples[index]`
    pub fn from_sample(bucket: &Bucket, index: usize, sample: &Sample, series: BucketSeries) -> Self {
        Self {
            id: format!("{}_{}", bucket.id, index),
            datum_type: series.type_tag(),
            value: sample.value,
            units: sample.units.clone(),
            time: sample.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            timezone: sample.timezone.clone(),
        }
    }
}
