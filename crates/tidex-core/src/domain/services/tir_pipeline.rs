//! Time-in-range aggregation pipeline builder
//!
//! Pure, deterministic construction of the five-stage analytic pipeline.
//! Stages are typed so an in-process engine can evaluate them; each stage
//! also renders to the aggregation-framework document the store executes.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::domain::{TirCategory, TirThresholds, value_objects::format_time};

/// Record type holding glucose samples
pub const CBG_TYPE: &str = "cbg";

/// Default sampling interval of a CGM, in minutes
pub const DEFAULT_SAMPLING_INTERVAL_MINUTES: u32 = 5;

/// Input of the pipeline builder
#[derive(Debug, Clone, PartialEq)]
pub struct TirQuery {
    /// Users to aggregate
    pub target_user_ids: Vec<String>,
    /// Inclusive lower bound on `time`
    pub start: DateTime<Utc>,
    /// Inclusive upper bound on `time`
    pub end: DateTime<Utc>,
    /// Band boundaries
    pub thresholds: TirThresholds,
    /// Minutes represented by one sample
    pub sampling_interval_minutes: u32,
}

impl TirQuery {
    /// Query with default thresholds and interval
    pub fn new(target_user_ids: Vec<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            target_user_ids,
            start,
            end,
            thresholds: TirThresholds::default(),
            sampling_interval_minutes: DEFAULT_SAMPLING_INTERVAL_MINUTES,
        }
    }

    /// Override thresholds
    pub fn with_thresholds(mut self, thresholds: TirThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Override the sampling interval
    pub fn with_sampling_interval(mut self, minutes: u32) -> Self {
        self.sampling_interval_minutes = minutes;
        self
    }
}

/// One stage of the TIR pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    /// Restrict to `sample_type` samples of `user_ids` within `[start, end]`
    Match {
        /// Record type to keep
        sample_type: String,
        /// Users to keep
        user_ids: Vec<String>,
        /// Inclusive lower bound
        start: DateTime<Utc>,
        /// Inclusive upper bound
        end: DateTime<Utc>,
    },
    /// Parse `time` and assign exactly one category per sample
    Classify {
        /// Band boundaries
        thresholds: TirThresholds,
    },
    /// Count and latest time per `(user, category)`
    GroupByUserCategory,
    /// Flatten the per-category groups into one row per user
    GroupByUser,
    /// Emit counts, last times, rates and durations
    Summarize {
        /// Minutes represented by one sample
        sampling_interval_minutes: u32,
    },
}

impl PipelineStage {
    /// Short stage name for logs
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Match { .. } => "match",
            PipelineStage::Classify { .. } => "classify",
            PipelineStage::GroupByUserCategory => "group_by_user_category",
            PipelineStage::GroupByUser => "group_by_user",
            PipelineStage::Summarize { .. } => "summarize",
        }
    }

    /// Render as an aggregation-framework stage document
    pub fn to_document(&self) -> Value {
        match self {
            PipelineStage::Match {
                sample_type,
                user_ids,
                start,
                end,
            } => json!({
                "$match": {
                    "type": sample_type,
                    "_userId": { "$in": user_ids },
                    "time": { "$gte": format_time(*start), "$lte": format_time(*end) }
                }
            }),
            PipelineStage::Classify { thresholds } => json!({
                "$project": {
                    "_userId": 1,
                    "value": 1,
                    "time": { "$dateFromString": { "dateString": "$time" } },
                    "category": classify_switch(thresholds)
                }
            }),
            PipelineStage::GroupByUserCategory => json!({
                "$group": {
                    "_id": { "userId": "$_userId", "category": "$category" },
                    "count": { "$sum": 1 },
                    "lastTime": { "$max": "$time" }
                }
            }),
            PipelineStage::GroupByUser => {
                let mut group = serde_json::Map::new();
                group.insert("_id".into(), json!("$_id.userId"));
                group.insert("lastCbgTime".into(), json!({ "$max": "$lastTime" }));
                for category in TirCategory::ALL {
                    let name = category.as_str();
                    group.insert(
                        format!("{name}Count"),
                        json!({ "$max": { "$cond": [
                            { "$eq": ["$_id.category", name] }, "$count", 0
                        ] } }),
                    );
                    group.insert(
                        format!("{name}LastTime"),
                        json!({ "$max": { "$cond": [
                            { "$eq": ["$_id.category", name] }, "$lastTime", null
                        ] } }),
                    );
                }
                json!({ "$group": group })
            }
            PipelineStage::Summarize {
                sampling_interval_minutes,
            } => {
                let total: Vec<Value> = TirCategory::ALL
                    .iter()
                    .map(|c| json!(format!("${}Count", c.as_str())))
                    .collect();
                let per_category = |f: &dyn Fn(&str) -> Value| {
                    let mut map = serde_json::Map::new();
                    for category in TirCategory::ALL {
                        map.insert(category.as_str().to_string(), f(category.as_str()));
                    }
                    Value::Object(map)
                };

                json!({
                    "$project": {
                        "_id": 0,
                        "userId": "$_id",
                        "lastCbgTime": 1,
                        "count": per_category(&|name| json!(format!("${name}Count"))),
                        "lastTime": per_category(&|name| json!(format!("${name}LastTime"))),
                        "rate": per_category(&|name| json!({ "$multiply": [
                            { "$divide": [format!("${name}Count"), { "$add": total.clone() }] },
                            100
                        ] })),
                        "totalTime": per_category(&|name| json!({ "$multiply": [
                            format!("${name}Count"), sampling_interval_minutes
                        ] }))
                    }
                })
            }
        }
    }
}

/// `$switch` expression mirroring [`TirCategory::classify`]
fn classify_switch(t: &TirThresholds) -> Value {
    json!({
        "$switch": {
            "branches": [
                { "case": { "$lt": ["$value", t.very_low] }, "then": "veryLow" },
                { "case": { "$and": [
                    { "$gte": ["$value", t.very_low] },
                    { "$lt": ["$value", t.low] }
                ] }, "then": "low" },
                { "case": { "$and": [
                    { "$gt": ["$value", t.high] },
                    { "$lte": ["$value", t.very_high] }
                ] }, "then": "high" },
                { "case": { "$gt": ["$value", t.very_high] }, "then": "veryHigh" }
            ],
            "default": "target"
        }
    })
}

/// Ordered list of pipeline stages
#[derive(Debug, Clone, PartialEq)]
pub struct TirPipeline {
    stages: Vec<PipelineStage>,
}

impl TirPipeline {
    /// Build the five-stage pipeline for `query`
    pub fn build(query: &TirQuery) -> Self {
        Self {
            stages: vec![
                PipelineStage::Match {
                    sample_type: CBG_TYPE.to_string(),
                    user_ids: query.target_user_ids.clone(),
                    start: query.start,
                    end: query.end,
                },
                PipelineStage::Classify {
                    thresholds: query.thresholds,
                },
                PipelineStage::GroupByUserCategory,
                PipelineStage::GroupByUser,
                PipelineStage::Summarize {
                    sampling_interval_minutes: query.sampling_interval_minutes,
                },
            ],
        }
    }

    /// Stages in execution order
    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    /// Render every stage as a store document
    pub fn to_documents(&self) -> Vec<Value> {
        self.stages.iter().map(PipelineStage::to_document).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn query() -> TirQuery {
        TirQuery::new(
            vec!["tir123".to_string(), "tir456".to_string()],
            Utc.with_ymd_and_hms(2020, 1, 1, 8, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 2, 8, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_stage_order() {
        let pipeline = TirPipeline::build(&query());
        let names: Vec<_> = pipeline.stages().iter().map(PipelineStage::name).collect();
        assert_eq!(
            names,
            vec!["match", "classify", "group_by_user_category", "group_by_user", "summarize"]
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        assert_eq!(
            TirPipeline::build(&query()).to_documents(),
            TirPipeline::build(&query()).to_documents()
        );
    }

    #[test]
    fn test_match_document() {
        let docs = TirPipeline::build(&query()).to_documents();
        let matcher = &docs[0]["$match"];

        assert_eq!(matcher["type"], "cbg");
        assert_eq!(matcher["_userId"]["$in"], json!(["tir123", "tir456"]));
        assert_eq!(matcher["time"]["$gte"], "2020-01-01T08:00:00.000Z");
        assert_eq!(matcher["time"]["$lte"], "2020-01-02T08:00:00.000Z");
    }

    #[test]
    fn test_classify_document_boundaries() {
        let docs = TirPipeline::build(&query()).to_documents();
        let branches = &docs[1]["$project"]["category"]["$switch"]["branches"];

        assert_eq!(branches[0]["case"]["$lt"], json!(["$value", 3.0]));
        assert_eq!(branches[1]["case"]["$and"][0]["$gte"], json!(["$value", 3.0]));
        assert_eq!(branches[2]["case"]["$and"][0]["$gt"], json!(["$value", 10.0]));
        assert_eq!(branches[2]["case"]["$and"][1]["$lte"], json!(["$value", 13.9]));
        assert_eq!(docs[1]["$project"]["category"]["$switch"]["default"], "target");
    }

    #[test]
    fn test_regroup_flattens_every_category() {
        let docs = TirPipeline::build(&query()).to_documents();
        let group = docs[3]["$group"].as_object().unwrap();

        for category in TirCategory::ALL {
            assert!(group.contains_key(&format!("{}Count", category.as_str())));
            assert!(group.contains_key(&format!("{}LastTime", category.as_str())));
        }
    }

    #[test]
    fn test_summarize_uses_interval() {
        let pipeline = TirPipeline::build(&query().with_sampling_interval(15));
        let docs = pipeline.to_documents();
        assert_eq!(
            docs[4]["$project"]["totalTime"]["low"]["$multiply"],
            json!(["$lowCount", 15])
        );
        assert_eq!(
            docs[4]["$project"]["rate"]["target"]["$multiply"][0]["$divide"][1]["$add"]
                .as_array()
                .unwrap()
                .len(),
            5
        );
    }
}
