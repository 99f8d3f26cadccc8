//! In-process document store
//!
//! Keeps raw JSON documents in insertion order, answers the export queries
//! and evaluates TIR pipelines stage by stage. Also serves the auxiliary
//! enrichment data, so one instance can stand in for every store-side
//! collaborator.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{FutureExt, StreamExt, future::BoxFuture, stream};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use super::generic_store::InMemoryStore;
use crate::domain::{
    DataRange, DomainError, DomainResult, TirAggregateResult, TirCategories, TirCategory,
    entities::TYPE_PUMP_SETTINGS,
    ports::{AuxDataServiceGat, DataQuery, DocumentStoreGat, DocumentStream},
    services::{PipelineStage, TirPipeline},
    value_objects::parse_date,
};

/// One stored document with the fields queries look at
#[derive(Debug, Clone)]
struct StoredDocument {
    user_id: String,
    raw: Bytes,
    id: Option<String>,
    datum_type: Option<String>,
    time: Option<DateTime<Utc>>,
    value: Option<f64>,
}

impl StoredDocument {
    fn new(user_id: String, raw: Bytes) -> Self {
        let probe: Option<Value> = serde_json::from_slice(&raw).ok();
        let field = |key: &str| probe.as_ref().and_then(|doc| doc.get(key));

        Self {
            id: field("id").and_then(Value::as_str).map(str::to_string),
            datum_type: field("type").and_then(Value::as_str).map(str::to_string),
            time: field("time")
                .and_then(Value::as_str)
                .and_then(|time| parse_date(time).ok()),
            value: field("value").and_then(Value::as_f64),
            user_id,
            raw,
        }
    }

    fn is_type(&self, datum_type: &str) -> bool {
        self.datum_type.as_deref() == Some(datum_type)
    }
}

/// Document store held in memory
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<Vec<StoredDocument>>,
    parameter_history: InMemoryStore<String, Vec<Value>>,
    security_profiles: InMemoryStore<String, Value>,
}

impl MemoryDocumentStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a JSON document for `user_id`
    pub fn insert(&self, user_id: impl Into<String>, document: &Value) -> DomainResult<()> {
        let raw = serde_json::to_vec(document).map_err(|e| DomainError::Encode(e.to_string()))?;
        self.insert_raw(user_id, Bytes::from(raw));
        Ok(())
    }

    /// Append raw bytes as-is, even when they are not valid JSON
    pub fn insert_raw(&self, user_id: impl Into<String>, raw: impl Into<Bytes>) {
        self.documents
            .write()
            .push(StoredDocument::new(user_id.into(), raw.into()));
    }

    /// Append a parameter history entry for `user_id`
    pub fn add_parameter_change(&self, user_id: impl Into<String>, entry: Value) {
        self.parameter_history
            .update(user_id.into(), Vec::new, |entries| entries.push(entry));
    }

    /// Set the basal security profile of `user_id`
    pub fn set_basal_security_profile(&self, user_id: impl Into<String>, profile: Value) {
        self.security_profiles.insert(user_id.into(), profile);
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// No documents stored
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    fn select(&self, predicate: impl Fn(&StoredDocument) -> bool) -> Vec<Bytes> {
        self.documents
            .read()
            .iter()
            .filter(|doc| predicate(doc))
            .map(|doc| doc.raw.clone())
            .collect()
    }

    fn user_data(&self, query: &DataQuery) -> Vec<Bytes> {
        let bounded = query.window.start.is_some() || query.window.end.is_some();
        self.select(|doc| {
            doc.user_id == query.user_id
                && !doc.datum_type.as_deref().is_some_and(|t| query.excludes(t))
                && match doc.time {
                    Some(time) => query.window.contains(time),
                    None => !bounded,
                }
        })
    }

    fn latest_pump_settings(&self, user_id: &str) -> Option<Bytes> {
        self.documents
            .read()
            .iter()
            .enumerate()
            .filter(|(_, doc)| doc.user_id == user_id && doc.is_type(TYPE_PUMP_SETTINGS))
            .max_by_key(|(position, doc)| (doc.time, *position))
            .map(|(_, doc)| doc.raw.clone())
    }

    fn data_range(&self, user_id: &str) -> Option<DataRange> {
        self.documents
            .read()
            .iter()
            .filter(|doc| doc.user_id == user_id)
            .filter_map(|doc| doc.time)
            .fold(None, |range, time| Some(DataRange::extend(range, time)))
    }

    fn evaluate(&self, pipeline: &TirPipeline) -> DomainResult<Vec<TirAggregateResult>> {
        let mut rows = Rows::Collection;
        for stage in pipeline.stages() {
            rows = self.apply(stage, rows)?;
            debug!(stage = stage.name(), rows = rows.len(), "pipeline stage evaluated");
        }

        match rows {
            Rows::Results(results) => Ok(results),
            other => Err(DomainError::query(format!(
                "pipeline ended with {} rows instead of results",
                other.kind()
            ))),
        }
    }

    fn apply(&self, stage: &PipelineStage, rows: Rows) -> DomainResult<Rows> {
        match (stage, rows) {
            (
                PipelineStage::Match {
                    sample_type,
                    user_ids,
                    start,
                    end,
                },
                Rows::Collection,
            ) => {
                let samples = self
                    .documents
                    .read()
                    .iter()
                    .filter(|doc| doc.is_type(sample_type) && user_ids.contains(&doc.user_id))
                    .filter_map(|doc| {
                        let time = doc.time.filter(|t| t >= start && t <= end)?;
                        Some(SampleRow {
                            user_id: doc.user_id.clone(),
                            value: doc.value?,
                            time,
                        })
                    })
                    .collect();
                Ok(Rows::Samples(samples))
            }
            (PipelineStage::Classify { thresholds }, Rows::Samples(samples)) => Ok(
                Rows::Classified(
                    samples
                        .into_iter()
                        .map(|s| {
                            let category = TirCategory::classify(s.value, thresholds);
                            (s, category)
                        })
                        .collect(),
                ),
            ),
            (PipelineStage::GroupByUserCategory, Rows::Classified(samples)) => {
                let mut groups: BTreeMap<(String, TirCategory), CategoryGroup> = BTreeMap::new();
                for (sample, category) in samples {
                    let group = groups.entry((sample.user_id, category)).or_default();
                    group.count += 1;
                    group.last_time = group.last_time.max(Some(sample.time));
                }
                Ok(Rows::Groups(groups))
            }
            (PipelineStage::GroupByUser, Rows::Groups(groups)) => {
                let mut users: BTreeMap<String, UserGroup> = BTreeMap::new();
                for ((user_id, category), group) in groups {
                    let user = users.entry(user_id).or_default();
                    let count = user.count.get_mut(category);
                    *count = (*count).max(group.count);
                    let last = user.last_time.get_mut(category);
                    *last = (*last).max(group.last_time);
                }
                Ok(Rows::Users(users))
            }
            (
                PipelineStage::Summarize {
                    sampling_interval_minutes,
                },
                Rows::Users(users),
            ) => Ok(Rows::Results(
                users
                    .into_iter()
                    .map(|(user_id, group)| {
                        TirAggregateResult::from_groups(
                            user_id,
                            group.count,
                            group.last_time,
                            *sampling_interval_minutes,
                        )
                    })
                    .collect(),
            )),
            (stage, rows) => Err(DomainError::query(format!(
                "stage {} cannot consume {} rows",
                stage.name(),
                rows.kind()
            ))),
        }
    }
}

#[derive(Debug)]
struct SampleRow {
    user_id: String,
    value: f64,
    time: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CategoryGroup {
    count: u64,
    last_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct UserGroup {
    count: TirCategories<u64>,
    last_time: TirCategories<Option<DateTime<Utc>>>,
}

/// Intermediate rows between pipeline stages
#[derive(Debug)]
enum Rows {
    Collection,
    Samples(Vec<SampleRow>),
    Classified(Vec<(SampleRow, TirCategory)>),
    Groups(BTreeMap<(String, TirCategory), CategoryGroup>),
    Users(BTreeMap<String, UserGroup>),
    Results(Vec<TirAggregateResult>),
}

impl Rows {
    fn kind(&self) -> &'static str {
        match self {
            Rows::Collection => "collection",
            Rows::Samples(_) => "sample",
            Rows::Classified(_) => "classified",
            Rows::Groups(_) => "group",
            Rows::Users(_) => "user",
            Rows::Results(_) => "result",
        }
    }

    fn len(&self) -> usize {
        match self {
            Rows::Collection => 0,
            Rows::Samples(rows) => rows.len(),
            Rows::Classified(rows) => rows.len(),
            Rows::Groups(rows) => rows.len(),
            Rows::Users(rows) => rows.len(),
            Rows::Results(rows) => rows.len(),
        }
    }
}

fn into_stream(documents: Vec<Bytes>) -> DocumentStream {
    stream::iter(documents.into_iter().map(Ok)).boxed()
}

impl DocumentStoreGat for MemoryDocumentStore {
    type FindUserDataFuture<'a>
        = BoxFuture<'a, DomainResult<DocumentStream>>
    where
        Self: 'a;

    type FindLatestPumpSettingsFuture<'a>
        = BoxFuture<'a, DomainResult<Option<Bytes>>>
    where
        Self: 'a;

    type FindByUploadIdsFuture<'a>
        = BoxFuture<'a, DomainResult<DocumentStream>>
    where
        Self: 'a;

    type FindDataRangeFuture<'a>
        = BoxFuture<'a, DomainResult<Option<DataRange>>>
    where
        Self: 'a;

    type AggregateTirFuture<'a>
        = BoxFuture<'a, DomainResult<Vec<TirAggregateResult>>>
    where
        Self: 'a;

    fn find_user_data(&self, query: DataQuery) -> Self::FindUserDataFuture<'_> {
        async move { Ok(into_stream(self.user_data(&query))) }.boxed()
    }

    fn find_latest_pump_settings(&self, user_id: String) -> Self::FindLatestPumpSettingsFuture<'_> {
        async move { Ok(self.latest_pump_settings(&user_id)) }.boxed()
    }

    fn find_by_upload_ids(
        &self,
        user_id: String,
        upload_ids: Vec<String>,
    ) -> Self::FindByUploadIdsFuture<'_> {
        async move {
            let documents = self.select(|doc| {
                doc.user_id == user_id
                    && doc.id.as_ref().is_some_and(|id| upload_ids.contains(id))
            });
            Ok(into_stream(documents))
        }
        .boxed()
    }

    fn find_data_range(&self, user_id: String) -> Self::FindDataRangeFuture<'_> {
        async move { Ok(self.data_range(&user_id)) }.boxed()
    }

    fn aggregate_tir(&self, pipeline: TirPipeline) -> Self::AggregateTirFuture<'_> {
        async move { self.evaluate(&pipeline) }.boxed()
    }
}

impl AuxDataServiceGat for MemoryDocumentStore {
    type ParameterHistoryFuture<'a>
        = BoxFuture<'a, DomainResult<Option<Value>>>
    where
        Self: 'a;

    type BasalSecurityProfileFuture<'a>
        = BoxFuture<'a, DomainResult<Option<Value>>>
    where
        Self: 'a;

    fn parameter_history(
        &self,
        user_id: String,
        levels: Vec<i64>,
    ) -> Self::ParameterHistoryFuture<'_> {
        async move {
            let history = self.parameter_history.with(&user_id, |entries| {
                entries
                    .iter()
                    .filter(|entry| {
                        entry
                            .get("level")
                            .and_then(Value::as_i64)
                            .is_none_or(|level| levels.contains(&level))
                    })
                    .cloned()
                    .collect::<Vec<_>>()
            });
            Ok(history.map(Value::Array))
        }
        .boxed()
    }

    fn basal_security_profile(&self, user_id: String) -> Self::BasalSecurityProfileFuture<'_> {
        async move { Ok(self.security_profiles.get(&user_id)) }.boxed()
    }
}
