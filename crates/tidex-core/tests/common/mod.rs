//! Common test utilities and mock collaborators
//!
//! Mocks record what they were asked so tests can assert on fetch behavior.

#![allow(dead_code)]

use bytes::Bytes;
use futures::{FutureExt, StreamExt, future::BoxFuture, stream};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tidex::{
    application::{ExportDataQuery, services::DataExportService},
    config::{ExportConfig, TirConfig},
    domain::{
        Bucket, BucketSeries, DataRange, DomainError, DomainResult, RequestWindow, Sample,
        TirAggregateResult, TraceId,
        ports::{
            AuthRequest, AuthorizationPolicy, AuxDataServiceGat, DataQuery, DocumentStoreGat,
            DocumentStream, RemoteBucketClientGat, SeriesRequest,
        },
        services::TirPipeline,
    },
};

/// One item of a scripted cursor
#[derive(Debug, Clone)]
pub enum Item {
    Doc(Value),
    Raw(&'static [u8]),
    Fail(DomainError),
}

fn into_stream(items: Vec<Item>) -> DocumentStream {
    stream::iter(items.into_iter().map(|item| match item {
        Item::Doc(doc) => Ok(Bytes::from(serde_json::to_vec(&doc).unwrap())),
        Item::Raw(raw) => Ok(Bytes::from_static(raw)),
        Item::Fail(err) => Err(err),
    }))
    .boxed()
}

/// Scripted document store
#[derive(Default)]
pub struct MockStore {
    pub records: Vec<Item>,
    pub pump_settings: Option<Value>,
    pub upload_records: Vec<Item>,
    pub user_data_error: Option<DomainError>,
    pub upload_error: Option<DomainError>,
    pub range: Option<DataRange>,
    pub tir_results: Vec<TirAggregateResult>,
    pub queries: parking_lot::Mutex<Vec<DataQuery>>,
    pub upload_calls: parking_lot::Mutex<Vec<Vec<String>>>,
    pub settings_calls: parking_lot::Mutex<usize>,
    pub pipelines: parking_lot::Mutex<Vec<TirPipeline>>,
}

impl MockStore {
    pub fn with_records(records: Vec<Item>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }
}

impl DocumentStoreGat for MockStore {
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
        async move {
            self.queries.lock().push(query);
            match &self.user_data_error {
                Some(err) => Err(err.clone()),
                None => Ok(into_stream(self.records.clone())),
            }
        }
        .boxed()
    }

    fn find_latest_pump_settings(&self, _user_id: String) -> Self::FindLatestPumpSettingsFuture<'_> {
        async move {
            *self.settings_calls.lock() += 1;
            Ok(self
                .pump_settings
                .as_ref()
                .map(|doc| Bytes::from(serde_json::to_vec(doc).unwrap())))
        }
        .boxed()
    }

    fn find_by_upload_ids(
        &self,
        _user_id: String,
        upload_ids: Vec<String>,
    ) -> Self::FindByUploadIdsFuture<'_> {
        async move {
            self.upload_calls.lock().push(upload_ids);
            match &self.upload_error {
                Some(err) => Err(err.clone()),
                None => Ok(into_stream(self.upload_records.clone())),
            }
        }
        .boxed()
    }

    fn find_data_range(&self, _user_id: String) -> Self::FindDataRangeFuture<'_> {
        async move { Ok(self.range) }.boxed()
    }

    fn aggregate_tir(&self, pipeline: TirPipeline) -> Self::AggregateTirFuture<'_> {
        async move {
            self.pipelines.lock().push(pipeline);
            Ok(self.tir_results.clone())
        }
        .boxed()
    }
}

/// Scripted remote bucket service
#[derive(Default)]
pub struct MockRemote {
    pub responses: HashMap<BucketSeries, DomainResult<Vec<Bucket>>>,
    pub requests: parking_lot::Mutex<Vec<(BucketSeries, SeriesRequest)>>,
}

impl MockRemote {
    pub fn with(series: BucketSeries, response: DomainResult<Vec<Bucket>>) -> Self {
        let mut remote = Self::default();
        remote.responses.insert(series, response);
        remote
    }

    pub fn and(mut self, series: BucketSeries, response: DomainResult<Vec<Bucket>>) -> Self {
        self.responses.insert(series, response);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl RemoteBucketClientGat for MockRemote {
    type FetchBucketsFuture<'a>
        = BoxFuture<'a, DomainResult<Vec<Bucket>>>
    where
        Self: 'a;

    fn fetch_buckets(
        &self,
        series: BucketSeries,
        request: SeriesRequest,
    ) -> Self::FetchBucketsFuture<'_> {
        async move {
            self.requests.lock().push((series, request));
            self.responses
                .get(&series)
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
        .boxed()
    }
}

/// Scripted auxiliary data service
#[derive(Default)]
pub struct MockAux {
    pub history: Option<DomainResult<Option<Value>>>,
    pub profile: Option<DomainResult<Option<Value>>>,
    pub history_levels: parking_lot::Mutex<Vec<Vec<i64>>>,
}

impl AuxDataServiceGat for MockAux {
    type ParameterHistoryFuture<'a>
        = BoxFuture<'a, DomainResult<Option<Value>>>
    where
        Self: 'a;

    type BasalSecurityProfileFuture<'a>
        = BoxFuture<'a, DomainResult<Option<Value>>>
    where
        Self: 'a;

    fn parameter_history(&self, _user_id: String, levels: Vec<i64>) -> Self::ParameterHistoryFuture<'_> {
        async move {
            self.history_levels.lock().push(levels);
            self.history.clone().unwrap_or(Ok(None))
        }
        .boxed()
    }

    fn basal_security_profile(&self, _user_id: String) -> Self::BasalSecurityProfileFuture<'_> {
        async move { self.profile.clone().unwrap_or(Ok(None)) }.boxed()
    }
}

/// Policy returning a fixed answer
pub struct StaticPolicy(pub bool);

impl AuthorizationPolicy for StaticPolicy {
    fn authorize(&self, _request: &AuthRequest, _targets: &[String]) -> bool {
        self.0
    }
}

pub type TestService = DataExportService<MockStore, MockRemote, MockAux, StaticPolicy>;

pub struct Fixture {
    pub store: Arc<MockStore>,
    pub remote: Arc<MockRemote>,
    pub aux: Arc<MockAux>,
    pub service: TestService,
}

pub fn fixture(store: MockStore, remote: MockRemote, aux: MockAux) -> Fixture {
    fixture_with_policy(store, remote, aux, StaticPolicy(false))
}

pub fn fixture_with_policy(
    store: MockStore,
    remote: MockRemote,
    aux: MockAux,
    policy: StaticPolicy,
) -> Fixture {
    let store = Arc::new(store);
    let remote = Arc::new(remote);
    let aux = Arc::new(aux);
    let service = DataExportService::new(
        store.clone(),
        remote.clone(),
        aux.clone(),
        policy,
        ExportConfig::default(),
        TirConfig::default(),
    );
    Fixture {
        store,
        remote,
        aux,
        service,
    }
}

pub fn auth(caller: &str, trace_id: TraceId) -> AuthRequest {
    AuthRequest {
        caller_id: Some(caller.to_string()),
        session_token: Some("token-123".to_string()),
        method: "GET".to_string(),
        path: "/v1/data/u1".to_string(),
        trace_id,
    }
}

/// Owner export of `u1`
pub fn export_query(include_pump_settings: bool, include_buckets: bool) -> ExportDataQuery {
    let trace_id = TraceId::new();
    ExportDataQuery {
        request: RequestWindow::new(
            "u1",
            trace_id,
            Some("2020-01-01T00:00:00Z"),
            Some("2020-01-02T00:00:00Z"),
            include_pump_settings,
        )
        .unwrap(),
        auth: auth("u1", trace_id),
        include_buckets,
    }
}

pub fn datum(id: &str, datum_type: &str, upload_id: &str) -> Value {
    json!({
        "id": id,
        "type": datum_type,
        "uploadId": upload_id,
        "time": "2020-01-01T10:00:00.000Z"
    })
}

pub fn bucket(id: &str, values: &[f64]) -> Bucket {
    let day = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let start = day.and_hms_opt(10, 0, 0).unwrap().and_utc();
    Bucket {
        id: id.to_string(),
        user_id: "u1".to_string(),
        day,
        creation_timestamp: start,
        samples: values
            .iter()
            .enumerate()
            .map(|(i, value)| Sample {
                value: *value,
                units: "mmol/L".to_string(),
                timestamp: start + chrono::Duration::minutes(5 * i as i64),
                timezone: "Europe/Paris".to_string(),
                timezone_offset: 60,
            })
            .collect(),
    }
}

/// Parse a finished body into JSON
pub fn body_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|e| {
        panic!("body is not valid JSON ({e}): {}", String::from_utf8_lossy(body))
    })
}

/// Ids of every element of an array body
pub fn ids(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|record| record["id"].as_str().unwrap().to_string())
        .collect()
}
