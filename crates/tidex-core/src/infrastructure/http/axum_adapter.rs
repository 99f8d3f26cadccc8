//! Axum HTTP adapter for the export endpoints

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path as AxumPath, Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::{
    application::{
        ApplicationError, ExportDataQuery, GetRangeQuery, GetTirSummaryQuery,
        dto::StatusResponse,
        services::{DataExportService, ResponseAccumulator},
    },
    config::HttpConfig,
    domain::{
        DateWindow, RequestWindow, TraceId,
        ports::{
            AuthRequest, AuthorizationPolicy, AuxDataServiceGat, DocumentStoreGat,
            RemoteBucketClientGat, SessionValidator,
        },
    },
    infrastructure::http::middleware::security_middleware,
};

/// Incoming and echoed trace id
pub const TRACE_SESSION_HEADER: &str = "x-tidepool-trace-session";
/// Caller credential; resolves the caller identity and is forwarded to the
/// remote service
pub const SESSION_TOKEN_HEADER: &str = "x-tidepool-session-token";

/// Shared state of the router
pub struct TidexAppState<S, R, A, P> {
    service: Arc<DataExportService<S, R, A, P>>,
    sessions: Arc<dyn SessionValidator>,
}

impl<S, R, A, P> Clone for TidexAppState<S, R, A, P> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            sessions: self.sessions.clone(),
        }
    }
}

impl<S, R, A, P> TidexAppState<S, R, A, P> {
    /// State around a ready service and the validator of session tokens
    pub fn new(
        service: DataExportService<S, R, A, P>,
        sessions: impl SessionValidator + 'static,
    ) -> Self {
        Self {
            service: Arc::new(service),
            sessions: Arc::new(sessions),
        }
    }
}

/// Query parameters of the export and summary endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportParams {
    /// RFC3339 lower bound
    pub start_date: Option<String>,
    /// RFC3339 upper bound
    pub end_date: Option<String>,
    /// `"true"` emits the latest pump settings first
    pub with_pump_settings: Option<String>,
}

impl ExportParams {
    fn include_pump_settings(&self) -> bool {
        self.with_pump_settings.as_deref() == Some("true")
    }
}

/// Create the tidex router
pub fn create_tidex_router<S, R, A, P>(config: &HttpConfig) -> Router<TidexAppState<S, R, A, P>>
where
    S: DocumentStoreGat + 'static,
    R: RemoteBucketClientGat + 'static,
    A: AuxDataServiceGat + 'static,
    P: AuthorizationPolicy + 'static,
{
    Router::new()
        .route("/v1/data/{user_id}", get(export_data::<S, R, A, P>))
        .route("/v1/dataV2/{user_id}", get(export_data_v2::<S, R, A, P>))
        .route("/v1/range/{user_id}", get(data_range::<S, R, A, P>))
        .route("/v1/summary/{user_id}", get(tir_summary::<S, R, A, P>))
        .route("/v1/status", get(status))
        .layer(middleware::from_fn(security_middleware))
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Extract every request-derived identifier once.
///
/// The caller identity comes only from a session token the validator knows.
fn request_context(
    sessions: &dyn SessionValidator,
    headers: &HeaderMap,
    method: &Method,
    uri: &Uri,
) -> AuthRequest {
    let value_of = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let trace_id = match value_of(TRACE_SESSION_HEADER) {
        Some(raw) => TraceId::from_string(&raw).unwrap_or_else(|_| {
            let generated = TraceId::new();
            warn!(received = %raw, trace_id = %generated, "malformed trace id, generated a new one");
            generated
        }),
        None => {
            let generated = TraceId::new();
            warn!(trace_id = %generated, path = %uri.path(), "missing trace id, generated a new one");
            generated
        }
    };

    let session_token = value_of(SESSION_TOKEN_HEADER);
    let caller_id = session_token.as_deref().and_then(|token| sessions.resolve(token));
    if session_token.is_some() && caller_id.is_none() {
        debug!(trace_id = %trace_id, path = %uri.path(), "unknown session token");
    }

    AuthRequest {
        caller_id,
        session_token,
        method: method.to_string(),
        path: uri.path().to_string(),
        trace_id,
    }
}

/// Merged per-event records
async fn export_data<S, R, A, P>(
    State(state): State<TidexAppState<S, R, A, P>>,
    AxumPath(user_id): AxumPath<String>,
    Query(params): Query<ExportParams>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ResponseAccumulator
where
    S: DocumentStoreGat + 'static,
    R: RemoteBucketClientGat + 'static,
    A: AuxDataServiceGat + 'static,
    P: AuthorizationPolicy + 'static,
{
    let auth = request_context(state.sessions.as_ref(), &headers, &method, &uri);
    export(&state, user_id, params, auth, false).await
}

/// Merged per-event and remote bucket records
async fn export_data_v2<S, R, A, P>(
    State(state): State<TidexAppState<S, R, A, P>>,
    AxumPath(user_id): AxumPath<String>,
    Query(params): Query<ExportParams>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ResponseAccumulator
where
    S: DocumentStoreGat + 'static,
    R: RemoteBucketClientGat + 'static,
    A: AuxDataServiceGat + 'static,
    P: AuthorizationPolicy + 'static,
{
    let auth = request_context(state.sessions.as_ref(), &headers, &method, &uri);
    export(&state, user_id, params, auth, true).await
}

async fn export<S, R, A, P>(
    state: &TidexAppState<S, R, A, P>,
    user_id: String,
    params: ExportParams,
    auth: AuthRequest,
    include_buckets: bool,
) -> ResponseAccumulator
where
    S: DocumentStoreGat + 'static,
    R: RemoteBucketClientGat + 'static,
    A: AuxDataServiceGat + 'static,
    P: AuthorizationPolicy + 'static,
{
    let request = match RequestWindow::new(
        user_id.clone(),
        auth.trace_id,
        params.start_date.as_deref(),
        params.end_date.as_deref(),
        params.include_pump_settings(),
    ) {
        Ok(request) => request,
        Err(err) => return rejected(state, &auth, user_id, err.into()),
    };

    state
        .service
        .export(ExportDataQuery {
            request,
            auth,
            include_buckets,
        })
        .await
}

/// `[earliest, latest]` record times
async fn data_range<S, R, A, P>(
    State(state): State<TidexAppState<S, R, A, P>>,
    AxumPath(user_id): AxumPath<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ResponseAccumulator
where
    S: DocumentStoreGat + 'static,
    R: RemoteBucketClientGat + 'static,
    A: AuxDataServiceGat + 'static,
    P: AuthorizationPolicy + 'static,
{
    let auth = request_context(state.sessions.as_ref(), &headers, &method, &uri);
    let trace_id = auth.trace_id;
    let result = state.service.range(GetRangeQuery { user_id, auth }).await;
    json_body(trace_id, result)
}

/// Time-in-range statistics
async fn tir_summary<S, R, A, P>(
    State(state): State<TidexAppState<S, R, A, P>>,
    AxumPath(user_id): AxumPath<String>,
    Query(params): Query<ExportParams>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ResponseAccumulator
where
    S: DocumentStoreGat + 'static,
    R: RemoteBucketClientGat + 'static,
    A: AuxDataServiceGat + 'static,
    P: AuthorizationPolicy + 'static,
{
    let auth = request_context(state.sessions.as_ref(), &headers, &method, &uri);
    let trace_id = auth.trace_id;

    let window =
        match DateWindow::parse(params.start_date.as_deref(), params.end_date.as_deref()) {
            Ok(window) => window,
            Err(err) => return rejected(&state, &auth, user_id, err.into()),
        };

    let result = state
        .service
        .summary(GetTirSummaryQuery {
            user_id,
            window,
            auth,
        })
        .await;
    json_body(trace_id, result)
}

/// Body for a request whose parameters failed to parse. Callers the gate
/// refuses get 403 regardless of the parameters.
fn rejected<S, R, A, P>(
    state: &TidexAppState<S, R, A, P>,
    auth: &AuthRequest,
    user_id: String,
    err: ApplicationError,
) -> ResponseAccumulator
where
    S: DocumentStoreGat + 'static,
    R: RemoteBucketClientGat + 'static,
    A: AuxDataServiceGat + 'static,
    P: AuthorizationPolicy + 'static,
{
    let err = match state.service.authorize(auth, user_id) {
        Ok(()) => err,
        Err(denied) => denied,
    };
    ResponseAccumulator::failed(auth.trace_id, &err)
}

/// Liveness
async fn status() -> Json<StatusResponse> {
    Json(StatusResponse::default())
}

fn json_body<T: Serialize>(
    trace_id: TraceId,
    result: Result<T, ApplicationError>,
) -> ResponseAccumulator {
    let mut acc = ResponseAccumulator::new(trace_id);
    match result.and_then(|value| {
        serde_json::to_vec(&value).map_err(|e| ApplicationError::Serialization(e.to_string()))
    }) {
        Ok(body) => {
            acc.write(&body);
        }
        Err(err) => {
            if err.status() >= 500 {
                error!(trace_id = %trace_id, code = err.code(), error = %err, "request failed");
            }
            acc.write_error(&err);
        }
    }
    acc
}

impl IntoResponse for ResponseAccumulator {
    fn into_response(self) -> Response {
        let (status, trace_id, body) = self.into_parts();
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = (status, body).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Ok(value) = HeaderValue::from_str(&trace_id.to_string()) {
            headers.insert(TRACE_SESSION_HEADER, value);
        }
        response
    }
}
