//! Export use cases: merged records, data range and TIR summary

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    application::{
        ApplicationError, ApplicationResult, ExportDataQuery, GetRangeQuery, GetTirSummaryQuery,
        services::{
            AuthorizationGate, FetchPlan, MergeStats, RecordMerger, ResponseAccumulator,
            SourceOrchestrator, StageTimings,
        },
    },
    config::{ExportConfig, TirConfig},
    domain::{
        BucketSeries, DataRange, TirAggregateResult,
        ports::{
            AuthRequest, AuthorizationPolicy, AuxDataServiceGat, DocumentStoreGat, RemoteBucketClientGat,
            SystemTimeProvider, TimeProvider,
        },
        services::{TirPipeline, TirQuery},
    },
};

/// Entry point of every read endpoint
pub struct DataExportService<S, R, A, P> {
    store: Arc<S>,
    orchestrator: SourceOrchestrator<S, R, A>,
    gate: AuthorizationGate<P>,
    export: ExportConfig,
    tir: TirConfig,
    clock: Arc<dyn TimeProvider>,
}

impl<S, R, A, P> DataExportService<S, R, A, P>
where
    S: DocumentStoreGat + 'static,
    R: RemoteBucketClientGat + 'static,
    A: AuxDataServiceGat + 'static,
    P: AuthorizationPolicy,
{
    /// Service over the given collaborators
    pub fn new(
        store: Arc<S>,
        remote: Arc<R>,
        aux: Arc<A>,
        policy: P,
        export: ExportConfig,
        tir: TirConfig,
    ) -> Self {
        Self {
            orchestrator: SourceOrchestrator::new(store.clone(), remote, aux),
            store,
            gate: AuthorizationGate::new(policy),
            export,
            tir,
            clock: Arc::new(SystemTimeProvider),
        }
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Run the authorization gate alone for a single target user
    pub fn authorize(&self, auth: &AuthRequest, user_id: String) -> ApplicationResult<()> {
        self.gate.check(auth, &[user_id])
    }

    /// Build the merged export body.
    ///
    /// Never fails: every error ends up as the envelope inside the returned
    /// accumulator.
    pub async fn export(&self, query: ExportDataQuery) -> ResponseAccumulator {
        let trace_id = query.trace_id();
        let user_id = query.request.user_id.clone();
        let mut acc = ResponseAccumulator::new(trace_id);
        let mut timings = StageTimings::new(trace_id);

        match self.run_export(query, &mut acc, &mut timings).await {
            Ok(stats) => info!(
                trace_id = %trace_id,
                user_id = %user_id,
                written = stats.written,
                deferred_ids = stats.deferred_ids,
                filtered = stats.filtered,
                missing_fields = stats.missing_fields,
                bytes = acc.len(),
                "export complete"
            ),
            Err(err) => {
                log_failure(&err, &trace_id.to_string(), &user_id);
                acc.write_error(&err);
            }
        }

        timings.log_summary();
        acc
    }

    async fn run_export(
        &self,
        query: ExportDataQuery,
        acc: &mut ResponseAccumulator,
        timings: &mut StageTimings,
    ) -> ApplicationResult<MergeStats> {
        let ExportDataQuery {
            request,
            auth,
            include_buckets,
        } = query;
        self.gate.check(&auth, std::slice::from_ref(&request.user_id))?;

        if let Some(estimate) = request
            .window
            .estimated_bytes(self.export.bytes_per_second, self.export.max_grow_bytes)
        {
            acc.grow(estimate);
        }

        let user_id = request.user_id.clone();
        let plan = FetchPlan {
            request,
            session_token: auth.session_token,
            series: if include_buckets {
                BucketSeries::ALL.to_vec()
            } else {
                Vec::new()
            },
            exclude_types: self.export.exclude_types.clone(),
            parameter_levels: self.export.parameter_levels.clone(),
        };

        let sources = self.orchestrator.fetch(plan, timings).await?;

        let merger = RecordMerger::new(acc, &self.export.parameter_levels);
        let start = std::time::Instant::now();
        let stats = merger
            .merge(sources, self.store.as_ref(), &user_id, timings)
            .await;
        timings.record("merge", start.elapsed());
        stats
    }

    /// Earliest and latest record time of a user
    pub async fn range(&self, query: GetRangeQuery) -> ApplicationResult<DataRange> {
        self.gate
            .check(&query.auth, std::slice::from_ref(&query.user_id))?;

        let mut timings = StageTimings::new(query.auth.trace_id);
        let range = timings
            .time("fetch_data_range", self.store.find_data_range(query.user_id.clone()))
            .await;
        timings.log_summary();

        range?.ok_or_else(|| {
            ApplicationError::NotFound(format!("no data for user {}", query.user_id))
        })
    }

    /// Time-in-range statistics of a user.
    ///
    /// Missing bounds default to the configured trailing window ending now.
    pub async fn summary(&self, query: GetTirSummaryQuery) -> ApplicationResult<TirAggregateResult> {
        self.gate
            .check(&query.auth, std::slice::from_ref(&query.user_id))?;

        let end = query.window.end.unwrap_or_else(|| self.clock.now());
        let start = query
            .window
            .start
            .unwrap_or_else(|| end - self.tir.default_window());
        if end < start {
            return Err(ApplicationError::InvalidParameters(
                "endDate is before the default summary window start".to_string(),
            ));
        }

        let tir_query = TirQuery::new(vec![query.user_id.clone()], start, end)
            .with_thresholds(self.tir.thresholds)
            .with_sampling_interval(self.tir.sampling_interval_minutes);
        let pipeline = TirPipeline::build(&tir_query);

        let mut timings = StageTimings::new(query.auth.trace_id);
        let results = timings
            .time("aggregate_tir", self.store.aggregate_tir(pipeline))
            .await;
        timings.log_summary();

        results?
            .into_iter()
            .find(|result| result.user_id == query.user_id && result.has_data())
            .ok_or_else(|| {
                ApplicationError::NotFound(format!(
                    "no cbg data for user {} between {} and {}",
                    query.user_id,
                    start.to_rfc3339(),
                    end.to_rfc3339()
                ))
            })
    }
}

fn log_failure(err: &ApplicationError, trace_id: &str, user_id: &str) {
    match err.status() {
        500.. => error!(trace_id, user_id, code = err.code(), error = %err, "export failed"),
        _ => warn!(trace_id, user_id, code = err.code(), error = %err, "export rejected"),
    }
}
