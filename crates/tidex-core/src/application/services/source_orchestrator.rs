//! Concurrent fetch across the primary store and the remote services
//!
//! One task per backend call, joined on a barrier. Nothing is cancelled
//! early: a fatal failure is only acted upon once every task has reported.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use futures::future::join_all;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    application::{ApplicationError, ApplicationResult, services::StageTimings},
    domain::{
        Bucket, BucketSeries, DomainError, DomainResult, RequestWindow,
        entities::TYPE_PUMP_SETTINGS,
        ports::{
            AuxDataServiceGat, DataQuery, DocumentStoreGat, DocumentStream,
            RemoteBucketClientGat, SeriesRequest,
        },
    },
};

const STAGE_PUMP_SETTINGS: &str = "fetch_pump_settings";
const STAGE_USER_DATA: &str = "fetch_user_data";
const STAGE_PARAMETER_HISTORY: &str = "fetch_parameter_history";
const STAGE_SECURITY_PROFILE: &str = "fetch_basal_security_profile";

/// Lifecycle of one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Nothing started
    Idle,
    /// Tasks running
    Fetching,
    /// Every task reported
    Joined,
    /// A fatal failure was classified
    Aborted,
    /// Handles ready for the merger
    Ready,
}

impl FetchState {
    /// Allowed transitions
    pub fn can_transition_to(self, next: FetchState) -> bool {
        matches!(
            (self, next),
            (FetchState::Idle, FetchState::Fetching)
                | (FetchState::Idle, FetchState::Aborted)
                | (FetchState::Fetching, FetchState::Joined)
                | (FetchState::Joined, FetchState::Aborted)
                | (FetchState::Joined, FetchState::Ready)
        )
    }
}

/// What to fetch for one export
#[derive(Debug, Clone)]
pub struct FetchPlan {
    /// Validated request
    pub request: RequestWindow,
    /// Caller credential forwarded to the remote service
    pub session_token: Option<String>,
    /// Remote series, in merge order
    pub series: Vec<BucketSeries>,
    /// Types left out of the primary query
    pub exclude_types: Vec<String>,
    /// Device parameter levels requested from the history service
    pub parameter_levels: Vec<i64>,
}

/// Typed handles handed to the merger
pub struct FetchedSources {
    /// Latest settings record, fetched before the fan-out
    pub pump_settings: Option<Bytes>,
    /// Primary store cursor
    pub records: DocumentStream,
    /// Decoded buckets per series, in plan order
    pub buckets: Vec<(BucketSeries, Vec<Bucket>)>,
    /// Best-effort parameter history
    pub parameter_history: Option<Value>,
    /// Best-effort basal security profile
    pub basal_security_profile: Option<Value>,
}

impl std::fmt::Debug for FetchedSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedSources")
            .field("pump_settings", &self.pump_settings.as_ref().map(Bytes::len))
            .field("series", &self.buckets.iter().map(|(s, b)| (*s, b.len())).collect::<Vec<_>>())
            .field("parameter_history", &self.parameter_history.is_some())
            .field("basal_security_profile", &self.basal_security_profile.is_some())
            .finish_non_exhaustive()
    }
}

type Timed<T> = (DomainResult<T>, Duration);

/// Runs the backend calls of one export concurrently
pub struct SourceOrchestrator<S, R, A> {
    store: Arc<S>,
    remote: Arc<R>,
    aux: Arc<A>,
}

impl<S, R, A> Clone for SourceOrchestrator<S, R, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            remote: self.remote.clone(),
            aux: self.aux.clone(),
        }
    }
}

impl<S, R, A> SourceOrchestrator<S, R, A>
where
    S: DocumentStoreGat + 'static,
    R: RemoteBucketClientGat + 'static,
    A: AuxDataServiceGat + 'static,
{
    /// Orchestrator over the three collaborators
    pub fn new(store: Arc<S>, remote: Arc<R>, aux: Arc<A>) -> Self {
        Self { store, remote, aux }
    }

    /// Fetch every source of `plan`.
    ///
    /// The settings singleton is read first; then the primary query, each
    /// remote series and the auxiliary lookups run in parallel. A store or
    /// remote failure aborts after the join; auxiliary failures are logged
    /// and replaced by absence.
    pub async fn fetch(
        &self,
        plan: FetchPlan,
        timings: &mut StageTimings,
    ) -> ApplicationResult<FetchedSources> {
        let trace_id = plan.request.trace_id;
        let user_id = plan.request.user_id.clone();
        let mut state = FetchState::Idle;

        let mut query = DataQuery::new(user_id.clone(), plan.request.window)
            .excluding(plan.exclude_types.iter().cloned());

        let pump_settings = if plan.request.include_pump_settings {
            query = query.excluding([TYPE_PUMP_SETTINGS]);
            let result = timings
                .time(STAGE_PUMP_SETTINGS, self.store.find_latest_pump_settings(user_id.clone()))
                .await;
            match result {
                Ok(settings) => settings,
                Err(err) if err.is_not_found() => None,
                Err(err) => {
                    transition(&mut state, FetchState::Aborted, trace_id);
                    return Err(ApplicationError::UpstreamQuery(err.to_string()));
                }
            }
        } else {
            None
        };

        transition(&mut state, FetchState::Fetching, trace_id);

        let primary = {
            let store = self.store.clone();
            spawn_timed(async move { store.find_user_data(query).await })
        };

        let series_handles: Vec<_> = plan
            .series
            .iter()
            .map(|&series| {
                let remote = self.remote.clone();
                let request = SeriesRequest {
                    user_id: user_id.clone(),
                    session_token: plan.session_token.clone(),
                    start: plan.request.window.start,
                    end: plan.request.window.end,
                    trace_id,
                };
                (
                    series,
                    spawn_timed(async move { remote.fetch_buckets(series, request).await }),
                )
            })
            .collect();

        let (history_handle, profile_handle) = if plan.request.include_pump_settings {
            let aux = self.aux.clone();
            let history_user = user_id.clone();
            let levels = plan.parameter_levels.clone();
            let history =
                spawn_timed(async move { aux.parameter_history(history_user, levels).await });

            let aux = self.aux.clone();
            let profile_user = user_id.clone();
            let profile =
                spawn_timed(async move { aux.basal_security_profile(profile_user).await });

            (Some(history), Some(profile))
        } else {
            (None, None)
        };

        let (series, handles): (Vec<_>, Vec<_>) = series_handles.into_iter().unzip();
        let (primary, series_results, history, profile) = tokio::join!(
            join_timed(primary),
            join_all(handles.into_iter().map(join_timed)),
            join_optional(history_handle),
            join_optional(profile_handle),
        );

        transition(&mut state, FetchState::Joined, trace_id);

        let (records, elapsed) = primary;
        timings.record(STAGE_USER_DATA, elapsed);
        let records = match records {
            Ok(records) => records,
            Err(err) => {
                transition(&mut state, FetchState::Aborted, trace_id);
                return Err(ApplicationError::UpstreamQuery(err.to_string()));
            }
        };

        let mut buckets = Vec::with_capacity(series.len());
        let mut remote_error = None;
        for (series, (result, elapsed)) in series.into_iter().zip(series_results) {
            timings.record(series.stage_name(), elapsed);
            match result {
                Ok(found) => buckets.push((series, found)),
                Err(err) if err.is_not_found() => buckets.push((series, Vec::new())),
                Err(err) => {
                    warn!(trace_id = %trace_id, %series, error = %err, "bucket fetch failed");
                    remote_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = remote_error {
            transition(&mut state, FetchState::Aborted, trace_id);
            return Err(ApplicationError::RemoteService(err.to_string()));
        }

        let parameter_history = best_effort(history, STAGE_PARAMETER_HISTORY, timings);
        let basal_security_profile = best_effort(profile, STAGE_SECURITY_PROFILE, timings);

        transition(&mut state, FetchState::Ready, trace_id);

        Ok(FetchedSources {
            pump_settings,
            records,
            buckets,
            parameter_history,
            basal_security_profile,
        })
    }
}

fn transition(state: &mut FetchState, next: FetchState, trace_id: crate::domain::TraceId) {
    debug_assert!(state.can_transition_to(next), "{state:?} -> {next:?}");
    debug!(trace_id = %trace_id, from = ?state, to = ?next, "fetch state");
    *state = next;
}

fn spawn_timed<T, F>(fut: F) -> JoinHandle<Timed<T>>
where
    F: Future<Output = DomainResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(async move {
        let start = Instant::now();
        let result = fut.await;
        (result, start.elapsed())
    })
}

async fn join_timed<T>(handle: JoinHandle<Timed<T>>) -> Timed<T> {
    handle.await.unwrap_or_else(|err| {
        (
            Err(DomainError::query(format!("fetch task failed: {err}"))),
            Duration::ZERO,
        )
    })
}

async fn join_optional<T>(handle: Option<JoinHandle<Timed<T>>>) -> Option<Timed<T>> {
    match handle {
        Some(handle) => Some(join_timed(handle).await),
        None => None,
    }
}

fn best_effort(
    result: Option<Timed<Option<Value>>>,
    stage: &'static str,
    timings: &mut StageTimings,
) -> Option<Value> {
    let (result, elapsed) = result?;
    timings.record(stage, elapsed);
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(stage, error = %err, "auxiliary fetch failed, continuing without it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        assert!(FetchState::Idle.can_transition_to(FetchState::Fetching));
        assert!(FetchState::Fetching.can_transition_to(FetchState::Joined));
        assert!(FetchState::Joined.can_transition_to(FetchState::Ready));
        assert!(FetchState::Joined.can_transition_to(FetchState::Aborted));

        assert!(!FetchState::Fetching.can_transition_to(FetchState::Ready));
        assert!(!FetchState::Ready.can_transition_to(FetchState::Fetching));
        assert!(!FetchState::Aborted.can_transition_to(FetchState::Ready));
    }
}
