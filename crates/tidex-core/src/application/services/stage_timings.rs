//! Request-scoped stage timers

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::domain::TraceId;

/// Elapsed time of each named stage of one request
#[derive(Debug, Clone)]
pub struct StageTimings {
    trace_id: TraceId,
    started: Instant,
    stages: Vec<(&'static str, Duration)>,
}

impl StageTimings {
    /// Start timing a request
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            started: Instant::now(),
            stages: Vec::new(),
        }
    }

    /// Record one finished stage
    pub fn record(&mut self, stage: &'static str, elapsed: Duration) {
        debug!(
            trace_id = %self.trace_id,
            stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "stage finished"
        );
        self.stages.push((stage, elapsed));
    }

    /// Run `fut` and record its duration under `stage`
    pub async fn time<F, T>(&mut self, stage: &'static str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();
        let out = fut.await;
        self.record(stage, start.elapsed());
        out
    }

    /// Elapsed time of `stage`, if recorded
    pub fn get(&self, stage: &str) -> Option<Duration> {
        self.stages
            .iter()
            .find(|(name, _)| *name == stage)
            .map(|(_, elapsed)| *elapsed)
    }

    /// Recorded stages in completion order
    pub fn stages(&self) -> &[(&'static str, Duration)] {
        &self.stages
    }

    /// Time since the request started
    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }

    /// One summary line for the whole request
    pub fn log_summary(&self) {
        let stages = self
            .stages
            .iter()
            .map(|(name, elapsed)| format!("{name}={}ms", elapsed.as_millis()))
            .collect::<Vec<_>>()
            .join(" ");

        info!(
            trace_id = %self.trace_id,
            total_ms = self.total().as_millis() as u64,
            stages = %stages,
            "request timings"
        );
    }
}
