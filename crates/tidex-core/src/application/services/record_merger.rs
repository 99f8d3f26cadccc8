//! Sequential schema unification and emission
//!
//! Walks the fetched sources one record at a time in a fixed order (settings,
//! primary store, remote series, deferred upload records) and writes one JSON
//! array into the accumulator. Bad records are counted and skipped; only a
//! failing cursor aborts the pass.

use std::collections::HashSet;

use futures::StreamExt;
use serde::Serialize;
use tracing::warn;

use crate::{
    application::{
        ApplicationError, ApplicationResult,
        services::{FetchedSources, ResponseAccumulator, StageTimings},
    },
    domain::{
        Datum, DomainError, TraceId, UploadIdSet,
        entities::{PAYLOAD_BASAL_SECURITY_PROFILE, PAYLOAD_HISTORY},
        ports::{DocumentStoreGat, DocumentStream},
    },
};

const STAGE_UPLOAD_RECORDS: &str = "fetch_upload_records";

/// Counters of one merge pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeStats {
    /// Records written to the body
    pub written: usize,
    /// Documents that failed to decode
    pub decode_errors: usize,
    /// Records that failed to encode
    pub encode_errors: usize,
    /// Records dropped for an empty `id`, `type` or `uploadId`
    pub missing_fields: usize,
    /// Device parameter events outside the level allow-list
    pub filtered: usize,
    /// Distinct upload ids requested in the deferred pass
    pub deferred_ids: usize,
    /// First decode failure
    pub first_decode_error: Option<DomainError>,
    /// First encode failure
    pub first_encode_error: Option<DomainError>,
}

impl MergeStats {
    fn decode_failed(&mut self, err: DomainError) {
        self.decode_errors += 1;
        self.first_decode_error.get_or_insert(err);
    }

    fn encode_failed(&mut self, err: DomainError) {
        self.encode_errors += 1;
        self.first_encode_error.get_or_insert(err);
    }

    /// Any per-record failure
    pub fn has_errors(&self) -> bool {
        self.decode_errors > 0 || self.encode_errors > 0
    }
}

/// Which rules apply to a primary-store document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Primary,
    Deferred,
}

/// Single-owner merge state of one request
pub struct RecordMerger<'a> {
    acc: &'a mut ResponseAccumulator,
    trace_id: TraceId,
    parameter_levels: &'a [i64],
    upload_ids: UploadIdSet,
    emitted_uploads: HashSet<String>,
    stats: MergeStats,
}

impl<'a> RecordMerger<'a> {
    /// Merger writing into `acc`
    pub fn new(acc: &'a mut ResponseAccumulator, parameter_levels: &'a [i64]) -> Self {
        let trace_id = acc.trace_id();
        Self {
            acc,
            trace_id,
            parameter_levels,
            upload_ids: UploadIdSet::new(),
            emitted_uploads: HashSet::new(),
            stats: MergeStats::default(),
        }
    }

    /// Merge `sources` and the deferred upload records of `user_id`.
    ///
    /// On error the accumulator holds a partial array; callers override it
    /// with [`ResponseAccumulator::write_error`].
    pub async fn merge<S>(
        mut self,
        sources: FetchedSources,
        store: &S,
        user_id: &str,
        timings: &mut StageTimings,
    ) -> ApplicationResult<MergeStats>
    where
        S: DocumentStoreGat,
    {
        let FetchedSources {
            pump_settings,
            records,
            buckets,
            parameter_history,
            basal_security_profile,
        } = sources;
        let enrichment = Enrichment {
            history: parameter_history,
            basal_security_profile,
        };

        self.acc.write_str("[");

        if let Some(raw) = pump_settings {
            self.process_document(&raw, Pass::Primary, &enrichment);
        }

        self.drain(records, Pass::Primary, &enrichment).await?;

        for (series, buckets) in &buckets {
            for bucket in buckets {
                for datum in bucket.synthesize(*series) {
                    self.emit(&datum);
                }
            }
        }

        let ids: Vec<String> = std::mem::take(&mut self.upload_ids)
            .into_vec()
            .into_iter()
            .filter(|id| !self.emitted_uploads.contains(id))
            .collect();
        if !ids.is_empty() {
            self.stats.deferred_ids = ids.len();
            let stream = timings
                .time(
                    STAGE_UPLOAD_RECORDS,
                    store.find_by_upload_ids(user_id.to_string(), ids),
                )
                .await
                .map_err(|e| ApplicationError::UpstreamQuery(e.to_string()))?;
            self.drain(stream, Pass::Deferred, &enrichment).await?;
        }

        self.acc.write_str("]");
        self.log_errors();
        Ok(self.stats)
    }

    async fn drain(
        &mut self,
        mut stream: DocumentStream,
        pass: Pass,
        enrichment: &Enrichment,
    ) -> ApplicationResult<()> {
        while let Some(item) = stream.next().await {
            let raw = item.map_err(|e| ApplicationError::UpstreamQuery(e.to_string()))?;
            self.process_document(&raw, pass, enrichment);
        }
        Ok(())
    }

    fn process_document(&mut self, raw: &[u8], pass: Pass, enrichment: &Enrichment) {
        let mut datum = match Datum::decode(raw) {
            Ok(datum) => datum,
            Err(err) => {
                self.stats.decode_failed(err);
                return;
            }
        };

        if !datum.has_required_fields() {
            self.stats.missing_fields += 1;
            return;
        }

        if pass == Pass::Primary {
            if !datum.passes_level_filter(self.parameter_levels) {
                self.stats.filtered += 1;
                return;
            }
            if !datum.is_self_referential_upload() {
                self.upload_ids.insert(&datum.upload_id);
            }
            if datum.is_pump_settings() {
                enrichment.apply(&mut datum, self.trace_id);
            }
        } else if self.emitted_uploads.contains(&datum.id) {
            return;
        }

        if datum.is_upload() {
            self.emitted_uploads.insert(datum.id.clone());
        }

        self.emit(&datum);
    }

    fn emit<T: Serialize>(&mut self, record: &T) {
        let bytes = match serde_json::to_vec(record) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.encode_failed(DomainError::Encode(e.to_string()));
                return;
            }
        };

        if self.stats.written > 0 {
            self.acc.write_str(",\n");
        }
        self.acc.write(&bytes);
        self.stats.written += 1;
    }

    fn log_errors(&self) {
        if !self.stats.has_errors() {
            return;
        }

        warn!(
            trace_id = %self.trace_id,
            decode_errors = self.stats.decode_errors,
            encode_errors = self.stats.encode_errors,
            first_decode_error = ?self.stats.first_decode_error,
            first_encode_error = ?self.stats.first_encode_error,
            "records skipped during merge"
        );
    }
}

struct Enrichment {
    history: Option<serde_json::Value>,
    basal_security_profile: Option<serde_json::Value>,
}

impl Enrichment {
    fn apply(&self, datum: &mut Datum, trace_id: TraceId) {
        let values = [
            (PAYLOAD_HISTORY, &self.history),
            (PAYLOAD_BASAL_SECURITY_PROFILE, &self.basal_security_profile),
        ];

        for (key, value) in values {
            if let Some(value) = value
                && !datum.inject_payload(key, value.clone())
            {
                warn!(trace_id = %trace_id, id = %datum.id, key, "payload is not an object");
            }
        }
    }
}
