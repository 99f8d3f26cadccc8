//! Application services orchestrating one export request

pub mod authorization_gate;
pub mod data_export_service;
pub mod record_merger;
pub mod response_accumulator;
pub mod source_orchestrator;
pub mod stage_timings;

pub use authorization_gate::AuthorizationGate;
pub use data_export_service::DataExportService;
pub use record_merger::{MergeStats, RecordMerger};
pub use response_accumulator::ResponseAccumulator;
pub use source_orchestrator::{FetchPlan, FetchState, FetchedSources, SourceOrchestrator};
pub use stage_timings::StageTimings;
