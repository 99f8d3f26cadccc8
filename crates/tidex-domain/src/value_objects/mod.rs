//! Domain Value Objects
//!
//! Immutable, validated request concepts.

mod id;
mod upload_ids;
mod window;

pub use id::TraceId;
pub use upload_ids::UploadIdSet;
pub use window::{DataRange, DateWindow, RequestWindow, format_time, parse_date};
