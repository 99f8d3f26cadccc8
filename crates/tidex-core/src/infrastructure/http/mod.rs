//! HTTP server integration

pub mod axum_adapter;
pub mod middleware;

pub use axum_adapter::{TidexAppState, create_tidex_router};
