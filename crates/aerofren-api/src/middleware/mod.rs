//! HTTP middleware for the AEROFREN API.
//!
//! # Components
//!
//! - `admission` - Runs the admission pipeline for API routes
//! - `http_metrics` - Records request metrics for every response

pub mod admission;
pub mod http_metrics;

pub use admission::{admit, client_identifier, AdmissionLayerState};
pub use http_metrics::http_metrics_middleware;
