//! Observability for the AEROFREN API.
//!
//! Metric definitions and the Prometheus recorder live in [`metrics`];
//! request-level recording happens in `middleware::http_metrics`.

pub mod metrics;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod captured_logs;
