//! AEROFREN API Service Library
//!
//! Request admission and the HTTP surface of the AEROFREN customer API:
//! the admin console, support chat, and the public contact form.
//!
//! # Architecture
//!
//! Every API request is admitted before its handler runs:
//!
//! ```text
//! routes/mod.rs -> middleware/admission.rs -> admission/mod.rs -> handlers/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `admission` - Rate limit, verification and authorization pipeline
//! - `auth` - Bearer token verification (JWKS + EdDSA) and admin resolution
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Admission and HTTP metrics middleware
//! - `models` - Stored records and API request/response types
//! - `observability` - Prometheus metrics
//! - `pagination` - Opaque cursors and page assembly
//! - `rate_limit` - Fixed-window rate limiter
//! - `repositories` - Document store (PostgreSQL and in-memory)
//! - `routes` - Axum router setup
//! - `tasks` - Background maintenance tasks

pub mod admission;
pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod pagination;
pub mod rate_limit;
pub mod repositories;
pub mod routes;
pub mod tasks;
