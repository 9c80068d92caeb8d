//! Background tasks for the AEROFREN API.
//!
//! # Tasks
//!
//! - `rate_limit_sweeper` - Evicts rate-limit entries whose window has ended

pub mod rate_limit_sweeper;

pub use rate_limit_sweeper::start_rate_limit_sweeper;
