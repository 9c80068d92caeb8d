//! Common utilities shared across AEROFREN service crates.

#![warn(clippy::pedantic)]

/// Module for JWT and bearer-credential utilities
pub mod jwt;

/// Module for secret types that prevent accidental logging
pub mod secret;
