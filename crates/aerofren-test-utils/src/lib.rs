//! # AEROFREN Test Utilities
//!
//! Shared test utilities for the AEROFREN API.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed Ed25519 keys for reproducible tokens)
//! - Test token builders (`TestTokenBuilder`)
//! - Server test harness (`TestApiServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aerofren_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestApiServer::builder().spawn().await?;
//!     let token = server.sign(TestTokenBuilder::new().for_user("alice"));
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/chat/conversations/abc/messages", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 404);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
