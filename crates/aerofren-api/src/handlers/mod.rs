//! HTTP request handlers for the AEROFREN API.

pub mod admin;
pub mod chat;
pub mod contact;
pub mod health;
pub mod metrics;

pub use admin::{admin_check, list_conversations, list_inquiries};
pub use chat::{escalate_conversation, list_messages, post_message};
pub use contact::submit_inquiry;
pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
