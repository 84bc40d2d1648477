//! # ClassWatch Common Library
//!
//! Shared code for the ClassWatch services including:
//! - Attention label types
//! - Hub event types (HubEvent enum) and the EventBus
//! - Configuration loading
//! - Database schema and row models
//! - SSE helpers

pub mod attention;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use attention::{AttentionLabel, Stabilization, StableState};
pub use error::{Error, Result};
