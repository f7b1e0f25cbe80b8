//! Shared domain types for Tinker.
//!
//! This crate contains the core domain types used across the Tinker workspace:
//! chat turns and their structured payloads, prompt/LLM request shapes,
//! configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
