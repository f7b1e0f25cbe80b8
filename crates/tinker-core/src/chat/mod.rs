//! Conversation logic for Tinker.
//!
//! The message log port, prompt context construction, reply interpretation,
//! and the turn orchestrator that ties them to an LLM provider.

pub mod context;
pub mod interpreter;
pub mod orchestrator;
pub mod prompt;
pub mod repository;
