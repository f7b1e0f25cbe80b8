//! Business logic and port trait definitions for Tinker.
//!
//! This crate defines the "ports" (`MessageLog`, `LlmProvider`) that the
//! infrastructure layer implements, plus the pure conversation logic on top
//! of them. It depends only on `tinker-types` -- never on `tinker-infra` or
//! any database/IO crate.

pub mod chat;
pub mod llm;
