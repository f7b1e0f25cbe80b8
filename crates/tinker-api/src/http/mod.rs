//! HTTP API layer for Tinker.
//!
//! Two conversation endpoints plus `/health`, with CORS and request tracing.

pub mod error;
pub mod handlers;
pub mod router;
