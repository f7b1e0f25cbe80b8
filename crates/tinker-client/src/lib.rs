//! Client sync layer for the Tinker HTTP API.
//!
//! Keeps a per-session view of the turn log consistent with the server:
//! history is fetched on demand and cached, and a successful send drops the
//! cached copy so the next read reflects both new turns.

pub mod client;
pub mod error;

pub use client::ChatClient;
pub use error::ClientError;
