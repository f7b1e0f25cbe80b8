pub mod config;
pub mod image;
pub mod llm;
pub mod memory;
pub mod sqlite;
