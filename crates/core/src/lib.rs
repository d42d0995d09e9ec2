//! Core types and shared functionality for haven.
//!
//! This crate provides:
//! - Generation-tagged response cache with SQLite backend
//! - Unified error types
//! - Worker configuration

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheEntry, Generation, GenerationSummary, generation_name};
pub use config::{ConfigError, WorkerConfig};
pub use error::Error;
