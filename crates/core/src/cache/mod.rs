//! SQLite-backed store for generation-tagged response caches.
//!
//! Each deployed version owns one named generation. Entries are keyed by a
//! SHA-256 of the request and live until their generation is deleted.
//!
//! - Atomic population of a new generation in a single transaction
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Whole-generation pruning via cascading deletes

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheEntry;
pub use generations::{Generation, GenerationSummary, generation_name};
