//! Cache-related MCP tools.
//!
//! This module provides read-only views of the generation store.

pub mod generations;
pub mod get;

pub use generations::generations_impl;
pub use get::{CacheGetParams, get_impl};
