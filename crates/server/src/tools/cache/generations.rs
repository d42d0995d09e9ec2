//! cache_generations tool implementation.
//!
//! Lists every stored generation with its entry count.

use haven_core::{CacheDb, GenerationSummary};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Output from the cache_generations tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGenerationsOutput {
    /// Generation owned by the running version.
    pub current: String,
    pub generations: Vec<GenerationSummary>,
}

/// Implementation of the cache_generations tool.
pub async fn generations_impl(cache: &CacheDb, current: &str) -> Result<CallToolResult, McpError> {
    let generations = cache.generation_summaries().await?;
    json_result(&CacheGenerationsOutput { current: current.to_string(), generations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::parse_output;
    use haven_core::CacheEntry;

    #[tokio::test]
    async fn test_generations_impl_empty() {
        let cache = CacheDb::open_in_memory().await.unwrap();

        let output: CacheGenerationsOutput = parse_output(&generations_impl(&cache, "daemon-cache-v2").await.unwrap());

        assert_eq!(output.current, "daemon-cache-v2");
        assert!(output.generations.is_empty());
    }

    #[tokio::test]
    async fn test_generations_impl_counts_entries() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        cache.open_generation("daemon-cache-v1").await.unwrap();
        let batch = vec![
            CacheEntry::new("GET", "https://app.example.com/a.css", 200, vec![], b"a{}".to_vec()),
            CacheEntry::new("GET", "https://app.example.com/b.js", 200, vec![], b"b()".to_vec()),
        ];
        cache.commit_generation("daemon-cache-v2", batch).await.unwrap();

        let output: CacheGenerationsOutput = parse_output(&generations_impl(&cache, "daemon-cache-v2").await.unwrap());

        let counts: Vec<(String, u64)> = output.generations.into_iter().map(|g| (g.name, g.entries)).collect();
        assert_eq!(counts, vec![("daemon-cache-v1".to_string(), 0), ("daemon-cache-v2".to_string(), 2)]);
    }
}
