//! MCP tool implementations.
//!
//! `worker_*` tools dispatch lifecycle, fetch, message and client events to
//! the running worker. `cache_*` tools inspect the generation store.

pub mod cache;
pub mod worker;

use haven_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Parse the JSON text of a tool result back into its output type.
#[cfg(test)]
pub(crate) fn parse_output<T: serde::de::DeserializeOwned>(result: &CallToolResult) -> T {
    let content = serde_json::to_value(&result.content[0]).unwrap();
    let text = content
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
