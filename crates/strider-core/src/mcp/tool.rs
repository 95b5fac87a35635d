//! MCP tool wrapper
//!
//! Translates a discovered remote tool into the local `Tool` contract. The
//! dispatcher sees an ordinary catalog entry; transport and protocol errors
//! are always folded into structured results before they reach it.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::manager::McpManager;
use super::protocol::{format_mcp_result, McpToolDef};
use crate::tools::registry::{Tool, ToolContext, ToolRegistry, ToolResult};

/// Wraps an MCP tool as our Tool trait
pub struct McpTool {
    server_name: String,
    tool_name: String,
    full_name: String,
    definition: McpToolDef,
    manager: Arc<McpManager>,
}

impl McpTool {
    pub fn new(server_name: String, definition: McpToolDef, manager: Arc<McpManager>) -> Self {
        let tool_name = definition.name.clone();
        let full_name = format!("mcp__{}_{}", server_name, tool_name);

        Self {
            server_name,
            tool_name,
            full_name,
            definition,
            manager,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.full_name
    }

    fn description(&self) -> &str {
        self.definition.description.as_deref().unwrap_or("MCP tool")
    }

    fn parameters_schema(&self) -> Value {
        self.definition.input_schema.clone()
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        match self
            .manager
            .call_tool(&self.server_name, &self.tool_name, params)
            .await
        {
            Ok(result) => ToolResult {
                output: format_mcp_result(&result),
                is_error: result.is_error,
            },
            Err(e) => {
                tracing::warn!(
                    tool = %self.full_name,
                    server = %self.server_name,
                    "MCP tool call failed: {}", e
                );
                ToolResult::error_with_code("mcp_error", e)
            }
        }
    }
}

/// Discover and register all MCP tools from configured servers
pub async fn register_mcp_tools(manager: Arc<McpManager>, registry: &ToolRegistry) {
    let tools = manager.discover_all().await;

    for (server_name, tool_def) in tools {
        let mcp_tool = Arc::new(McpTool::new(server_name, tool_def, manager.clone()));
        registry.register(mcp_tool).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_unreachable_server_yields_structured_error() {
        let manager = Arc::new(McpManager::new(PathBuf::from(".")));
        let tool = McpTool::new(
            "ghost".to_string(),
            McpToolDef {
                name: "echo".to_string(),
                description: Some("echo".to_string()),
                input_schema: json!({"type": "object"}),
            },
            manager,
        );

        assert_eq!(tool.name(), "mcp__ghost_echo");

        let result = tool.execute(json!({}), &ToolContext::default()).await;
        assert!(result.is_error);
        // The failure is a structured envelope, not a raw transport error.
        let parsed: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed["ok"], false);
        assert_eq!(parsed["error"]["code"], "mcp_error");
    }

    #[tokio::test]
    async fn test_schema_translation() {
        let manager = Arc::new(McpManager::new(PathBuf::from(".")));
        let schema = json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"]
        });
        let tool = McpTool::new(
            "files".to_string(),
            McpToolDef {
                name: "read".to_string(),
                description: None,
                input_schema: schema.clone(),
            },
            manager,
        );

        assert_eq!(tool.parameters_schema(), schema);
        assert_eq!(tool.description(), "MCP tool");
        // Local validation applies to the translated schema.
        assert!(tool.validate(&json!({})).is_err());
        assert!(tool.validate(&json!({"path": "/x"})).is_ok());
    }
}
