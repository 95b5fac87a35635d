//! Built-in tool implementations
//!
//! Only capabilities the core owns live here. File, shell, and web tools are
//! external collaborators registered by the embedding process.

pub mod planner;

use std::sync::Arc;

use crate::tools::registry::ToolRegistry;

pub use planner::{PlannerTool, PLANNER_TOOL_NAME};

/// Register every built-in tool.
pub async fn register_builtin_tools(registry: &ToolRegistry) {
    registry.register(Arc::new(PlannerTool)).await;
}
