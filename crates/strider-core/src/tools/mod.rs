//! Tool layer for Strider
//!
//! Provides the uniform tool contract, the registry the execution loop
//! dispatches through, and the built-in tool implementations.

pub mod implementations;
pub mod registry;
pub mod truncation;

pub use implementations::register_builtin_tools;
pub use registry::{parse_params, Tool, ToolContext, ToolRegistry, ToolResult};
