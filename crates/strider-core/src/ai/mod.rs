//! Model provider layer
//!
//! Provider-agnostic conversation types and the `ModelClient` contract the
//! execution loop drives. Concrete network clients live outside this crate.

pub mod client;
pub mod types;

pub use client::{CallOptions, ModelClient, ModelError, ModelTurn, StreamPart};
pub use types::{AiTool, AiToolCall, Content, ModelMessage, Role, Usage};
