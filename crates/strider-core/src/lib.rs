//! Strider core - autonomous step-execution engine.
//!
//! Drives a natural-language mission through bounded Thought→Action→Observation
//! cycles. The hard guarantee: every model call receives a character-bounded
//! prompt regardless of how much data prior tool calls produced. Large tool
//! outputs are offloaded to a handle-based store and only bounded excerpts are
//! re-hydrated into the prompt by a deterministic context builder.
//!
//! Front ends (CLI/HTTP), credential loading, concrete file/shell/web tools,
//! the model-provider network client, and durable storage backends are all
//! external collaborators behind the traits in this crate.

pub mod agent;
pub mod ai;
pub mod context;
pub mod mcp;
pub mod plan;
pub mod storage;
pub mod tools;

pub use agent::loop_events::{EventPayload, LoopInput, PlanTaskInfo, RunStatus, StreamEvent};
pub use agent::orchestrator::{MissionOrchestrator, OrchestratorConfig, OrchestratorServices};
pub use ai::client::{CallOptions, ModelClient, ModelError, ModelTurn, StreamPart};
pub use context::builder::{build_context_pack, ContextPack};
pub use context::policy::ContextPolicy;
pub use plan::store::{PlanSnapshot, PlanStore, PlanTask, TaskStatus};
pub use storage::results::{
    FetchLimits, FetchOutcome, ResultStoreConfig, Selector, SelectorKind, StoredResult,
    ToolResultHandle, ToolResultStore,
};
pub use storage::sessions::{MemorySessionStore, ResultPreview, SessionState, SessionStore};
pub use tools::registry::{parse_params, Tool, ToolContext, ToolRegistry, ToolResult};
