//! Canonical event protocol for the execution loop.
//!
//! `StreamEvent` is the single source of truth for everything the orchestrator
//! emits: a strictly ordered, single-producer sequence. Consumers (UI, driving
//! process) map these to their own presentation format. `tool_call` /
//! `tool_result` pairs follow dispatch order, never completion order, so
//! transcripts replay deterministically.
//!
//! `LoopInput` carries the few inputs the platform sends back into a running
//! loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event on the stream: a tagged payload plus its emission time.
///
/// Wire shape: `{"event_type": ..., "data": {...}, "timestamp": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl StreamEvent {
    pub fn now(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Events emitted by the execution loop.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    /// A loop iteration began.
    StepStart { step: usize },

    /// Text content delta from the model.
    LlmToken { delta: String },

    /// A tool call is being dispatched.
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },

    /// A dispatched tool call finished. `output` is the inline payload or the
    /// bounded preview; `handle_id` is set when the full result was offloaded.
    ToolResult {
        id: String,
        name: String,
        output: String,
        handle_id: Option<String>,
        is_error: bool,
    },

    /// The plan changed through the model's own tool call.
    PlanUpdated { tasks: Vec<PlanTaskInfo> },

    /// A model turn contained no tool call; its content is the final answer.
    FinalAnswer { content: String },

    /// Something went wrong. On an irrecoverable fault this is the last
    /// event before the sequence ends.
    Error { message: String },
}

/// Simple plan task info for event transport.
#[derive(Debug, Clone, Serialize)]
pub struct PlanTaskInfo {
    pub description: String,
    pub done: bool,
}

/// External inputs the platform provides back to the running loop.
#[derive(Debug, Clone)]
pub enum LoopInput {
    /// Stop at the next iteration boundary. State is persisted first.
    Cancel,
}

/// How a run ended. `BudgetExhausted` is distinct from both success and
/// failure and is always reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    BudgetExhausted,
    Failed,
    Cancelled,
}
