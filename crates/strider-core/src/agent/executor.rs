//! Tool execution for the execution loop.
//!
//! Handles:
//! - Schema validation before dispatch
//! - Concurrent fan-out of a turn's tool calls, joined before the next turn
//! - Offloading large outputs through the `ToolResultStore`
//! - `tool_call`/`tool_result` events in dispatch order, never completion order
//!
//! Every failure mode - unknown tool, invalid arguments, timeout, tool error -
//! becomes a structured observation fed back into the next model turn. Nothing
//! here aborts the loop.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use crate::ai::types::{AiToolCall, Content};
use crate::plan::store::PlanStore;
use crate::storage::results::{StoredResult, ToolResultStore};
use crate::storage::sessions::ResultPreview;
use crate::tools::registry::{ToolContext, ToolRegistry, ToolResult};

use super::loop_events::{EventPayload, StreamEvent};

/// What one batch of tool calls produced.
pub(crate) struct ExecutionOutcome {
    /// `tool_result` content blocks for the next turn's history, in dispatch
    /// order.
    pub observations: Vec<Content>,
    /// Bounded previews for session state and context re-hydration.
    pub previews: Vec<ResultPreview>,
}

/// Execute a batch of tool calls, emitting events and offloading large
/// results.
pub(crate) async fn execute_tools(
    tool_calls: &[AiToolCall],
    registry: &Arc<ToolRegistry>,
    result_store: &Arc<ToolResultStore>,
    session_id: &str,
    plan: &Arc<Mutex<PlanStore>>,
    event_tx: &mpsc::UnboundedSender<StreamEvent>,
) -> ExecutionOutcome {
    // tool_call events go out up front, in dispatch order.
    for call in tool_calls {
        let _ = event_tx.send(StreamEvent::now(EventPayload::ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        }));
    }

    // Fan out: every call runs concurrently, joined before the next turn.
    let futures = tool_calls.iter().map(|call| {
        let registry = Arc::clone(registry);
        let plan = Arc::clone(plan);
        let session_id = session_id.to_string();
        let call = call.clone();
        async move { dispatch_one(&call, &registry, &plan, &session_id).await }
    });
    let results = futures::future::join_all(futures).await;

    // tool_result events and observations follow dispatch order regardless of
    // which call finished first.
    let mut observations = Vec::with_capacity(results.len());
    let mut previews = Vec::with_capacity(results.len());

    for (call, result) in tool_calls.iter().zip(results) {
        let stored = result_store.put(
            &result.output,
            &call.name,
            json!({"tool_call_id": call.id}),
        );

        let (observation_output, event_output, handle_id, preview_text) = match &stored {
            StoredResult::Inline { output } => {
                (Value::String(output.clone()), output.clone(), None, output.clone())
            }
            StoredResult::Offloaded { handle, preview } => (
                json!({"handle": handle, "preview": preview}),
                preview.clone(),
                Some(handle.id.clone()),
                preview.clone(),
            ),
        };

        let _ = event_tx.send(StreamEvent::now(EventPayload::ToolResult {
            id: call.id.clone(),
            name: call.name.clone(),
            output: event_output,
            handle_id: handle_id.clone(),
            is_error: result.is_error,
        }));

        observations.push(Content::ToolResult {
            tool_use_id: call.id.clone(),
            output: observation_output,
            is_error: if result.is_error { Some(true) } else { None },
        });

        previews.push(ResultPreview {
            handle_id,
            tool: call.name.clone(),
            preview: preview_text,
            created_at: Utc::now(),
        });
    }

    ExecutionOutcome {
        observations,
        previews,
    }
}

/// Validate and execute one call, converting every failure into a structured
/// result.
async fn dispatch_one(
    call: &AiToolCall,
    registry: &ToolRegistry,
    plan: &Arc<Mutex<PlanStore>>,
    session_id: &str,
) -> ToolResult {
    let Some(tool) = registry.get(&call.name).await else {
        tracing::warn!(tool = %call.name, tool_call = %call.id, "Unknown tool requested");
        return ToolResult::error_with_code(
            "unknown_tool",
            format!("Unknown tool: {}", call.name),
        );
    };

    if let Err(reason) = tool.validate(&call.arguments) {
        tracing::info!(tool = %call.name, tool_call = %call.id, %reason, "Tool arguments failed validation");
        return ToolResult::invalid_parameters(format!(
            "Invalid parameters for '{}': {}",
            call.name, reason
        ));
    }

    let ctx = ToolContext::for_session(session_id).with_plan(Arc::clone(plan));
    registry
        .execute(&call.name, call.arguments.clone(), &ctx)
        .await
        .unwrap_or_else(|| {
            ToolResult::error_with_code("unknown_tool", format!("Unknown tool: {}", call.name))
        })
}
