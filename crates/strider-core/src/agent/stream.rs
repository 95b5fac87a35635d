//! Stream processing for the execution loop.
//!
//! Consumes `StreamPart`s from `ModelClient::call_streaming()` and:
//! - Accumulates text and tool calls into one turn
//! - Emits `llm_token` events as text arrives
//! - Guards against a stalled stream with an inactivity timeout
//!
//! Tool-call events are NOT emitted here: the executor emits them at dispatch
//! time so `tool_call`/`tool_result` pairs stay in dispatch order.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::ai::client::{ModelError, StreamPart};
use crate::ai::types::{AiToolCall, Usage};

use super::loop_events::{EventPayload, StreamEvent};

const STREAM_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of draining a complete model stream.
pub(crate) struct StreamOutcome {
    pub text: String,
    pub tool_calls: Vec<AiToolCall>,
    pub usage: Usage,
    /// Set when the stream failed or stalled; the accumulated parts above are
    /// partial and must not be treated as a turn.
    pub error: Option<ModelError>,
}

/// Drain a model stream, emitting `llm_token` events as chunks arrive.
pub(crate) async fn process_stream(
    mut api_rx: mpsc::UnboundedReceiver<StreamPart>,
    event_tx: &mpsc::UnboundedSender<StreamEvent>,
) -> StreamOutcome {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut usage = Usage::default();
    let mut error = None;

    loop {
        let part = match tokio::time::timeout(STREAM_TIMEOUT, api_rx.recv()).await {
            Ok(Some(part)) => part,
            Ok(None) => break,
            Err(_) => {
                error = Some(ModelError::Transport(format!(
                    "model stream stalled: no data for {} seconds",
                    STREAM_TIMEOUT.as_secs()
                )));
                break;
            }
        };

        match part {
            StreamPart::TextDelta { delta } => {
                text.push_str(&delta);
                let _ = event_tx.send(StreamEvent::now(EventPayload::LlmToken { delta }));
            }
            StreamPart::ToolCallStart { id, name } => {
                tracing::debug!(tool_call = %id, tool = %name, "Tool call streaming started");
            }
            StreamPart::ToolCallComplete { tool_call } => {
                tool_calls.push(tool_call);
            }
            StreamPart::Usage { usage: turn_usage } => {
                usage = turn_usage;
            }
            StreamPart::Error { error: e } => {
                error = Some(e);
                break;
            }
        }
    }

    StreamOutcome {
        text,
        tool_calls,
        usage,
        error,
    }
}
