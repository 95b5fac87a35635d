//! Model client contract
//!
//! `ModelClient` is the seam between the execution loop and whatever network
//! client actually talks to a provider. It expresses one "produce a turn"
//! contract with two delivery modes: a single batched call, or incremental
//! streaming. The default `call_streaming` adapts the batched call into a
//! degenerate stream, so the orchestrator never has to care which mode the
//! concrete client supports.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::ai::types::{AiTool, AiToolCall, ModelMessage, Usage};

/// Options for a single model call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    /// Tool catalog attached to the request.
    pub tools: Option<Vec<AiTool>>,
}

impl CallOptions {
    /// Copy of these options with sampling pinned for a recovery retry.
    pub fn with_retry_sampling(&self) -> Self {
        let mut options = self.clone();
        options.temperature = Some(0.0);
        options
    }
}

/// Errors a model client can report.
///
/// `Malformed` means the provider responded but the structured response could
/// not be parsed. The offending text belongs in `detail` for logs only - it is
/// never surfaced to users.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("malformed model output")]
    Malformed { detail: String },

    #[error("model transport error: {0}")]
    Transport(String),
}

/// A complete (batched) model turn.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    pub text: String,
    pub tool_calls: Vec<AiToolCall>,
    pub usage: Usage,
}

/// Incremental parts of a streamed model turn.
#[derive(Debug, Clone)]
pub enum StreamPart {
    /// Text content delta.
    TextDelta { delta: String },
    /// The model started streaming a tool call (arguments not yet complete).
    ToolCallStart { id: String, name: String },
    /// Tool call arguments fully received.
    ToolCallComplete { tool_call: AiToolCall },
    /// Token usage for this turn.
    Usage { usage: Usage },
    /// The stream failed mid-flight.
    Error { error: ModelError },
}

/// Contract for anything that can produce a model turn.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Single batched completion.
    async fn call(
        &self,
        messages: Vec<ModelMessage>,
        options: &CallOptions,
    ) -> Result<ModelTurn, ModelError>;

    /// Whether this client delivers turns incrementally.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Incremental delivery. The default adapts `call` into a one-shot stream
    /// so batched-only clients work transparently.
    async fn call_streaming(
        &self,
        messages: Vec<ModelMessage>,
        options: &CallOptions,
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>, ModelError> {
        let turn = self.call(messages, options).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        if !turn.text.is_empty() {
            let _ = tx.send(StreamPart::TextDelta { delta: turn.text });
        }
        for tool_call in turn.tool_calls {
            let _ = tx.send(StreamPart::ToolCallComplete { tool_call });
        }
        let _ = tx.send(StreamPart::Usage { usage: turn.usage });
        Ok(rx)
    }
}
