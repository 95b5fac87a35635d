//! Mission orchestrator - the single canonical execution loop.
//!
//! `MissionOrchestrator` drives one session's mission to completion within a
//! fixed step budget. Each iteration: load/merge state, rebuild the prompt
//! with a freshly built context pack, request a model turn with the tool
//! catalog attached, dispatch any tool calls, and persist. A turn with no
//! tool call is the final answer.
//!
//! Consumers get an ordered `StreamEvent` receiver and a `LoopInput` sender:
//!
//! ```text
//!  ┌──────────────┐       StreamEvent        ┌─────────────┐
//!  │ Orchestrator │ ─────────────────────►   │  Consumer   │
//!  │    (core)    │                          │ (UI/driver) │
//!  │              │ ◄─────────────────────   │             │
//!  └──────────────┘        LoopInput         └─────────────┘
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::ai::client::{CallOptions, ModelClient, ModelError, ModelTurn};
use crate::ai::types::{Content, ModelMessage, Role};
use crate::context::policy::ContextPolicy;
use crate::plan::store::{PlanStore, TaskStatus};
use crate::storage::results::ToolResultStore;
use crate::storage::sessions::{SessionState, SessionStore};
use crate::tools::registry::ToolRegistry;

use super::context::{inject_context, SYSTEM_PROMPT};
use super::executor;
use super::loop_events::{EventPayload, LoopInput, PlanTaskInfo, RunStatus, StreamEvent};
use super::stream;

const MAX_STEPS: usize = 32;
const RECENT_RESULTS_KEPT: usize = 32;

/// Fixed, user-safe reply when the model output stays unparseable after the
/// recovery retry. The raw model text is logged, never surfaced.
pub const FALLBACK_ANSWER: &str = "I could not produce a well-formed response for \
this step. Stopping here; please retry or rephrase the mission.";

/// Configuration for an orchestrator run.
pub struct OrchestratorConfig {
    pub session_id: String,
    pub max_steps: usize,
    /// Context budget; the conservative built-in default applies when unset.
    pub policy: Option<ContextPolicy>,
    pub call_options: CallOptions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            max_steps: MAX_STEPS,
            policy: None,
            call_options: CallOptions::default(),
        }
    }
}

/// Services the orchestrator needs.
///
/// The model client, tool registry, and session store may be shared across
/// sessions; the result store is a per-session namespace and must not be
/// shared between concurrently running session ids.
pub struct OrchestratorServices {
    pub model_client: Arc<dyn ModelClient>,
    pub tool_registry: Arc<ToolRegistry>,
    pub result_store: Arc<ToolResultStore>,
    pub session_store: Arc<dyn SessionStore>,
}

/// The mission orchestrator - runs the complete execution loop.
pub struct MissionOrchestrator {
    services: OrchestratorServices,
    config: OrchestratorConfig,
}

impl MissionOrchestrator {
    pub fn new(services: OrchestratorServices, config: OrchestratorConfig) -> Self {
        Self { services, config }
    }

    /// Start the execution loop.
    ///
    /// Returns `(event_receiver, input_sender, status_handle)`. The loop runs
    /// as a spawned tokio task, emits `StreamEvent`s for every state change,
    /// and resolves the handle with the terminal `RunStatus` - which is also
    /// persisted into session state.
    pub fn run(
        self,
        mission: String,
    ) -> (
        mpsc::UnboundedReceiver<StreamEvent>,
        mpsc::UnboundedSender<LoopInput>,
        JoinHandle<RunStatus>,
    ) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move { self.run_inner(mission, event_tx, input_rx).await });

        (event_rx, input_tx, handle)
    }

    async fn run_inner(
        self,
        mission: String,
        event_tx: mpsc::UnboundedSender<StreamEvent>,
        mut input_rx: mpsc::UnboundedReceiver<LoopInput>,
    ) -> RunStatus {
        let OrchestratorServices {
            model_client,
            tool_registry,
            result_store,
            session_store,
        } = self.services;

        let OrchestratorConfig {
            session_id,
            max_steps,
            policy,
            call_options,
        } = self.config;

        let policy = policy.unwrap_or_default();

        // First contact with a session id creates its state.
        let mut state = match session_store.load_state(&session_id).await {
            Ok(Some(state)) => state,
            Ok(None) => SessionState::default(),
            Err(e) => {
                tracing::error!(session_id = %session_id, "Failed to load session state: {}", e);
                SessionState::default()
            }
        };

        if state.mission.is_none() {
            state.mission = Some(mission.clone());
        }
        let mission_text = state.mission.clone().unwrap_or(mission);
        if state.history.is_empty() {
            state
                .history
                .push(ModelMessage::text(Role::User, mission_text.clone()));
        }
        state.status = None;

        // The session owns its plan store; restore it from the snapshot.
        let plan = Arc::new(Mutex::new(PlanStore::new()));
        if let Some(snapshot) = state.plan.clone() {
            plan.lock().await.set_state(snapshot);
        }

        let mut options = call_options;
        if options.system_prompt.is_none() {
            options.system_prompt = Some(SYSTEM_PROMPT.to_string());
        }

        let start_step = state.step + 1;
        for step in start_step..=max_steps {
            // Cancellation boundary. State is persisted before honoring.
            if drain_cancel(&mut input_rx) {
                tracing::info!(session_id = %session_id, step, "Cancelled at iteration boundary");
                state.status = Some(RunStatus::Cancelled);
                persist(&*session_store, &session_id, &state).await;
                return RunStatus::Cancelled;
            }

            let _ = event_tx.send(StreamEvent::now(EventPayload::StepStart { step }));

            // Fresh catalog and context pack every iteration - never cached.
            options.tools = Some(tool_registry.get_ai_tools().await);
            let plan_snapshot = plan.lock().await.get_state();
            let conversation = inject_context(
                &state.history,
                &mission_text,
                &state.recent_results,
                (!plan_snapshot.is_empty()).then_some(&plan_snapshot),
                &policy,
            );

            // Model turn, with one bounded retry under adjusted sampling.
            let turn = match run_model_turn(&*model_client, conversation.clone(), &options, &event_tx)
                .await
            {
                Ok(turn) => turn,
                Err(first_error) => {
                    tracing::warn!(
                        session_id = %session_id,
                        step,
                        error = %first_error,
                        "Model turn failed, retrying with adjusted sampling"
                    );
                    let retry_options = options.with_retry_sampling();
                    match run_model_turn(&*model_client, conversation, &retry_options, &event_tx)
                        .await
                    {
                        Ok(turn) => turn,
                        Err(retry_error) => {
                            log_model_failure(&session_id, step, &retry_error);
                            state.step = step;
                            state.status = Some(RunStatus::Failed);

                            match retry_error {
                                ModelError::Malformed { .. } => {
                                    let _ = event_tx.send(StreamEvent::now(EventPayload::Error {
                                        message: "Model output was unparseable after retry; \
                                                  returning a fixed fallback answer."
                                            .to_string(),
                                    }));
                                    state
                                        .history
                                        .push(ModelMessage::text(Role::Assistant, FALLBACK_ANSWER));
                                    persist(&*session_store, &session_id, &state).await;
                                    let _ =
                                        event_tx.send(StreamEvent::now(EventPayload::FinalAnswer {
                                            content: FALLBACK_ANSWER.to_string(),
                                        }));
                                }
                                ModelError::Transport(_) => {
                                    persist(&*session_store, &session_id, &state).await;
                                    let _ = event_tx.send(StreamEvent::now(EventPayload::Error {
                                        message: "Model request failed after retry.".to_string(),
                                    }));
                                }
                            }
                            return RunStatus::Failed;
                        }
                    }
                }
            };

            // Record the assistant turn.
            let mut content = Vec::with_capacity(1 + turn.tool_calls.len());
            if !turn.text.is_empty() {
                content.push(Content::Text {
                    text: turn.text.clone(),
                });
            }
            for call in &turn.tool_calls {
                content.push(Content::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                });
            }
            if !content.is_empty() {
                state.history.push(ModelMessage {
                    role: Role::Assistant,
                    content,
                });
            }

            // No tool calls: the content is the final answer.
            if turn.tool_calls.is_empty() {
                state.step = step;
                state.status = Some(RunStatus::Completed);
                persist(&*session_store, &session_id, &state).await;
                let _ = event_tx.send(StreamEvent::now(EventPayload::FinalAnswer {
                    content: turn.text,
                }));
                return RunStatus::Completed;
            }

            // Dispatch tools; large results leave history via the store.
            let outcome = executor::execute_tools(
                &turn.tool_calls,
                &tool_registry,
                &result_store,
                &session_id,
                &plan,
                &event_tx,
            )
            .await;

            state.history.push(ModelMessage {
                role: Role::User,
                content: outcome.observations,
            });
            state.recent_results.extend(outcome.previews);
            if state.recent_results.len() > RECENT_RESULTS_KEPT {
                let overflow = state.recent_results.len() - RECENT_RESULTS_KEPT;
                state.recent_results.drain(..overflow);
            }

            // Plan changes come only from the model's own tool calls; mirror
            // them into state and onto the event stream.
            let new_snapshot = plan.lock().await.get_state();
            if !new_snapshot.is_empty() && state.plan.as_ref() != Some(&new_snapshot) {
                let tasks = new_snapshot
                    .tasks
                    .iter()
                    .map(|t| PlanTaskInfo {
                        description: t.description.clone(),
                        done: t.status == TaskStatus::Done,
                    })
                    .collect();
                let _ = event_tx.send(StreamEvent::now(EventPayload::PlanUpdated { tasks }));
                state.plan = Some(new_snapshot);
            }

            state.step = step;
            persist(&*session_store, &session_id, &state).await;
        }

        // Step budget exhausted without a final answer: a terminal status
        // distinct from both success and failure.
        tracing::warn!(session_id = %session_id, max_steps, "Step budget exhausted");
        state.status = Some(RunStatus::BudgetExhausted);
        persist(&*session_store, &session_id, &state).await;
        RunStatus::BudgetExhausted
    }
}

/// Drain pending inputs at an iteration boundary; true if any was a cancel.
fn drain_cancel(input_rx: &mut mpsc::UnboundedReceiver<LoopInput>) -> bool {
    let mut cancelled = false;
    while let Ok(input) = input_rx.try_recv() {
        match input {
            LoopInput::Cancel => cancelled = true,
        }
    }
    cancelled
}

/// Run one model turn through the streaming contract (batched clients are
/// adapted transparently by the `ModelClient` default).
async fn run_model_turn(
    client: &dyn ModelClient,
    conversation: Vec<ModelMessage>,
    options: &CallOptions,
    event_tx: &mpsc::UnboundedSender<StreamEvent>,
) -> Result<ModelTurn, ModelError> {
    let rx = client.call_streaming(conversation, options).await?;
    let outcome = stream::process_stream(rx, event_tx).await;

    if let Some(error) = outcome.error {
        return Err(error);
    }

    Ok(ModelTurn {
        text: outcome.text,
        tool_calls: outcome.tool_calls,
        usage: outcome.usage,
    })
}

fn log_model_failure(session_id: &str, step: usize, error: &ModelError) {
    match error {
        ModelError::Malformed { detail } => {
            // The raw text goes to logs only, never to events or history.
            tracing::error!(
                session_id = %session_id,
                step,
                detail = %detail,
                "Model output unparseable after retry"
            );
        }
        ModelError::Transport(message) => {
            tracing::error!(
                session_id = %session_id,
                step,
                error = %message,
                "Model transport failure after retry"
            );
        }
    }
}

async fn persist(store: &dyn SessionStore, session_id: &str, state: &SessionState) {
    if let Err(e) = store.save_state(session_id, state).await {
        tracing::error!(session_id = %session_id, "Failed to persist session state: {}", e);
    }
}
