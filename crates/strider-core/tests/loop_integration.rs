//! End-to-end tests for the execution loop.
//!
//! A scripted model client stands in for the provider; everything else - the
//! registry, planner tool, result store, session store, and orchestrator -
//! runs for real.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use strider_core::agent::loop_events::{EventPayload, LoopInput, RunStatus, StreamEvent};
use strider_core::agent::orchestrator::{
    MissionOrchestrator, OrchestratorConfig, OrchestratorServices, FALLBACK_ANSWER,
};
use strider_core::ai::client::{CallOptions, ModelClient, ModelError, ModelTurn};
use strider_core::ai::types::{AiToolCall, Content, ModelMessage, Role, Usage};
use strider_core::context::builder::CONTEXT_PACK_HEADER;
use strider_core::context::policy::ContextPolicy;
use strider_core::storage::results::{ResultStoreConfig, ToolResultStore};
use strider_core::storage::sessions::{MemorySessionStore, SessionStore};
use strider_core::tools::implementations::register_builtin_tools;
use strider_core::tools::registry::{Tool, ToolContext, ToolRegistry, ToolResult};

/// Model client that replays a fixed list of turns and records every request.
struct ScriptedClient {
    turns: Mutex<VecDeque<Result<ModelTurn, ModelError>>>,
    requests: Mutex<Vec<Vec<ModelMessage>>>,
}

impl ScriptedClient {
    fn new(turns: Vec<Result<ModelTurn, ModelError>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<Vec<ModelMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn call(
        &self,
        messages: Vec<ModelMessage>,
        _options: &CallOptions,
    ) -> Result<ModelTurn, ModelError> {
        self.requests.lock().unwrap().push(messages);
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Transport("script exhausted".to_string())))
    }
}

/// Model client that calls the same tool forever (never finishes).
struct EndlessToolClient;

#[async_trait]
impl ModelClient for EndlessToolClient {
    async fn call(
        &self,
        _messages: Vec<ModelMessage>,
        _options: &CallOptions,
    ) -> Result<ModelTurn, ModelError> {
        Ok(tool_turn(vec![call("loop", "echo", json!({"text": "again"}))]))
    }
}

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Echoes the given text"
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        })
    }
    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        ToolResult::success(params["text"].as_str().unwrap_or_default().to_string())
    }
}

struct BigOutputTool;

#[async_trait]
impl Tool for BigOutputTool {
    fn name(&self) -> &str {
        "dump"
    }
    fn description(&self) -> &str {
        "Produces a very large output"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }
    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
        ToolResult::success("payload-line\n".repeat(2_000))
    }
}

struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }
    fn description(&self) -> &str {
        "Takes a moment"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }
    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
        tokio::time::sleep(Duration::from_millis(100)).await;
        ToolResult::success("done")
    }
}

fn call(id: &str, name: &str, arguments: Value) -> AiToolCall {
    AiToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

fn tool_turn(tool_calls: Vec<AiToolCall>) -> ModelTurn {
    ModelTurn {
        text: String::new(),
        tool_calls,
        usage: Usage::default(),
    }
}

fn text_turn(text: &str) -> ModelTurn {
    ModelTurn {
        text: text.to_string(),
        tool_calls: Vec::new(),
        usage: Usage::default(),
    }
}

struct Fixture {
    session_store: Arc<MemorySessionStore>,
    result_store: Arc<ToolResultStore>,
    registry: Arc<ToolRegistry>,
}

async fn fixture() -> Fixture {
    let registry = Arc::new(ToolRegistry::new());
    register_builtin_tools(&registry).await;
    registry.register(Arc::new(EchoTool)).await;
    registry.register(Arc::new(BigOutputTool)).await;
    registry.register(Arc::new(SlowTool)).await;

    Fixture {
        session_store: Arc::new(MemorySessionStore::new()),
        result_store: Arc::new(ToolResultStore::new(ResultStoreConfig {
            inline_threshold: 256,
            ..Default::default()
        })),
        registry,
    }
}

fn orchestrator(
    fixture: &Fixture,
    client: Arc<dyn ModelClient>,
    session_id: &str,
    max_steps: usize,
) -> MissionOrchestrator {
    MissionOrchestrator::new(
        OrchestratorServices {
            model_client: client,
            tool_registry: fixture.registry.clone(),
            result_store: fixture.result_store.clone(),
            session_store: fixture.session_store.clone(),
        },
        OrchestratorConfig {
            session_id: session_id.to_string(),
            max_steps,
            ..Default::default()
        },
    )
}

async fn drain_events(
    mut event_rx: tokio::sync::mpsc::UnboundedReceiver<StreamEvent>,
) -> Vec<EventPayload> {
    let mut events = Vec::new();
    while let Some(event) = event_rx.recv().await {
        events.push(event.payload);
    }
    events
}

#[tokio::test]
async fn test_say_a_then_b_end_to_end() {
    let fixture = fixture().await;
    let client = Arc::new(ScriptedClient::new(vec![
        Ok(tool_turn(vec![call(
            "c1",
            "planner",
            json!({"action": "create_plan", "tasks": ["Say A", "Say B"]}),
        )])),
        Ok(tool_turn(vec![
            call("c2", "planner", json!({"action": "mark_done", "index": 1})),
            call("c3", "planner", json!({"action": "mark_done", "index": 2})),
        ])),
        Ok(text_turn("A then B")),
    ]));

    let (event_rx, _input_tx, handle) =
        orchestrator(&fixture, client.clone(), "say-ab", 10).run("Say A then B".to_string());

    let status = handle.await.unwrap();
    let events = drain_events(event_rx).await;

    assert_eq!(status, RunStatus::Completed);

    // The final answer is the model's literal reply.
    let final_answer = events
        .iter()
        .find_map(|e| match e {
            EventPayload::FinalAnswer { content } => Some(content.clone()),
            _ => None,
        })
        .expect("final_answer event");
    assert_eq!(final_answer, "A then B");

    // Plan mutations surfaced as plan_updated events.
    let plan_updates: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, EventPayload::PlanUpdated { .. }))
        .collect();
    assert!(!plan_updates.is_empty());

    // Final session state: plan fully done, status completed.
    let state = fixture
        .session_store
        .load_state("say-ab")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.status, Some(RunStatus::Completed));
    let plan = state.plan.unwrap();
    assert_eq!(plan.progress(), (2, 2));
    assert_eq!(plan.render_checklist(), "1. [x] Say A\n2. [x] Say B");

    // Every model request started with a bounded, delimited context pack.
    let policy = ContextPolicy::default();
    for request in client.requests() {
        let first = request.first().expect("non-empty request");
        assert_eq!(first.role, Role::System);
        let Content::Text { text } = &first.content[0] else {
            panic!("expected text system message");
        };
        assert!(text.starts_with(CONTEXT_PACK_HEADER));
        assert!(text.len() <= policy.max_total_chars);
    }
}

#[tokio::test]
async fn test_event_order_for_one_step() {
    let fixture = fixture().await;
    let client = Arc::new(ScriptedClient::new(vec![
        Ok(tool_turn(vec![call("c1", "echo", json!({"text": "hi"}))])),
        Ok(text_turn("done")),
    ]));

    let (event_rx, _input_tx, handle) =
        orchestrator(&fixture, client, "order", 10).run("mission".to_string());
    handle.await.unwrap();

    let events = drain_events(event_rx).await;
    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            EventPayload::StepStart { .. } => "step_start",
            EventPayload::LlmToken { .. } => "llm_token",
            EventPayload::ToolCall { .. } => "tool_call",
            EventPayload::ToolResult { .. } => "tool_result",
            EventPayload::PlanUpdated { .. } => "plan_updated",
            EventPayload::FinalAnswer { .. } => "final_answer",
            EventPayload::Error { .. } => "error",
        })
        .collect();

    assert_eq!(
        kinds,
        vec![
            "step_start",
            "tool_call",
            "tool_result",
            "step_start",
            "llm_token",
            "final_answer",
        ]
    );
}

#[tokio::test]
async fn test_budget_exhaustion_is_distinct_terminal_status() {
    let fixture = fixture().await;
    let (event_rx, _input_tx, handle) =
        orchestrator(&fixture, Arc::new(EndlessToolClient), "budget", 3)
            .run("never finishes".to_string());

    let status = handle.await.unwrap();
    assert_eq!(status, RunStatus::BudgetExhausted);

    let events = drain_events(event_rx).await;
    let steps = events
        .iter()
        .filter(|e| matches!(e, EventPayload::StepStart { .. }))
        .count();
    assert_eq!(steps, 3);
    assert!(!events
        .iter()
        .any(|e| matches!(e, EventPayload::FinalAnswer { .. })));

    let state = fixture
        .session_store
        .load_state("budget")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.status, Some(RunStatus::BudgetExhausted));
    assert_eq!(state.step, 3);
}

#[tokio::test]
async fn test_large_output_never_raw_in_session_state() {
    let fixture = fixture().await;
    let client = Arc::new(ScriptedClient::new(vec![
        Ok(tool_turn(vec![call("c1", "dump", json!({}))])),
        Ok(text_turn("done")),
    ]));

    let (_event_rx, _input_tx, handle) =
        orchestrator(&fixture, client, "offload", 10).run("dump it".to_string());
    assert_eq!(handle.await.unwrap(), RunStatus::Completed);

    let state = fixture
        .session_store
        .load_state("offload")
        .await
        .unwrap()
        .unwrap();

    // The raw payload is ~26KB; nothing that large may appear in history.
    let serialized = serde_json::to_string(&state.history).unwrap();
    assert!(!serialized.contains(&"payload-line\\n".repeat(100)));

    let observation = state
        .history
        .iter()
        .flat_map(|m| m.content.iter())
        .find_map(|c| match c {
            Content::ToolResult { output, .. } => Some(output.clone()),
            _ => None,
        })
        .expect("tool result in history");
    assert!(observation.get("handle").is_some());
    assert!(observation.get("preview").is_some());
    assert_eq!(fixture.result_store.len(), 1);
}

#[tokio::test]
async fn test_malformed_output_recovers_on_retry() {
    let fixture = fixture().await;
    let client = Arc::new(ScriptedClient::new(vec![
        Err(ModelError::Malformed {
            detail: "{not json".to_string(),
        }),
        Ok(text_turn("recovered")),
    ]));

    let (event_rx, _input_tx, handle) =
        orchestrator(&fixture, client, "retry-ok", 10).run("mission".to_string());

    assert_eq!(handle.await.unwrap(), RunStatus::Completed);
    let events = drain_events(event_rx).await;
    assert!(events
        .iter()
        .any(|e| matches!(e, EventPayload::FinalAnswer { content } if content == "recovered")));
}

#[tokio::test]
async fn test_malformed_output_falls_back_after_retry() {
    let fixture = fixture().await;
    let client = Arc::new(ScriptedClient::new(vec![
        Err(ModelError::Malformed {
            detail: "{not json".to_string(),
        }),
        Err(ModelError::Malformed {
            detail: "{still not json".to_string(),
        }),
    ]));

    let (event_rx, _input_tx, handle) =
        orchestrator(&fixture, client, "retry-fail", 10).run("mission".to_string());

    assert_eq!(handle.await.unwrap(), RunStatus::Failed);
    let events = drain_events(event_rx).await;

    let error_pos = events
        .iter()
        .position(|e| matches!(e, EventPayload::Error { .. }))
        .expect("error event");
    let final_pos = events
        .iter()
        .position(|e| matches!(e, EventPayload::FinalAnswer { .. }))
        .expect("fallback final answer");
    assert!(error_pos < final_pos);

    // The fallback is the fixed message; raw model text never surfaces.
    let EventPayload::FinalAnswer { content } = &events[final_pos] else {
        unreachable!()
    };
    assert_eq!(content, FALLBACK_ANSWER);
    for event in &events {
        let rendered = serde_json::to_string(&StreamEvent::now(event.clone())).unwrap();
        assert!(!rendered.contains("not json"));
    }
}

#[tokio::test]
async fn test_transport_failure_ends_with_error_event() {
    let fixture = fixture().await;
    let client = Arc::new(ScriptedClient::new(vec![
        Err(ModelError::Transport("connection refused".to_string())),
        Err(ModelError::Transport("connection refused".to_string())),
    ]));

    let (event_rx, _input_tx, handle) =
        orchestrator(&fixture, client, "transport", 10).run("mission".to_string());

    assert_eq!(handle.await.unwrap(), RunStatus::Failed);
    let events = drain_events(event_rx).await;
    assert!(matches!(
        events.last().expect("events"),
        EventPayload::Error { .. }
    ));
}

#[tokio::test]
async fn test_cancel_honored_at_iteration_boundary() {
    let fixture = fixture().await;
    let client = Arc::new(ScriptedClient::new(vec![
        Ok(tool_turn(vec![call("c1", "slow", json!({}))])),
        Ok(text_turn("should never be reached")),
    ]));

    let (event_rx, input_tx, handle) =
        orchestrator(&fixture, client, "cancel", 10).run("mission".to_string());

    // Arrives while the first step's tool is still executing; honored at the
    // next boundary, after the completed step is persisted.
    tokio::time::sleep(Duration::from_millis(30)).await;
    input_tx.send(LoopInput::Cancel).unwrap();

    assert_eq!(handle.await.unwrap(), RunStatus::Cancelled);
    let events = drain_events(event_rx).await;

    // The dispatched tool call completed before cancellation.
    assert!(events
        .iter()
        .any(|e| matches!(e, EventPayload::ToolResult { .. })));

    let state = fixture
        .session_store
        .load_state("cancel")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.status, Some(RunStatus::Cancelled));
    assert_eq!(state.step, 1);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let fixture = fixture().await;

    let client_a = Arc::new(ScriptedClient::new(vec![
        Ok(tool_turn(vec![call(
            "c1",
            "planner",
            json!({"action": "create_plan", "tasks": ["only in A"]}),
        )])),
        Ok(text_turn("done A")),
    ]));
    let client_b = Arc::new(ScriptedClient::new(vec![Ok(text_turn("done B"))]));

    let (_rx_a, _tx_a, handle_a) =
        orchestrator(&fixture, client_a, "session-a", 10).run("mission A".to_string());
    let (_rx_b, _tx_b, handle_b) =
        orchestrator(&fixture, client_b, "session-b", 10).run("mission B".to_string());

    assert_eq!(handle_a.await.unwrap(), RunStatus::Completed);
    assert_eq!(handle_b.await.unwrap(), RunStatus::Completed);

    let state_a = fixture
        .session_store
        .load_state("session-a")
        .await
        .unwrap()
        .unwrap();
    let state_b = fixture
        .session_store
        .load_state("session-b")
        .await
        .unwrap()
        .unwrap();

    assert!(state_a.plan.is_some());
    assert!(state_b.plan.is_none());
}
