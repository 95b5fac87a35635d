//! Session state and the persistence contract
//!
//! `SessionState` is the durable mapping one execution loop owns: conversation
//! history, plan snapshot, recent result previews, step counter, and terminal
//! status. The loop loads it once per iteration and saves it at iteration end
//! and at termination.
//!
//! Durable backends are external collaborators behind `SessionStore` - the
//! core only relies on the opaque `load_state`/`save_state` contract.
//! `MemorySessionStore` is the reference implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::loop_events::RunStatus;
use crate::ai::types::ModelMessage;
use crate::plan::store::PlanSnapshot;

/// Bounded preview of one tool result, kept for context re-hydration.
///
/// `handle_id` is `None` for results small enough to stay inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPreview {
    pub handle_id: Option<String>,
    pub tool: String,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

/// Durable per-session state, mutated once per loop iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub mission: Option<String>,
    pub history: Vec<ModelMessage>,
    pub plan: Option<PlanSnapshot>,
    /// Oldest-first; the context builder reads newest-first.
    pub recent_results: Vec<ResultPreview>,
    pub step: usize,
    pub status: Option<RunStatus>,
    #[serde(default)]
    pub misc: Map<String, Value>,
}

/// Opaque key-value persistence contract for session state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_state(&self, session_id: &str) -> anyhow::Result<Option<SessionState>>;
    async fn save_state(&self, session_id: &str, state: &SessionState) -> anyhow::Result<()>;
}

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    states: DashMap<String, SessionState>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_state(&self, session_id: &str) -> anyhow::Result<Option<SessionState>> {
        Ok(self.states.get(session_id).map(|s| s.value().clone()))
    }

    async fn save_state(&self, session_id: &str, state: &SessionState) -> anyhow::Result<()> {
        self.states.insert(session_id.to_string(), state.clone());
        Ok(())
    }
}
