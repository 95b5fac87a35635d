//! Context injection for the execution loop.
//!
//! Rebuilds the prompt-side context before every model call: a fresh context
//! pack (never cached across iterations) prepended to the conversation as a
//! system message. The pack is the only channel through which prior tool
//! results re-enter the prompt, which is what keeps the next request bounded.

use crate::ai::types::{ModelMessage, Role};
use crate::context::builder::build_context_pack;
use crate::context::policy::ContextPolicy;
use crate::plan::store::PlanSnapshot;
use crate::storage::sessions::ResultPreview;

/// Base system prompt for the loop.
pub const SYSTEM_PROMPT: &str = "\
You are an autonomous agent working a mission step by step. Each turn, either \
call tools to make progress or reply with plain text to deliver the final \
answer. Use the planner tool to keep a task checklist: create_plan before \
multi-step work, mark_done as tasks finish, read_plan to review. Large tool \
results are stored outside the conversation; the [MISSION CONTEXT] block \
carries bounded excerpts of the most recent ones. A plain-text reply with no \
tool call ends the mission.";

/// Build a conversation clone with a fresh context pack prepended.
pub fn inject_context(
    conversation: &[ModelMessage],
    mission: &str,
    previews: &[ResultPreview],
    plan: Option<&PlanSnapshot>,
    policy: &ContextPolicy,
) -> Vec<ModelMessage> {
    let pack = build_context_pack(mission, previews, plan, policy);

    let mut injected = Vec::with_capacity(conversation.len() + 1);
    injected.push(ModelMessage::text(Role::System, pack.rendered()));
    injected.extend_from_slice(conversation);
    injected
}
