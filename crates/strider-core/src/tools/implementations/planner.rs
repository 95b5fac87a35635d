//! Planner tool
//!
//! The plan store surfaced to the model as one ordinary catalog entry -
//! planning is a tool call, not a second control-flow mechanism. The tool
//! mutates the session's own `PlanStore` handed in through `ToolContext`;
//! the orchestrator persists the snapshot with the rest of session state.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::plan::store::PlanStore;
use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};

pub const PLANNER_TOOL_NAME: &str = "planner";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PlannerAction {
    CreatePlan,
    MarkDone,
    ReadPlan,
    UpdatePlan,
}

#[derive(Debug, Deserialize)]
struct PlannerParams {
    action: PlannerAction,
    #[serde(default)]
    tasks: Option<Vec<String>>,
    #[serde(default)]
    index: Option<i64>,
    /// Verb dispatched by `update_plan`.
    #[serde(default)]
    update_action: Option<PlannerAction>,
}

/// Plan management as a tool.
pub struct PlannerTool;

#[async_trait]
impl Tool for PlannerTool {
    fn name(&self) -> &str {
        PLANNER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Manage the task checklist for this mission. Actions: 'create_plan' \
         (replaces the plan with the given tasks, all pending), 'mark_done' \
         (marks the 1-based task index as done), 'read_plan' (returns the \
         current checklist), 'update_plan' (dispatches to another action via \
         'update_action')."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["create_plan", "mark_done", "read_plan", "update_plan"],
                    "description": "Plan operation to perform"
                },
                "tasks": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Task descriptions for create_plan"
                },
                "index": {
                    "type": "integer",
                    "description": "1-based task index for mark_done"
                },
                "update_action": {
                    "type": "string",
                    "enum": ["create_plan", "mark_done", "read_plan"],
                    "description": "Verb dispatched by update_plan"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params: PlannerParams = match parse_params(params) {
            Ok(p) => p,
            Err(result) => return result,
        };

        let Some(plan) = &ctx.plan else {
            return ToolResult::error_with_code(
                "no_plan_store",
                "No plan store is attached to this session",
            );
        };

        let mut plan = plan.lock().await;
        apply(&params, &mut plan)
    }
}

fn apply(params: &PlannerParams, plan: &mut PlanStore) -> ToolResult {
    let action = match params.action {
        PlannerAction::UpdatePlan => match &params.update_action {
            Some(PlannerAction::UpdatePlan) | None => {
                return ToolResult::invalid_parameters(
                    "update_plan requires 'update_action' of create_plan, mark_done, or read_plan",
                );
            }
            Some(inner) => inner.clone(),
        },
        ref direct => direct.clone(),
    };

    match action {
        PlannerAction::CreatePlan => {
            let Some(tasks) = params.tasks.clone() else {
                return ToolResult::invalid_parameters("create_plan requires 'tasks'");
            };
            if tasks.is_empty() {
                return ToolResult::invalid_parameters("create_plan requires at least one task");
            }
            plan.create_plan(tasks);
            ToolResult::success_data(json!({
                "plan": plan.read_plan(),
                "task_count": plan.progress().1,
            }))
        }
        PlannerAction::MarkDone => {
            let Some(index) = params.index else {
                return ToolResult::invalid_parameters("mark_done requires 'index'");
            };
            if index < 1 {
                return ToolResult::invalid_parameters(format!(
                    "'index' must be a positive 1-based integer, got {}",
                    index
                ));
            }
            match plan.mark_done(index as usize) {
                Ok(()) => ToolResult::success_data(json!({
                    "plan": plan.read_plan(),
                    "progress": {
                        "done": plan.progress().0,
                        "total": plan.progress().1,
                    },
                })),
                Err(e) => ToolResult::invalid_parameters(e),
            }
        }
        PlannerAction::ReadPlan => ToolResult::success(plan.read_plan()),
        PlannerAction::UpdatePlan => unreachable!("update_plan resolved above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::store::NO_PLAN_SENTINEL;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn ctx_with_plan() -> (ToolContext, Arc<Mutex<PlanStore>>) {
        let plan = Arc::new(Mutex::new(PlanStore::new()));
        let ctx = ToolContext::for_session("s1").with_plan(plan.clone());
        (ctx, plan)
    }

    #[tokio::test]
    async fn test_create_then_mark_then_read() {
        let (ctx, _plan) = ctx_with_plan();
        let tool = PlannerTool;

        let result = tool
            .execute(
                json!({"action": "create_plan", "tasks": ["Say A", "Say B"]}),
                &ctx,
            )
            .await;
        assert!(!result.is_error);

        let result = tool
            .execute(json!({"action": "mark_done", "index": 1}), &ctx)
            .await;
        assert!(!result.is_error);

        let result = tool.execute(json!({"action": "read_plan"}), &ctx).await;
        assert_eq!(result.output, "1. [x] Say A\n2. [ ] Say B");
    }

    #[tokio::test]
    async fn test_mark_done_out_of_range_is_validation_error() {
        let (ctx, plan) = ctx_with_plan();
        let tool = PlannerTool;

        tool.execute(json!({"action": "create_plan", "tasks": ["A"]}), &ctx)
            .await;
        let before = plan.lock().await.get_state();

        let result = tool
            .execute(json!({"action": "mark_done", "index": 99}), &ctx)
            .await;
        assert!(result.is_error);
        let parsed: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed["error"]["code"], "invalid_parameters");

        // Plan unchanged.
        assert_eq!(plan.lock().await.get_state(), before);
    }

    #[tokio::test]
    async fn test_read_plan_without_plan_returns_sentinel() {
        let (ctx, _plan) = ctx_with_plan();
        let result = PlannerTool.execute(json!({"action": "read_plan"}), &ctx).await;
        assert!(!result.is_error);
        assert_eq!(result.output, NO_PLAN_SENTINEL);
    }

    #[tokio::test]
    async fn test_update_plan_dispatches() {
        let (ctx, _plan) = ctx_with_plan();
        let tool = PlannerTool;

        tool.execute(json!({"action": "create_plan", "tasks": ["A"]}), &ctx)
            .await;

        let result = tool
            .execute(
                json!({"action": "update_plan", "update_action": "mark_done", "index": 1}),
                &ctx,
            )
            .await;
        assert!(!result.is_error);

        let result = tool.execute(json!({"action": "read_plan"}), &ctx).await;
        assert_eq!(result.output, "1. [x] A");
    }

    #[tokio::test]
    async fn test_update_plan_requires_inner_action() {
        let (ctx, _plan) = ctx_with_plan();
        let result = PlannerTool
            .execute(json!({"action": "update_plan"}), &ctx)
            .await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_create_plan_requires_tasks() {
        let (ctx, _plan) = ctx_with_plan();
        let result = PlannerTool
            .execute(json!({"action": "create_plan"}), &ctx)
            .await;
        assert!(result.is_error);
        let parsed: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed["error"]["code"], "invalid_parameters");
    }

    #[tokio::test]
    async fn test_no_plan_store_attached() {
        let result = PlannerTool
            .execute(json!({"action": "read_plan"}), &ToolContext::default())
            .await;
        assert!(result.is_error);
        let parsed: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed["error"]["code"], "no_plan_store");
    }
}
