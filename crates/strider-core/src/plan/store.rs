//! Plan store
//!
//! Ordered checklist of tasks, each `PENDING` or `DONE`. Positions are stable
//! once created: `create_plan` fully replaces the list, `mark_done` transitions
//! exactly one task, nothing ever reorders or deletes entries. State round-trips
//! through `get_state`/`set_state` so the orchestrator can persist it as part
//! of session state - there is no process-wide instance.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed rendering when no plan exists yet.
pub const NO_PLAN_SENTINEL: &str = "No plan has been created yet.";

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Done,
}

/// One checklist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTask {
    pub description: String,
    pub status: TaskStatus,
}

/// Serializable snapshot of the whole plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub tasks: Vec<PlanTask>,
}

impl PlanSnapshot {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// `(completed, total)` task counts.
    pub fn progress(&self) -> (usize, usize) {
        let done = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count();
        (done, self.tasks.len())
    }

    /// Deterministic checklist rendering, or the fixed sentinel when empty.
    pub fn render_checklist(&self) -> String {
        if self.tasks.is_empty() {
            return NO_PLAN_SENTINEL.to_string();
        }

        let mut rendered = String::new();
        for (i, task) in self.tasks.iter().enumerate() {
            let mark = match task.status {
                TaskStatus::Done => 'x',
                TaskStatus::Pending => ' ',
            };
            if i > 0 {
                rendered.push('\n');
            }
            rendered.push_str(&format!("{}. [{}] {}", i + 1, mark, task.description));
        }
        rendered
    }
}

/// Validation errors from plan operations. These are returned, never raised
/// past the tool boundary, and leave the plan unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("no plan exists yet")]
    NoPlan,

    #[error("task index {index} is out of range (plan has {len} tasks)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Per-session plan store.
#[derive(Debug, Default)]
pub struct PlanStore {
    tasks: Vec<PlanTask>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the plan with a fresh all-`PENDING` checklist.
    pub fn create_plan(&mut self, tasks: Vec<String>) {
        self.tasks = tasks
            .into_iter()
            .map(|description| PlanTask {
                description,
                status: TaskStatus::Pending,
            })
            .collect();
    }

    /// Mark the 1-based `index` task as done.
    ///
    /// Out-of-range indices return a validation error and leave every task
    /// untouched.
    pub fn mark_done(&mut self, index: usize) -> Result<(), PlanError> {
        if self.tasks.is_empty() {
            return Err(PlanError::NoPlan);
        }
        if index == 0 || index > self.tasks.len() {
            return Err(PlanError::IndexOutOfRange {
                index,
                len: self.tasks.len(),
            });
        }
        self.tasks[index - 1].status = TaskStatus::Done;
        Ok(())
    }

    /// Deterministic checklist rendering, or the fixed sentinel when empty.
    pub fn read_plan(&self) -> String {
        self.get_state().render_checklist()
    }

    pub fn has_plan(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// `(completed, total)` task counts.
    pub fn progress(&self) -> (usize, usize) {
        let done = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count();
        (done, self.tasks.len())
    }

    pub fn get_state(&self) -> PlanSnapshot {
        PlanSnapshot {
            tasks: self.tasks.clone(),
        }
    }

    pub fn set_state(&mut self, snapshot: PlanSnapshot) {
        self.tasks = snapshot.tasks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mark_read() {
        let mut store = PlanStore::new();
        store.create_plan(vec!["Say A".to_string(), "Say B".to_string()]);
        store.mark_done(1).unwrap();

        assert_eq!(store.read_plan(), "1. [x] Say A\n2. [ ] Say B");
        assert_eq!(store.progress(), (1, 2));
    }

    #[test]
    fn test_mark_done_out_of_range_leaves_plan_unchanged() {
        let mut store = PlanStore::new();
        store.create_plan(vec!["A".to_string(), "B".to_string()]);

        let before = store.get_state();
        let err = store.mark_done(99).unwrap_err();
        assert_eq!(err, PlanError::IndexOutOfRange { index: 99, len: 2 });
        assert_eq!(store.get_state(), before);

        let err = store.mark_done(0).unwrap_err();
        assert_eq!(err, PlanError::IndexOutOfRange { index: 0, len: 2 });
        assert_eq!(store.get_state(), before);
    }

    #[test]
    fn test_mark_done_without_plan() {
        let mut store = PlanStore::new();
        assert_eq!(store.mark_done(1).unwrap_err(), PlanError::NoPlan);
    }

    #[test]
    fn test_read_plan_sentinel_and_stability() {
        let store = PlanStore::new();
        assert_eq!(store.read_plan(), NO_PLAN_SENTINEL);

        let mut store = PlanStore::new();
        store.create_plan(vec!["A".to_string()]);
        // No mutation between reads -> identical output.
        assert_eq!(store.read_plan(), store.read_plan());
    }

    #[test]
    fn test_create_plan_resets_statuses() {
        let mut store = PlanStore::new();
        store.create_plan(vec!["A".to_string()]);
        store.mark_done(1).unwrap();

        store.create_plan(vec!["B".to_string(), "C".to_string()]);
        assert_eq!(store.read_plan(), "1. [ ] B\n2. [ ] C");
    }

    #[test]
    fn test_state_round_trip() {
        let mut store = PlanStore::new();
        store.create_plan(vec!["A".to_string(), "B".to_string()]);
        store.mark_done(2).unwrap();

        let snapshot = store.get_state();
        let mut restored = PlanStore::new();
        restored.set_state(snapshot);

        assert_eq!(restored.read_plan(), "1. [ ] A\n2. [x] B");
    }
}
