//! Plan management
//!
//! A flat, ordered task checklist owned per session. The store is surfaced to
//! the model as one ordinary tool (see `tools::implementations::planner`), so
//! plan mutation never becomes a second control-flow mechanism beside the
//! execution loop.

pub mod store;

pub use store::{PlanError, PlanSnapshot, PlanStore, PlanTask, TaskStatus, NO_PLAN_SENTINEL};
