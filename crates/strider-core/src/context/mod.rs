//! Context budgeting
//!
//! The policy states hard caps; the builder is a pure, deterministic function
//! turning `(mission, recent previews, plan snapshot, policy)` into a bounded
//! pack of snippets. This is the budget-safety core: whatever prior tool calls
//! produced, the next model call sees at most `max_total_chars` of it.

pub mod builder;
pub mod policy;

pub use builder::{build_context_pack, ContextPack, CONTEXT_PACK_FOOTER, CONTEXT_PACK_HEADER};
pub use policy::ContextPolicy;
