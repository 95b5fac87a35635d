//! Session and tool-result persistence
//!
//! Two session-scoped stores:
//! - Session state behind the `SessionStore` key-value contract (durable
//!   backends are external collaborators; an in-memory implementation ships
//!   for tests and single-process use)
//! - The handle-based `ToolResultStore` that keeps large tool outputs out of
//!   conversational history

pub mod results;
pub mod sessions;

pub use results::{
    FetchLimits, FetchOutcome, ResultStoreConfig, Selector, SelectorKind, StoredResult,
    ToolResultHandle, ToolResultStore,
};
pub use sessions::{MemorySessionStore, ResultPreview, SessionState, SessionStore};
