//! Handle-based tool-result store
//!
//! `put` embeds small payloads directly; anything above the inline threshold
//! is persisted under an opaque, write-once handle and only a bounded preview
//! travels with the conversation. `fetch` serves excerpts through selectors
//! and re-applies hard caps even when the caller asks for more.
//!
//! Handles are immutable: an identical handle resolves to the identical
//! payload on every fetch until retention reclaims it. The backing map is
//! sharded, so concurrent operations on distinct handles never block each
//! other.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

use crate::tools::truncation::{first_chars, last_chars, truncate_head};

/// Payload format version stamped into every handle.
const SCHEMA_VERSION: u32 = 1;

/// Store configuration. All bounds are hard, never advisory.
#[derive(Debug, Clone)]
pub struct ResultStoreConfig {
    /// Payloads at or below this many bytes stay inline in history.
    pub inline_threshold: usize,
    /// Preview budget (lines / bytes) for offloaded payloads.
    pub preview_lines: usize,
    pub preview_bytes: usize,
    /// Retention: oldest handles are reclaimed past this count.
    pub max_entries: usize,
}

impl Default for ResultStoreConfig {
    fn default() -> Self {
        Self {
            inline_threshold: 2_000,
            preview_lines: 10,
            preview_bytes: 400,
            max_entries: 256,
        }
    }
}

/// Opaque, immutable reference to an offloaded tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultHandle {
    pub id: String,
    pub tool: String,
    pub created_at: DateTime<Utc>,
    pub size: usize,
    pub schema_version: u32,
    pub metadata: Value,
}

/// Outcome of `put`: either the raw small payload, or a handle + preview.
#[derive(Debug, Clone)]
pub enum StoredResult {
    Inline { output: String },
    Offloaded {
        handle: ToolResultHandle,
        preview: String,
    },
}

impl StoredResult {
    pub fn handle_id(&self) -> Option<&str> {
        match self {
            StoredResult::Inline { .. } => None,
            StoredResult::Offloaded { handle, .. } => Some(&handle.id),
        }
    }
}

/// Bounded extraction strategy for `fetch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Selector {
    FirstChars { n: usize },
    LastChars { n: usize },
}

impl Selector {
    pub fn kind(&self) -> SelectorKind {
        match self {
            Selector::FirstChars { .. } => SelectorKind::FirstChars,
            Selector::LastChars { .. } => SelectorKind::LastChars,
        }
    }
}

/// Selector kind without a count, for policy allow-lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SelectorKind {
    FirstChars,
    LastChars,
}

impl SelectorKind {
    pub fn with_count(self, n: usize) -> Selector {
        match self {
            SelectorKind::FirstChars => Selector::FirstChars { n },
            SelectorKind::LastChars => Selector::LastChars { n },
        }
    }
}

/// Hard caps re-applied on every fetch, regardless of the selector's ask.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub max_chars: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self { max_chars: 4_000 }
    }
}

/// Outcome of `fetch`. A missing or reclaimed handle is a typed result,
/// never a panic or error propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Excerpt {
        text: String,
        total_size: usize,
        truncated: bool,
    },
    NotFound {
        handle_id: String,
    },
}

struct StoredEntry {
    payload: String,
    tool: String,
}

/// Session-scoped store for large tool outputs.
pub struct ToolResultStore {
    config: ResultStoreConfig,
    entries: DashMap<String, StoredEntry>,
    /// Insertion order, for oldest-first reclamation.
    order: Mutex<VecDeque<String>>,
}

impl Default for ToolResultStore {
    fn default() -> Self {
        Self::new(ResultStoreConfig::default())
    }
}

impl ToolResultStore {
    pub fn new(config: ResultStoreConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &ResultStoreConfig {
        &self.config
    }

    /// Store a tool result. Small payloads come back inline; larger ones are
    /// persisted under a fresh handle with a bounded, visibly-truncated
    /// preview.
    pub fn put(&self, output: &str, tool: &str, metadata: Value) -> StoredResult {
        if output.len() <= self.config.inline_threshold {
            return StoredResult::Inline {
                output: output.to_string(),
            };
        }

        let handle = ToolResultHandle {
            id: uuid::Uuid::new_v4().to_string(),
            tool: tool.to_string(),
            created_at: Utc::now(),
            size: output.len(),
            schema_version: SCHEMA_VERSION,
            metadata,
        };

        let preview =
            truncate_head(output, self.config.preview_lines, self.config.preview_bytes)
                .with_notice();

        self.entries.insert(
            handle.id.clone(),
            StoredEntry {
                payload: output.to_string(),
                tool: tool.to_string(),
            },
        );
        self.retain(&handle.id);

        tracing::debug!(
            handle = %handle.id,
            tool,
            size = handle.size,
            "Offloaded tool result"
        );

        StoredResult::Offloaded { handle, preview }
    }

    /// Fetch a bounded excerpt of a stored payload.
    pub fn fetch(&self, handle_id: &str, selector: Selector, limits: FetchLimits) -> FetchOutcome {
        let Some(entry) = self.entries.get(handle_id) else {
            tracing::debug!(handle = handle_id, "Fetch of unknown or expired handle");
            return FetchOutcome::NotFound {
                handle_id: handle_id.to_string(),
            };
        };

        let payload = &entry.payload;
        let excerpt = match selector {
            Selector::FirstChars { n } => first_chars(payload, n.min(limits.max_chars)),
            Selector::LastChars { n } => last_chars(payload, n.min(limits.max_chars)),
        };

        FetchOutcome::Excerpt {
            text: excerpt.to_string(),
            total_size: payload.len(),
            truncated: excerpt.len() < payload.len(),
        }
    }

    /// Tool that produced a stored payload, if the handle is still live.
    pub fn tool_of(&self, handle_id: &str) -> Option<String> {
        self.entries.get(handle_id).map(|e| e.tool.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn retain(&self, new_id: &str) {
        let mut order = self.order.lock();
        order.push_back(new_id.to_string());
        while order.len() > self.config.max_entries {
            if let Some(oldest) = order.pop_front() {
                self.entries.remove(&oldest);
                tracing::debug!(handle = %oldest, "Reclaimed tool result by retention cap");
            }
        }
    }
}
