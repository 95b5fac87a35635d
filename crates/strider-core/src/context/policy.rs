//! Context policy
//!
//! Hard upper bounds on what the builder may emit. Never advisory: every
//! generated pack satisfies all three character/item caps simultaneously.

use serde::{Deserialize, Serialize};

use crate::storage::results::SelectorKind;

/// Budget policy for context packs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPolicy {
    /// Maximum number of snippets in a pack.
    pub max_items: usize,
    /// Maximum characters per snippet.
    pub max_chars_per_item: usize,
    /// Maximum characters for the rendered pack, header included.
    pub max_total_chars: usize,
    /// How many of the newest tool-result previews to consider.
    pub include_latest_tool_previews_n: usize,
    /// If set, only previews from these tools are eligible.
    pub allow_tools: Option<Vec<String>>,
    /// If set, only these selector kinds may excerpt; the first entry is used.
    pub allow_selectors: Option<Vec<SelectorKind>>,
}

impl Default for ContextPolicy {
    /// Conservative built-in caps so the system is budget-safe out of the box.
    fn default() -> Self {
        Self {
            max_items: 8,
            max_chars_per_item: 600,
            max_total_chars: 4_000,
            include_latest_tool_previews_n: 5,
            allow_tools: None,
            allow_selectors: None,
        }
    }
}

impl ContextPolicy {
    /// Selector kind the builder excerpts with.
    pub fn selector_kind(&self) -> SelectorKind {
        self.allow_selectors
            .as_ref()
            .and_then(|kinds| kinds.first().copied())
            .unwrap_or(SelectorKind::FirstChars)
    }

    /// Whether previews from `tool` are eligible under `allow_tools`.
    pub fn allows_tool(&self, tool: &str) -> bool {
        match &self.allow_tools {
            Some(allowed) => allowed.iter().any(|t| t == tool),
            None => true,
        }
    }
}
