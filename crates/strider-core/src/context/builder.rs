//! Context pack builder
//!
//! A pure function from `(mission, recent previews, plan snapshot, policy)` to
//! a budgeted, clearly-delimited snippet bundle. No clocks, no I/O, no model
//! calls: identical inputs always produce byte-identical packs.
//!
//! Truncation happens at selection time through the policy's selector, so an
//! emitted snippet is always an honest excerpt - never a post-hoc cut that
//! implies unstated content.

use crate::context::policy::ContextPolicy;
use crate::plan::store::PlanSnapshot;
use crate::storage::results::SelectorKind;
use crate::storage::sessions::ResultPreview;
use crate::tools::truncation::{ceil_char_boundary, floor_char_boundary};

/// Fixed delimiters so the model can tell the pack apart from conversation.
pub const CONTEXT_PACK_HEADER: &str = "[MISSION CONTEXT]";
pub const CONTEXT_PACK_FOOTER: &str = "[END MISSION CONTEXT]";

/// A budgeted context snippet bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPack {
    items: Vec<String>,
    rendered: String,
}

impl ContextPack {
    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// Rendered length in bytes (what the caps bound).
    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Build a context pack satisfying every cap in `policy` simultaneously.
///
/// `previews` are oldest-first as the session stores them; selection walks
/// them newest-first. Snippet order is fixed: mission, plan, then previews.
pub fn build_context_pack(
    mission: &str,
    previews: &[ResultPreview],
    plan: Option<&PlanSnapshot>,
    policy: &ContextPolicy,
) -> ContextPack {
    // Frame cost: header + footer + the newline joining them.
    let base = CONTEXT_PACK_HEADER.len() + CONTEXT_PACK_FOOTER.len() + 1;
    if policy.max_total_chars < base {
        // Degenerate budget: emit as much of the header as fits.
        let end = floor_char_boundary(CONTEXT_PACK_HEADER, policy.max_total_chars);
        return ContextPack {
            items: Vec::new(),
            rendered: CONTEXT_PACK_HEADER[..end].to_string(),
        };
    }

    let kind = policy.selector_kind();
    let mut candidates: Vec<String> = Vec::new();

    candidates.push(format!("Mission: {}", mission));

    if let Some(plan) = plan {
        if !plan.is_empty() {
            let (done, total) = plan.progress();
            candidates.push(format!(
                "Plan ({}/{} done):\n{}",
                done,
                total,
                plan.render_checklist()
            ));
        }
    }

    for preview in previews
        .iter()
        .rev()
        .filter(|p| policy.allows_tool(&p.tool))
        .take(policy.include_latest_tool_previews_n)
    {
        let line = match &preview.handle_id {
            Some(id) => format!("- [{}] (handle {}) {}", preview.tool, id, preview.preview),
            None => format!("- [{}] {}", preview.tool, preview.preview),
        };
        candidates.push(line);
    }

    let mut items: Vec<String> = Vec::new();
    let mut used = base;

    for candidate in candidates {
        if items.len() >= policy.max_items {
            break;
        }
        let remaining = policy.max_total_chars - used;
        if remaining <= 1 {
            break;
        }
        // One byte reserved for the newline this item adds to the frame.
        let allowed = policy.max_chars_per_item.min(remaining - 1);
        let excerpt = select(&candidate, kind, allowed);
        if excerpt.is_empty() {
            break;
        }
        used += excerpt.len() + 1;
        items.push(excerpt.to_string());
    }

    let mut rendered = String::with_capacity(used);
    rendered.push_str(CONTEXT_PACK_HEADER);
    for item in &items {
        rendered.push('\n');
        rendered.push_str(item);
    }
    rendered.push('\n');
    rendered.push_str(CONTEXT_PACK_FOOTER);

    ContextPack { items, rendered }
}

/// Excerpt `text` to at most `max_bytes` via the policy's selector kind.
fn select(text: &str, kind: SelectorKind, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    match kind {
        SelectorKind::FirstChars => &text[..floor_char_boundary(text, max_bytes)],
        SelectorKind::LastChars => &text[ceil_char_boundary(text, text.len() - max_bytes)..],
    }
}
