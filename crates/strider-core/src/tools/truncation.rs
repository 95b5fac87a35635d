//! Output truncation utilities for tool results
//!
//! Dual-limit truncation (lines + bytes) with head/tail modes, plus the
//! char-boundary helpers the result store and context builder share. Every
//! truncation is explicitly marked in the produced text - nothing is cut
//! silently.

/// Result of a truncation operation
pub struct TruncationResult {
    pub text: String,
    pub was_truncated: bool,
    pub lines_shown: usize,
    pub lines_total: usize,
    pub bytes_shown: usize,
    pub bytes_total: usize,
}

impl TruncationResult {
    /// Format a truncation notice for appending to output
    pub fn notice(&self) -> Option<String> {
        if !self.was_truncated {
            return None;
        }
        Some(format!(
            "\n[Output truncated: showed {} of {} lines ({}/{} bytes)]",
            self.lines_shown, self.lines_total, self.bytes_shown, self.bytes_total,
        ))
    }

    /// Truncated text with the notice already appended.
    pub fn with_notice(&self) -> String {
        match self.notice() {
            Some(notice) => format!("{}{}", self.text, notice),
            None => self.text.clone(),
        }
    }
}

/// Head-truncate: keep the first N lines/bytes.
pub fn truncate_head(text: &str, max_lines: usize, max_bytes: usize) -> TruncationResult {
    let bytes_total = text.len();
    let lines: Vec<&str> = text.lines().collect();
    let lines_total = lines.len();

    if lines_total <= max_lines && bytes_total <= max_bytes {
        return TruncationResult {
            text: text.to_string(),
            was_truncated: false,
            lines_shown: lines_total,
            lines_total,
            bytes_shown: bytes_total,
            bytes_total,
        };
    }

    let line_limited = if lines_total > max_lines {
        &lines[..max_lines]
    } else {
        &lines[..]
    };

    let joined = line_limited.join("\n");
    let (final_text, lines_shown) = if joined.len() > max_bytes {
        let boundary = floor_char_boundary(&joined, max_bytes);
        let cutoff = joined[..boundary].rfind('\n').unwrap_or(boundary);
        let trimmed = &joined[..cutoff];
        let shown = trimmed.lines().count();
        (trimmed.to_string(), shown)
    } else {
        let shown = line_limited.len();
        (joined, shown)
    };

    let bytes_shown = final_text.len();
    TruncationResult {
        text: final_text,
        was_truncated: true,
        lines_shown,
        lines_total,
        bytes_shown,
        bytes_total,
    }
}

/// Tail-truncate: keep the last N lines/bytes.
pub fn truncate_tail(text: &str, max_lines: usize, max_bytes: usize) -> TruncationResult {
    let bytes_total = text.len();
    let lines: Vec<&str> = text.lines().collect();
    let lines_total = lines.len();

    if lines_total <= max_lines && bytes_total <= max_bytes {
        return TruncationResult {
            text: text.to_string(),
            was_truncated: false,
            lines_shown: lines_total,
            lines_total,
            bytes_shown: bytes_total,
            bytes_total,
        };
    }

    let line_limited = if lines_total > max_lines {
        &lines[lines_total - max_lines..]
    } else {
        &lines[..]
    };

    let joined = line_limited.join("\n");
    let (final_text, lines_shown) = if joined.len() > max_bytes {
        let skip = ceil_char_boundary(&joined, joined.len() - max_bytes);
        let start = joined[skip..]
            .find('\n')
            .map(|pos| skip + pos + 1)
            .unwrap_or(skip);
        let trimmed = &joined[start..];
        let shown = trimmed.lines().count();
        (trimmed.to_string(), shown)
    } else {
        let shown = line_limited.len();
        (joined, shown)
    };

    let bytes_shown = final_text.len();
    TruncationResult {
        text: final_text,
        was_truncated: true,
        lines_shown,
        lines_total,
        bytes_shown,
        bytes_total,
    }
}

/// First `n` characters of `text`, cut on a char boundary.
pub fn first_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Last `n` characters of `text`, cut on a char boundary.
pub fn last_chars(text: &str, n: usize) -> &str {
    let total = text.chars().count();
    if total <= n {
        return text;
    }
    match text.char_indices().nth(total - n) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Largest byte index `<= index` that sits on a char boundary.
pub(crate) fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut boundary = index.min(text.len());
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

/// Smallest byte index `>= index` that sits on a char boundary.
pub(crate) fn ceil_char_boundary(text: &str, index: usize) -> usize {
    let mut boundary = index.min(text.len());
    while boundary < text.len() && !text.is_char_boundary(boundary) {
        boundary += 1;
    }
    boundary
}
