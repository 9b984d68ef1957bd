//! Rollback of speculatively appended snippets by exact suffix match.
//!
//! Accumulate appends a generated snippet to its target file before any gate
//! has judged it; when a gate rejects the attempt the same snippet must come
//! back out. Matching is on trimmed text so the blank-line separator inserted
//! by accumulate does not defeat the suffix comparison.

use crate::core::types::FileState;

/// Remove `snippet` from the end of `content`, returning the rolled-back
/// text. Returns `None` when the snippet is empty or is not a suffix of the
/// content, e.g. because it was already rolled back by an earlier gate.
pub fn rollback_suffix(content: &str, snippet: &str) -> Option<String> {
    let snippet = snippet.trim();
    if snippet.is_empty() {
        return None;
    }
    let stripped = content.trim_end().strip_suffix(snippet)?;
    Some(stripped.trim_end().to_string())
}

/// Roll the last appended snippet out of a file. Returns whether content
/// changed; a `false` is normal when the snippet was already removed.
pub fn rollback_file(file: &mut FileState, snippet: &str) -> bool {
    match rollback_suffix(&file.content, snippet) {
        Some(content) => {
            file.content = content;
            true
        }
        None => false,
    }
}
