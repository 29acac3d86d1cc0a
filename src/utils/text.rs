//! Text processing utilities.

/// Number of non-whitespace characters in `content`.
pub fn meaningful_len(content: &str) -> usize {
    content.chars().filter(|c| !c.is_whitespace()).count()
}

/// Truncate `text` to at most `max_chars` characters, appending "..." when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let truncated: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        format!("{truncated}...")
    } else {
        truncated
    }
}
