/// Truncates `text` to at most `max_len` characters, appending "..." when cut.
///
/// Works on `char`s, so multi-byte text (Cyrillic, emoji) is never split
/// mid-codepoint.
pub fn truncate_string_safe(text: &str, max_len: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    let char_count = text.chars().count();
    if char_count <= max_len {
        return text.to_string();
    }

    let truncate_len = max_len.saturating_sub(3);
    let mut result: String = text.chars().take(truncate_len).collect();
    result.push_str("...");
    result
}

/// Plain character cut without an ellipsis.
pub fn take_chars(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect()
}

/// Escapes the three characters Telegram's HTML parse mode cares about.
pub fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

/// Human readable size in MB with one decimal, e.g. `12.3MB`.
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
}
