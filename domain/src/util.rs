//! Shared utility functions.

/// Truncate a string to approximately `max_bytes` without splitting a UTF-8
/// character boundary.
///
/// Returns a sub-slice of the original string. If the string is shorter than
/// `max_bytes`, the entire string is returned unchanged.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
