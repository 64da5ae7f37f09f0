use serde_json::{json, Value};

use super::session::SessionError;

/// Cuts `s` to at most `max` bytes on a char boundary, appending `suffix` when
/// something was dropped. If `max` cannot even hold the suffix, the text is cut
/// without it.
pub fn safe_truncate_utf8(s: &str, max: usize, suffix: &str) -> String {
    if s.len() <= max {
        return s.to_string();
    }

    let budget = if max > suffix.len() {
        max - suffix.len()
    } else {
        max
    };
    let mut end = budget;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    let mut out = String::with_capacity(end + suffix.len());
    out.push_str(&s[..end]);
    if max > suffix.len() {
        out.push_str(suffix);
    }
    out
}

/// Standard textual body for tool errors: a human-readable first line, then a
/// JSON object with `code`, `message` and `details`.
pub fn build_error_payload(code: &str, message: &str, details: Value) -> String {
    let obj = json!({
        "code": code,
        "message": message,
        "details": details,
    });
    format!("{}\n{}", message, obj)
}

/// Error payload for a failed session operation, with the error's hint merged
/// into `details`.
pub fn session_error_payload(err: &SessionError, mut details: Value) -> String {
    if let Value::Object(map) = &mut details {
        map.insert("hint".to_string(), Value::String(err.hint().to_string()));
    }
    build_error_payload(err.code(), &err.to_string(), details)
}

/// Pulls the `code` field back out of a payload built by [`build_error_payload`].
pub fn payload_code(payload: &str) -> Option<String> {
    let json_line = payload
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with('{'))?;
    let v: Value = serde_json::from_str(json_line).ok()?;
    v.get("code").and_then(|c| c.as_str()).map(str::to_string)
}
