//! Locating JSON inside free-form oracle replies.

use serde_json::{Map, Value};

/// Strict object parse: the trimmed reply must be a JSON object, or consist
/// of exactly one fenced code block whose body is a JSON object.
///
/// Prose around the JSON is not tolerated here; callers that need a
/// best-effort scan use [`find_json_object`].
pub fn parse_json_object(reply: &str) -> Option<Map<String, Value>> {
    let trimmed = reply.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str(trimmed) {
        return Some(map);
    }

    let body = sole_fence_body(trimmed)?;
    match serde_json::from_str(body) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// First JSON array in the reply: a fenced ```` ```json ```` block wins,
/// otherwise the first balanced top-level `[...]` that parses as an array.
pub fn find_json_array(reply: &str) -> Option<Vec<Value>> {
    if let Some(body) = fenced_json_body(reply) {
        if let Ok(Value::Array(items)) = serde_json::from_str(body) {
            return Some(items);
        }
    }

    balanced_spans(reply, '[', ']').find_map(|span| match serde_json::from_str(span) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    })
}

/// First JSON object in the reply, fenced block first, then the first
/// balanced `{...}` that parses.
pub fn find_json_object(reply: &str) -> Option<Map<String, Value>> {
    if let Some(body) = fenced_json_body(reply) {
        if let Ok(Value::Object(map)) = serde_json::from_str(body) {
            return Some(map);
        }
    }

    balanced_spans(reply, '{', '}').find_map(|span| match serde_json::from_str(span) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    })
}

/// Body of the first ```` ```json ```` fence, trimmed.
fn fenced_json_body(reply: &str) -> Option<&str> {
    let fence_start = reply.find("```json")?;
    let after_fence = &reply[fence_start + "```json".len()..];
    let fence_end = after_fence.find("```")?;
    Some(after_fence[..fence_end].trim())
}

/// Body of a reply that is nothing but one fenced block (language tag optional).
fn sole_fence_body(reply: &str) -> Option<&str> {
    let inner = reply.strip_prefix("```")?.strip_suffix("```")?;
    let body = match inner.find('\n') {
        Some(newline) if !inner[..newline].trim_start().starts_with(['{', '[']) => {
            &inner[newline + 1..]
        }
        _ => inner,
    };
    if body.contains("```") {
        return None;
    }
    Some(body.trim())
}

/// Candidate spans delimited by balanced `open`/`close`, in document order.
/// Brackets inside JSON strings are ignored.  An unclosed opener is skipped
/// and scanning resumes right after it.
fn balanced_spans(text: &str, open: char, close: char) -> impl Iterator<Item = &str> {
    let mut cursor = 0;
    std::iter::from_fn(move || {
        while cursor < text.len() {
            let start = cursor + text[cursor..].find(open)?;
            match closing_index(&text[start..], open, close) {
                Some(len) => {
                    cursor = start + len;
                    return Some(&text[start..start + len]);
                }
                None => cursor = start + open.len_utf8(),
            }
        }
        None
    })
}

/// Byte length of the balanced span starting at `text[0] == open`.
fn closing_index(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
        } else if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(idx + ch.len_utf8());
            }
        }
    }
    None
}
