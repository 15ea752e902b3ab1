//! Display-name and chat-body validation plus private-prefix parsing.

use std::sync::LazyLock;

use serde_json::Value;

/// Display names: 1-32 chars from a conservative class.
static NAME_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z0-9 _\-\.]+$").unwrap());

/// Maximum chat body length in characters.
pub const CHAT_MAX_CHARS: usize = 500;

/// Maximum display-name length in characters.
pub const NAME_MAX_CHARS: usize = 32;

/// Chat lines beginning with this literal are quoted replies, never
/// private-message addressed, even though they start with `@`.
pub const REPLY_PREFIX: &str = "@reply [";

/// Validate a display name from a decoded frame field.
///
/// Returns the canonical (trimmed) name, or `None` when the value is not a
/// string, is empty/overlong after trimming, or contains characters outside
/// `[A-Za-z0-9 _\-\.]`.
pub fn validate_name(value: &Value) -> Option<String> {
    let raw = value.as_str()?;
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > NAME_MAX_CHARS {
        return None;
    }
    if !NAME_REGEX.is_match(trimmed) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Validate a chat body from a decoded frame field.
///
/// Returns the trimmed text, or `None` when the value is not a string, is
/// empty or longer than 500 characters after trimming, or contains C0
/// control characters. Line feed, carriage return, and tab stay legal so
/// multi-line messages pass; everything else below U+0020 (and U+007F) is
/// rejected.
pub fn validate_chat(value: &Value) -> Option<String> {
    let raw = value.as_str()?;
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > CHAT_MAX_CHARS {
        return None;
    }
    if trimmed.chars().any(is_forbidden_control) {
        return None;
    }
    Some(trimmed.to_string())
}

fn is_forbidden_control(c: char) -> bool {
    matches!(c,
        '\u{0000}'..='\u{0008}'
        | '\u{000B}'
        | '\u{000C}'
        | '\u{000E}'..='\u{001F}'
        | '\u{007F}')
}

/// Parse a private-message prefix out of chat text.
///
/// Two shapes are recognized:
/// - `@"name with spaces" body` — quoted name, closing quote required,
///   followed by exactly one space and a non-empty body;
/// - `@name body` — unquoted name up to the first space.
///
/// Returns `(name, body)` on a match. Callers must check [`REPLY_PREFIX`]
/// first; this function does not.
pub fn parse_private_prefix(text: &str) -> Option<(String, String)> {
    let rest = text.strip_prefix('@')?;

    if let Some(quoted) = rest.strip_prefix('"') {
        let close = quoted.find('"')?;
        let name = &quoted[..close];
        let after = &quoted[close + 1..];
        let body = after.strip_prefix(' ')?;
        if name.is_empty() || body.is_empty() {
            return None;
        }
        return Some((name.to_string(), body.to_string()));
    }

    let space = rest.find(' ')?;
    let name = &rest[..space];
    let body = &rest[space + 1..];
    if name.is_empty() || body.is_empty() {
        return None;
    }
    Some((name.to_string(), body.to_string()))
}
