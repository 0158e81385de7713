/// Literal produced by some exporters for an absent value.
const NAN_LITERAL: &str = "nan";

/// Trim a text value. Blank-after-trim and the literal `nan` are missing.
pub fn clean_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == NAN_LITERAL {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn has_ascii_digit(s: &str) -> bool {
    s.bytes().any(|b| b.is_ascii_digit())
}
