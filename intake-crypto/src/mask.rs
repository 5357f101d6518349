//! Last-4 masking for identifiers.
//!
//! Computed from plaintext at write time and stored next to the encrypted
//! column so screens can show `•••• 6789` without a decrypt.

const MASK: &str = "••••";

/// Returns the trailing four alphanumeric characters of `raw`.
///
/// Separators and whitespace are stripped first, so `"123-45-6789"` and
/// `"123 45 6789"` both give `"6789"`. Returns `None` when fewer than four
/// alphanumeric characters remain.
pub fn last_four(raw: &str) -> Option<String> {
    let cleaned: Vec<char> = raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if cleaned.len() < 4 {
        return None;
    }
    Some(cleaned[cleaned.len() - 4..].iter().collect())
}

/// [`last_four`] over an optional value.
pub fn last_four_opt(raw: Option<&str>) -> Option<String> {
    raw.and_then(last_four)
}

/// Display form of a stored last-4 value.
pub fn masked_display(last4: Option<&str>) -> String {
    match last4 {
        Some(digits) if !digits.is_empty() => format!("{MASK} {digits}"),
        _ => MASK.to_string(),
    }
}
