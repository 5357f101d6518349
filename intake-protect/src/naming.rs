//! Standardized document display names: `{year}_{DOCTYPE}_{Subject}.{ext}`.

/// Cap on the name before the extension.
pub const MAX_STEM_LEN: usize = 96;

const MAX_EXT_LEN: usize = 10;
const FALLBACK_STEM: &str = "document";

/// Builds the display name used for a stored document.
///
/// Every part is restricted to `[A-Za-z0-9_-]`; whitespace becomes `_` and
/// underscore runs collapse. The extension is taken from
/// `original_file_name` and lowercased.
pub fn standard_file_name(
    year: Option<i32>,
    doc_type: &str,
    subject: &str,
    original_file_name: &str,
) -> String {
    let year = year.map(|y| y.to_string()).unwrap_or_default();
    let doc_type = sanitize_part(doc_type).to_ascii_uppercase();
    let subject = sanitize_part(subject);

    let mut stem = [year.as_str(), doc_type.as_str(), subject.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    if stem.len() > MAX_STEM_LEN {
        // Sanitized parts are ASCII, so byte truncation is safe.
        stem.truncate(MAX_STEM_LEN);
        stem = stem.trim_end_matches(['_', '-']).to_string();
    }
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }

    match extension(original_file_name) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

fn sanitize_part(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let mapped = if c.is_whitespace() || c == '_' {
            '_'
        } else if c.is_ascii_alphanumeric() || c == '-' {
            c
        } else {
            continue;
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    out.trim_matches('_').to_string()
}

fn extension(file_name: &str) -> Option<String> {
    let (base, ext) = file_name.rsplit_once('.')?;
    if base.is_empty() {
        return None;
    }
    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXT_LEN)
        .collect::<String>()
        .to_ascii_lowercase();
    (!ext.is_empty()).then_some(ext)
}
