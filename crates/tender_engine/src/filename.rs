use sha2::{Digest, Sha256};

const MAX_STEM_LEN: usize = 80;

/// Filesystem-safe, deterministic name: `{sanitized_title}--{short_hash(key)}.{extension}`.
///
/// The same title and key always map to the same file, so a regenerated
/// document replaces its previous export.
pub fn export_filename(title: &str, key: &str, extension: &str) -> String {
    format!("{}--{}.{extension}", sanitize_title(title), short_hash(key))
}

fn sanitize_title(input: &str) -> String {
    let mut cleaned = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_forbidden(c) || c.is_whitespace() { '_' } else { c };
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        cleaned.push(c);
    }

    let mut stem: String = cleaned
        .trim_matches(&['_', '.'][..])
        .chars()
        .take(MAX_STEM_LEN)
        .collect();
    if stem.is_empty() {
        stem = "document".to_string();
    }
    if is_reserved_windows_name(&stem) {
        stem.push('_');
    }
    stem
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}')
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    use std::fmt::Write;

    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(4).fold(String::with_capacity(8), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_are_sanitized_and_collapsed() {
        let name = export_filename("Bid: Phase 2 / Lot?  A", "p1/technical_proposal", "md");
        assert!(name.starts_with("Bid_Phase_2_Lot_A--"), "{name}");
        assert!(name.ends_with(".md"));
    }

    #[test]
    fn reserved_and_empty_titles_are_patched() {
        assert!(export_filename("con", "k", "md").starts_with("con_--"));
        assert!(export_filename("???", "k", "md").starts_with("document--"));
    }

    #[test]
    fn same_inputs_same_name() {
        assert_eq!(
            export_filename("Title", "key", "md"),
            export_filename("Title", "key", "md")
        );
        assert_ne!(
            export_filename("Title", "key-a", "md"),
            export_filename("Title", "key-b", "md")
        );
    }
}
