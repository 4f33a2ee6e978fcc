//! Content-derived receipt identity.
//!
//! A receipt's identifier is the SHA-256 digest of its normalized OCR text:
//! every line trimmed, joined with `\n`, and the whole trimmed again. Two
//! scans that differ only in leading/trailing whitespace per line, or in
//! `\r\n` vs `\n` line endings, map to the same identifier.

use sha2::{Digest, Sha256};

/// Normalize OCR text for hashing.
pub fn normalize_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Lowercase hex SHA-256 of the normalized text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_hex_sha256() {
        let id = content_hash("abc");
        assert_eq!(id, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn test_per_line_whitespace_ignored() {
        let a = content_hash("REWE Markt\nSumme 12,99 €\n");
        let b = content_hash("  REWE Markt \r\n\tSumme 12,99 €   ");
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_change_changes_id() {
        assert_ne!(content_hash("Summe 12,99 €"), content_hash("Summe 12,98 €"));
    }

    #[test]
    fn test_inner_blank_lines_are_kept() {
        assert_ne!(content_hash("a\nb"), content_hash("a\n\nb"));
        assert_eq!(normalize_text("\n\n a \n\n b \n"), "a\n\nb");
    }
}
