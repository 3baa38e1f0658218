//! Content hashing compatible with Git blob object ids
//!
//! A blob id is the SHA-1 of `"blob " + <decimal byte length> + NUL` followed by
//! the raw bytes. Matching this scheme lets local content be compared directly
//! against remote tree listings without downloading unchanged files.

use crate::types::ObjectId;
use sha1::{Digest, Sha1};

/// Compute the blob id for raw content.
pub fn compute_blob_id(content: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Compute the blob id for UTF-8 text.
pub fn compute_text_blob_id(text: &str) -> ObjectId {
    compute_blob_id(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_matches_git() {
        assert_eq!(
            compute_blob_id(b"hello"),
            "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0"
        );
    }

    #[test]
    fn test_empty_blob() {
        assert_eq!(
            compute_blob_id(b""),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
    }

    #[test]
    fn test_deterministic_and_lowercase() {
        let first = compute_blob_id(&[0u8, 159, 146, 150]);
        let second = compute_blob_id(&[0u8, 159, 146, 150]);
        assert_eq!(first, second);
        assert_eq!(first.len(), 40);
        assert!(first.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_text_and_bytes_agree() {
        assert_eq!(compute_text_blob_id("héllo"), compute_blob_id("héllo".as_bytes()));
    }
}
