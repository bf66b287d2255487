//! Deterministic key encodings.
//!
//! File entries are stored keyed by an encoding of their path rather than
//! the path itself, so an upsert needs no prior read: the same path always
//! maps to the same key, and distinct paths never collide.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Longest encoded key stored verbatim; anything longer switches to the
/// prefix-plus-digest form.
const MAX_ENTRY_KEY_LEN: usize = 250;

/// Bytes of the encoded path kept in front of the digest.
const DIGEST_PREFIX_LEN: usize = 180;

/// Encodes a workspace-relative path into a storage key.
///
/// `%`, `/` and `.` are percent-escaped (with `%` first, so the encoding is
/// injective). The escaped form never contains a literal dot, which makes
/// `.` safe as the joiner in the overlong form: encoded prefix, one dot,
/// SHA-256 hex of the original path.
pub fn entry_key(file_path: &str) -> String {
    let mut encoded = String::with_capacity(file_path.len());
    for ch in file_path.chars() {
        match ch {
            '%' => encoded.push_str("%25"),
            '/' => encoded.push_str("%2F"),
            '.' => encoded.push_str("%2E"),
            _ => encoded.push(ch),
        }
    }
    if encoded.len() <= MAX_ENTRY_KEY_LEN {
        return encoded;
    }

    let digest = Sha256::digest(file_path.as_bytes());
    let mut prefix_len = DIGEST_PREFIX_LEN.min(encoded.len());
    while !encoded.is_char_boundary(prefix_len) {
        prefix_len -= 1;
    }
    format!("{}.{}", &encoded[..prefix_len], hex::encode(digest))
}

/// Object-store key for a file's content. Derived from the stable file id,
/// never the path, so renames and recreate-after-delete never reuse a key.
pub fn content_key(workspace_id: &str, file_id: &str) -> String {
    format!("workspaces/{workspace_id}/blobs/{file_id}")
}

/// Identity for a path first staged at a given offered version.
///
/// Derived rather than random, so replanning an unconfirmed change yields
/// the same id. The version is digit-only and the encoded path never
/// contains a slash, so the name is unambiguous. A path recreated after a
/// confirmed delete plans against a later version and derives a fresh id.
pub fn file_id(workspace_id: &str, file_path: &str, version: u64) -> String {
    let name = format!("{}/{}/{}", version, entry_key(file_path), workspace_id);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_separators_and_dots() {
        assert_eq!(entry_key("src/main.py"), "src%2Fmain%2Epy");
        assert_eq!(entry_key("a%b"), "a%25b");
        assert_eq!(entry_key("notes"), "notes");
    }

    #[test]
    fn tricky_paths_stay_distinct() {
        // A path that literally contains an escape sequence must not key
        // the same as the path it would decode to.
        assert_ne!(entry_key("a/b"), entry_key("a%2Fb"));
        assert_ne!(entry_key("a.b"), entry_key("a%2Eb"));
        assert_ne!(entry_key("a%25b"), entry_key("a%b"));
    }

    #[test]
    fn overlong_paths_use_digest_form() {
        let long = format!("deep/{}.txt", "x".repeat(400));
        let key = entry_key(&long);
        assert!(key.len() <= MAX_ENTRY_KEY_LEN);
        assert!(key.contains('.'));
        assert_eq!(key, entry_key(&long));

        let sibling = format!("deep/{}.txt", "y".repeat(400));
        assert_ne!(key, entry_key(&sibling));
    }

    #[test]
    fn short_keys_never_contain_a_dot() {
        // The digest joiner relies on this.
        assert!(!entry_key("a.b/c.d").contains('.'));
    }

    #[test]
    fn digest_prefix_respects_char_boundaries() {
        let long = format!("ディレクトリ/{}", "ファ".repeat(200));
        let key = entry_key(&long);
        assert!(key.len() <= MAX_ENTRY_KEY_LEN);
    }

    #[test]
    fn content_keys_are_scoped_by_workspace() {
        assert_eq!(
            content_key("w-1", "f-9"),
            "workspaces/w-1/blobs/f-9"
        );
    }

    #[test]
    fn file_ids_are_stable_per_version_and_workspace() {
        let id = file_id("w-1", "a.py", 2);
        assert_eq!(id, file_id("w-1", "a.py", 2));
        assert_eq!(id.len(), 36);

        assert_ne!(id, file_id("w-1", "a.py", 3));
        assert_ne!(id, file_id("w-1", "b.py", 2));
        assert_ne!(id, file_id("w-2", "a.py", 2));
    }
}
