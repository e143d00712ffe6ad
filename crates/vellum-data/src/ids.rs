//! Deterministic content-addressed identity for documents and chunks

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Derive the document id for a given user and content hash.
///
/// `document_id == UUIDv5(ns, "{user_id}:{content_hash}")`.
#[must_use]
pub fn document_id(namespace: Uuid, user_id: &str, content_hash: &str) -> Uuid {
    Uuid::new_v5(&namespace, format!("{user_id}:{content_hash}").as_bytes())
}

/// Derive a chunk id for a given document, chunker identity, and ordinal.
///
/// `chunk_id == UUIDv5(ns, "{document_id}:{chunker_name}:{chunker_version}:{ordinal}")`.
#[must_use]
pub fn chunk_id(
    namespace: Uuid,
    document_id: Uuid,
    chunker_name: &str,
    chunker_version: &str,
    ordinal: i32,
) -> Uuid {
    Uuid::new_v5(
        &namespace,
        format!("{document_id}:{chunker_name}:{chunker_version}:{ordinal}").as_bytes(),
    )
}

/// SHA-256 of raw bytes, returned as lowercase hex.
#[must_use]
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of a string, returned as lowercase hex. Used for parsed-markdown
/// and chunk-text hashing.
#[must_use]
pub fn hash_content(content: &str) -> String {
    hash_bytes(content.as_bytes())
}

/// SHA-256 over the byte representation of an embedding vector (native-endian
/// `f32` bytes, concatenated in order), used as the vector integrity hash.
#[must_use]
pub fn hash_vector(vector: &[f32]) -> String {
    let mut hasher = Sha256::new();
    for component in vector {
        hasher.update(component.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Normalize markdown per the `parsed` stage handler: trim trailing whitespace
/// on every line, trim the document, use `\n` line endings.
#[must_use]
pub fn normalize_markdown(raw: &str) -> String {
    raw.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: Uuid = uuid::uuid!("7d9f9e2a-4c1b-4a3e-9f6d-2b8c5e1a7d3f");

    #[test]
    fn document_id_is_deterministic() {
        let a = document_id(NS, "U1", "H");
        let b = document_id(NS, "U1", "H");
        assert_eq!(a, b);
    }

    #[test]
    fn document_id_differs_per_user() {
        let a = document_id(NS, "U1", "H");
        let b = document_id(NS, "U2", "H");
        assert_ne!(a, b);
    }

    #[test]
    fn chunk_id_is_deterministic() {
        let doc = document_id(NS, "U1", "H");
        let a = chunk_id(NS, doc, "markdown-simple", "1", 0);
        let b = chunk_id(NS, doc, "markdown-simple", "1", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_id_differs_per_ordinal() {
        let doc = document_id(NS, "U1", "H");
        let a = chunk_id(NS, doc, "markdown-simple", "1", 0);
        let b = chunk_id(NS, doc, "markdown-simple", "1", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn normalize_markdown_strips_trailing_whitespace() {
        let input = "# Title   \nBody line   \n\ntrailing  \n";
        assert_eq!(normalize_markdown(input), "# Title\nBody line\n\ntrailing");
    }

    #[test]
    fn hash_vector_is_stable() {
        let v = vec![1.0_f32, 2.0, 3.0];
        assert_eq!(hash_vector(&v), hash_vector(&v.clone()));
    }
}
