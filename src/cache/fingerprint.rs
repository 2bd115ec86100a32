use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of content and return as hex string
#[must_use]
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
