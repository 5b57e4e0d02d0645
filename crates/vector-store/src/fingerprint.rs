use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of a file's raw bytes, lower-case hex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[must_use]
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint(hex_encode_lower(&hasher.finalize()))
}

/// Chunk ids depend only on where the chunk sits and what the file contained, so an
/// unchanged file always yields the same ids.
#[must_use]
pub fn chunk_id(path: &str, ordinal: usize, fingerprint: &Fingerprint) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    hasher.update(ordinal.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(fingerprint.as_str().as_bytes());
    let mut id = hex_encode_lower(&hasher.finalize());
    id.truncate(32);
    id
}

pub(crate) fn hex_encode_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len().saturating_mul(2));
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
