use std::fmt;

use sha2::{Digest, Sha256};

/// Identity of a cacheable request: hex SHA-256 over method, target and body.
///
/// The three fields are hashed back to back with no separator, so
/// `("GET", "Ax", b"")` and `("GETA", "x", b"")` map to the same key.
/// Existing databases depend on this layout.
#[derive(Clone, Hash, Eq, PartialEq, Debug)]
pub struct CacheKey(String);

impl CacheKey {
    /// Length of the rendered key in characters.
    pub const LEN: usize = 64;

    pub fn derive(method: &str, target: &str, body: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update(target.as_bytes());
        hasher.update(body);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, enough to correlate log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
