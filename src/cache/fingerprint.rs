//! Content fingerprints used as HTTP entity tags.
//!
//! A fingerprint is the first 16 bytes of the SHA-256 digest of the
//! rendered document, hex encoded. It is only ever used as an equality
//! oracle for conditional requests, which is why it is always advertised
//! as a weak validator (`W/"…"`).

use std::fmt;

use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a fingerprint.
const FINGERPRINT_BYTES: usize = 16;

/// Content-derived validator for a rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a document body.
    pub fn of(body: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(body);
        let digest = hasher.finalize().to_vec();
        Self(hex::encode(&digest[..FINGERPRINT_BYTES]))
    }

    /// The bare hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render as a weak `ETag` header value.
    pub fn to_etag(&self) -> String {
        format!("W/\"{}\"", self.0)
    }

    /// Weak comparison against an `If-None-Match` style validator.
    ///
    /// Accepts a comma-separated list of entity tags, each optionally
    /// prefixed with `W/` and optionally quoted. `*` matches any
    /// fingerprint.
    pub fn matches(&self, validator: &str) -> bool {
        validator.split(',').map(str::trim).any(|tag| {
            if tag == "*" {
                return true;
            }
            let tag = tag.strip_prefix("W/").unwrap_or(tag);
            let tag = tag
                .strip_prefix('"')
                .and_then(|t| t.strip_suffix('"'))
                .unwrap_or(tag);
            tag == self.0
        })
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
