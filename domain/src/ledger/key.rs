//! Call fingerprints.
//!
//! An [`IdempotencyKey`] identifies "the same call again": the tool name plus
//! its normalized arguments, hashed. With a secret configured the hash is an
//! HMAC-SHA256, so fingerprints written to logs cannot be matched against
//! guessed argument values by anyone without the key.

use super::normalize::canonical_json;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Hex fingerprint of (tool name, normalized arguments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for human-facing output.
    pub fn short(&self) -> &str {
        crate::util::truncate_str(&self.0, 12)
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derives [`IdempotencyKey`]s, optionally keyed.
#[derive(Clone, Default)]
pub struct KeyDeriver {
    secret: Option<Vec<u8>>,
}

impl std::fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDeriver")
            .field("keyed", &self.secret.is_some())
            .finish()
    }
}

impl KeyDeriver {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret
                .filter(|s| !s.is_empty())
                .map(|s| s.as_bytes().to_vec()),
        }
    }

    pub fn is_keyed(&self) -> bool {
        self.secret.is_some()
    }

    /// Fingerprint a tool call whose arguments are already normalized.
    pub fn derive(&self, tool_name: &str, normalized_args: &Value) -> IdempotencyKey {
        let material = format!("{}\u{0}{}", tool_name, canonical_json(normalized_args));
        let digest = match self.secret.as_deref().map(HmacSha256::new_from_slice) {
            Some(Ok(mut mac)) => {
                mac.update(material.as_bytes());
                hex::encode(mac.finalize().into_bytes())
            }
            // HMAC accepts keys of any length; the error arm is unreachable
            // in practice and falls back to the unkeyed digest.
            Some(Err(_)) | None => hex::encode(Sha256::digest(material.as_bytes())),
        };
        IdempotencyKey(digest)
    }
}
