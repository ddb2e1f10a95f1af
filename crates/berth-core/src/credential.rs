//! Opaque bearer credentials shared between cluster actors.
//!
//! Credentials are 32 bytes from the OS CSPRNG, rendered as lowercase hex.
//! They are stored in plaintext and compared in constant time.

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Number of random bytes behind each credential.
pub const CREDENTIAL_BYTES: usize = 32;

/// An opaque secret token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Generate a fresh random credential.
    pub fn generate() -> Self {
        let mut buf = [0u8; CREDENTIAL_BYTES];
        OsRng.fill_bytes(&mut buf);
        Self(hex::encode(buf))
    }

    /// Wrap a credential read back from storage or a request.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    /// Exact-match comparison against a presented token.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = candidate.as_bytes();
        if expected.len() != presented.len() {
            return false;
        }
        expected.ct_eq(presented).into()
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}
