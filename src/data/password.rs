//! Password hashes.

use std::fmt;

use crate::error::Result;

// Unit tests register many accounts; full cost would dominate their runtime
const COST: u32 = if cfg!(test) { 4 } else { bcrypt::DEFAULT_COST };

/// A password as stored: a bcrypt hash, never the plaintext.
#[derive(Clone, PartialEq, Eq)]
pub struct Password {
    hash: String,
}

impl Password {
    /// Hash `plaintext` under a fresh salt.
    pub fn set(plaintext: &str) -> Result<Self> {
        Ok(Self {
            hash: bcrypt::hash(plaintext, COST)?,
        })
    }

    /// Whether `plaintext` is the password this hash was derived from.
    pub fn matches(&self, plaintext: &str) -> Result<bool> {
        Ok(bcrypt::verify(plaintext, &self.hash)?)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}
