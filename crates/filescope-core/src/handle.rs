//! Salted hashing of protocol-derived file handles into file ids.
//!
//! Protocol logic hands the engine a raw handle built from
//! connection-visible data. Hashing it together with a secret salt keeps
//! an attacker who controls that data from forcing two files onto one id
//! or splitting one file across two ids.

use ring::digest::{Context, SHA256};

use crate::types::Fuid;

/// Salt shipped as the default. Must be overridden in production.
pub const DEFAULT_SALT: &str = "I recommend changing this.";

const BASE62: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Derives file ids from raw handles.
#[derive(Debug, Clone)]
pub struct HandleHasher {
    salt: String,
}

impl HandleHasher {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// Whether the salt is still the shipped default
    #[must_use]
    pub fn uses_default_salt(&self) -> bool {
        self.salt == DEFAULT_SALT
    }

    /// File id for a raw handle: `F` followed by the base62 form of the
    /// first 128 bits of SHA-256(salt || handle).
    #[must_use]
    pub fn fuid_for(&self, handle: &str) -> Fuid {
        let mut context = Context::new(&SHA256);
        context.update(self.salt.as_bytes());
        context.update(handle.as_bytes());
        let digest = context.finish();

        let mut bits = [0u8; 16];
        bits.copy_from_slice(&digest.as_ref()[..16]);
        Fuid::new(format!("F{}", base62(u128::from_be_bytes(bits))))
    }
}

impl Default for HandleHasher {
    fn default() -> Self {
        Self::new(DEFAULT_SALT)
    }
}

fn base62(mut n: u128) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(22);
    while n > 0 {
        out.push(BASE62[(n % 62) as usize]);
        n /= 62;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
