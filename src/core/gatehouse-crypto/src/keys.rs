//! Session key material with automatic memory zeroization.

use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::aead::KEY_SIZE;
use crate::error::CryptoError;
use crate::kdf::derive_session_key;

/// Shortest operator secret accepted for session key derivation.
pub const MIN_SECRET_LEN: usize = 16;

/// HKDF context for the session cookie key.
const SESSION_KEY_CONTEXT: &[u8] = b"gatehouse-session-key-v1";

/// A 256-bit key used to seal session cookies.
///
/// The key is erased from memory when dropped and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    bytes: [u8; KEY_SIZE],
}

impl SessionKey {
    /// Generates a random key, for sessions that need not survive a restart.
    pub fn generate() -> Self {
        let mut key = Self {
            bytes: [0u8; KEY_SIZE],
        };
        OsRng.fill_bytes(&mut key.bytes);
        key
    }

    /// Derives the session key from an operator-supplied secret.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn from_secret(secret: &[u8]) -> Result<Self, CryptoError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "secret must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                secret.len()
            )));
        }

        let derived = derive_session_key(secret, None, SESSION_KEY_CONTEXT)?;
        Ok(Self { bytes: *derived })
    }

    /// Returns the raw key bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
