//! Crypto error types.

use thiserror::Error;

/// Failure to produce or accept sealed session data.
///
/// Callers opening a cookie treat every variant the same way (no session);
/// the distinction only matters for logs.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// HKDF could not expand the secret.
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// Sealing failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Tag check failed: wrong key, wrong associated data or altered bytes.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The secret or key is unusable.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Malformed encoding, truncated data or an implausible payload.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The session is authentic but older than the allowed age.
    #[error("session expired")]
    SessionExpired,
}
