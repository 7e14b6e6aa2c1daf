//! Session key derivation.
//!
//! Operators configure a secret of arbitrary length and entropy; HKDF-SHA256
//! (RFC 5869) stretches it into the AES-256 key that seals session cookies.
//! The info string pins the key to its purpose, so the same secret reused
//! elsewhere yields unrelated key material.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::aead::KEY_SIZE;
use crate::error::CryptoError;

/// Expands `secret` into a 256-bit key bound to `info`.
///
/// # Arguments
///
/// * `secret` - Operator secret (HKDF input key material)
/// * `salt` - Optional HKDF salt
/// * `info` - Purpose label
pub fn derive_session_key(
    secret: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
) -> Result<Zeroizing<[u8; KEY_SIZE]>, CryptoError> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    Hkdf::<Sha256>::new(salt, secret)
        .expand(info, &mut key[..])
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    Ok(key)
}
