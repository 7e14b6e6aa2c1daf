//! Session cookie sealing.
//!
//! After a successful form login the proxy hands the browser a cookie that
//! says "logged in as `<username>` since `<iat>`". The cookie value is a
//! [`SessionToken`] serialized as JSON, sealed with AES-256-GCM and encoded
//! as unpadded base64url. A forged or bit-flipped cookie fails to open; it
//! never decodes to a different user.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::aead;
use crate::error::CryptoError;
use crate::keys::SessionKey;

/// Associated data bound into every sealed session.
const SESSION_AAD: &[u8] = b"gatehouse-session-v1";

/// Tolerated clock skew for tokens issued "in the future".
const MAX_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Payload of a session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// User the session was issued to.
    #[serde(rename = "sub")]
    pub username: String,

    /// Issue time (Unix seconds).
    #[serde(rename = "iat")]
    pub issued_at: u64,
}

/// Symmetric encryption for session cookies.
///
/// The key is fixed at construction and only read afterwards, so a single
/// crypter can be shared across all request tasks.
#[derive(Clone)]
pub struct SessionCrypter {
    key: SessionKey,
}

impl SessionCrypter {
    /// Creates a crypter whose key is derived from an operator secret.
    pub fn new(secret: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self::from_key(SessionKey::from_secret(secret)?))
    }

    /// Creates a crypter from an existing key.
    pub fn from_key(key: SessionKey) -> Self {
        Self { key }
    }

    /// Encrypts arbitrary bytes.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        aead::seal(&self.key, plaintext, SESSION_AAD)
    }

    /// Decrypts bytes produced by [`SessionCrypter::encrypt`].
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        aead::open(&self.key, ciphertext, SESSION_AAD)
    }

    /// Issues a cookie value for `username`, stamped with the current time.
    pub fn seal(&self, username: &str) -> Result<String, CryptoError> {
        self.seal_at(username, unix_now())
    }

    pub(crate) fn seal_at(&self, username: &str, issued_at: u64) -> Result<String, CryptoError> {
        let token = SessionToken {
            username: username.to_string(),
            issued_at,
        };
        let payload = Zeroizing::new(
            serde_json::to_vec(&token).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?,
        );

        Ok(URL_SAFE_NO_PAD.encode(self.encrypt(&payload)?))
    }

    /// Opens a cookie value without an age limit.
    pub fn open(&self, cookie: &str) -> Result<SessionToken, CryptoError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(cookie.trim())
            .map_err(|e| CryptoError::InvalidInput(format!("invalid session encoding: {e}")))?;
        let payload = self.decrypt(&sealed)?;

        serde_json::from_slice(&payload)
            .map_err(|e| CryptoError::InvalidInput(format!("invalid session payload: {e}")))
    }

    /// Opens a cookie value and rejects it when older than `max_age`.
    ///
    /// `None` accepts sessions of any age. Tokens stamped further in the
    /// future than the tolerated clock skew are always rejected.
    pub fn open_with_max_age(
        &self,
        cookie: &str,
        max_age: Option<Duration>,
    ) -> Result<SessionToken, CryptoError> {
        let token = self.open(cookie)?;
        let now = unix_now();

        if token.issued_at > now.saturating_add(MAX_CLOCK_SKEW.as_secs()) {
            return Err(CryptoError::InvalidInput(
                "session issued in the future".to_string(),
            ));
        }

        if let Some(max_age) = max_age {
            if now.saturating_sub(token.issued_at) > max_age.as_secs() {
                return Err(CryptoError::SessionExpired);
            }
        }

        Ok(token)
    }
}

impl std::fmt::Debug for SessionCrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCrypter")
            .field("key", &self.key)
            .finish()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn crypter() -> SessionCrypter {
        SessionCrypter::new(b"0123456789abcdef-test-secret").unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let crypter = crypter();
        let cases: [&[u8]; 4] = [b"", b"alice", "jürgen ünïcode".as_bytes(), &[0u8; 512]];
        for plaintext in cases {
            let ciphertext = crypter.encrypt(plaintext).unwrap();
            assert_eq!(&*crypter.decrypt(&ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let crypter = crypter();
        let cookie = crypter.seal("alice").unwrap();
        let token = crypter.open(&cookie).unwrap();

        assert_eq!(token.username, "alice");
        assert!(token.issued_at > 0);
    }

    #[test]
    fn test_cookie_is_cookie_safe() {
        let cookie = crypter().seal("alice").unwrap();

        assert!(cookie
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_flipping_any_byte_fails() {
        let crypter = crypter();
        let sealed = URL_SAFE_NO_PAD
            .decode(crypter.seal("alice").unwrap())
            .unwrap();

        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x80;
            let result = crypter.open(&URL_SAFE_NO_PAD.encode(&tampered));
            assert!(result.is_err(), "tampered byte {i} opened as {result:?}");
        }
    }

    #[test]
    fn test_foreign_key_fails() {
        let cookie = crypter().seal("alice").unwrap();
        let other = SessionCrypter::new(b"another-secret-of-enough-length").unwrap();

        assert!(matches!(
            other.open(&cookie),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let crypter = crypter();

        assert!(crypter.open("").is_err());
        assert!(crypter.open("not base64 at all!").is_err());
        assert!(crypter.open("AAAA").is_err());
    }

    #[test]
    fn test_max_age_enforced() {
        let crypter = crypter();
        let old = crypter.seal_at("alice", unix_now() - 7200).unwrap();

        assert!(crypter.open_with_max_age(&old, None).is_ok());
        assert!(crypter
            .open_with_max_age(&old, Some(Duration::from_secs(86400)))
            .is_ok());
        assert!(matches!(
            crypter.open_with_max_age(&old, Some(Duration::from_secs(3600))),
            Err(CryptoError::SessionExpired)
        ));
    }

    #[test]
    fn test_future_token_rejected() {
        let crypter = crypter();
        let future = crypter.seal_at("alice", unix_now() + 3600).unwrap();

        assert!(crypter.open_with_max_age(&future, None).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            SessionCrypter::new(b"short"),
            Err(CryptoError::InvalidKey(_))
        ));
    }
}
