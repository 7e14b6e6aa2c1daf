//! # Gatehouse Crypto
//!
//! Cryptographic primitives for the Gatehouse authenticating proxy.
//!
//! This crate provides:
//! - Authenticated symmetric encryption (AES-256-GCM)
//! - Key derivation (HKDF-SHA256)
//! - The session crypter that seals and opens login cookies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aead;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod session;

pub use error::CryptoError;
pub use keys::SessionKey;
pub use session::{SessionCrypter, SessionToken};
