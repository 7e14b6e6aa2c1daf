//! # Gatehouse Auth
//!
//! Credential verification for the Gatehouse authenticating proxy.
//!
//! Every credential source implements the [`Verifier`] contract. The
//! [`CachedVerifier`] decorator wraps any of them to shield slow backends
//! from repeated checks.
//!
//! ## Backends
//!
//! - [`ldap`] - LDAP directory (service bind, user search, user bind, group search)
//! - [`file`] - flat user file with plain or Argon2 secrets
//! - [`auth_service`] - remote auth service deciding group membership itself
//! - [`crowd`] - Atlassian Crowd application authentication
//! - [`group_check`] - adapter from a token/group check to a [`Verifier`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth_service;
pub mod cache;
pub mod context;
pub mod crowd;
pub mod error;
pub mod file;
pub mod group_check;
pub mod groups;
pub mod ldap;
pub mod verifier;

pub use cache::CachedVerifier;
pub use context::{Credential, Verification};
pub use error::VerifyError;
pub use groups::RequiredGroups;
pub use verifier::Verifier;
