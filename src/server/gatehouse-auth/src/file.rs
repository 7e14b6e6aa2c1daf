//! Flat user file backend.
//!
//! Each non-empty line that does not start with `#` is
//!
//! ```text
//! username:secret[:group,group,...]
//! ```
//!
//! The secret is either an Argon2 PHC string (`$argon2id$...`) or a plain
//! password. The file is read on every verification, so edits take effect
//! without a restart (modulo the verification cache in front).
//!
//! Group semantics: any-of. With required groups configured, the user must
//! list at least one of them in the third column.

use std::path::PathBuf;

use argon2::{password_hash, Argon2, PasswordHash, PasswordVerifier};
use async_trait::async_trait;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::{Credential, RequiredGroups, Verification, Verifier, VerifyError};

/// Configuration for the user file backend.
#[derive(Debug, Clone)]
pub struct FileConfig {
    /// Path of the user file.
    pub path: PathBuf,
    /// Groups a user must list (any-of).
    pub required_groups: RequiredGroups,
}

/// One parsed line of the user file.
#[derive(Debug, PartialEq, Eq)]
struct UserEntry<'a> {
    username: &'a str,
    secret: &'a str,
    groups: Vec<&'a str>,
}

impl<'a> UserEntry<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let mut fields = line.splitn(3, ':');
        let username = fields.next()?;
        let secret = fields.next()?;
        let groups = fields
            .next()
            .map(|g| g.split(',').map(str::trim).filter(|g| !g.is_empty()).collect())
            .unwrap_or_default();

        Some(Self {
            username,
            secret,
            groups,
        })
    }

    fn accepts(&self, password: &str) -> Result<bool, VerifyError> {
        if !self.secret.starts_with("$argon2") {
            return Ok(self.secret.as_bytes().ct_eq(password.as_bytes()).into());
        }

        let invalid = |reason: String| {
            VerifyError::Configuration(format!(
                "invalid password hash for user {}: {reason}",
                self.username
            ))
        };

        let hash = PasswordHash::new(self.secret).map_err(|e| invalid(e.to_string()))?;
        if hash.salt.is_none() || hash.hash.is_none() {
            return Err(invalid("missing salt or hash".to_string()));
        }

        match Argon2::default().verify_password(password.as_bytes(), &hash) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(invalid(e.to_string())),
        }
    }
}

/// Verifier backed by a flat user file.
pub struct FileVerifier {
    path: PathBuf,
    required_groups: RequiredGroups,
}

impl FileVerifier {
    /// Creates a verifier reading `config.path`.
    pub fn new(config: FileConfig) -> Self {
        Self {
            path: config.path,
            required_groups: config.required_groups,
        }
    }
}

#[async_trait]
impl Verifier for FileVerifier {
    async fn verify(&self, credential: &Credential<'_>) -> Result<Verification, VerifyError> {
        if credential.username.is_empty() || credential.password.is_empty() {
            return Ok(Verification::denied());
        }

        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            VerifyError::Unavailable(format!(
                "failed to read user file {}: {e}",
                self.path.display()
            ))
        })?;

        let Some(entry) = contents
            .lines()
            .filter_map(UserEntry::parse)
            .find(|e| e.username == credential.username)
        else {
            debug!(username = %credential.username, "unknown user");
            return Ok(Verification::denied());
        };

        if !entry.accepts(credential.password)? {
            debug!(username = %credential.username, "password mismatch");
            return Ok(Verification::denied());
        }

        if !self.required_groups.matches_any(&entry.groups) {
            debug!(username = %credential.username, "user lacks required groups");
            return Ok(Verification::denied());
        }

        Ok(Verification::granted(Some(entry.username.to_string())))
    }

    fn required_groups(&self) -> &RequiredGroups {
        &self.required_groups
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
