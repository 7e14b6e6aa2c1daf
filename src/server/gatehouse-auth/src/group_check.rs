//! Adapter from a token/group check to the [`Verifier`] contract.
//!
//! Some credential sources do not answer "is this password right" but
//! "which user does this token belong to, given these groups". A
//! [`GroupCheck`] captures that shape; [`GroupCheckVerifier`] turns it into
//! a [`Verifier`] by packing the credential into a basic authorization token
//! and granting iff a non-empty user name comes back.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::{Credential, RequiredGroups, Verification, Verifier, VerifyError};

/// Resolves an authorization token to a user, subject to group membership.
#[async_trait]
pub trait GroupCheck: Send + Sync {
    /// Returns the user owning `token` if it satisfies `required_groups`,
    /// `None` if the token is unknown or lacks the groups.
    async fn check(
        &self,
        token: &str,
        required_groups: &RequiredGroups,
    ) -> Result<Option<String>, VerifyError>;

    /// Returns the name of this check for logging/debugging.
    fn name(&self) -> &'static str;
}

/// Builds the token a [`GroupCheck`] receives: `base64(username:password)`.
pub fn authorization_token(credential: &Credential<'_>) -> String {
    STANDARD.encode(format!("{}:{}", credential.username, credential.password))
}

/// [`Verifier`] delegating to a [`GroupCheck`].
pub struct GroupCheckVerifier<C> {
    check: C,
    required_groups: RequiredGroups,
}

impl<C: GroupCheck> GroupCheckVerifier<C> {
    /// Wraps `check`, asking it for `required_groups` on every verification.
    pub fn new(check: C, required_groups: RequiredGroups) -> Self {
        Self {
            check,
            required_groups,
        }
    }
}

#[async_trait]
impl<C: GroupCheck> Verifier for GroupCheckVerifier<C> {
    async fn verify(&self, credential: &Credential<'_>) -> Result<Verification, VerifyError> {
        debug!(
            username = %credential.username,
            groups = ?self.required_groups,
            check = self.check.name(),
            "verifying user has groups"
        );

        let token = authorization_token(credential);
        let user = self.check.check(&token, &self.required_groups).await?;

        Ok(match user {
            Some(user) if !user.is_empty() => Verification::granted(Some(user)),
            _ => Verification::denied(),
        })
    }

    fn required_groups(&self) -> &RequiredGroups {
        &self.required_groups
    }

    fn name(&self) -> &'static str {
        self.check.name()
    }
}
