//! The credential verification contract.

use async_trait::async_trait;

use crate::{Credential, RequiredGroups, Verification, VerifyError};

/// Checks a credential against a backend.
///
/// Implementations return `Ok(Verification::granted(..))` only when the
/// backend positively confirms the credential and, if required groups are
/// configured, group membership. Any I/O or protocol failure is an `Err`
/// and must not be collapsed into a denial.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Verifies a credential.
    async fn verify(&self, credential: &Credential<'_>) -> Result<Verification, VerifyError>;

    /// Groups this verifier requires. Empty means no restriction.
    fn required_groups(&self) -> &RequiredGroups {
        RequiredGroups::none()
    }

    /// Returns the name of this verifier for logging/debugging.
    fn name(&self) -> &'static str;
}

