//! Verification error types.

use thiserror::Error;

/// A verification that could not reach a decision.
///
/// This is never a denial: callers must answer it differently from a
/// negative [`Verification`](crate::Verification), and it is never cached.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The backend could not be reached or timed out.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with something we do not understand.
    #[error("backend protocol error: {0}")]
    Protocol(String),

    /// The backend is misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),
}
