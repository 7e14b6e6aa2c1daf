//! Verification input and output types.

/// Username and password presented by a caller.
///
/// Borrowed for the duration of a single verification and never stored.
#[derive(Clone, Copy)]
pub struct Credential<'a> {
    /// Username as presented. May be empty.
    pub username: &'a str,
    /// Password as presented. May be empty.
    pub password: &'a str,
}

impl<'a> Credential<'a> {
    /// Creates a credential from its parts.
    pub fn new(username: &'a str, password: &'a str) -> Self {
        Self { username, password }
    }
}

impl std::fmt::Debug for Credential<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Outcome of a verification that reached a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Whether the caller may pass.
    pub authorized: bool,

    /// Identity name resolved by the backend, when it reports one.
    pub identity: Option<String>,
}

impl Verification {
    /// A positive decision.
    pub fn granted(identity: Option<String>) -> Self {
        Self {
            authorized: true,
            identity,
        }
    }

    /// A negative decision.
    pub fn denied() -> Self {
        Self {
            authorized: false,
            identity: None,
        }
    }
}
