//! LDAP directory backend.
//!
//! Verification runs the classic search-then-bind sequence:
//!
//! 1. bind with the service account,
//! 2. search the user entry under `user_dn,base_dn`,
//! 3. bind as that entry with the presented password,
//! 4. when required groups are set, search the user's groups under
//!    `group_dn,base_dn` and grant if any of them is required (any-of).
//!
//! The sequence lives in [`DirectoryVerifier`], written against the
//! [`Directory`] trait; [`LdapDirectory`] is the `ldap3` implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, warn};

use crate::{Credential, RequiredGroups, Verification, Verifier, VerifyError};

/// LDAP result code for a failed simple bind.
const INVALID_CREDENTIALS: u32 = 49;

/// An entry returned by a directory search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished name.
    pub dn: String,
    /// Attribute values by attribute name.
    pub attrs: HashMap<String, Vec<String>>,
}

/// Opens sessions against a directory server.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Connects and returns a fresh, unbound session.
    async fn connect(&self) -> Result<Box<dyn DirectorySession>, VerifyError>;
}

/// A connected directory session.
#[async_trait]
pub trait DirectorySession: Send {
    /// Simple bind. `Ok(false)` means the directory rejected the credentials.
    async fn bind(&mut self, dn: &str, password: &str) -> Result<bool, VerifyError>;

    /// Subtree search returning the requested attributes.
    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, VerifyError>;

    /// Unbinds and closes the session.
    async fn close(self: Box<Self>);
}

/// Configuration for the LDAP backend.
///
/// There is no separate TLS server name: `ldap3` verifies the certificate
/// against `host`, so `host` must be the name on the certificate.
#[derive(Debug, Clone)]
pub struct LdapConfig {
    /// Server host name, also the name checked against the TLS certificate.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Connect with `ldaps://`.
    pub use_ssl: bool,
    /// Do not upgrade plain connections with StartTLS.
    pub skip_tls: bool,
    /// Accept any server certificate.
    pub skip_tls_verify: bool,
    /// Base DN appended to the user and group DNs.
    pub base_dn: String,
    /// Service account DN.
    pub bind_dn: String,
    /// Service account password.
    pub bind_password: String,
    /// User subtree relative to the base DN (e.g., "ou=people").
    pub user_dn: String,
    /// Filter selecting user entries (e.g., "(objectClass=person)").
    pub user_filter: String,
    /// Attribute holding the login name (e.g., "uid").
    pub user_field: String,
    /// Group subtree relative to the base DN (e.g., "ou=groups").
    pub group_dn: String,
    /// Filter selecting group entries (e.g., "(objectClass=groupOfNames)").
    pub group_filter: String,
    /// Attribute holding the group name (e.g., "cn").
    pub group_field: String,
    /// Bound on a whole verification, connect included.
    pub timeout: Duration,
    /// Groups a user must belong to (any-of).
    pub required_groups: RequiredGroups,
}

/// The search-then-bind policy, independent of the directory client.
pub struct DirectoryVerifier<D> {
    directory: D,
    config: LdapConfig,
}

impl<D: Directory> DirectoryVerifier<D> {
    /// Creates a verifier over `directory`.
    pub fn new(directory: D, config: LdapConfig) -> Self {
        Self { directory, config }
    }

    fn user_base(&self) -> String {
        join_dn(&self.config.user_dn, &self.config.base_dn)
    }

    fn group_base(&self) -> String {
        join_dn(&self.config.group_dn, &self.config.base_dn)
    }

    async fn run(
        &self,
        session: &mut dyn DirectorySession,
        credential: &Credential<'_>,
    ) -> Result<Verification, VerifyError> {
        if !session
            .bind(&self.config.bind_dn, &self.config.bind_password)
            .await?
        {
            return Err(VerifyError::Configuration(
                "directory rejected service account credentials".to_string(),
            ));
        }

        let user_filter = format!(
            "(&{}({}={}))",
            self.config.user_filter,
            self.config.user_field,
            ldap_escape(credential.username)
        );
        let users = session
            .search(&self.user_base(), &user_filter, &["dn"])
            .await?;

        let user_dn = match users.as_slice() {
            [user] => user.dn.clone(),
            [] => {
                debug!(username = %credential.username, "user not found in directory");
                return Ok(Verification::denied());
            },
            _ => {
                warn!(username = %credential.username, count = users.len(), "ambiguous user in directory");
                return Ok(Verification::denied());
            },
        };

        if !session.bind(&user_dn, credential.password).await? {
            debug!(username = %credential.username, "directory rejected password");
            return Ok(Verification::denied());
        }

        if !self.config.required_groups.is_empty() {
            // Back to the service account; the user may not be allowed to read groups.
            if !session
                .bind(&self.config.bind_dn, &self.config.bind_password)
                .await?
            {
                return Err(VerifyError::Configuration(
                    "directory rejected service account credentials".to_string(),
                ));
            }

            let group_filter = format!(
                "(&{}(member={}))",
                self.config.group_filter,
                ldap_escape(&user_dn)
            );
            let groups = session
                .search(
                    &self.group_base(),
                    &group_filter,
                    &[self.config.group_field.as_str()],
                )
                .await?;

            let names = groups
                .iter()
                .flat_map(|g| g.attrs.get(&self.config.group_field).into_iter().flatten());
            if !self.config.required_groups.matches_any(names) {
                debug!(username = %credential.username, "user lacks required groups");
                return Ok(Verification::denied());
            }
        }

        Ok(Verification::granted(Some(credential.username.to_string())))
    }
}

#[async_trait]
impl<D: Directory> Verifier for DirectoryVerifier<D> {
    async fn verify(&self, credential: &Credential<'_>) -> Result<Verification, VerifyError> {
        // An empty password is an unauthenticated bind, which most servers accept.
        if credential.username.is_empty() || credential.password.is_empty() {
            return Ok(Verification::denied());
        }

        let attempt = async {
            let mut session = self.directory.connect().await?;
            let result = self.run(session.as_mut(), credential).await;
            session.close().await;
            result
        };

        tokio::time::timeout(self.config.timeout, attempt)
            .await
            .map_err(|_| VerifyError::Unavailable("directory verification timed out".to_string()))?
    }

    fn required_groups(&self) -> &RequiredGroups {
        &self.config.required_groups
    }

    fn name(&self) -> &'static str {
        "ldap"
    }
}

/// [`Directory`] backed by an `ldap3` connection per verification.
pub struct LdapDirectory {
    url: String,
    settings: LdapConnSettings,
}

impl LdapDirectory {
    /// Creates a directory client from the connection part of `config`.
    pub fn new(config: &LdapConfig) -> Self {
        let scheme = if config.use_ssl { "ldaps" } else { "ldap" };
        let settings = LdapConnSettings::new()
            .set_conn_timeout(config.timeout)
            .set_starttls(!config.use_ssl && !config.skip_tls)
            .set_no_tls_verify(config.skip_tls_verify);

        Self {
            url: format!("{scheme}://{}:{}", config.host, config.port),
            settings,
        }
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn connect(&self) -> Result<Box<dyn DirectorySession>, VerifyError> {
        let (conn, ldap) = LdapConnAsync::with_settings(self.settings.clone(), &self.url)
            .await
            .map_err(|e| {
                warn!(error = %e, url = %self.url, "ldap connect failed");
                VerifyError::Unavailable(e.to_string())
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "ldap connection error");
            }
        });

        Ok(Box::new(LdapSession { ldap }))
    }
}

struct LdapSession {
    ldap: Ldap,
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<bool, VerifyError> {
        let result = self
            .ldap
            .simple_bind(dn, password)
            .await
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?;

        match result.rc {
            0 => Ok(true),
            INVALID_CREDENTIALS => Ok(false),
            rc => Err(VerifyError::Protocol(format!(
                "bind failed with result code {rc}: {}",
                result.text
            ))),
        }
    }

    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, VerifyError> {
        let (entries, _) = self
            .ldap
            .search(base, Scope::Subtree, filter, attrs.to_vec())
            .await
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?
            .success()
            .map_err(|e| VerifyError::Protocol(e.to_string()))?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let entry = SearchEntry::construct(entry);
                DirectoryEntry {
                    dn: entry.dn,
                    attrs: entry.attrs,
                }
            })
            .collect())
    }

    async fn close(mut self: Box<Self>) {
        if let Err(e) = self.ldap.unbind().await {
            debug!(error = %e, "ldap unbind failed");
        }
    }
}

/// Builds an LDAP verifier from `config`.
pub fn ldap_verifier(config: LdapConfig) -> DirectoryVerifier<LdapDirectory> {
    DirectoryVerifier::new(LdapDirectory::new(&config), config)
}

fn join_dn(relative: &str, base: &str) -> String {
    match (relative.is_empty(), base.is_empty()) {
        (true, _) => base.to_string(),
        (false, true) => relative.to_string(),
        (false, false) => format!("{relative},{base}"),
    }
}
