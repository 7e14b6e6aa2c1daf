//! Command line and environment configuration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Auth filter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    /// HTTP Basic challenge.
    Basic,
    /// Login form with session cookie.
    Html,
}

/// Credential backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VerifierKind {
    /// LDAP directory.
    Ldap,
    /// Flat user file.
    File,
    /// Remote auth service.
    Auth,
    /// Atlassian Crowd.
    Crowd,
}

#[derive(Debug, Parser)]
#[command(name = "gatehouse-server")]
#[command(about = "Gatehouse - authenticating reverse proxy")]
#[command(version)]
pub struct Cli {
    /// Proxy bind address
    #[arg(long, default_value = "0.0.0.0:8080", env = "GATEHOUSE_BIND_ADDRESS")]
    pub bind: String,

    /// Upstream host:port every authorized request is sent to
    #[arg(long, env = "GATEHOUSE_TARGET_ADDRESS")]
    pub target_address: String,

    /// Upstream health URL; a TCP connect to the target is used when unset
    #[arg(long, env = "GATEHOUSE_TARGET_HEALTHZ_URL")]
    pub target_healthz_url: Option<String>,

    /// Upstream and backend connect timeout in seconds
    #[arg(long, default_value_t = 30, env = "GATEHOUSE_DIAL_TIMEOUT_SECS")]
    pub dial_timeout_secs: u64,

    /// Auth filter
    #[arg(long, value_enum, default_value_t = Kind::Basic, env = "GATEHOUSE_KIND")]
    pub kind: Kind,

    /// Credential backend
    #[arg(long, value_enum, env = "GATEHOUSE_VERIFIER")]
    pub verifier: VerifierKind,

    /// Comma separated groups a user must belong to
    #[arg(long, default_value = "", env = "GATEHOUSE_REQUIRED_GROUPS")]
    pub required_groups: String,

    /// Verification cache TTL in seconds (0 disables caching)
    #[arg(long, default_value_t = 300, env = "GATEHOUSE_CACHE_TTL_SECS")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached verifications
    #[arg(long, default_value_t = 10_000, env = "GATEHOUSE_CACHE_MAX_ENTRIES")]
    pub cache_max_entries: usize,

    /// Session cookie secret (html kind), at least 16 bytes
    #[arg(long, env = "GATEHOUSE_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Session lifetime in seconds; sessions never expire when unset
    #[arg(long, env = "GATEHOUSE_SESSION_MAX_AGE_SECS")]
    pub session_max_age_secs: Option<u64>,

    /// Session cookie name
    #[arg(long, default_value = "gatehouse_session", env = "GATEHOUSE_COOKIE_NAME")]
    pub cookie_name: String,

    /// Mark the session cookie Secure
    #[arg(long, env = "GATEHOUSE_COOKIE_SECURE")]
    pub cookie_secure: bool,

    /// Realm announced in Basic challenges
    #[arg(long, default_value = "Authentication", env = "GATEHOUSE_BASIC_AUTH_REALM")]
    pub basic_auth_realm: String,

    /// User file (file verifier)
    #[arg(long, env = "GATEHOUSE_USER_FILE")]
    pub user_file: Option<PathBuf>,

    /// Auth service base URL (auth verifier)
    #[arg(long, env = "GATEHOUSE_AUTH_URL")]
    pub auth_url: Option<String>,

    /// Auth service application name
    #[arg(long, env = "GATEHOUSE_AUTH_APPLICATION_NAME")]
    pub auth_application_name: Option<String>,

    /// Auth service application password
    #[arg(long, env = "GATEHOUSE_AUTH_APPLICATION_PASSWORD", hide_env_values = true)]
    pub auth_application_password: Option<String>,

    /// Crowd base URL (crowd verifier)
    #[arg(long, env = "GATEHOUSE_CROWD_URL")]
    pub crowd_url: Option<String>,

    /// Crowd application name
    #[arg(long, env = "GATEHOUSE_CROWD_APP_NAME")]
    pub crowd_app_name: Option<String>,

    /// Crowd application password
    #[arg(long, env = "GATEHOUSE_CROWD_APP_PASSWORD", hide_env_values = true)]
    pub crowd_app_password: Option<String>,

    /// LDAP host (ldap verifier)
    #[arg(long, env = "GATEHOUSE_LDAP_HOST")]
    pub ldap_host: Option<String>,

    /// LDAP port
    #[arg(long, default_value_t = 389, env = "GATEHOUSE_LDAP_PORT")]
    pub ldap_port: u16,

    /// Connect with ldaps://
    #[arg(long, env = "GATEHOUSE_LDAP_USE_SSL")]
    pub ldap_use_ssl: bool,

    /// Do not upgrade plain LDAP connections with StartTLS
    #[arg(long, env = "GATEHOUSE_LDAP_SKIP_TLS")]
    pub ldap_skip_tls: bool,

    /// Accept any LDAP server certificate
    #[arg(long, env = "GATEHOUSE_LDAP_SKIP_TLS_VERIFY")]
    pub ldap_skip_tls_verify: bool,

    /// LDAP base DN
    #[arg(long, default_value = "", env = "GATEHOUSE_LDAP_BASE_DN")]
    pub ldap_base_dn: String,

    /// LDAP service account DN
    #[arg(long, env = "GATEHOUSE_LDAP_BIND_DN")]
    pub ldap_bind_dn: Option<String>,

    /// LDAP service account password
    #[arg(long, env = "GATEHOUSE_LDAP_BIND_PASSWORD", hide_env_values = true)]
    pub ldap_bind_password: Option<String>,

    /// LDAP user subtree relative to the base DN
    #[arg(long, default_value = "", env = "GATEHOUSE_LDAP_USER_DN")]
    pub ldap_user_dn: String,

    /// LDAP filter selecting user entries
    #[arg(long, default_value = "(objectClass=person)", env = "GATEHOUSE_LDAP_USER_FILTER")]
    pub ldap_user_filter: String,

    /// LDAP attribute holding the login name
    #[arg(long, default_value = "uid", env = "GATEHOUSE_LDAP_USER_FIELD")]
    pub ldap_user_field: String,

    /// LDAP group subtree relative to the base DN
    #[arg(long, default_value = "", env = "GATEHOUSE_LDAP_GROUP_DN")]
    pub ldap_group_dn: String,

    /// LDAP filter selecting group entries
    #[arg(
        long,
        default_value = "(objectClass=groupOfNames)",
        env = "GATEHOUSE_LDAP_GROUP_FILTER"
    )]
    pub ldap_group_filter: String,

    /// LDAP attribute holding the group name
    #[arg(long, default_value = "cn", env = "GATEHOUSE_LDAP_GROUP_FIELD")]
    pub ldap_group_field: String,
}
