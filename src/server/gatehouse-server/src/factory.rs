//! Builds the verifier and proxy state from the command line.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use gatehouse_auth::auth_service::{auth_service_verifier, AuthServiceConfig};
use gatehouse_auth::crowd::{CrowdConfig, CrowdVerifier};
use gatehouse_auth::file::{FileConfig, FileVerifier};
use gatehouse_auth::ldap::{ldap_verifier, LdapConfig};
use gatehouse_auth::{CachedVerifier, RequiredGroups, Verifier};
use gatehouse_crypto::SessionCrypter;
use gatehouse_proxy::{AuthKind, CookieSettings, ProxyConfig, ProxyState};
use tracing::info;

use crate::cli::{Cli, Kind, VerifierKind};

/// Proxy settings from the command line.
pub fn proxy_config(cli: &Cli) -> ProxyConfig {
    ProxyConfig {
        kind: match cli.kind {
            Kind::Basic => AuthKind::Basic,
            Kind::Html => AuthKind::Html,
        },
        realm: cli.basic_auth_realm.clone(),
        cookie: CookieSettings {
            name: cli.cookie_name.clone(),
            secure: cli.cookie_secure,
            max_age: cli.session_max_age_secs.map(Duration::from_secs),
        },
        target_address: cli.target_address.clone(),
        target_healthz_url: cli.target_healthz_url.clone(),
        dial_timeout: Duration::from_secs(cli.dial_timeout_secs),
    }
}

/// Builds the configured backend behind the verification cache.
pub fn build_verifier(cli: &Cli) -> Result<Arc<dyn Verifier>> {
    let required_groups = RequiredGroups::parse(&cli.required_groups);
    let timeout = Duration::from_secs(cli.dial_timeout_secs);

    let backend: Arc<dyn Verifier> = match cli.verifier {
        VerifierKind::File => {
            let path = cli
                .user_file
                .clone()
                .context("--user-file is required for the file verifier")?;
            Arc::new(FileVerifier::new(FileConfig {
                path,
                required_groups,
            }))
        },
        VerifierKind::Auth => {
            let config = AuthServiceConfig {
                url: required(&cli.auth_url, "--auth-url")?,
                application_name: required(&cli.auth_application_name, "--auth-application-name")?,
                application_password: required(
                    &cli.auth_application_password,
                    "--auth-application-password",
                )?,
                timeout,
            };
            Arc::new(auth_service_verifier(config, required_groups)?)
        },
        VerifierKind::Crowd => {
            if !required_groups.is_empty() {
                bail!("the crowd verifier does not support required groups");
            }
            let config = CrowdConfig {
                url: required(&cli.crowd_url, "--crowd-url")?,
                application_name: required(&cli.crowd_app_name, "--crowd-app-name")?,
                application_password: required(&cli.crowd_app_password, "--crowd-app-password")?,
                timeout,
            };
            Arc::new(CrowdVerifier::new(config)?)
        },
        VerifierKind::Ldap => {
            let config = LdapConfig {
                host: required(&cli.ldap_host, "--ldap-host")?,
                port: cli.ldap_port,
                use_ssl: cli.ldap_use_ssl,
                skip_tls: cli.ldap_skip_tls,
                skip_tls_verify: cli.ldap_skip_tls_verify,
                base_dn: cli.ldap_base_dn.clone(),
                bind_dn: required(&cli.ldap_bind_dn, "--ldap-bind-dn")?,
                bind_password: required(&cli.ldap_bind_password, "--ldap-bind-password")?,
                user_dn: cli.ldap_user_dn.clone(),
                user_filter: cli.ldap_user_filter.clone(),
                user_field: cli.ldap_user_field.clone(),
                group_dn: cli.ldap_group_dn.clone(),
                group_filter: cli.ldap_group_filter.clone(),
                group_field: cli.ldap_group_field.clone(),
                timeout,
                required_groups,
            };
            Arc::new(ldap_verifier(config))
        },
    };

    info!(
        verifier = backend.name(),
        groups = backend.required_groups().len(),
        cache_ttl_secs = cli.cache_ttl_secs,
        "verifier configured"
    );

    Ok(Arc::new(CachedVerifier::with_max_entries(
        backend,
        Duration::from_secs(cli.cache_ttl_secs),
        cli.cache_max_entries,
    )))
}

/// Builds the session crypter when the html filter needs one.
pub fn build_crypter(cli: &Cli) -> Result<Option<SessionCrypter>> {
    if cli.kind != Kind::Html {
        return Ok(None);
    }

    let secret = cli
        .secret
        .as_deref()
        .context("--secret is required for the html kind")?;
    let crypter = SessionCrypter::new(secret.as_bytes()).context("invalid session secret")?;
    Ok(Some(crypter))
}

/// Validates the command line and assembles the router state.
pub fn build_state(cli: &Cli) -> Result<ProxyState> {
    let config = proxy_config(cli);
    let verifier = build_verifier(cli)?;
    let crypter = build_crypter(cli)?;

    ProxyState::from_config(&config, verifier, crypter).context("invalid proxy configuration")
}

fn required(value: &Option<String>, flag: &str) -> Result<String> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => bail!("{flag} is required for the selected verifier"),
    }
}
