//! Proxy configuration.

use std::time::Duration;

use crate::ProxyError;

/// Which auth filter guards the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    /// HTTP Basic challenge per request.
    Basic,
    /// Login form and encrypted session cookie.
    Html,
}

/// Session cookie attributes for the HTML filter.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    /// Cookie name.
    pub name: String,
    /// Add the `Secure` attribute.
    pub secure: bool,
    /// Session lifetime. `None` keeps sessions valid until the browser drops them.
    pub max_age: Option<Duration>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: "gatehouse_session".to_string(),
            secure: false,
            max_age: None,
        }
    }
}

/// Validated proxy settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Auth filter kind.
    pub kind: AuthKind,
    /// Realm announced in Basic challenges.
    pub realm: String,
    /// Session cookie settings (HTML filter only).
    pub cookie: CookieSettings,
    /// Upstream `host:port`.
    pub target_address: String,
    /// Upstream health URL; a TCP connect is used when absent.
    pub target_healthz_url: Option<String>,
    /// Upstream connect timeout.
    pub dial_timeout: Duration,
}

impl ProxyConfig {
    /// Checks settings that would otherwise fail per request.
    pub fn validate(&self) -> Result<(), ProxyError> {
        let target = self.target_address.as_str();
        if target.is_empty() || target.contains("://") || target.contains('/') {
            return Err(ProxyError::Configuration(format!(
                "target address must be host:port, got {target:?}"
            )));
        }

        if self.realm.is_empty() || self.realm.contains(['"', '\r', '\n']) {
            return Err(ProxyError::Configuration(
                "basic auth realm must be non-empty and must not contain quotes or line breaks"
                    .to_string(),
            ));
        }

        if !is_cookie_token(&self.cookie.name) {
            return Err(ProxyError::Configuration(format!(
                "invalid cookie name {:?}",
                self.cookie.name
            )));
        }

        if let Some(url) = &self.target_healthz_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProxyError::Configuration(format!(
                    "target healthz url must be http(s), got {url:?}"
                )));
            }
        }

        if self.dial_timeout.is_zero() {
            return Err(ProxyError::Configuration(
                "dial timeout must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// RFC 6265 cookie-name: a non-empty HTTP token.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}
