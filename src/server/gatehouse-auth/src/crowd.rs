//! Atlassian Crowd backend.
//!
//! Uses the Crowd usermanagement REST API as a registered application:
//! `POST {url}/rest/usermanagement/1/authentication?username=<name>` with the
//! password as `{"value": "..."}`. Crowd applications carry their own group
//! mapping, so this backend does not evaluate required groups and refuses to
//! be configured with any.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Credential, Verification, Verifier, VerifyError};

/// Configuration for the Crowd backend.
#[derive(Debug, Clone)]
pub struct CrowdConfig {
    /// Base URL of the Crowd server (e.g., "https://crowd.example.com/crowd").
    pub url: String,
    /// Crowd application name.
    pub application_name: String,
    /// Crowd application password.
    pub application_password: String,
    /// Bound on connect plus response time.
    pub timeout: Duration,
}

#[derive(Serialize)]
struct PasswordBody<'a> {
    value: &'a str,
}

#[derive(Deserialize)]
struct CrowdUser {
    name: String,
}

/// Verifier authenticating against Crowd.
pub struct CrowdVerifier {
    client: Client,
    authentication_url: String,
    application_name: String,
    application_password: String,
}

impl CrowdVerifier {
    /// Creates a Crowd verifier. Requests bypass any ambient proxy.
    pub fn new(config: CrowdConfig) -> Result<Self, VerifyError> {
        let client = Client::builder()
            .no_proxy()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VerifyError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            authentication_url: format!(
                "{}/rest/usermanagement/1/authentication",
                config.url.trim_end_matches('/')
            ),
            application_name: config.application_name,
            application_password: config.application_password,
        })
    }
}

#[async_trait]
impl Verifier for CrowdVerifier {
    async fn verify(&self, credential: &Credential<'_>) -> Result<Verification, VerifyError> {
        if credential.username.is_empty() || credential.password.is_empty() {
            return Ok(Verification::denied());
        }

        let response = self
            .client
            .post(&self.authentication_url)
            .query(&[("username", credential.username)])
            .basic_auth(&self.application_name, Some(&self.application_password))
            .header(header::ACCEPT, "application/json")
            .json(&PasswordBody {
                value: credential.password,
            })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "crowd request failed");
                VerifyError::Unavailable(e.to_string())
            })?;

        match response.status() {
            StatusCode::OK => {
                let user: CrowdUser = response
                    .json()
                    .await
                    .map_err(|e| VerifyError::Protocol(format!("invalid crowd response: {e}")))?;
                Ok(Verification::granted(Some(user.name)))
            },
            // Crowd answers bad credentials, unknown and inactive users with 400.
            StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                debug!(username = %credential.username, status = %response.status(), "crowd denied user");
                Ok(Verification::denied())
            },
            StatusCode::UNAUTHORIZED => Err(VerifyError::Configuration(
                "crowd rejected application credentials".to_string(),
            )),
            status => Err(VerifyError::Protocol(format!(
                "crowd returned unexpected status {status}"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "crowd"
    }
}
