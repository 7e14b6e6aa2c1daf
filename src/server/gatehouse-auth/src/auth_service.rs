//! Remote auth service backend.
//!
//! The proxy authenticates to the service as an application and asks it to
//! resolve a user token under a set of required groups:
//!
//! ```text
//! POST {url}/api/1.0/login
//! Authorization: Basic base64(application_name:application_password)
//! {"authToken": "...", "requiredGroups": ["..."]}
//! ```
//!
//! `200` with `{"user": "name"}` resolves the user; `403` and `404` mean the
//! token is unknown or lacks the groups. `401` means the service rejected the
//! application credentials, which is a configuration error, not a denial.
//! Group semantics are the service's: it receives every required group and
//! decides.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::group_check::{GroupCheck, GroupCheckVerifier};
use crate::{RequiredGroups, VerifyError};

/// Configuration for the remote auth service backend.
#[derive(Debug, Clone)]
pub struct AuthServiceConfig {
    /// Base URL of the service (e.g., "http://auth.internal:8080").
    pub url: String,
    /// Application name the proxy authenticates as.
    pub application_name: String,
    /// Application password.
    pub application_password: String,
    /// Bound on connect plus response time.
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    auth_token: &'a str,
    required_groups: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    user: Option<String>,
}

/// HTTP client for the remote auth service.
pub struct AuthServiceClient {
    client: Client,
    login_url: String,
    application_name: String,
    application_password: String,
}

impl AuthServiceClient {
    /// Creates a client. Requests bypass any ambient proxy.
    pub fn new(config: AuthServiceConfig) -> Result<Self, VerifyError> {
        let client = Client::builder()
            .no_proxy()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VerifyError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            login_url: format!("{}/api/1.0/login", config.url.trim_end_matches('/')),
            application_name: config.application_name,
            application_password: config.application_password,
        })
    }
}

#[async_trait]
impl GroupCheck for AuthServiceClient {
    async fn check(
        &self,
        token: &str,
        required_groups: &RequiredGroups,
    ) -> Result<Option<String>, VerifyError> {
        let request = LoginRequest {
            auth_token: token,
            required_groups: required_groups.iter().collect(),
        };

        let response = self
            .client
            .post(&self.login_url)
            .basic_auth(&self.application_name, Some(&self.application_password))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, url = %self.login_url, "auth service request failed");
                VerifyError::Unavailable(e.to_string())
            })?;

        match response.status() {
            StatusCode::OK => {
                let body: LoginResponse = response
                    .json()
                    .await
                    .map_err(|e| VerifyError::Protocol(format!("invalid login response: {e}")))?;
                Ok(body.user)
            },
            StatusCode::UNAUTHORIZED => Err(VerifyError::Configuration(
                "auth service rejected application credentials".to_string(),
            )),
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                debug!(status = %response.status(), "auth service rejected token");
                Ok(None)
            },
            status => Err(VerifyError::Protocol(format!(
                "auth service returned unexpected status {status}"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "auth-service"
    }
}

/// Verifier asking the remote auth service.
pub type AuthServiceVerifier = GroupCheckVerifier<AuthServiceClient>;

/// Builds a verifier for the remote auth service.
pub fn auth_service_verifier(
    config: AuthServiceConfig,
    required_groups: RequiredGroups,
) -> Result<AuthServiceVerifier, VerifyError> {
    Ok(GroupCheckVerifier::new(
        AuthServiceClient::new(config)?,
        required_groups,
    ))
}
