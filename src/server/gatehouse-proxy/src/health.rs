//! Upstream health probe behind `/healthz` and `/readiness`.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reqwest::Client;
use tokio::net::TcpStream;
use tracing::debug;

use crate::ProxyError;

/// How the upstream is probed.
pub enum HealthCheck {
    /// `GET` a health URL; any 2xx is healthy.
    Http {
        /// HTTP client without proxy or redirects.
        client: Client,
        /// Health URL.
        url: String,
    },
    /// Open and close a TCP connection to the target.
    Tcp {
        /// Upstream `host:port`.
        address: String,
        /// Connect timeout.
        timeout: Duration,
    },
}

impl HealthCheck {
    /// Probes `healthz_url` when given, the target address otherwise.
    pub fn new(
        target_address: &str,
        healthz_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ProxyError> {
        match healthz_url {
            Some(url) => {
                let client = Client::builder()
                    .no_proxy()
                    .redirect(reqwest::redirect::Policy::none())
                    .timeout(timeout)
                    .build()
                    .map_err(|e| {
                        ProxyError::Configuration(format!("failed to build HTTP client: {e}"))
                    })?;
                Ok(HealthCheck::Http {
                    client,
                    url: url.to_string(),
                })
            },
            None => Ok(HealthCheck::Tcp {
                address: target_address.to_string(),
                timeout,
            }),
        }
    }

    /// Runs the probe once.
    pub async fn check(&self) -> Result<(), String> {
        match self {
            HealthCheck::Http { client, url } => {
                let response = client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| format!("GET {url} failed: {e}"))?;
                if !response.status().is_success() {
                    return Err(format!("GET {url} returned {}", response.status()));
                }
                debug!(%url, "upstream health url ok");
                Ok(())
            },
            HealthCheck::Tcp { address, timeout } => {
                tokio::time::timeout(*timeout, TcpStream::connect(address.as_str()))
                    .await
                    .map_err(|_| format!("tcp connection to {address} timed out"))?
                    .map_err(|e| format!("tcp connection to {address} failed: {e}"))?;
                debug!(%address, "upstream tcp connection ok");
                Ok(())
            },
        }
    }

    /// Runs the probe and renders the result.
    pub async fn respond(&self) -> Response {
        match self.check().await {
            Ok(()) => (StatusCode::OK, "ok").into_response(),
            Err(e) => {
                debug!(error = %e, "upstream unhealthy");
                (StatusCode::SERVICE_UNAVAILABLE, e).into_response()
            },
        }
    }
}
