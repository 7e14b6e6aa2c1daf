//! HTTP Basic auth filter.
//!
//! Stateless: every request carries its credentials and is verified (the
//! verification cache makes repeats cheap). Missing, malformed and denied
//! credentials all get the same `401` challenge.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gatehouse_auth::{Credential, Verifier};
use tracing::debug;

use crate::{Forward, ProxyError};

/// Filter answering Basic challenges in front of a [`Forward`].
pub struct BasicAuthFilter {
    verifier: Arc<dyn Verifier>,
    forward: Arc<dyn Forward>,
    challenge: HeaderValue,
}

impl BasicAuthFilter {
    /// Creates a filter announcing `realm` in its challenges.
    pub fn new(
        verifier: Arc<dyn Verifier>,
        forward: Arc<dyn Forward>,
        realm: &str,
    ) -> Result<Self, ProxyError> {
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{realm}\""))
            .map_err(|_| ProxyError::Configuration(format!("invalid realm {realm:?}")))?;

        Ok(Self {
            verifier,
            forward,
            challenge,
        })
    }

    /// Verifies the request's credentials and forwards it if they pass.
    pub async fn handle(&self, request: Request) -> Response {
        let Some((username, password)) = basic_credentials(request.headers()) else {
            debug!(path = %request.uri().path(), "missing or malformed basic credentials");
            return self.challenge();
        };

        let credential = Credential::new(&username, &password);
        match self.verifier.verify(&credential).await {
            Ok(verification) if verification.authorized => {
                debug!(username = %username, verifier = self.verifier.name(), "basic auth granted");
            },
            Ok(_) => {
                debug!(username = %username, verifier = self.verifier.name(), "basic auth denied");
                return self.challenge();
            },
            Err(e) => return ProxyError::from(e).into_response(),
        }

        match self.forward.forward(request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    fn challenge(&self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, self.challenge.clone())],
            "unauthorized",
        )
            .into_response()
    }
}

/// Extracts `(username, password)` from an `Authorization: Basic` header.
///
/// The password is everything after the first `:`, so it may itself
/// contain colons.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
