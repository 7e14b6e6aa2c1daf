//! Proxy error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gatehouse_auth::VerifyError;
use thiserror::Error;
use tracing::{error, warn};

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The verifier could not reach a decision.
    #[error("authentication backend unavailable: {0}")]
    BackendUnavailable(#[from] VerifyError),

    /// The upstream target could not be reached.
    #[error("upstream unreachable: {0}")]
    Upstream(String),

    /// The request could not be understood.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Invalid startup configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// HTTP status this error answers with.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Configuration(_) | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        // Details stay in the log; callers only learn the class of failure.
        let body = match &self {
            ProxyError::BackendUnavailable(e) => {
                warn!(error = %e, "authentication backend unavailable");
                "authentication backend unavailable".to_string()
            },
            ProxyError::Upstream(e) => {
                warn!(error = %e, "upstream unreachable");
                "bad gateway".to_string()
            },
            ProxyError::BadRequest(msg) => msg.clone(),
            ProxyError::Configuration(e) | ProxyError::Internal(e) => {
                error!(error = %e, "internal server error");
                "internal server error".to_string()
            },
        };

        (self.status(), body).into_response()
    }
}
