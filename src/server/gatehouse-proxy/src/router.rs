//! Axum router wiring the health routes and the auth filter.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use gatehouse_auth::Verifier;
use gatehouse_crypto::SessionCrypter;
use tracing::info;

use crate::{
    AuthKind, BasicAuthFilter, Forward, Forwarder, HealthCheck, HtmlAuthFilter, ProxyConfig,
    ProxyError,
};

/// The filter guarding every non-health route.
pub enum AuthFilter {
    /// HTTP Basic.
    Basic(BasicAuthFilter),
    /// Login form and session cookie.
    Html(HtmlAuthFilter),
}

impl AuthFilter {
    /// Runs the request through the filter.
    pub async fn handle(&self, request: Request) -> Response {
        match self {
            AuthFilter::Basic(filter) => filter.handle(request).await,
            AuthFilter::Html(filter) => filter.handle(request).await,
        }
    }
}

/// Shared state of the proxy router.
pub struct ProxyState {
    /// Auth filter in front of the upstream.
    pub filter: AuthFilter,
    /// Upstream health probe.
    pub health: HealthCheck,
}

impl ProxyState {
    /// Builds the filter, forwarder and health probe described by `config`.
    ///
    /// # Arguments
    ///
    /// * `config` - Proxy settings, validated here
    /// * `verifier` - Credential verifier, usually cached
    /// * `crypter` - Session crypter, required for [`AuthKind::Html`]
    pub fn from_config(
        config: &ProxyConfig,
        verifier: Arc<dyn Verifier>,
        crypter: Option<SessionCrypter>,
    ) -> Result<Self, ProxyError> {
        config.validate()?;

        let forward: Arc<dyn Forward> =
            Arc::new(Forwarder::new(&config.target_address, config.dial_timeout)?);

        let filter = match config.kind {
            AuthKind::Basic => {
                AuthFilter::Basic(BasicAuthFilter::new(verifier, forward, &config.realm)?)
            },
            AuthKind::Html => {
                let crypter = crypter.ok_or_else(|| {
                    ProxyError::Configuration("html auth requires a session secret".to_string())
                })?;
                AuthFilter::Html(HtmlAuthFilter::new(
                    verifier,
                    forward,
                    crypter,
                    config.cookie.clone(),
                ))
            },
        };

        let health = HealthCheck::new(
            &config.target_address,
            config.target_healthz_url.as_deref(),
            config.dial_timeout,
        )?;

        info!(
            kind = ?config.kind,
            target = %config.target_address,
            "proxy configured"
        );

        Ok(Self { filter, health })
    }
}

/// Builds the router: health routes first, everything else through the filter.
pub fn create_router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route("/healthz", get(handle_health))
        .route("/readiness", get(handle_health))
        .fallback(handle_filtered)
        .with_state(state)
}

async fn handle_health(State(state): State<Arc<ProxyState>>) -> Response {
    state.health.respond().await
}

async fn handle_filtered(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    state.filter.handle(request).await
}
