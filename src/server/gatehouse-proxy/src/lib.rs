//! # Gatehouse Proxy
//!
//! HTTP layer of the Gatehouse authenticating proxy.
//!
//! Every request outside the health routes passes through exactly one auth
//! filter, which decides between challenging the caller and handing the
//! request to the [`Forward`] implementation for the single upstream target.
//!
//! ## Routes
//!
//! - `/healthz`, `/readiness` - upstream probe, unauthenticated
//! - everything else - the configured filter ([`basic`] or [`html`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod basic;
pub mod config;
pub mod error;
pub mod forward;
pub mod health;
pub mod html;
pub mod router;

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod testing;

pub use basic::BasicAuthFilter;
pub use config::{AuthKind, CookieSettings, ProxyConfig};
pub use error::ProxyError;
pub use forward::{Forward, Forwarder};
pub use health::HealthCheck;
pub use html::HtmlAuthFilter;
pub use router::{create_router, AuthFilter, ProxyState};
