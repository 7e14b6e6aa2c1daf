//! Upstream forwarding.
//!
//! Every forwarded request goes to the one configured target, whatever the
//! inbound `Host` says. Bodies are streamed in both directions.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, HttpBody};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, Uri};
use axum::response::Response;
use reqwest::{redirect, Client};
use tracing::{debug, warn};

use crate::ProxyError;

/// Headers that describe a single connection and are never relayed.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
    header::HOST,
];

/// Hands an authorized request to the upstream.
#[async_trait]
pub trait Forward: Send + Sync {
    /// Sends `request` upstream and returns the upstream response.
    async fn forward(&self, request: Request) -> Result<Response, ProxyError>;
}

/// [`Forward`] over HTTP to a fixed `host:port`.
pub struct Forwarder {
    client: Client,
    target: String,
}

impl Forwarder {
    /// Creates a forwarder to `target_address`.
    ///
    /// The client ignores ambient proxy settings and never follows
    /// redirects; only connecting is bounded by `dial_timeout`, so long
    /// responses can stream.
    pub fn new(target_address: &str, dial_timeout: Duration) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .no_proxy()
            .redirect(redirect::Policy::none())
            .connect_timeout(dial_timeout)
            .build()
            .map_err(|e| ProxyError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            target: target_address.to_string(),
        })
    }

    fn upstream_url(&self, uri: &Uri) -> String {
        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        format!("http://{}{}", self.target, path)
    }
}

#[async_trait]
impl Forward for Forwarder {
    async fn forward(&self, request: Request) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let url = self.upstream_url(&parts.uri);
        debug!(method = %parts.method, target = %self.target, path = %parts.uri.path(), "forwarding request");

        let mut upstream = self
            .client
            .request(parts.method, &url)
            .headers(strip_hop_by_hop(&parts.headers));
        if body.size_hint().exact() != Some(0) {
            upstream = upstream.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = upstream.send().await.map_err(|e| {
            warn!(error = %e, target = %self.target, "upstream request failed");
            ProxyError::Upstream(e.to_string())
        })?;

        let status = upstream.status();
        let headers = strip_hop_by_hop(upstream.headers());

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Copies `headers` without hop-by-hop headers, including any the
/// `Connection` header names.
fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    let mut stripped = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !HOP_BY_HOP.contains(name) && !listed.contains(name) {
            stripped.append(name.clone(), value.clone());
        }
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{Method, Request, StatusCode},
        response::{IntoResponse, Redirect},
        routing::get,
        Router,
    };

    async fn echo(request: Request<Body>) -> String {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .expect("failed to read body");
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string()
        };
        format!(
            "{} {} host={} x-private={} x-keep={} body={}",
            parts.method,
            parts.uri,
            header("host"),
            header("x-private"),
            header("x-keep"),
            String::from_utf8_lossy(&body)
        )
    }

    async fn status(Path(code): Path<u16>) -> impl IntoResponse {
        (
            StatusCode::from_u16(code).expect("invalid status"),
            [("x-upstream", "yes"), ("connection", "close")],
            "from upstream",
        )
    }

    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route("/status/{code}", get(status))
            .route("/redirect", get(|| async { Redirect::temporary("/elsewhere") }))
            .fallback(echo);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind upstream");
        let addr = listener.local_addr().expect("no local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("upstream failed");
        });
        addr.to_string()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        String::from_utf8(bytes.to_vec()).expect("body is not utf-8")
    }

    fn forwarder(target: &str) -> Forwarder {
        Forwarder::new(target, Duration::from_secs(5)).expect("failed to build forwarder")
    }

    #[tokio::test]
    async fn test_forwards_to_fixed_target_regardless_of_host() {
        let target = spawn_upstream().await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/some/path?q=1&r=2")
            .header(header::HOST, "evil.example.com")
            .body(Body::from("payload"))
            .expect("failed to build request");

        let response = forwarder(&target)
            .forward(request)
            .await
            .expect("forward failed");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            format!("POST /some/path?q=1&r=2 host={target} x-private=- x-keep=- body=payload")
        );
    }

    #[tokio::test]
    async fn test_strips_hop_by_hop_request_headers() {
        let target = spawn_upstream().await;
        let request = Request::builder()
            .uri("/")
            .header(header::CONNECTION, "x-private")
            .header("x-private", "secret")
            .header("x-keep", "kept")
            .header("keep-alive", "timeout=5")
            .body(Body::empty())
            .expect("failed to build request");

        let response = forwarder(&target)
            .forward(request)
            .await
            .expect("forward failed");

        assert_eq!(
            body_text(response).await,
            format!("GET / host={target} x-private=- x-keep=kept body=")
        );
    }

    #[tokio::test]
    async fn test_relays_status_and_headers() {
        let target = spawn_upstream().await;
        let request = Request::builder()
            .uri("/status/418")
            .body(Body::empty())
            .expect("failed to build request");

        let response = forwarder(&target)
            .forward(request)
            .await
            .expect("forward failed");

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers()["x-upstream"], "yes");
        assert!(response.headers().get(header::CONNECTION).is_none());
        assert_eq!(body_text(response).await, "from upstream");
    }

    #[tokio::test]
    async fn test_does_not_follow_redirects() {
        let target = spawn_upstream().await;
        let request = Request::builder()
            .uri("/redirect")
            .body(Body::empty())
            .expect("failed to build request");

        let response = forwarder(&target)
            .forward(request)
            .await
            .expect("forward failed");

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/elsewhere");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_bad_gateway() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind");
        let target = listener.local_addr().expect("no local addr").to_string();
        drop(listener);

        let request = Request::builder()
            .uri("/")
            .body(Body::empty())
            .expect("failed to build request");
        let result = forwarder(&target).forward(request).await;

        let err = result.expect_err("forward to closed port succeeded");
        assert!(matches!(err, ProxyError::Upstream(_)));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_upstream_url() {
        let forwarder = forwarder("upstream:8080");

        assert_eq!(
            forwarder.upstream_url(&Uri::from_static("/a/b?c=d")),
            "http://upstream:8080/a/b?c=d"
        );
        assert_eq!(
            forwarder.upstream_url(&Uri::from_static("http://other.example/x")),
            "http://upstream:8080/x"
        );
    }
}
