//! Integration tests for the Gatehouse proxy.
//!
//! These tests start the real server binary in front of an in-process
//! upstream and drive it over HTTP.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::io::Write;
use std::net::SocketAddr;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::{extract::Request, Router};
use reqwest::{redirect, Client};
use tempfile::NamedTempFile;

// ============================================================================
// Upstream
// ============================================================================

/// Starts an upstream answering every request with its method and URI.
pub async fn start_upstream() -> Result<SocketAddr> {
    let app = Router::new().fallback(|request: Request| async move {
        format!("upstream saw {} {}", request.method(), request.uri())
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind upstream")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(addr)
}

/// Returns a local address nothing listens on.
pub fn unused_addr() -> Result<SocketAddr> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?)
}

/// Writes a user file with the given lines.
pub fn user_file(lines: &[&str]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new().context("Failed to create user file")?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    file.flush()?;
    Ok(file)
}

// ============================================================================
// Test Server
// ============================================================================

/// A running proxy process.
pub struct TestProxy {
    process: Child,
    pub base_url: String,
}

impl TestProxy {
    /// Start the proxy with `args` on a free port, in front of `target`.
    pub async fn start(target: SocketAddr, args: &[&str]) -> Result<Self> {
        let bind = unused_addr()?;
        let server_binary = find_server_binary()?;

        let process = Command::new(&server_binary)
            .arg("--bind")
            .arg(bind.to_string())
            .arg("--target-address")
            .arg(target.to_string())
            .args(args)
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start proxy: {:?}", server_binary))?;

        let proxy = Self {
            process,
            base_url: format!("http://{bind}"),
        };
        proxy.wait_for_ready().await?;

        Ok(proxy)
    }

    /// Wait until the proxy answers HTTP at all.
    async fn wait_for_ready(&self) -> Result<()> {
        let client = client();
        let url = self.url("/healthz");

        for _ in 0..50 {
            match client.get(&url).send().await {
                Ok(_) => return Ok(()),
                Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }

        bail!("Proxy failed to start within 5 seconds")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// HTTP client that neither follows redirects nor uses ambient proxies.
pub fn client() -> Client {
    Client::builder()
        .no_proxy()
        .redirect(redirect::Policy::none())
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create HTTP client")
}

/// Find the server binary in the target directory.
fn find_server_binary() -> Result<std::path::PathBuf> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let target_dir = std::env::var("CARGO_TARGET_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::Path::new(&manifest_dir).join("../../target"));

    // Try debug build first, then release
    let candidates = [
        target_dir.join("debug/gatehouse-server"),
        target_dir.join("debug/gatehouse-server.exe"),
        target_dir.join("release/gatehouse-server"),
        target_dir.join("release/gatehouse-server.exe"),
    ];

    for candidate in &candidates {
        if candidate.exists() {
            return Ok(candidate.canonicalize()?);
        }
    }

    bail!(
        "Could not find gatehouse-server binary. Run 'cargo build -p gatehouse-server' first. Searched in: {:?}",
        candidates
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{header, StatusCode};

    const USERS: &[&str] = &["# test users", "alice:wonderland:admins", "bob:builder:users"];
    const SECRET: &str = "integration-session-secret-0123";

    #[tokio::test]
    async fn test_health_bypasses_auth() {
        let upstream = start_upstream().await.unwrap();
        let users = user_file(USERS).unwrap();
        let user_path = users.path().to_str().unwrap();
        let proxy = TestProxy::start(upstream, &["--verifier", "file", "--user-file", user_path])
            .await
            .unwrap();

        for path in ["/healthz", "/readiness"] {
            let resp = client().get(proxy.url(path)).send().await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{path}");
            assert_eq!(resp.text().await.unwrap(), "ok");
        }
    }

    #[tokio::test]
    async fn test_health_reports_unreachable_upstream() {
        let users = user_file(USERS).unwrap();
        let user_path = users.path().to_str().unwrap();
        let proxy = TestProxy::start(
            unused_addr().unwrap(),
            &["--verifier", "file", "--user-file", user_path],
        )
        .await
        .unwrap();

        let resp = client().get(proxy.url("/healthz")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_basic_auth_flow() {
        let upstream = start_upstream().await.unwrap();
        let users = user_file(USERS).unwrap();
        let user_path = users.path().to_str().unwrap();
        let proxy = TestProxy::start(upstream, &["--verifier", "file", "--user-file", user_path])
            .await
            .unwrap();
        let client = client();

        let resp = client.get(proxy.url("/docs?page=2")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"Authentication\""
        );

        let resp = client
            .get(proxy.url("/docs?page=2"))
            .basic_auth("alice", Some("wonderland"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "upstream saw GET /docs?page=2");

        let resp = client
            .get(proxy.url("/docs"))
            .basic_auth("alice", Some("looking-glass"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_required_groups() {
        let upstream = start_upstream().await.unwrap();
        let users = user_file(USERS).unwrap();
        let user_path = users.path().to_str().unwrap();
        let proxy = TestProxy::start(
            upstream,
            &[
                "--verifier",
                "file",
                "--user-file",
                user_path,
                "--required-groups",
                "admins,ops",
            ],
        )
        .await
        .unwrap();
        let client = client();

        let alice = client
            .get(proxy.url("/"))
            .basic_auth("alice", Some("wonderland"))
            .send()
            .await
            .unwrap();
        assert_eq!(alice.status(), StatusCode::OK);

        let bob = client
            .get(proxy.url("/"))
            .basic_auth("bob", Some("builder"))
            .send()
            .await
            .unwrap();
        assert_eq!(bob.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_html_login_flow() {
        let upstream = start_upstream().await.unwrap();
        let users = user_file(USERS).unwrap();
        let user_path = users.path().to_str().unwrap();
        let proxy = TestProxy::start(
            upstream,
            &[
                "--verifier",
                "file",
                "--user-file",
                user_path,
                "--kind",
                "html",
                "--secret",
                SECRET,
            ],
        )
        .await
        .unwrap();
        let client = client();

        // No session: login form
        let resp = client.get(proxy.url("/reports?year=2024")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.text().await.unwrap().contains("name=\"password\""));

        // Wrong password: form again, no cookie
        let resp = client
            .post(proxy.url("/reports?year=2024"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("login=alice&password=nope")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());

        // Login: cookie and redirect back
        let resp = client
            .post(proxy.url("/reports?year=2024"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("login=alice&password=wonderland")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/reports?year=2024");
        let cookie = resp.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("gatehouse_session="));

        // Session: forwarded
        let resp = client
            .get(proxy.url("/reports?year=2024"))
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.text().await.unwrap(),
            "upstream saw GET /reports?year=2024"
        );
    }

    #[test]
    fn test_invalid_configuration_exits() {
        let server_binary = find_server_binary().unwrap();

        // html without a secret must fail before binding
        let status = Command::new(server_binary)
            .args([
                "--bind",
                "127.0.0.1:0",
                "--target-address",
                "127.0.0.1:9",
                "--verifier",
                "file",
                "--user-file",
                "/tmp/users",
                "--kind",
                "html",
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .unwrap();

        assert!(!status.success());
    }
}
