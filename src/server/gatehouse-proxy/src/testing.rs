//! Test doubles shared by the filter and router tests.

use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use gatehouse_auth::{Credential, Verification, Verifier, VerifyError};

use crate::{Forward, ProxyError};

/// Grants exactly one username/password pair; records every call.
pub struct StubVerifier {
    username: &'static str,
    password: &'static str,
    fail: bool,
    pub calls: Mutex<Vec<String>>,
}

impl StubVerifier {
    pub fn granting(username: &'static str, password: &'static str) -> Self {
        Self {
            username,
            password,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            username: "",
            password: "",
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Verifier for StubVerifier {
    async fn verify(&self, credential: &Credential<'_>) -> Result<Verification, VerifyError> {
        self.calls.lock().unwrap().push(credential.username.to_string());
        if self.fail {
            return Err(VerifyError::Unavailable("connection refused".into()));
        }
        if credential.username == self.username && credential.password == self.password {
            Ok(Verification::granted(Some(self.username.to_string())))
        } else {
            Ok(Verification::denied())
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Answers every request with a fixed body; records the forwarded URIs.
#[derive(Default)]
pub struct StubForward {
    pub forwarded: Mutex<Vec<String>>,
}

impl StubForward {
    pub fn count(&self) -> usize {
        self.forwarded.lock().unwrap().len()
    }
}

#[async_trait]
impl Forward for StubForward {
    async fn forward(&self, request: Request) -> Result<Response, ProxyError> {
        self.forwarded.lock().unwrap().push(request.uri().to_string());
        Ok(Response::builder()
            .status(StatusCode::OK)
            .header("x-upstream", "stub")
            .body(Body::from("upstream body"))
            .unwrap())
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    String::from_utf8(bytes.to_vec()).expect("body is not utf-8")
}
