//! HTML login form and session cookie filter.
//!
//! A request passes when it carries a session cookie that opens under the
//! configured key. Otherwise the caller gets a login form that posts back to
//! the requested URL; a successful login sets the cookie and redirects to
//! that same URL with `303 See Other`.
//!
//! Sessions are trusted from login until the cookie expires or the key
//! changes. The verifier is not consulted again for a valid cookie.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::Form;
use gatehouse_auth::{Credential, Verifier};
use gatehouse_crypto::SessionCrypter;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{CookieSettings, Forward, ProxyError};

/// Largest accepted login form body.
pub const MAX_LOGIN_BODY: usize = 16 * 1024;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Deserialize)]
struct LoginForm {
    login: Option<String>,
    password: Option<String>,
}

/// Filter guarding the upstream with a login form and session cookie.
pub struct HtmlAuthFilter {
    verifier: Arc<dyn Verifier>,
    forward: Arc<dyn Forward>,
    crypter: SessionCrypter,
    cookie: CookieSettings,
}

impl HtmlAuthFilter {
    /// Creates a filter issuing cookies sealed by `crypter`.
    pub fn new(
        verifier: Arc<dyn Verifier>,
        forward: Arc<dyn Forward>,
        crypter: SessionCrypter,
        cookie: CookieSettings,
    ) -> Self {
        Self {
            verifier,
            forward,
            crypter,
            cookie,
        }
    }

    /// Forwards requests with a valid session, handles login posts and
    /// shows the form to everyone else.
    pub async fn handle(&self, request: Request) -> Response {
        if self.has_session(request.headers()) {
            return match self.forward.forward(request).await {
                Ok(response) => response,
                Err(e) => e.into_response(),
            };
        }

        let target = login_target(request.uri());

        if !is_form_post(&request) {
            return login_page(StatusCode::OK, &target, None);
        }

        match self.login(request, &target).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    fn has_session(&self, headers: &HeaderMap) -> bool {
        cookie_values(headers, &self.cookie.name).any(|value| {
            match self.crypter.open_with_max_age(value, self.cookie.max_age) {
                Ok(session) => {
                    debug!(username = %session.username, "valid session cookie");
                    true
                },
                Err(e) => {
                    debug!(error = %e, "ignoring session cookie");
                    false
                },
            }
        })
    }

    async fn login(&self, request: Request, target: &str) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, MAX_LOGIN_BODY)
            .await
            .map_err(|_| ProxyError::BadRequest("login form too large".to_string()))?;

        let request = Request::from_parts(parts, Body::from(body));
        let Form(form) = Form::<LoginForm>::from_request(request, &())
            .await
            .map_err(|e| ProxyError::BadRequest(format!("invalid login form: {e}")))?;

        let (Some(login), Some(password)) = (form.login, form.password) else {
            return Ok(login_page(StatusCode::OK, target, None));
        };

        let credential = Credential::new(&login, &password);
        let verification = match self.verifier.verify(&credential).await {
            Ok(verification) => verification,
            Err(e) => {
                warn!(error = %e, verifier = self.verifier.name(), "login verification failed");
                return Ok(unavailable_page());
            },
        };

        if !verification.authorized {
            debug!(username = %login, verifier = self.verifier.name(), "login denied");
            return Ok(login_page(
                StatusCode::UNAUTHORIZED,
                target,
                Some("Login failed. Check your username and password."),
            ));
        }

        debug!(username = %login, verifier = self.verifier.name(), "login granted");
        let token = self
            .crypter
            .seal(&login)
            .map_err(|e| ProxyError::Internal(format!("failed to seal session: {e}")))?;
        let cookie = HeaderValue::from_str(&self.set_cookie(&token))
            .map_err(|e| ProxyError::Internal(format!("invalid session cookie: {e}")))?;
        let location = HeaderValue::from_str(target)
            .map_err(|e| ProxyError::BadRequest(format!("invalid redirect target: {e}")))?;

        Ok((
            StatusCode::SEE_OTHER,
            [(header::SET_COOKIE, cookie), (header::LOCATION, location)],
        )
            .into_response())
    }

    fn set_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie.name, token
        );
        if self.cookie.secure {
            cookie.push_str("; Secure");
        }
        if let Some(max_age) = self.cookie.max_age {
            cookie.push_str(&format!("; Max-Age={}", max_age.as_secs()));
        }
        cookie
    }
}

/// Path and query the form posts to and a login redirects to.
///
/// Only a single leading `/` is accepted: `//host` and `/\host` are read by
/// browsers as references to another host and fall back to `/`.
fn login_target(uri: &Uri) -> String {
    match uri.path_and_query().map(|p| p.as_str()) {
        Some(target)
            if target.starts_with('/')
                && !target[1..].starts_with(['/', '\\']) =>
        {
            target.to_string()
        },
        _ => "/".to_string(),
    }
}

fn is_form_post(request: &Request) -> bool {
    request.method() == Method::POST
        && request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| {
                v.split(';')
                    .next()
                    .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
            })
}

/// Values of every cookie named `name` across all `Cookie` headers.
fn cookie_values<'a>(headers: &'a HeaderMap, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(move |pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.trim_matches('"'))
        })
}

fn login_page(status: StatusCode, action: &str, message: Option<&str>) -> Response {
    let message = message
        .map(|m| format!("<p class=\"error\">{}</p>\n", escape_html(m)))
        .unwrap_or_default();
    let page = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Login</title>
</head>
<body>
<h1>Login</h1>
{message}<form method="post" action="{action}">
<p><label>Username <input type="text" name="login" autofocus></label></p>
<p><label>Password <input type="password" name="password"></label></p>
<p><button type="submit">Login</button></p>
</form>
</body>
</html>
"#,
        action = escape_html(action),
    );

    (status, [(header::CACHE_CONTROL, "no-store")], Html(page)).into_response()
}

fn unavailable_page() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::CACHE_CONTROL, "no-store")],
        Html(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Login unavailable</title></head>\n\
             <body><h1>Login unavailable</h1><p>The authentication backend could not be reached. Please try again later.</p></body>\n</html>\n",
        ),
    )
        .into_response()
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}
