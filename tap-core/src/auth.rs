//! Authentication and REST collaborators.
//!
//! The server issues bearer tokens from a password login; the token is
//! then carried on both WebSocket connections (query parameter) and on
//! REST calls (Authorization header). Responses are parsed by pure
//! helpers so the protocol handling is testable without a server.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

// ── AuthError ────────────────────────────────────────────────────

/// Typed failure for auth and REST exchanges. Always carries a
/// human-readable reason; never panics through.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server refused the request (wrong password, expired token,
    /// lockout). The string is the server's reason.
    #[error("{0}")]
    Rejected(String),

    /// No password is configured yet; `setup` must run first.
    #[error("server has no password configured, setup required")]
    SetupRequired,

    #[error("malformed server response: {0}")]
    Malformed(String),
}

// ── Response shapes ──────────────────────────────────────────────

/// `GET /api/auth/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub setup_required: bool,
}

/// One entry of `GET /api/monitors`. Index 0 is the combined desktop
/// spanning all outputs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MonitorInfo {
    pub index: u32,
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub is_combined: bool,
}

/// `GET /api/system`.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub os: String,
    #[serde(default)]
    pub desktop: String,
    #[serde(default)]
    pub display_server: String,
    #[serde(default)]
    pub monitors: Vec<MonitorInfo>,
    #[serde(default)]
    pub uptime: String,
    #[serde(default)]
    pub server_version: String,
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    status: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

// ── TokenStore ───────────────────────────────────────────────────

/// Persistence collaborator for the auth token. Implementations own
/// their failure handling; a load that fails simply yields no token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn store(&self, token: &str);
    fn clear(&self);
}

// ── AuthClient ───────────────────────────────────────────────────

/// REST client for the auth service and the small read-only system
/// endpoints.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    /// `http(s)://host:port`, no trailing slash.
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Whether a token is currently accepted and whether first-run
    /// setup is needed.
    pub async fn status(&self, token: Option<&str>) -> Result<AuthStatus, AuthError> {
        let mut req = self.http.get(format!("{}/api/auth/status", self.base_url));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AuthError::Rejected(detail_of(status, &body)));
        }
        serde_json::from_str(&body).map_err(|e| AuthError::Malformed(e.to_string()))
    }

    /// First-run password configuration.
    pub async fn setup(&self, password: &str) -> Result<(), AuthError> {
        let resp = self
            .http
            .post(format!("{}/api/auth/setup", self.base_url))
            .json(&json!({ "password": password }))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if status.is_success() {
            debug!("password configured");
            Ok(())
        } else {
            Err(AuthError::Rejected(detail_of(status, &body)))
        }
    }

    /// Exchange the password for a bearer token.
    pub async fn login(&self, password: &str) -> Result<String, AuthError> {
        let resp = self
            .http
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&json!({ "password": password }))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        parse_login(status, &body)
    }

    pub async fn system_info(&self, token: &str) -> Result<SystemInfo, AuthError> {
        self.get_json(token, "/api/system").await
    }

    pub async fn monitors(&self, token: &str) -> Result<Vec<MonitorInfo>, AuthError> {
        #[derive(Deserialize)]
        struct Monitors {
            monitors: Vec<MonitorInfo>,
        }
        let wrapped: Monitors = self.get_json(token, "/api/monitors").await?;
        Ok(wrapped.monitors)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
    ) -> Result<T, AuthError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AuthError::Rejected(detail_of(status, &body)));
        }
        serde_json::from_str(&body).map_err(|e| AuthError::Malformed(e.to_string()))
    }
}

// ── Response parsing ─────────────────────────────────────────────

fn parse_login(status: StatusCode, body: &str) -> Result<String, AuthError> {
    if !status.is_success() {
        return Err(AuthError::Rejected(detail_of(status, body)));
    }
    let parsed: LoginBody =
        serde_json::from_str(body).map_err(|e| AuthError::Malformed(e.to_string()))?;
    match (parsed.status.as_str(), parsed.token) {
        ("ok", Some(token)) => Ok(token),
        ("setup_required", _) => Err(AuthError::SetupRequired),
        _ => Err(AuthError::Malformed(format!(
            "unexpected login status {:?}",
            parsed.status
        ))),
    }
}

/// Best-effort extraction of the server's `detail` message; falls
/// back to the HTTP status line.
fn detail_of(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => err.detail,
        Err(_) => format!(
            "HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        ),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_success_yields_token() {
        let token = parse_login(
            StatusCode::OK,
            r#"{"status":"ok","token":"abc.def.ghi"}"#,
        )
        .unwrap();
        assert_eq!(token, "abc.def.ghi");
    }

    #[test]
    fn login_on_fresh_server_requires_setup() {
        let err = parse_login(
            StatusCode::OK,
            r#"{"status":"setup_required","message":"No password configured"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::SetupRequired));
    }

    #[test]
    fn login_rejection_carries_server_detail() {
        let err = parse_login(
            StatusCode::UNAUTHORIZED,
            r#"{"detail":"Invalid password"}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid password");
    }

    #[test]
    fn lockout_detail_is_surfaced() {
        let err = parse_login(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"detail":"Too many attempts. Try again in 240 seconds."}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("240 seconds"));
    }

    #[test]
    fn unparseable_error_body_falls_back_to_status_line() {
        let msg = detail_of(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert_eq!(msg, "HTTP 502 Bad Gateway");
    }

    #[test]
    fn malformed_login_body_is_typed() {
        let err = parse_login(StatusCode::OK, r#"{"status":"ok"}"#).unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[test]
    fn status_and_monitor_payloads_deserialize() {
        let status: AuthStatus =
            serde_json::from_str(r#"{"authenticated":false,"setup_required":true}"#).unwrap();
        assert!(status.setup_required);

        let info: SystemInfo = serde_json::from_str(
            r#"{
                "hostname":"desk","os":"Linux 6.8","desktop":"GNOME",
                "display_server":"wayland","uptime":"4h 2m","server_version":"0.1.0",
                "monitors":[
                    {"index":0,"left":0,"top":0,"width":3840,"height":1080,"is_combined":true},
                    {"index":1,"left":0,"top":0,"width":1920,"height":1080}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(info.monitors.len(), 2);
        assert!(info.monitors[0].is_combined);
        assert!(!info.monitors[1].is_combined);
    }
}
