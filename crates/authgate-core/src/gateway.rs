//! HTTP client for the backend's session endpoints.
//!
//! The backend keeps the session in an HttpOnly cookie. This client never
//! looks at it; reqwest's cookie store round-trips it and `/auth/verify`'s
//! status code is the only signal read back.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::credential::Credential;
use crate::error::AuthError;

/// Default backend when none is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
/// A hung backend degrades to "not authenticated" instead of stalling startup.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

const VERIFY_PATH: &str = "/auth/verify";
const LOGOUT_PATH: &str = "/auth/logout";

/// Backend session operations the orchestrator depends on.
///
/// Calls are idempotent at the network layer and never retried internally.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Trade a provider credential for a session cookie.
    async fn exchange_credential(&self, credential: Credential) -> Result<(), AuthError>;

    /// True only on a 2xx from the verify endpoint; any failure is false.
    async fn verify(&self) -> bool;

    async fn end_session(&self) -> Result<(), AuthError>;
}

/// Backend client. Clone is cheap and shares the cookie jar.
#[derive(Clone)]
pub struct SessionGateway {
    client: Client,
    base_url: String,
}

impl SessionGateway {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        url::Url::parse(base_url).with_context(|| format!("Invalid API base URL: {}", base_url))?;

        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SessionBackend for SessionGateway {
    async fn exchange_credential(&self, credential: Credential) -> Result<(), AuthError> {
        let url = self.url(credential.provider().exchange_path());
        debug!(url = %url, credential = ?credential, "Exchanging credential");

        let response = self
            .client
            .post(&url)
            .json(&credential.into_exchange_body())
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(AuthError::exchange_rejected(status, &body))
        }
    }

    async fn verify(&self) -> bool {
        match self.client.get(self.url(VERIFY_PATH)).send().await {
            Ok(response) => {
                debug!(status = %response.status(), "Session verify response");
                response.status().is_success()
            }
            Err(e) => {
                warn!(error = %e, "Session verify failed; treating as not authenticated");
                false
            }
        }
    }

    async fn end_session(&self) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.url(LOGOUT_PATH))
            .send()
            .await
            .map_err(|e| AuthError::LogoutFailed(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(AuthError::LogoutFailed(format!(
                "status {}: {}",
                status,
                AuthError::truncate_body(&body)
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;
    use crate::credential::{ProviderId, TokenKind};

    #[derive(Clone, Default)]
    struct Backend {
        exchanged: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
    }

    fn has_session(headers: &HeaderMap) -> bool {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.split(';').any(|c| c.trim() == "token=valid"))
    }

    async fn exchange_google(State(backend): State<Backend>, Json(body): Json<serde_json::Value>) -> impl IntoResponse {
        backend.exchanged.lock().unwrap().push(("google".into(), body.clone()));
        if body.get("token").and_then(|t| t.as_str()) == Some("bad") {
            return (StatusCode::UNAUTHORIZED, "Invalid Google token").into_response();
        }
        ([(header::SET_COOKIE, "token=valid; HttpOnly; Path=/")], "{}").into_response()
    }

    async fn exchange_microsoft(State(backend): State<Backend>, Json(body): Json<serde_json::Value>) -> impl IntoResponse {
        backend.exchanged.lock().unwrap().push(("microsoft".into(), body));
        StatusCode::INTERNAL_SERVER_ERROR
    }

    async fn verify(headers: HeaderMap) -> StatusCode {
        if has_session(&headers) {
            StatusCode::OK
        } else {
            StatusCode::UNAUTHORIZED
        }
    }

    async fn logout() -> impl IntoResponse {
        ([(header::SET_COOKIE, "token=; HttpOnly; Path=/; Max-Age=0")], "{}")
    }

    async fn serve() -> (String, Backend) {
        let backend = Backend::default();
        let app = Router::new()
            .route("/auth/google", post(exchange_google))
            .route("/auth/microsoft", post(exchange_microsoft))
            .route("/auth/verify", get(verify))
            .route("/auth/logout", post(logout))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), backend)
    }

    /// Base URL of a port nothing listens on.
    async fn closed_port() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_session_cookie_round_trip() {
        let (base, backend) = serve().await;
        let gateway = SessionGateway::new(&base).unwrap();

        assert!(!gateway.verify().await);

        gateway
            .exchange_credential(Credential::new(ProviderId::Google, "id-token", TokenKind::Id))
            .await
            .unwrap();
        assert!(gateway.verify().await);

        gateway.end_session().await.unwrap();
        assert!(!gateway.verify().await);

        let exchanged = backend.exchanged.lock().unwrap();
        assert_eq!(exchanged.len(), 1);
        assert_eq!(exchanged[0].1, serde_json::json!({ "token": "id-token" }));
    }

    #[tokio::test]
    async fn test_exchange_rejected_carries_status_and_body() {
        let (base, _) = serve().await;
        let gateway = SessionGateway::new(&base).unwrap();

        let err = gateway
            .exchange_credential(Credential::new(ProviderId::Google, "bad", TokenKind::Id))
            .await
            .unwrap_err();

        match err {
            AuthError::ExchangeRejected { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Invalid Google token");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!gateway.verify().await);
    }

    #[tokio::test]
    async fn test_microsoft_exchange_uses_its_endpoint() {
        let (base, backend) = serve().await;
        let gateway = SessionGateway::new(&format!("{}/", base)).unwrap();

        let err = gateway
            .exchange_credential(Credential::new(ProviderId::Microsoft, "ms-token", TokenKind::Access))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::ExchangeRejected { status: 500, .. }));
        let exchanged = backend.exchanged.lock().unwrap();
        assert_eq!(exchanged[0].0, "microsoft");
        assert_eq!(exchanged[0].1, serde_json::json!({ "access_token": "ms-token" }));
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_closed() {
        let gateway = SessionGateway::new(&closed_port().await).unwrap();

        assert!(!gateway.verify().await);
        assert!(matches!(gateway.end_session().await, Err(AuthError::LogoutFailed(_))));
        assert!(matches!(
            gateway
                .exchange_credential(Credential::new(ProviderId::Google, "t", TokenKind::Access))
                .await,
            Err(AuthError::Network(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(SessionGateway::new("not a url").is_err());
        assert_eq!(SessionGateway::new("http://localhost:8000/").unwrap().base_url(), DEFAULT_BASE_URL);
    }
}
