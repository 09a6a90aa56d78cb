//! File-backed redirect SDK.
//!
//! Stands in for a browser SDK's persisted storage: `begin_redirect` writes
//! the pending sign-in to disk and hands the authorization URL to a
//! navigator; on the next start, `process_redirect` reads the response from
//! the location the process was started with.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::RedirectSdk;
use crate::credential::ProviderId;
use crate::error::ProviderFailure;

/// Pending state file name in cache directory
const PENDING_FILE: &str = "pending_redirect.json";

/// A redirect response older than this is rejected.
const PENDING_EXPIRY_MINUTES: i64 = 10;

/// Path appended to the authority for the authorization endpoint
const AUTHORIZE_PATH: &str = "oauth2/v2.0/authorize";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingState {
    state: String,
    provider: ProviderId,
    created_at: DateTime<Utc>,
}

impl PendingState {
    fn is_expired(&self) -> bool {
        Utc::now() > self.created_at + Duration::minutes(PENDING_EXPIRY_MINUTES)
    }
}

type Navigator = Box<dyn Fn(&Url) + Send + Sync>;

pub struct PendingRedirectOptions {
    pub provider: ProviderId,
    pub authority: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub cache_dir: PathBuf,
    /// URL the process was started with, if any.
    pub location: Option<String>,
}

pub struct PendingRedirectFile {
    provider: ProviderId,
    authority: String,
    client_id: String,
    redirect_uri: String,
    cache_dir: PathBuf,
    location: Option<String>,
    navigator: Navigator,
}

impl PendingRedirectFile {
    pub fn new<F>(options: PendingRedirectOptions, navigator: F) -> Self
    where
        F: Fn(&Url) + Send + Sync + 'static,
    {
        Self {
            provider: options.provider,
            authority: options.authority,
            client_id: options.client_id,
            redirect_uri: options.redirect_uri,
            cache_dir: options.cache_dir,
            location: options.location,
            navigator: Box::new(navigator),
        }
    }

    fn pending_path(&self) -> PathBuf {
        self.cache_dir.join(PENDING_FILE)
    }

    fn authorize_url(&self, scopes: &[String], state: &str) -> Result<Url, ProviderFailure> {
        let base = format!("{}/{}", self.authority.trim_end_matches('/'), AUTHORIZE_PATH);
        let mut url = Url::parse(&base)
            .map_err(|e| ProviderFailure::Other(format!("invalid authority {}: {}", self.authority, e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "token")
            .append_pair("response_mode", "fragment")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &scopes.join(" "))
            .append_pair("state", state);
        Ok(url)
    }

    fn load_pending(path: &Path) -> Result<Option<PendingState>, ProviderFailure> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ProviderFailure::Other(format!("failed to read pending redirect: {}", e)))?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| ProviderFailure::Malformed(format!("unreadable pending redirect: {}", e)))
    }

    fn clear_pending(path: &Path) {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(error = %e, "Failed to remove pending redirect state");
            }
        }
    }

    /// Redirect response parameters carried in the location's fragment, if any.
    fn response_params(&self) -> Result<Option<HashMap<String, String>>, ProviderFailure> {
        let Some(location) = self.location.as_deref() else {
            return Ok(None);
        };
        let url = Url::parse(location)
            .map_err(|e| ProviderFailure::Malformed(format!("invalid location: {}", e)))?;
        let Some(fragment) = url.fragment() else {
            return Ok(None);
        };

        let params: HashMap<String, String> = url::form_urlencoded::parse(fragment.as_bytes())
            .into_owned()
            .collect();
        let is_response = ["access_token", "error", "state"]
            .iter()
            .any(|key| params.contains_key(*key));
        Ok(is_response.then_some(params))
    }
}

fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait]
impl RedirectSdk for PendingRedirectFile {
    async fn initialize(&self) -> Result<(), ProviderFailure> {
        std::fs::create_dir_all(&self.cache_dir)
            .map_err(|e| ProviderFailure::Other(format!("failed to create {}: {}", self.cache_dir.display(), e)))
    }

    async fn begin_redirect(&self, scopes: &[String]) -> Result<(), ProviderFailure> {
        let pending = PendingState {
            state: generate_state(),
            provider: self.provider,
            created_at: Utc::now(),
        };
        let url = self.authorize_url(scopes, &pending.state)?;

        let contents = serde_json::to_string_pretty(&pending)
            .map_err(|e| ProviderFailure::Other(e.to_string()))?;
        std::fs::write(self.pending_path(), contents)
            .map_err(|e| ProviderFailure::Other(format!("failed to persist pending redirect: {}", e)))?;

        debug!(provider = %self.provider, "Pending redirect persisted");
        (self.navigator)(&url);
        Ok(())
    }

    async fn process_redirect(&self) -> Result<Option<String>, ProviderFailure> {
        let Some(params) = self.response_params()? else {
            return Ok(None);
        };

        let path = self.pending_path();
        let pending = Self::load_pending(&path);
        Self::clear_pending(&path);
        let pending = pending?.ok_or_else(|| ProviderFailure::Malformed("no sign-in in progress".into()))?;

        if pending.provider != self.provider {
            return Err(ProviderFailure::Malformed(format!(
                "pending sign-in belongs to {}",
                pending.provider
            )));
        }

        if let Some(error) = params.get("error") {
            if error == "access_denied" {
                return Err(ProviderFailure::UserCancelled);
            }
            let description = params.get("error_description").map(String::as_str).unwrap_or("");
            return Err(ProviderFailure::Malformed(format!("{}: {}", error, description)));
        }

        if params.get("state").map(String::as_str) != Some(pending.state.as_str()) {
            return Err(ProviderFailure::Malformed("state mismatch".into()));
        }

        if pending.is_expired() {
            return Err(ProviderFailure::Expired);
        }

        params
            .get("access_token")
            .filter(|t| !t.is_empty())
            .cloned()
            .map(Some)
            .ok_or_else(|| ProviderFailure::Malformed("missing access_token".into()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn file_sdk(dir: &Path, location: Option<String>) -> (PendingRedirectFile, Arc<Mutex<Vec<Url>>>) {
        let visited = Arc::new(Mutex::new(Vec::new()));
        let sink = visited.clone();
        let sdk = PendingRedirectFile::new(
            PendingRedirectOptions {
                provider: ProviderId::Microsoft,
                authority: "https://login.microsoftonline.com/common".into(),
                client_id: "client-123".into(),
                redirect_uri: "http://localhost:5173".into(),
                cache_dir: dir.to_path_buf(),
                location,
            },
            move |url| sink.lock().unwrap().push(url.clone()),
        );
        (sdk, visited)
    }

    /// Start a sign-in and return the state the navigator was sent with.
    async fn begin(dir: &Path) -> String {
        let (sdk, visited) = file_sdk(dir, None);
        sdk.initialize().await.unwrap();
        sdk.begin_redirect(&["openid".to_string(), "User.Read".to_string()]).await.unwrap();

        let url = visited.lock().unwrap()[0].clone();
        assert!(url.as_str().starts_with("https://login.microsoftonline.com/common/oauth2/v2.0/authorize?"));
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], "client-123");
        assert_eq!(query["response_type"], "token");
        assert_eq!(query["scope"], "openid User.Read");
        query["state"].clone()
    }

    #[tokio::test]
    async fn test_fresh_load_without_location() {
        let dir = tempfile::tempdir().unwrap();
        let (sdk, _) = file_sdk(dir.path(), None);
        assert_eq!(sdk.process_redirect().await.unwrap(), None);

        let (sdk, _) = file_sdk(dir.path(), Some("http://localhost:5173/dashboard".into()));
        assert_eq!(sdk.process_redirect().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_completed_redirect_yields_token_once() {
        let dir = tempfile::tempdir().unwrap();
        let state = begin(dir.path()).await;
        assert!(dir.path().join(PENDING_FILE).exists());

        let location = format!("http://localhost:5173/#access_token=tok%2B1&token_type=Bearer&state={}", state);
        let (sdk, _) = file_sdk(dir.path(), Some(location));

        assert_eq!(sdk.process_redirect().await.unwrap(), Some("tok+1".to_string()));
        assert!(!dir.path().join(PENDING_FILE).exists());

        // Replaying the same location after the state is consumed fails
        assert!(matches!(sdk.process_redirect().await, Err(ProviderFailure::Malformed(_))));
    }

    #[tokio::test]
    async fn test_state_mismatch_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        begin(dir.path()).await;

        let (sdk, _) = file_sdk(dir.path(), Some("http://localhost:5173/#access_token=tok&state=forged".into()));

        assert_eq!(
            sdk.process_redirect().await,
            Err(ProviderFailure::Malformed("state mismatch".into()))
        );
        assert!(!dir.path().join(PENDING_FILE).exists());
    }

    #[tokio::test]
    async fn test_access_denied_is_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        begin(dir.path()).await;

        let (sdk, _) = file_sdk(
            dir.path(),
            Some("http://localhost:5173/#error=access_denied&error_description=denied".into()),
        );

        assert_eq!(sdk.process_redirect().await, Err(ProviderFailure::UserCancelled));
    }

    #[tokio::test]
    async fn test_expired_pending_state() {
        let dir = tempfile::tempdir().unwrap();
        let pending = PendingState {
            state: "abc".into(),
            provider: ProviderId::Microsoft,
            created_at: Utc::now() - Duration::minutes(PENDING_EXPIRY_MINUTES + 1),
        };
        std::fs::write(dir.path().join(PENDING_FILE), serde_json::to_string(&pending).unwrap()).unwrap();

        let (sdk, _) = file_sdk(dir.path(), Some("http://localhost:5173/#access_token=tok&state=abc".into()));

        assert_eq!(sdk.process_redirect().await, Err(ProviderFailure::Expired));
    }

    #[test]
    fn test_generate_state_is_random_hex() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
