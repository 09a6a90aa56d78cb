//! Application configuration management.
//!
//! Configuration is stored at `~/.config/authgate/config.json`, with
//! environment variables layered on top. Missing files yield defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::credential::{ProviderId, TokenKind};
use crate::gateway::{DEFAULT_BASE_URL, REQUEST_TIMEOUT_SECS};
use crate::provider::normalize_scopes;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "authgate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_API_BASE_URL: &str = "AUTHGATE_API_BASE_URL";
const ENV_GOOGLE_CLIENT_ID: &str = "AUTHGATE_GOOGLE_CLIENT_ID";
const ENV_MICROSOFT_CLIENT_ID: &str = "AUTHGATE_MICROSOFT_CLIENT_ID";
const ENV_MICROSOFT_REDIRECT_URI: &str = "AUTHGATE_MICROSOFT_REDIRECT_URI";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub scopes: Vec<String>,
    /// Which token the backend's `/auth/google` endpoint expects.
    pub token_kind: TokenKind,
    pub consent_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            scopes: vec!["openid".into(), "email".into(), "profile".into()],
            token_kind: TokenKind::Id,
            consent_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MicrosoftConfig {
    pub client_id: Option<String>,
    pub authority: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl Default for MicrosoftConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            authority: "https://login.microsoftonline.com/common".into(),
            redirect_uri: "http://localhost:5173".into(),
            scopes: ["openid", "profile", "email", "User.Read", "Mail.Read"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub google: GoogleConfig,
    pub microsoft: MicrosoftConfig,
    /// Redirect providers drained at startup, highest priority first.
    pub redirect_priority: Vec<ProviderId>,
    /// Overrides the platform cache directory for pending redirect state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.into(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            google: GoogleConfig::default(),
            microsoft: MicrosoftConfig::default(),
            redirect_priority: vec![ProviderId::Microsoft],
            cache_dir: None,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config.validated())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in practice).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(id) = lookup(ENV_GOOGLE_CLIENT_ID) {
            self.google.client_id = Some(id);
        }
        if let Some(id) = lookup(ENV_MICROSOFT_CLIENT_ID) {
            self.microsoft.client_id = Some(id);
        }
        if let Some(uri) = lookup(ENV_MICROSOFT_REDIRECT_URI) {
            self.microsoft.redirect_uri = uri;
        }
    }

    /// Normalize scopes and drop duplicate priorities.
    pub fn validated(mut self) -> Self {
        self.google.scopes = normalize_scopes(std::mem::take(&mut self.google.scopes));
        self.microsoft.scopes = normalize_scopes(std::mem::take(&mut self.microsoft.scopes));

        let mut seen = Vec::new();
        self.redirect_priority.retain(|p| {
            let first = !seen.contains(p);
            seen.push(*p);
            first
        });
        self
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
