//! Terminal stand-in for an in-page consent popup.

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use authgate_core::provider::ImplicitSdk;
use authgate_core::{ProviderFailure, TokenKind};

pub struct PromptImplicitSdk {
    client_id: Option<String>,
    consent_url: String,
}

impl PromptImplicitSdk {
    pub fn new(client_id: Option<String>, consent_url: String) -> Self {
        Self {
            client_id,
            consent_url,
        }
    }

    fn consent_link(&self, client_id: &str, scopes: &[String], kind: TokenKind) -> Result<Url, ProviderFailure> {
        let mut url = Url::parse(&self.consent_url)
            .map_err(|e| ProviderFailure::Other(format!("invalid consent URL: {}", e)))?;
        let response_type = match kind {
            TokenKind::Id => "id_token",
            TokenKind::Access => "token",
        };
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("response_type", response_type)
            .append_pair("scope", &scopes.join(" "))
            .append_pair("redirect_uri", "postmessage");
        Ok(url)
    }
}

#[async_trait]
impl ImplicitSdk for PromptImplicitSdk {
    async fn initialize(&self) -> Result<(), ProviderFailure> {
        match self.client_id {
            Some(_) => Ok(()),
            None => Err(ProviderFailure::Other("no Google client id configured".into())),
        }
    }

    async fn prompt(&self, scopes: &[String], kind: TokenKind) -> Result<String, ProviderFailure> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or_else(|| ProviderFailure::Other("no Google client id configured".into()))?;
        let link = self.consent_link(client_id, scopes, kind)?;

        eprintln!("Sign in with Google:\n  {}\n", link);
        debug!(?kind, "Waiting for token from terminal");

        // rpassword blocks on the terminal
        let answer = tokio::task::spawn_blocking(|| rpassword::prompt_password("Paste the token (empty to cancel): "))
            .await
            .map_err(|e| ProviderFailure::Other(e.to_string()))?
            .map_err(|e| ProviderFailure::Other(format!("failed to read token: {}", e)))?;

        let token = answer.trim();
        if token.is_empty() {
            Err(ProviderFailure::UserCancelled)
        } else {
            Ok(token.to_string())
        }
    }
}
