//! Composition root: wires config, session store, gateway, providers and
//! the orchestrator together.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Notify;
use tracing::{debug, warn};

use authgate_core::provider::{ImplicitProvider, PendingRedirectFile, PendingRedirectOptions, RedirectProvider};
use authgate_core::{
    AuthError, AuthOrchestrator, Config, ProviderAdapter, ProviderId, RedirectAdapter, RedirectResolver,
    SessionGateway, SessionStore,
};

use crate::prompt::PromptImplicitSdk;

pub struct App {
    pub config: Config,
    pub auth: AuthOrchestrator<SessionGateway>,
    google: Option<Arc<ImplicitProvider<PromptImplicitSdk>>>,
    microsoft: Option<Arc<RedirectProvider<PendingRedirectFile>>>,
    /// Signalled when a redirect provider navigates away.
    navigated: Arc<Notify>,
}

impl App {
    /// `location` is the URL this process was started with, if any.
    pub fn new(config: Config, location: Option<String>) -> Result<Self> {
        let gateway = SessionGateway::with_timeout(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let navigated = Arc::new(Notify::new());

        let google = config.google.client_id.as_ref().map(|client_id| {
            let sdk = PromptImplicitSdk::new(Some(client_id.clone()), config.google.consent_url.clone());
            Arc::new(ImplicitProvider::new(
                ProviderId::Google,
                sdk,
                config.google.scopes.clone(),
                config.google.token_kind,
            ))
        });

        let microsoft = match config.microsoft.client_id.as_ref() {
            Some(client_id) => {
                let signal = navigated.clone();
                let sdk = PendingRedirectFile::new(
                    PendingRedirectOptions {
                        provider: ProviderId::Microsoft,
                        authority: config.microsoft.authority.clone(),
                        client_id: client_id.clone(),
                        redirect_uri: config.microsoft.redirect_uri.clone(),
                        cache_dir: config.cache_dir()?,
                        location,
                    },
                    move |url| {
                        println!("Continue sign-in in your browser:\n  {}", url);
                        signal.notify_one();
                    },
                );
                Some(Arc::new(RedirectProvider::new(
                    ProviderId::Microsoft,
                    sdk,
                    config.microsoft.scopes.clone(),
                )))
            }
            None => None,
        };

        let mut redirect_providers: Vec<Arc<dyn RedirectAdapter>> = Vec::new();
        for id in &config.redirect_priority {
            match (id, &microsoft) {
                (ProviderId::Microsoft, Some(provider)) => redirect_providers.push(provider.clone()),
                (ProviderId::Microsoft, None) => debug!("Microsoft not configured; skipping redirect check"),
                (ProviderId::Google, _) => warn!("Google sign-in does not use redirects; ignoring in redirect_priority"),
            }
        }

        let auth = AuthOrchestrator::new(gateway, RedirectResolver::new(redirect_providers), SessionStore::new());

        Ok(Self {
            config,
            auth,
            google,
            microsoft,
            navigated,
        })
    }

    pub fn provider(&self, id: ProviderId) -> Result<Arc<dyn ProviderAdapter>, AuthError> {
        let provider: Option<Arc<dyn ProviderAdapter>> = match id {
            ProviderId::Google => self.google.clone().map(|p| p as Arc<dyn ProviderAdapter>),
            ProviderId::Microsoft => self.microsoft.clone().map(|p| p as Arc<dyn ProviderAdapter>),
        };
        provider.ok_or(AuthError::ProviderNotConfigured(id))
    }

    /// Resolves once a redirect provider has handed the browser its URL.
    pub async fn navigated(&self) {
        self.navigated.notified().await
    }
}
