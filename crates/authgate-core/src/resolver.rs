use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::credential::{Credential, ProviderId};
use crate::provider::RedirectAdapter;

/// Drains pending redirect results at process start.
///
/// Providers are asked in priority order and the first credential wins.
/// Every provider is still drained so each SDK clears its own pending state.
/// Errors never escape: a broken redirect degrades to "no credential".
#[derive(Clone, Default)]
pub struct RedirectResolver {
    providers: Vec<Arc<dyn RedirectAdapter>>,
}

impl RedirectResolver {
    pub fn new(providers: Vec<Arc<dyn RedirectAdapter>>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.providers.iter().map(|p| p.id())
    }

    pub async fn resolve(&self) -> Option<Credential> {
        let mut resolved: Option<Credential> = None;

        for provider in &self.providers {
            let id = provider.id();

            // Draining before initialize is undefined in provider SDKs
            if let Err(e) = provider.initialize().await {
                warn!(provider = %id, error = %e, "Redirect provider failed to initialize");
                continue;
            }

            match provider.drain_pending_redirect().await {
                Ok(Some(credential)) if resolved.is_none() => {
                    info!(provider = %id, "Redirect sign-in completed");
                    resolved = Some(credential);
                }
                Ok(Some(_)) => {
                    warn!(provider = %id, "Discarding redirect credential; a higher priority provider already resolved");
                }
                Ok(None) => debug!(provider = %id, "No redirect in flight"),
                Err(e) => warn!(provider = %id, error = %e, "Ignoring failed redirect"),
            }
        }

        resolved
    }
}
