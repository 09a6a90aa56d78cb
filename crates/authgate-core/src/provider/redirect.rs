use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{normalize_scopes, AcquireMode, ProviderAdapter, RedirectAdapter, RedirectSdk};
use crate::credential::{Credential, ProviderId, TokenKind};
use crate::error::{AuthError, ProviderFailure};

/// Provider whose sign-in navigates away from the application.
///
/// An interactive acquisition never resolves in the current process; the
/// credential shows up through `drain_pending_redirect` after the restart.
pub struct RedirectProvider<S> {
    id: ProviderId,
    sdk: S,
    scopes: Vec<String>,
    initialized: OnceCell<()>,
}

impl<S: RedirectSdk> RedirectProvider<S> {
    pub fn new<I, T>(id: ProviderId, sdk: S, scopes: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            id,
            sdk,
            scopes: normalize_scopes(scopes),
            initialized: OnceCell::new(),
        }
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

#[async_trait]
impl<S: RedirectSdk> ProviderAdapter for RedirectProvider<S> {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn initialize(&self) -> Result<(), AuthError> {
        self.initialized
            .get_or_try_init(|| async {
                debug!(provider = %self.id, "Initializing redirect SDK");
                self.sdk.initialize().await
            })
            .await?;
        Ok(())
    }

    async fn acquire_credential(&self, mode: AcquireMode) -> Result<Credential, AuthError> {
        self.initialize().await?;

        match mode {
            AcquireMode::Interactive => {
                self.sdk.begin_redirect(&self.scopes).await?;
                info!(provider = %self.id, "Navigated to provider; sign-in completes after restart");
                futures::future::pending().await
            }
            AcquireMode::Silent => self
                .drain_pending_redirect()
                .await?
                .ok_or_else(|| ProviderFailure::Other("no redirect response pending".into()).into()),
        }
    }
}

#[async_trait]
impl<S: RedirectSdk> RedirectAdapter for RedirectProvider<S> {
    async fn drain_pending_redirect(&self) -> Result<Option<Credential>, AuthError> {
        self.initialize()
            .await
            .map_err(|e| AuthError::Redirect(e.to_string()))?;

        let token = self
            .sdk
            .process_redirect()
            .await
            .map_err(|e| AuthError::Redirect(e.to_string()))?;

        Ok(token.map(|token| Credential::new(self.id, token, TokenKind::Access)))
    }
}
