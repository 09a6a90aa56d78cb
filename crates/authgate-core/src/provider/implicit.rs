use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{normalize_scopes, AcquireMode, ImplicitSdk, ProviderAdapter};
use crate::credential::{Credential, ProviderId, TokenKind};
use crate::error::{AuthError, ProviderFailure};

/// Provider whose consent UI returns the token to the calling code.
pub struct ImplicitProvider<S> {
    id: ProviderId,
    sdk: S,
    scopes: Vec<String>,
    kind: TokenKind,
    initialized: OnceCell<()>,
}

impl<S: ImplicitSdk> ImplicitProvider<S> {
    /// `kind` must match what the backend's exchange endpoint expects.
    pub fn new<I, T>(id: ProviderId, sdk: S, scopes: I, kind: TokenKind) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            id,
            sdk,
            scopes: normalize_scopes(scopes),
            kind,
            initialized: OnceCell::new(),
        }
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

#[async_trait]
impl<S: ImplicitSdk> ProviderAdapter for ImplicitProvider<S> {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn initialize(&self) -> Result<(), AuthError> {
        self.initialized
            .get_or_try_init(|| async {
                debug!(provider = %self.id, "Initializing provider SDK");
                self.sdk.initialize().await
            })
            .await?;
        Ok(())
    }

    async fn acquire_credential(&self, mode: AcquireMode) -> Result<Credential, AuthError> {
        if mode == AcquireMode::Silent {
            return Err(ProviderFailure::Other(format!(
                "{} requires interactive consent",
                self.id
            ))
            .into());
        }

        self.initialize().await?;
        let token = self.sdk.prompt(&self.scopes, self.kind).await?;
        Ok(Credential::new(self.id, token, self.kind))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Default)]
    struct FakeSdk {
        inits: AtomicUsize,
        prompts: AtomicUsize,
        answer: Option<String>,
    }

    #[async_trait]
    impl ImplicitSdk for Arc<FakeSdk> {
        async fn initialize(&self) -> Result<(), ProviderFailure> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(())
        }

        async fn prompt(&self, scopes: &[String], _kind: TokenKind) -> Result<String, ProviderFailure> {
            assert_eq!(self.inits.load(Ordering::SeqCst), 1, "prompt before initialize");
            assert_eq!(scopes[0], "openid");
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.answer.clone().ok_or(ProviderFailure::UserCancelled)
        }
    }

    fn provider(answer: Option<&str>) -> (Arc<FakeSdk>, ImplicitProvider<Arc<FakeSdk>>) {
        let sdk = Arc::new(FakeSdk {
            answer: answer.map(str::to_string),
            ..Default::default()
        });
        let provider = ImplicitProvider::new(ProviderId::Google, sdk.clone(), ["email"], TokenKind::Id);
        (sdk, provider)
    }

    #[tokio::test]
    async fn test_initialize_runs_once_under_concurrency() {
        let (sdk, provider) = provider(None);

        let (a, b, c) = tokio::join!(provider.initialize(), provider.initialize(), provider.initialize());
        a.unwrap();
        b.unwrap();
        c.unwrap();
        provider.initialize().await.unwrap();

        assert_eq!(sdk.inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquire_returns_credential() {
        let (sdk, provider) = provider(Some("id-token"));

        let cred = provider.acquire_credential(AcquireMode::Interactive).await.unwrap();

        assert_eq!(cred.provider(), ProviderId::Google);
        assert_eq!(cred.kind(), TokenKind::Id);
        assert_eq!(sdk.prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_consent_is_provider_error() {
        let (_, provider) = provider(None);

        let err = provider.acquire_credential(AcquireMode::Interactive).await.unwrap_err();

        assert!(matches!(err, AuthError::Provider(ProviderFailure::UserCancelled)));
    }

    #[tokio::test]
    async fn test_silent_mode_is_rejected_without_prompting() {
        let (sdk, provider) = provider(Some("id-token"));

        let err = provider.acquire_credential(AcquireMode::Silent).await.unwrap_err();

        assert!(matches!(err, AuthError::Provider(ProviderFailure::Other(_))));
        assert_eq!(sdk.prompts.load(Ordering::SeqCst), 0);
    }
}
