//! Authentication state machine.
//!
//! Runs `Resolving -> Exchanging -> Verifying -> Ready` once at startup, then
//! re-enters at `Exchanging` for `login` and at `Verifying` for `logout`.
//! Every run ends in exactly one `SessionStore` publish.
//!
//! Failure policy:
//! - startup: a rejected exchange is recorded and verification still runs,
//!   since a cookie from an earlier exchange may be valid.
//! - login: a rejected exchange aborts and republishes the current verdict,
//!   and a verify that disagrees with a successful exchange is
//!   `VerificationInconsistency`.
//! - logout: the local belief is cleared whatever the backend says.

use tokio::sync::{watch, Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::credential::{Credential, ProviderId};
use crate::error::AuthError;
use crate::gateway::SessionBackend;
use crate::provider::{AcquireMode, ProviderAdapter};
use crate::resolver::RedirectResolver;
use crate::session::{Session, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Uninitialized,
    Resolving,
    Exchanging,
    Verifying,
    Ready { logged_in: bool },
}

/// What the startup run observed, beyond the published session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    pub session: Session,
    pub redirect_provider: Option<ProviderId>,
    /// Set when a redirect credential was rejected by the backend.
    pub exchange_error: Option<String>,
}

pub struct AuthOrchestrator<B> {
    backend: B,
    resolver: RedirectResolver,
    store: SessionStore,
    phase: watch::Sender<AuthPhase>,
    startup: OnceCell<StartupReport>,
    /// Serializes every run that publishes.
    in_flight: Mutex<()>,
}

impl<B: SessionBackend> AuthOrchestrator<B> {
    pub fn new(backend: B, resolver: RedirectResolver, store: SessionStore) -> Self {
        let (phase, _rx) = watch::channel(AuthPhase::Uninitialized);
        Self {
            backend,
            resolver,
            store,
            phase,
            startup: OnceCell::new(),
            in_flight: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Redirect providers checked at startup, in priority order.
    pub fn resolver(&self) -> &RedirectResolver {
        &self.resolver
    }

    pub fn phase(&self) -> AuthPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<AuthPhase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: AuthPhase) {
        debug!(?phase, "Auth phase");
        self.phase.send_replace(phase);
    }

    fn finish(&self, session: Session) -> Session {
        self.store.publish(session);
        self.enter(AuthPhase::Ready {
            logged_in: session.logged_in,
        });
        session
    }

    /// Run the startup sequence once.
    ///
    /// Concurrent and repeated callers share the first run's outcome; the
    /// network is only touched by that first run.
    pub async fn start(&self) -> Session {
        self.start_report().await.session
    }

    pub async fn start_report(&self) -> StartupReport {
        self.startup.get_or_init(|| self.run_startup()).await.clone()
    }

    async fn run_startup(&self) -> StartupReport {
        let _guard = self.in_flight.lock().await;

        self.enter(AuthPhase::Resolving);
        let credential = self.resolver.resolve().await;
        let redirect_provider = credential.as_ref().map(Credential::provider);

        let mut exchange_error = None;
        if let Some(credential) = credential {
            self.enter(AuthPhase::Exchanging);
            if let Err(e) = self.backend.exchange_credential(credential).await {
                warn!(error = %e, "Redirect credential exchange failed; verifying existing session");
                exchange_error = Some(e.to_string());
            }
        }

        self.enter(AuthPhase::Verifying);
        let logged_in = self.backend.verify().await;
        let session = self.finish(Session::checked(logged_in));
        info!(logged_in, "Startup authentication check complete");

        StartupReport {
            session,
            redirect_provider,
            exchange_error,
        }
    }

    /// Exchange an interactively acquired credential and verify the result.
    ///
    /// Waits for the startup run first, so a login never races it.
    pub async fn login(&self, provider: ProviderId, credential: Credential) -> Result<Session, AuthError> {
        if credential.provider() != provider {
            return Err(AuthError::ProviderMismatch {
                expected: provider,
                actual: credential.provider(),
            });
        }

        self.start().await;
        let _guard = self.in_flight.lock().await;

        self.enter(AuthPhase::Exchanging);
        if let Err(e) = self.backend.exchange_credential(credential).await {
            warn!(provider = %provider, error = %e, "Login exchange rejected");
            // The existing cookie is untouched by a rejected exchange
            self.finish(Session::checked(self.store.read().logged_in));
            return Err(e);
        }

        self.enter(AuthPhase::Verifying);
        if self.backend.verify().await {
            info!(provider = %provider, "Logged in");
            Ok(self.finish(Session::checked(true)))
        } else {
            warn!(provider = %provider, "Exchange succeeded but the session did not verify");
            self.finish(Session::checked(false));
            Err(AuthError::VerificationInconsistency)
        }
    }

    /// Acquire a credential from `provider` interactively, then `login`.
    ///
    /// Provider failures are returned without touching the session. For a
    /// redirect provider this navigates away and does not return.
    pub async fn sign_in(&self, provider: &dyn ProviderAdapter) -> Result<Session, AuthError> {
        provider.initialize().await?;
        let credential = provider.acquire_credential(AcquireMode::Interactive).await?;
        self.login(provider.id(), credential).await
    }

    /// End the backend session and clear the local belief.
    ///
    /// The session is `{logged_in: false, auth_checked: true}` afterwards
    /// even when this returns `LogoutFailed`.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.start().await;
        let _guard = self.in_flight.lock().await;

        self.enter(AuthPhase::Verifying);
        let outcome = self.backend.end_session().await;
        if let Err(ref e) = outcome {
            warn!(error = %e, "Logout request failed; clearing local session anyway");
        }

        self.finish(Session::checked(false));
        info!("Logged out");
        outcome
    }
}
