//! Identity provider adapters.
//!
//! Two structurally different flows sit behind one capability interface:
//! - `ImplicitProvider`: the SDK hands a token back in-process.
//! - `RedirectProvider`: the SDK navigates away; the token is only observable
//!   after the next process start, through `drain_pending_redirect`.
//!
//! The SDKs themselves are external and reached through `ImplicitSdk` and
//! `RedirectSdk`. `pending::PendingRedirectFile` is a redirect SDK that keeps
//! its state on disk across the navigation boundary.

pub mod implicit;
pub mod pending;
pub mod redirect;

use async_trait::async_trait;

use crate::credential::{Credential, ProviderId, TokenKind};
use crate::error::{AuthError, ProviderFailure};

pub use implicit::ImplicitProvider;
pub use pending::{PendingRedirectFile, PendingRedirectOptions};
pub use redirect::RedirectProvider;

/// Scope every provider request must carry.
pub const OPENID_SCOPE: &str = "openid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// Show the provider's consent UI.
    Interactive,
    /// Use whatever the provider already holds, without UI.
    Silent,
}

/// Capability interface shared by every provider flow.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    /// One-time SDK setup. Safe to call repeatedly and concurrently.
    async fn initialize(&self) -> Result<(), AuthError>;

    async fn acquire_credential(&self, mode: AcquireMode) -> Result<Credential, AuthError>;
}

/// Providers whose flow completes across a page navigation.
#[async_trait]
pub trait RedirectAdapter: ProviderAdapter {
    /// Drain a redirect completed before this process started.
    ///
    /// `Ok(None)` on a normal load with no redirect in flight.
    async fn drain_pending_redirect(&self) -> Result<Option<Credential>, AuthError>;
}

/// SDK boundary for providers that return tokens in-process.
#[async_trait]
pub trait ImplicitSdk: Send + Sync {
    async fn initialize(&self) -> Result<(), ProviderFailure>;

    /// Run the provider's consent UI and return the raw token.
    async fn prompt(&self, scopes: &[String], kind: TokenKind) -> Result<String, ProviderFailure>;
}

/// SDK boundary for providers that complete through a navigation.
#[async_trait]
pub trait RedirectSdk: Send + Sync {
    async fn initialize(&self) -> Result<(), ProviderFailure>;

    /// Persist whatever the SDK needs and navigate to the provider.
    async fn begin_redirect(&self, scopes: &[String]) -> Result<(), ProviderFailure>;

    /// Inspect the current location for a completed redirect.
    async fn process_redirect(&self) -> Result<Option<String>, ProviderFailure>;
}

/// Deduplicate scopes, keeping order, and make sure `openid` is present.
pub fn normalize_scopes<I, S>(scopes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut normalized: Vec<String> = Vec::new();
    for scope in scopes {
        let scope = scope.into();
        let scope = scope.trim();
        if !scope.is_empty() && !normalized.iter().any(|s| s == scope) {
            normalized.push(scope.to_string());
        }
    }
    if !normalized.iter().any(|s| s == OPENID_SCOPE) {
        normalized.insert(0, OPENID_SCOPE.to_string());
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scopes_adds_openid() {
        assert_eq!(normalize_scopes(["email"]), vec!["openid", "email"]);
        assert_eq!(normalize_scopes(Vec::<String>::new()), vec!["openid"]);
    }

    #[test]
    fn test_normalize_scopes_dedups_and_trims() {
        let scopes = normalize_scopes(["openid", " Mail.Read ", "Mail.Read", ""]);
        assert_eq!(scopes, vec!["openid", "Mail.Read"]);
    }
}
