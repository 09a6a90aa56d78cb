use thiserror::Error;

use crate::credential::ProviderId;

/// Failure reported by an identity provider SDK.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderFailure {
    #[error("sign-in was cancelled by the user")]
    UserCancelled,

    #[error("the sign-in popup was blocked")]
    PopupBlocked,

    #[error("the requested scopes were denied")]
    ScopeDenied,

    #[error("malformed redirect response: {0}")]
    Malformed(String),

    #[error("the redirect response has expired")]
    Expired,

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Provider error: {0}")]
    Provider(ProviderFailure),

    #[error("Redirect could not be completed: {0}")]
    Redirect(String),

    #[error("Credential exchange rejected (status {status}): {body}")]
    ExchangeRejected { status: u16, body: String },

    #[error("Credential was accepted but the session could not be verified - please retry")]
    VerificationInconsistency,

    #[error("Logout failed: {0}")]
    LogoutFailed(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Credential was issued by {actual:?}, expected {expected:?}")]
    ProviderMismatch {
        expected: ProviderId,
        actual: ProviderId,
    },

    #[error("No provider configured for {0:?}")]
    ProviderNotConfigured(ProviderId),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl AuthError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn exchange_rejected(status: reqwest::StatusCode, body: &str) -> Self {
        AuthError::ExchangeRejected {
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    /// Whether the caller should offer a retry affordance.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::VerificationInconsistency
                | AuthError::Network(_)
                | AuthError::ExchangeRejected { status: 500..=599, .. }
        )
    }
}

impl From<ProviderFailure> for AuthError {
    fn from(failure: ProviderFailure) -> Self {
        AuthError::Provider(failure)
    }
}
