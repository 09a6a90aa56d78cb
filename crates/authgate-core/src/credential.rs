use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity providers the backend accepts credentials from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Google,
    Microsoft,
}

impl ProviderId {
    /// Backend path that exchanges this provider's credentials for a session.
    pub fn exchange_path(self) -> &'static str {
        match self {
            ProviderId::Google => "/auth/google",
            ProviderId::Microsoft => "/auth/microsoft",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::Google => f.write_str("google"),
            ProviderId::Microsoft => f.write_str("microsoft"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Id,
    Access,
}

/// A provider-issued token, exchanged exactly once for a backend session.
///
/// Not `Clone`; consumed by value in a single exchange call.
/// `Debug` prints the token length only.
pub struct Credential {
    provider: ProviderId,
    token: String,
    kind: TokenKind,
}

impl Credential {
    pub fn new(provider: ProviderId, token: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            provider,
            token: token.into(),
            kind,
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// JSON body for the provider's exchange endpoint, consuming the credential.
    ///
    /// Google ID tokens travel as `{"token"}`, every access token as `{"access_token"}`.
    pub(crate) fn into_exchange_body(self) -> serde_json::Value {
        match (self.provider, self.kind) {
            (ProviderId::Google, TokenKind::Id) => serde_json::json!({ "token": self.token }),
            _ => serde_json::json!({ "access_token": self.token }),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("provider", &self.provider)
            .field("kind", &self.kind)
            .field("token_len", &self.token.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let cred = Credential::new(ProviderId::Google, "secret-id-token", TokenKind::Id);
        let printed = format!("{:?}", cred);
        assert!(!printed.contains("secret-id-token"));
        assert!(printed.contains("token_len: 15"));
    }

    #[test]
    fn test_exchange_body_matches_token_kind() {
        let id = Credential::new(ProviderId::Google, "abc", TokenKind::Id);
        assert_eq!(id.into_exchange_body(), serde_json::json!({ "token": "abc" }));

        let access = Credential::new(ProviderId::Google, "abc", TokenKind::Access);
        assert_eq!(access.into_exchange_body(), serde_json::json!({ "access_token": "abc" }));

        let ms = Credential::new(ProviderId::Microsoft, "xyz", TokenKind::Access);
        assert_eq!(ms.into_exchange_body(), serde_json::json!({ "access_token": "xyz" }));
    }

    #[test]
    fn test_provider_paths() {
        assert_eq!(ProviderId::Google.exchange_path(), "/auth/google");
        assert_eq!(ProviderId::Microsoft.exchange_path(), "/auth/microsoft");
        assert_eq!(ProviderId::Microsoft.to_string(), "microsoft");
    }
}
