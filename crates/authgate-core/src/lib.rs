//! Client-side authentication session orchestration.
//!
//! Reconciles a backend session cookie, pending identity-provider redirects
//! and the UI's belief about being logged in into one `Session` value:
//!
//! - `session`: `Session` and the `SessionStore` it lives in
//! - `provider`: implicit and redirect provider adapters
//! - `resolver`: drains pending redirects at startup
//! - `gateway`: HTTP client for the backend's `/auth/*` endpoints
//! - `orchestrator`: the state machine that owns all session mutations
//! - `routing`: maps a session and a path to a view

pub mod config;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod provider;
pub mod resolver;
pub mod routing;
pub mod session;

pub use config::Config;
pub use credential::{Credential, ProviderId, TokenKind};
pub use error::{AuthError, ProviderFailure};
pub use gateway::{SessionBackend, SessionGateway};
pub use orchestrator::{AuthOrchestrator, AuthPhase, StartupReport};
pub use provider::{AcquireMode, ProviderAdapter, RedirectAdapter};
pub use resolver::RedirectResolver;
pub use routing::{guard, Destination, View};
pub use session::{Session, SessionStore};
