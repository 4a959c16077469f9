pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod events;
pub mod executor;
pub mod http;

// Re-export main types for convenience
pub use auth::{Authenticator, HttpAuthenticator, TokenResponse};
pub use cache::{MemoryResponseCache, ResponseCache, SharedResponseCache};
pub use client::SyncServerClient;
pub use config::ClientConfig;
pub use credential::{AuthState, Credential, CredentialStore, LoginDetails, SessionStore};
pub use error::{CallError, CallOutcome, ConfigError, CredentialError, FailureKind, SyncError};
pub use events::{EventReporter, NoopReporter, SessionEvent, SharedEventReporter};
pub use executor::AuthenticatedExecutor;
pub use http::{HttpClient, HttpRequest, HttpResponse, Method, ReqwestClient};
