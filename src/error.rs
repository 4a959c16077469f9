use std::fmt;

use thiserror::Error;

/// Classification of a non-authentication failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection could not be established or was reset
    Network,
    /// The transport gave up waiting for the server
    Timeout,
    /// Server answered with a non-success status other than 401
    Status(u16),
    /// Request could not be built from the given path or body
    InvalidRequest,
    /// Response body could not be decoded
    InvalidResponse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Status(status) => write!(f, "HTTP {status}"),
            FailureKind::InvalidRequest => write!(f, "invalid request"),
            FailureKind::InvalidResponse => write!(f, "invalid response"),
        }
    }
}

/// Failure of a single remote call, classified by whoever performed it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("{kind}: {message}")]
    Other { kind: FailureKind, message: String },
}

impl CallError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        CallError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn other(kind: FailureKind, message: impl Into<String>) -> Self {
        CallError::Other {
            kind,
            message: message.into(),
        }
    }

    /// Classify a transport error. Timeouts stay distinguishable from other
    /// network failures but neither counts as unauthorized.
    pub fn from_transport(error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            FailureKind::Timeout
        } else if error.is_decode() {
            FailureKind::InvalidResponse
        } else {
            FailureKind::Network
        };
        CallError::other(kind, error.to_string())
    }
}

/// Errors that can occur while obtaining a fresh credential
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("No refresh token or login stored, sign in first")]
    NotSignedIn,

    #[error("Server rejected the credential refresh: {0}")]
    Rejected(String),

    #[error("Credential refresh failed: {0}")]
    Transport(String),
}

/// Terminal failure of an authenticated request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(#[from] CredentialError),

    #[error("Request failed ({kind}): {message}")]
    Other { kind: FailureKind, message: String },
}

impl SyncError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SyncError::Unauthorized { .. })
    }

    /// The failure kind, if this is a plain remote-call failure
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            SyncError::Other { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<CallError> for SyncError {
    fn from(error: CallError) -> Self {
        match error {
            CallError::Unauthorized { message } => SyncError::Unauthorized { message },
            CallError::Other { kind, message } => SyncError::Other { kind, message },
        }
    }
}

/// Outcome of an authenticated request: the call's value or a terminal failure
pub type CallOutcome<T> = Result<T, SyncError>;

/// Errors that can occur when building a client configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Server URL must use http or https, got '{0}'")]
    UnsupportedScheme(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
