use std::sync::Arc;

/// Events emitted while managing the authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A fresh credential is being requested
    RefreshStarted,

    /// A fresh credential was obtained
    RefreshSucceeded,

    /// Obtaining a fresh credential failed
    RefreshFailed { error: String },

    /// The server rejected the credential, the request is retried once
    RetryingAfterUnauthorized { message: String },

    /// Cached server responses were discarded on sign-out
    SignedOut,
}

/// Trait for observing session events.
///
/// Implementations can use this to log messages, show a sign-in prompt,
/// or collect statistics.
pub trait EventReporter: Send + Sync {
    /// Report a session event
    fn report(&self, event: SessionEvent);
}

/// A shared reference to an event reporter
pub type SharedEventReporter = Arc<dyn EventReporter>;

/// A no-op reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl EventReporter for NoopReporter {
    fn report(&self, _event: SessionEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedEventReporter {
        Arc::new(Self)
    }
}
