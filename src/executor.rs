// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::SharedResponseCache;
use crate::credential::{AuthState, Credential, CredentialStore};
use crate::error::{CallError, CallOutcome, CredentialError};
use crate::events::{NoopReporter, SessionEvent, SharedEventReporter};

/// Runs remote calls that need a bearer credential.
///
/// Each call gets at most one fresh credential: a call made with a cached
/// credential that the server rejects is retried once after a refresh, a call
/// made with a freshly acquired credential is never retried.
pub struct AuthenticatedExecutor<S: ?Sized> {
    store: Arc<S>,
    cache: Option<SharedResponseCache>,
    reporter: SharedEventReporter,
}

impl<S: CredentialStore + ?Sized> AuthenticatedExecutor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            cache: None,
            reporter: NoopReporter::shared(),
        }
    }

    /// Transport cache to empty on sign-out
    pub fn with_cache(mut self, cache: SharedResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_reporter(mut self, reporter: SharedEventReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Execute `call` with a credential, refreshing and retrying once if the
    /// cached credential is rejected.
    ///
    /// Dropping the returned future cancels the request; a cancelled request
    /// never proceeds to the refresh step.
    pub async fn execute<T, F, Fut>(&self, mut call: F) -> CallOutcome<T>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let cached = match self.store.auth_state().await {
            AuthState::LoggedIn => self.store.cached_credential().await,
            AuthState::LoggedOut => None,
        };

        let Some(credential) = cached else {
            let credential = self.refresh().await?;
            return Ok(call(credential).await?);
        };

        match call(credential).await {
            Err(CallError::Unauthorized { message }) => {
                debug!(reason = %message, "Credential rejected, refreshing and retrying once");
                self.reporter
                    .report(SessionEvent::RetryingAfterUnauthorized { message });

                let credential = self.refresh().await?;
                Ok(call(credential).await?)
            }
            outcome => Ok(outcome?),
        }
    }

    /// Discard cached server responses so nothing leaks into the next session
    pub fn sign_out(&self) {
        if let Some(cache) = &self.cache {
            cache.evict_all();
        }
        info!("Response cache cleared on sign-out");
        self.reporter.report(SessionEvent::SignedOut);
    }

    async fn refresh(&self) -> Result<Credential, CredentialError> {
        self.reporter.report(SessionEvent::RefreshStarted);
        self.store.invalidate_credential().await;

        match self.store.refresh_credential().await {
            Ok(credential) => {
                self.reporter.report(SessionEvent::RefreshSucceeded);
                Ok(credential)
            }
            Err(e) => {
                debug!(error = %e, "Credential refresh failed");
                self.reporter.report(SessionEvent::RefreshFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
