use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cache::{MemoryResponseCache, SharedResponseCache};
use crate::config::ClientConfig;
use crate::credential::CredentialStore;
use crate::error::{CallError, CallOutcome, ConfigError, FailureKind, SyncError};
use crate::events::SharedEventReporter;
use crate::executor::AuthenticatedExecutor;
use crate::http::{HttpClient, HttpRequest, HttpResponse, Method, ReqwestClient};

/// Client for authenticated calls against a sync server
pub struct SyncServerClient<C, S: ?Sized> {
    http: C,
    config: ClientConfig,
    executor: AuthenticatedExecutor<S>,
}

impl<S: CredentialStore + ?Sized> SyncServerClient<ReqwestClient, S> {
    /// Create a reqwest-backed client with an in-memory response cache
    pub fn connect(config: ClientConfig, store: Arc<S>) -> Result<Self, ConfigError> {
        let cache = MemoryResponseCache::shared(config.cache_capacity);
        let http = ReqwestClient::from_config(&config)?.with_cache(cache.clone());
        Ok(Self::new(http, config, store, Some(cache)))
    }
}

impl<C: HttpClient, S: CredentialStore + ?Sized> SyncServerClient<C, S> {
    pub fn new(
        http: C,
        config: ClientConfig,
        store: Arc<S>,
        cache: Option<SharedResponseCache>,
    ) -> Self {
        let mut executor = AuthenticatedExecutor::new(store);
        if let Some(cache) = cache {
            executor = executor.with_cache(cache);
        }

        Self {
            http,
            config,
            executor,
        }
    }

    pub fn with_reporter(mut self, reporter: SharedEventReporter) -> Self {
        self.executor = self.executor.with_reporter(reporter);
        self
    }

    /// GET a path and decode the JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> CallOutcome<T> {
        let body = self.send(Method::Get, path, None).await?;
        decode(&body)
    }

    /// POST a JSON body to a path and decode the JSON response
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> CallOutcome<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|e| SyncError::Other {
            kind: FailureKind::InvalidRequest,
            message: format!("Failed to serialize request body: {e}"),
        })?;

        let response = self.send(Method::Post, path, Some(body)).await?;
        decode(&response)
    }

    /// DELETE a path, ignoring any response body
    pub async fn delete(&self, path: &str) -> CallOutcome<()> {
        self.send(Method::Delete, path, None).await.map(|_| ())
    }

    /// Discard cached server responses before another account signs in.
    ///
    /// Stored tokens belong to the credential store and are cleared there.
    pub fn sign_out(&self) {
        self.executor.sign_out();
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> CallOutcome<Bytes> {
        let url = self.config.endpoint(path).map_err(|e| SyncError::Other {
            kind: FailureKind::InvalidRequest,
            message: e.to_string(),
        })?;
        let http = &self.http;

        self.executor
            .execute(|credential| {
                let request = HttpRequest {
                    method,
                    url: url.clone(),
                    bearer: Some(credential.into_inner()),
                    body: body.clone(),
                };
                async move {
                    let response = http
                        .send(request)
                        .await
                        .map_err(|e| CallError::from_transport(&e))?;
                    classify(response)
                }
            })
            .await
    }
}

/// Map an HTTP response onto the call-failure taxonomy
fn classify(response: HttpResponse) -> Result<Bytes, CallError> {
    match response.status {
        401 => {
            let message = String::from_utf8_lossy(&response.body).into_owned();
            debug!("Server rejected access token");
            Err(CallError::unauthorized(if message.is_empty() {
                "HTTP 401".to_string()
            } else {
                message
            }))
        }
        _ if response.is_success() => Ok(response.body),
        status => {
            let message = String::from_utf8_lossy(&response.body).into_owned();
            warn!(status, "Sync server returned an error");
            Err(CallError::other(FailureKind::Status(status), message))
        }
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> CallOutcome<T> {
    // Empty bodies decode as JSON null so `()` and Option<T> responses work
    let body = if body.is_empty() { b"null".as_slice() } else { body };

    serde_json::from_slice(body).map_err(|e| SyncError::Other {
        kind: FailureKind::InvalidResponse,
        message: format!("Failed to parse response: {e}"),
    })
}
