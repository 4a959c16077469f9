// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::cache::SharedResponseCache;
use crate::config::ClientConfig;
use crate::error::ConfigError;

/// HTTP methods used against the sync server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// A single request to the sync server
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    /// Bearer token for the Authorization header, if any
    pub bearer: Option<String>,
    /// JSON body, if any
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            bearer: None,
            body: None,
        }
    }

    pub fn post(url: Url, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url,
            bearer: None,
            body: Some(body),
        }
    }

    pub fn delete(url: Url) -> Self {
        Self {
            method: Method::Delete,
            url,
            bearer: None,
            body: None,
        }
    }

    /// Attach a bearer token
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

/// HTTP response with status and fully buffered body
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Cache-Control header value, if present
    pub cache_control: Option<String>,
    /// Response body
    pub body: Bytes,
    /// Whether the body was served from the response cache
    pub from_cache: bool,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction for testability
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform one request and buffer the response
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, reqwest::Error>;
}

/// Default HTTP client implementation using reqwest
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    cache: Option<SharedResponseCache>,
}

impl ReqwestClient {
    /// Create a new ReqwestClient with default settings and no cache
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            cache: None,
        }
    }

    /// Create a new ReqwestClient with a custom reqwest::Client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            cache: None,
        }
    }

    /// Create a client with the timeouts and user agent from a configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self::with_client(client))
    }

    /// Serve and store successful GET responses through the given cache
    pub fn with_cache(mut self, cache: SharedResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, reqwest::Error> {
        let cache = self.cache.as_ref().filter(|_| request.method == Method::Get);

        if let Some(body) = cache.and_then(|c| c.get(request.url.as_str())) {
            debug!(url = %request.url, "Serving response from cache");
            return Ok(HttpResponse {
                status: 200,
                cache_control: None,
                body,
                from_cache: true,
            });
        }

        let mut builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Post => self.client.post(request.url.clone()),
            Method::Delete => self.client.delete(request.url.clone()),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let cache_control = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        debug!(url = %request.url, status, "Received response");

        let response = HttpResponse {
            status,
            cache_control,
            body,
            from_cache: false,
        };

        if let Some(cache) = cache
            && response.is_success()
        {
            cache.put(
                request.url.as_str(),
                response.body.clone(),
                response.cache_control.as_deref(),
            );
        }

        Ok(response)
    }
}
