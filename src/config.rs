use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Settings for talking to a sync server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the sync server, always ending in '/'
    pub base_url: Url,
    /// Total request timeout
    pub timeout: Duration,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// User-Agent header sent with every request
    pub user_agent: String,
    /// Maximum number of cached GET responses
    pub cache_capacity: usize,
}

impl ClientConfig {
    /// Create a configuration for the given server with default settings
    pub fn new(server_url: &str) -> Result<Self, ConfigError> {
        let mut base_url = Url::parse(server_url.trim())?;

        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(ConfigError::UnsupportedScheme(base_url.scheme().to_string()));
        }

        // Url::join treats the last segment as a file unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: format!("podsync/{}", env!("CARGO_PKG_VERSION")),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Resolve an API path relative to the server base URL
    pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}
