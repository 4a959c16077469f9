use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;

/// Transport-level cache of server responses.
///
/// Responses are keyed by URL only, not by identity, so the cache must be
/// emptied whenever the signed-in user changes.
pub trait ResponseCache: Send + Sync {
    /// Look up a fresh cached body for a URL
    fn get(&self, url: &str) -> Option<Bytes>;

    /// Store a response body, honouring its Cache-Control header
    fn put(&self, url: &str, body: Bytes, cache_control: Option<&str>);

    /// Drop every cached response
    fn evict_all(&self);

    /// Number of responses currently held
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A shared reference to a response cache
pub type SharedResponseCache = Arc<dyn ResponseCache>;

#[derive(Debug, Clone)]
struct CacheEntry {
    body: Bytes,
    expires_at: DateTime<Utc>,
}

/// Bounded in-memory response cache, evicting the least recently used entry
#[derive(Debug)]
pub struct MemoryResponseCache {
    // None when the capacity is zero and nothing is ever stored
    entries: Option<Mutex<LruCache<String, CacheEntry>>>,
}

impl MemoryResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// Create a new cache wrapped in an Arc
    pub fn shared(capacity: usize) -> SharedResponseCache {
        Arc::new(Self::new(capacity))
    }

    fn lock(&self) -> Option<MutexGuard<'_, LruCache<String, CacheEntry>>> {
        // A panic while holding the lock cannot leave an entry half-written
        self.entries
            .as_ref()
            .map(|entries| entries.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn insert(&self, url: &str, body: Bytes, expires_at: DateTime<Utc>) {
        if let Some(mut entries) = self.lock() {
            entries.put(url.to_string(), CacheEntry { body, expires_at });
        }
    }
}

impl ResponseCache for MemoryResponseCache {
    fn get(&self, url: &str) -> Option<Bytes> {
        let mut entries = self.lock()?;
        let entry = entries.get(url)?;

        if entry.expires_at > Utc::now() {
            return Some(entry.body.clone());
        }

        entries.pop(url);
        None
    }

    fn put(&self, url: &str, body: Bytes, cache_control: Option<&str>) {
        if let Some(max_age) = cache_control.and_then(parse_max_age) {
            self.insert(url, body, Utc::now() + max_age);
        }
    }

    fn evict_all(&self) {
        if let Some(mut entries) = self.lock() {
            entries.clear();
        }
    }

    fn len(&self) -> usize {
        self.lock().map_or(0, |entries| entries.len())
    }
}

/// Extract a positive `max-age` from a Cache-Control header.
///
/// Returns None when the response must not be stored.
pub fn parse_max_age(header: &str) -> Option<Duration> {
    let mut max_age = None;

    for directive in header.split(',').map(|d| d.trim().to_ascii_lowercase()) {
        match directive.as_str() {
            "no-store" | "no-cache" => return None,
            _ => {
                if let Some(value) = directive.strip_prefix("max-age=") {
                    max_age = value.trim_matches('"').parse::<i64>().ok();
                }
            }
        }
    }

    max_age.filter(|secs| *secs > 0).map(Duration::seconds)
}
