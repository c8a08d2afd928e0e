//! Last-seen upstream `ETag` per GitHub path.
//!
//! A proxied GET whose `If-None-Match` equals the cached tag for its path is
//! answered with `304 Not Modified` without calling GitHub. Writes through
//! the proxy invalidate the paths they affect. Edits made elsewhere are not
//! seen, so every entry expires after a short TTL and the next GET goes back
//! to GitHub.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;

/// Maximum number of paths remembered before the cache is reset.
pub const MAX_ENTRIES: usize = 1024;

/// How long a cached tag may answer for GitHub.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Entry {
    tag: String,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct EtagCache {
    tags: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl Default for EtagCache {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }
}

impl EtagCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        EtagCache {
            tags: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns true if `if_none_match` matches the fresh cached tag for `path`.
    ///
    /// Accepts a comma-separated list of tags, as sent by HTTP clients.
    pub fn matches(&self, path: &str, if_none_match: &str) -> bool {
        let Some(cached) = self.get(path) else {
            return false;
        };
        if_none_match
            .split(',')
            .map(str::trim)
            .any(|candidate| candidate == "*" || candidate == cached)
    }

    /// Returns the cached tag for `path` unless it has expired.
    pub fn get(&self, path: &str) -> Option<String> {
        let tags = self.tags.read().unwrap_or_else(PoisonError::into_inner);
        tags.get(path)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.tag.clone())
    }

    pub fn store(&self, path: &str, etag: &str) {
        let mut tags = self.tags.write().unwrap_or_else(PoisonError::into_inner);
        if tags.len() >= MAX_ENTRIES && !tags.contains_key(path) {
            tags.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
            if tags.len() >= MAX_ENTRIES {
                tags.clear();
            }
        }
        tags.insert(
            path.to_string(),
            Entry {
                tag: etag.to_string(),
                stored_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, path: &str) {
        let mut tags = self.tags.write().unwrap_or_else(PoisonError::into_inner);
        tags.remove(path);
    }

    /// Forgets every path starting with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let mut tags = self.tags.write().unwrap_or_else(PoisonError::into_inner);
        tags.retain(|path, _| !path.starts_with(prefix));
    }

    pub fn len(&self) -> usize {
        self.tags.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
