//! Query cache with key-prefix invalidation.
//!
//! Entries are keyed by segments such as `["list", "usuarios", "", "1"]`.
//! Writes never touch cached values; they drop every entry under a prefix
//! and the next read goes back to the backend.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

/// Segmented cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// One page of a resource list.
    pub fn list(resource: &str, search: &str, page: u32) -> Self {
        Self::new(["list".to_string(), resource.to_string(), search.to_string(), page.to_string()])
    }

    /// Every cached list page of a resource.
    pub fn lists(resource: &str) -> Self {
        Self::new(["list", resource])
    }

    /// One record of a resource.
    pub fn one(resource: &str, id: &str) -> Self {
        Self::new(["one", resource, id])
    }

    /// Every cached record of a resource.
    pub fn ones(resource: &str) -> Self {
        Self::new(["one", resource])
    }

    /// A fetched option list.
    pub fn options(endpoint: &str, value_key: &str, label_key: &str) -> Self {
        Self::new(["options", endpoint, value_key, label_key])
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

struct Entry {
    value: Value,
    stored_at: Instant,
}

/// Shared cache of decoded response bodies.
#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, Entry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value, however old.
    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        self.lock().get(key).map(|e| e.value.clone())
    }

    /// The cached value if it was stored less than `ttl` ago.
    pub fn get_fresh(&self, key: &QueryKey, ttl: Duration) -> Option<Value> {
        self.lock()
            .get(key)
            .filter(|e| e.stored_at.elapsed() < ttl)
            .map(|e| e.value.clone())
    }

    pub fn put(&self, key: QueryKey, value: Value) {
        self.lock().insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops every entry whose key starts with `prefix`; returns how many.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let dropped = before - entries.len();
        debug!("Invalidated {} cache entries under {:?}", dropped, prefix.segments());
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
