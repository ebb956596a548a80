use std::collections::HashMap;
use std::time::{Duration, Instant};

/// In-memory store of rendered pages. Entries live for a fixed TTL and are
/// never invalidated by writes; only expiry or [`PageCache::clear`] drops them.
pub struct PageCache {
    ttl: Duration,
    pages: HashMap<String, (Instant, String)>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pages: HashMap::new(),
        }
    }

    /// Cache key for a request: the path, the clamped page number and who is looking.
    /// Any other query parameters are ignored, so junk queries share one entry.
    pub fn key(path: &str, page: usize, viewer: Option<i64>) -> String {
        match viewer {
            Some(id) => format!("{}?page={}#user:{}", path, page, id),
            None => format!("{}?page={}#anonymous", path, page),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pages
            .get(key)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, body)| body.as_str())
    }

    pub fn insert(&mut self, key: String, body: String) {
        if self.ttl.is_zero() {
            return;
        }
        self.clear_stale();
        self.pages.insert(key, (Instant::now(), body));
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    fn clear_stale(&mut self) {
        let ttl = self.ttl;
        self.pages.retain(|_, (t, _)| t.elapsed() < ttl);
    }
}
