//! Bounded store for replies too long to send inline.
//!
//! An oversized reply goes out as a text attachment, and the chat front end
//! offers to export it as DOCX later. The text is kept here under a random
//! id until then: at most `capacity` entries (least recently used evicted
//! first), each for at most `ttl`.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;
use uuid::Uuid;

use crate::lock::mutex_lock;

struct Entry {
    text: String,
    stored_at: Instant,
}

pub struct ResponseCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl ResponseCache {
    /// A zero capacity is treated as 1.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Store `text` and return the id to fetch it with.
    pub fn insert(&self, text: impl Into<String>) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let mut entries = mutex_lock(&self.entries, "cache.insert");
        if let Some((evicted, _)) = entries.push(
            id.clone(),
            Entry {
                text: text.into(),
                stored_at: Instant::now(),
            },
        ) {
            debug!("Evicted cached reply {}", evicted);
        }
        id
    }

    /// The stored text, unless it expired or was evicted.
    pub fn get(&self, id: &str) -> Option<String> {
        let mut entries = mutex_lock(&self.entries, "cache.get");
        let expired = entries.get(id)?.stored_at.elapsed() > self.ttl;
        if expired {
            debug!("Cached reply {} expired", id);
            entries.pop(id);
            return None;
        }
        entries.get(id).map(|e| e.text.clone())
    }

    pub fn remove(&self, id: &str) -> Option<String> {
        mutex_lock(&self.entries, "cache.remove")
            .pop(id)
            .map(|e| e.text)
    }

    /// Drop every expired entry; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut entries = mutex_lock(&self.entries, "cache.purge_expired");
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.stored_at.elapsed() > self.ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            entries.pop(id);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, "cache.len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn insert_then_get() {
        let cache = ResponseCache::new(4, HOUR);
        let id = cache.insert("long reply");
        assert_eq!(id.len(), 32);
        assert_eq!(cache.get(&id).as_deref(), Some("long reply"));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = ResponseCache::new(2, HOUR);
        let a = cache.insert("a");
        let b = cache.insert("b");
        cache.get(&a);
        let c = cache.insert("c");
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&c).is_some());
    }

    #[test]
    fn expired_entries_are_gone() {
        let cache = ResponseCache::new(4, Duration::ZERO);
        let id = cache.insert("x");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&id), None);
        assert!(cache.is_empty());

        cache.insert("y");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.purge_expired(), 1);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let cache = ResponseCache::new(0, HOUR);
        cache.insert("a");
        cache.insert("b");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_returns_text() {
        let cache = ResponseCache::new(2, HOUR);
        let id = cache.insert("t");
        assert_eq!(cache.remove(&id).as_deref(), Some("t"));
        assert!(cache.is_empty());
    }
}
