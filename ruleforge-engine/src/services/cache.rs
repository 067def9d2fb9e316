//! Parsed-AST cache (§5 "Parsed-AST cache"): shared, read-mostly, keyed by
//! content digest so identical rule text always maps to the same slot.
//!
//! Grounded on `lumen-rt::services::cache::PersistentCache`'s write-through
//! key-value shape, extended with LRU eviction and a TTL since the teacher's
//! cache has neither — AST values here are small and numerous enough that
//! an unbounded `HashMap` would leak.

use ruleforge_core::RuleDocument;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    document: RuleDocument,
    inserted_at: Instant,
    last_used: Instant,
}

struct Inner {
    entries: HashMap<String, Entry>,
    capacity: usize,
    ttl: Duration,
}

/// Single-writer-discipline AST cache: reads never block each other beyond
/// the mutex critical section, and an insert-on-miss race simply produces
/// last-writer-wins, which is safe since AST values are idempotent for a
/// given digest (§5).
pub struct AstCache {
    inner: Mutex<Inner>,
}

impl AstCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                capacity: capacity.max(1),
                ttl,
            }),
        }
    }

    pub fn get(&self, digest: &str) -> Option<RuleDocument> {
        let mut inner = self.inner.lock().unwrap();
        let ttl = inner.ttl;
        let expired = inner
            .entries
            .get(digest)
            .map(|e| e.inserted_at.elapsed() > ttl)
            .unwrap_or(false);
        if expired {
            inner.entries.remove(digest);
            return None;
        }
        let now = Instant::now();
        if let Some(entry) = inner.entries.get_mut(digest) {
            entry.last_used = now;
            return Some(entry.document.clone());
        }
        None
    }

    pub fn insert(&self, digest: String, document: RuleDocument) {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        if inner.entries.len() >= inner.capacity && !inner.entries.contains_key(&digest) {
            if let Some(lru_key) = inner.entries.iter().min_by_key(|(_, e)| e.last_used).map(|(k, _)| k.clone()) {
                inner.entries.remove(&lru_key);
            }
        }
        inner.entries.insert(
            digest,
            Entry {
                document,
                inserted_at: now,
                last_used: now,
            },
        );
    }

    pub fn invalidate(&self, digest: &str) {
        self.inner.lock().unwrap().entries.remove(digest);
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruleforge_core::{CircuitConfig, OutputType, RuleLogic, RuleMetadata, SimpleLogic};

    fn doc() -> RuleDocument {
        RuleDocument {
            metadata: RuleMetadata::default(),
            inputs: vec![],
            constants: vec![],
            logic: RuleLogic::Simple(SimpleLogic::default()),
            output_schema: std::collections::BTreeMap::from([("x".to_string(), OutputType::Boolean)]),
            circuit: CircuitConfig::default(),
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let cache = AstCache::new(4, Duration::from_secs(60));
        cache.insert("abc".to_string(), doc());
        assert!(cache.get("abc").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn miss_returns_none() {
        let cache = AstCache::new(4, Duration::from_secs(60));
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn eviction_drops_least_recently_used_when_full() {
        let cache = AstCache::new(2, Duration::from_secs(60));
        cache.insert("a".to_string(), doc());
        cache.insert("b".to_string(), doc());
        // touch "a" so "b" becomes the least-recently-used entry
        let _ = cache.get("a");
        cache.insert("c".to_string(), doc());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn ttl_expiry_evicts_on_next_get() {
        let cache = AstCache::new(4, Duration::from_millis(0));
        cache.insert("x".to_string(), doc());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("x").is_none());
    }

    #[test]
    fn invalidate_and_clear_remove_entries() {
        let cache = AstCache::new(4, Duration::from_secs(60));
        cache.insert("a".to_string(), doc());
        cache.invalidate("a");
        assert!(cache.is_empty());
        cache.insert("b".to_string(), doc());
        cache.clear();
        assert!(cache.is_empty());
    }
}
