//! In-memory LRU translation cache with TTL.
//! Key: blake3 hash of (target_lang | combined source text). Re-translating
//! an identical batch (common on soft page reloads) costs no engine call.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

struct CacheEntry {
    translated_text: String,
    inserted_at: Instant,
}

pub struct TranslationCache {
    inner: Mutex<LruCache<[u8; 32], CacheEntry>>,
    ttl: Duration,
}

impl TranslationCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("cache capacity must be > 0"),
            )),
            ttl,
        }
    }

    /// Compute the cache key from translation parameters.
    pub fn compute_key(target_lang: &str, text: &str) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(target_lang.as_bytes());
        hasher.update(b"|");
        hasher.update(text.as_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Look up a cached translation. Returns None if absent or expired.
    pub fn get(&self, key: &[u8; 32]) -> Option<String> {
        let mut cache = self.inner.lock();
        if let Some(entry) = cache.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.translated_text.clone());
            }
            // Expired
            cache.pop(key);
        }
        None
    }

    /// Insert a translation result into the cache.
    pub fn insert(&self, key: [u8; 32], translated_text: String) {
        let mut cache = self.inner.lock();
        cache.put(
            key,
            CacheEntry {
                translated_text,
                inserted_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_after_insert_miss_after_distinct_key() {
        let cache = TranslationCache::new(4, Duration::from_secs(60));
        let key = TranslationCache::compute_key("en", "中文");
        assert!(cache.get(&key).is_none());
        cache.insert(key, "Chinese".to_string());
        assert_eq!(cache.get(&key).as_deref(), Some("Chinese"));

        let other = TranslationCache::compute_key("fr", "中文");
        assert!(cache.get(&other).is_none());
    }
}
