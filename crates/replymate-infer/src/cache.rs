//! LRU cache for embedding results.
//!
//! The template probe query is identical for every reply, so its vector is
//! computed once per TTL window instead of once per pipeline run.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use ndarray::Array1;
use parking_lot::Mutex;

struct CacheEntry {
    embedding: Array1<f32>,
    inserted_at: Instant,
}

/// Thread-safe LRU cache with a time-to-live.
pub struct EmbeddingCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Least recently used at the front.
    order: VecDeque<String>,
    max_size: usize,
    ttl: Duration,
}

impl CacheInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn evict(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

impl EmbeddingCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(max_size),
                order: VecDeque::with_capacity(max_size),
                max_size: max_size.max(1),
                ttl,
            }),
        }
    }

    /// Returns None on miss or expired entry.
    pub fn get(&self, text: &str) -> Option<Array1<f32>> {
        let mut inner = self.inner.lock();
        let ttl = inner.ttl;
        let (embedding, expired) = match inner.entries.get(text) {
            Some(e) => (e.embedding.clone(), e.inserted_at.elapsed() >= ttl),
            None => return None,
        };
        if expired {
            inner.evict(text);
            return None;
        }
        inner.touch(text);
        Some(embedding)
    }

    pub fn put(&self, text: String, embedding: Array1<f32>) {
        let mut inner = self.inner.lock();
        let entry = CacheEntry {
            embedding,
            inserted_at: Instant::now(),
        };

        if inner.entries.insert(text.clone(), entry).is_some() {
            inner.touch(&text);
            return;
        }

        inner.order.push_back(text);
        while inner.entries.len() > inner.max_size {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry (after the embedding model changes).
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

impl Default for EmbeddingCache {
    /// 256 entries, 1-hour TTL.
    fn default() -> Self {
        Self::new(256, Duration::from_secs(3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_hit_and_miss() {
        let cache = EmbeddingCache::new(4, Duration::from_secs(60));
        assert!(cache.get("리뷰 답변 템플릿").is_none());

        cache.put("리뷰 답변 템플릿".into(), array![0.1, 0.2]);
        assert_eq!(cache.get("리뷰 답변 템플릿"), Some(array![0.1, 0.2]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_eviction_respects_recent_use() {
        let cache = EmbeddingCache::new(2, Duration::from_secs(60));
        cache.put("a".into(), array![1.0]);
        cache.put("b".into(), array![2.0]);

        // "a" becomes most recently used, so "b" is evicted next.
        assert!(cache.get("a").is_some());
        cache.put("c".into(), array![3.0]);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = EmbeddingCache::new(4, Duration::from_millis(1));
        cache.put("짧은".into(), array![1.0]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("짧은").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = EmbeddingCache::default();
        cache.put("x".into(), array![1.0]);
        cache.clear();
        assert!(cache.is_empty());
    }
}
