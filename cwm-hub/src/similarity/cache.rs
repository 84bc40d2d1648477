//! Per-client cache of the most recent frame fingerprint
//!
//! Bounded by capacity with least-recently-used eviction, and by a
//! time-to-live that is checked independently of LRU order. An expired
//! entry is indistinguishable from a missing one.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::fingerprint::FrameFingerprint;

struct CachedFingerprint {
    fingerprint: Arc<FrameFingerprint>,
    stored_at: Instant,
}

/// LRU + TTL store of the latest fingerprint per client
pub struct SimilarityCache {
    entries: Mutex<LruCache<String, CachedFingerprint>>,
    ttl: Duration,
}

impl SimilarityCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Store `fingerprint` for `client_id` and return the live previous one
    ///
    /// The read and the write happen under one lock, so two concurrent
    /// frames from the same client each see exactly one predecessor.
    pub async fn swap(
        &self,
        client_id: &str,
        fingerprint: Arc<FrameFingerprint>,
    ) -> Option<Arc<FrameFingerprint>> {
        let now = Instant::now();
        let previous = self.entries.lock().await.put(
            client_id.to_string(),
            CachedFingerprint {
                fingerprint,
                stored_at: now,
            },
        );

        previous
            .filter(|entry| now.duration_since(entry.stored_at) < self.ttl)
            .map(|entry| entry.fingerprint)
    }

    /// Latest live fingerprint for `client_id`, dropping it if expired
    #[cfg(test)]
    async fn get(&self, client_id: &str) -> Option<Arc<FrameFingerprint>> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(client_id) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                return Some(Arc::clone(&entry.fingerprint));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(client_id);
        }
        None
    }

    pub async fn remove(&self, client_id: &str) {
        self.entries.lock().await.pop(client_id);
    }

    /// Drop every entry whose client id starts with `prefix`; returns how
    /// many were removed
    pub async fn remove_prefixed(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock().await;
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(client_id, _)| client_id.starts_with(prefix))
            .map(|(client_id, _)| client_id.clone())
            .collect();
        for client_id in &doomed {
            entries.pop(client_id);
        }
        doomed.len()
    }

    /// Number of stored entries, including ones that have expired but
    /// not been touched since
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::fingerprint::{CenterCropLocator, FingerprintExtractor};
    use image::{GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    fn fingerprint(seed: u8) -> Arc<FrameFingerprint> {
        let image = GrayImage::from_fn(24, 24, |x, y| Luma([(x as u8 ^ y as u8).wrapping_mul(seed)]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let extractor = FingerprintExtractor::new(Arc::new(CenterCropLocator), 16, 0.2);
        Arc::new(extractor.extract(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_swap_returns_previous() {
        let cache = SimilarityCache::new(10, Duration::from_secs(60));
        let first = fingerprint(3);
        let second = fingerprint(5);

        assert!(cache.swap("client-a", Arc::clone(&first)).await.is_none());
        let previous = cache.swap("client-a", Arc::clone(&second)).await;
        assert!(Arc::ptr_eq(&previous.unwrap(), &first));
        assert!(Arc::ptr_eq(&cache.get("client-a").await.unwrap(), &second));
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = SimilarityCache::new(2, Duration::from_secs(60));
        cache.swap("a", fingerprint(1)).await;
        cache.swap("b", fingerprint(2)).await;
        // Touch "a" so "b" is the least recently used
        assert!(cache.get("a").await.is_some());
        cache.swap("c", fingerprint(3)).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn test_expired_entry_is_treated_as_absent() {
        let cache = SimilarityCache::new(10, Duration::from_millis(30));
        cache.swap("a", fingerprint(1)).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cache.swap("a", fingerprint(2)).await.is_none());
        assert!(cache.get("a").await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get("a").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_prefixed_only_touches_matching_clients() {
        let cache = SimilarityCache::new(10, Duration::from_secs(60));
        cache.swap("s1:a", fingerprint(1)).await;
        cache.swap("s1:b", fingerprint(2)).await;
        cache.swap("s2:a", fingerprint(3)).await;

        assert_eq!(cache.remove_prefixed("s1:").await, 2);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("s2:a").await.is_some());
        assert_eq!(cache.remove_prefixed("s1:").await, 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = SimilarityCache::new(0, Duration::from_secs(1));
        assert_eq!(cache.ttl(), Duration::from_secs(1));
    }
}
