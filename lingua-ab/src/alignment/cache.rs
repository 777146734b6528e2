//! Bounded alignment cache
//!
//! Wraps any [`AlignmentProvider`] with an LRU cache limited both by entry
//! count and by per-entry age. Both `Found` and `NotFound` results are
//! cached; errors are not, so a transient provider failure is retried on
//! the next lookup.

use super::{AlignmentError, AlignmentLookup, AlignmentProvider};
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

type ChapterKey = (Uuid, Uuid);

#[derive(Debug, Clone)]
struct CacheEntry {
    lookup: AlignmentLookup,
    inserted_at: Instant,
}

/// Caching decorator around an alignment provider
pub struct CachedAlignmentProvider<P> {
    inner: P,
    /// None when caching is disabled (capacity 0)
    cache: Option<Mutex<LruCache<ChapterKey, CacheEntry>>>,
    ttl: Duration,
}

impl<P: AlignmentProvider> CachedAlignmentProvider<P> {
    /// `capacity == 0` disables caching entirely
    pub fn new(inner: P, capacity: usize, ttl: Duration) -> Self {
        let cache = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self { inner, cache, ttl }
    }

    /// Drop the cached entry for a chapter (after its alignment is replaced)
    pub async fn invalidate(&self, book_id: Uuid, chapter_id: Uuid) {
        if let Some(cache) = &self.cache {
            cache.lock().await.pop(&(book_id, chapter_id));
        }
    }

    /// Number of entries currently held (expired ones included until touched)
    pub async fn len(&self) -> usize {
        match &self.cache {
            Some(cache) => cache.lock().await.len(),
            None => 0,
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: AlignmentProvider> AlignmentProvider for CachedAlignmentProvider<P> {
    async fn fetch(
        &self,
        book_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<AlignmentLookup, AlignmentError> {
        let Some(cache) = &self.cache else {
            return self.inner.fetch(book_id, chapter_id).await;
        };

        let key = (book_id, chapter_id);
        {
            let mut guard = cache.lock().await;
            let fresh = guard
                .get(&key)
                .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
                .map(|entry| entry.lookup.clone());

            if let Some(lookup) = fresh {
                debug!(%book_id, %chapter_id, "Alignment cache hit");
                return Ok(lookup);
            }
            if guard.pop(&key).is_some() {
                debug!(%book_id, %chapter_id, "Alignment cache entry expired");
            }
        }

        // Lock is not held across the provider call
        let lookup = self.inner.fetch(book_id, chapter_id).await?;

        cache.lock().await.put(
            key,
            CacheEntry {
                lookup: lookup.clone(),
                inserted_at: Instant::now(),
            },
        );

        Ok(lookup)
    }
}
