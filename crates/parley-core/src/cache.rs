//! Suggestion cache using moka
//!
//! Short-lived, tenant-scoped memoization of recency queries. Only
//! successful lookups are stored, so a failing source is retried on the
//! next turn.

use crate::error::SourceError;
use crate::resolver::{RecentQuery, SuggestionSource};
use moka::future::Cache;
use parley_dialogue::Suggestion;
use std::sync::Arc;
use std::time::Duration;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

/// [`SuggestionSource`] decorator with a TTL cache
#[derive(Clone)]
pub struct CachedSuggestionSource {
    inner: Arc<dyn SuggestionSource>,
    cache: Cache<RecentQuery, Arc<Vec<Suggestion>>>,
}

impl std::fmt::Debug for CachedSuggestionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSuggestionSource")
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl CachedSuggestionSource {
    /// Wrap a source
    #[must_use]
    pub fn new(inner: Arc<dyn SuggestionSource>, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Drop every cached entry
    #[inline]
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Get cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.cache.entry_count(),
        }
    }
}

#[async_trait::async_trait]
impl SuggestionSource for CachedSuggestionSource {
    async fn recent(&self, query: &RecentQuery) -> Result<Vec<Suggestion>, SourceError> {
        if let Some(hit) = self.cache.get(query).await {
            tracing::debug!(parameter = %query.parameter, "suggestion cache hit");
            return Ok(hit.as_ref().clone());
        }

        let found = self.inner.recent(query).await?;
        self.cache
            .insert(query.clone(), Arc::new(found.clone()))
            .await;
        Ok(found)
    }
}
