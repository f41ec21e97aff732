//! LRU cache of rendered pages

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::request::RenderParams;
use super::types::{RenderedPage, Rotation};

/// Default number of rendered pages kept around
pub const DEFAULT_CACHE_SIZE: usize = 8;

/// Cache key for rendered pages
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Page number (1-based)
    pub page: usize,
    /// Scale factor (stored as thousandths for stable hashing)
    pub scale_milli: u32,
    /// User rotation
    pub rotation: Rotation,
    /// Device pixel ratio (thousandths)
    pub dpr_milli: u32,
}

impl CacheKey {
    /// Create a cache key from render parameters
    #[must_use]
    pub fn from_params(params: &RenderParams) -> Self {
        Self {
            page: params.page,
            scale_milli: (params.scale * 1000.0).round() as u32,
            rotation: params.rotation,
            dpr_milli: (params.device_pixel_ratio * 1000.0).round() as u32,
        }
    }
}

/// LRU cache for rendered page data
pub struct PageCache {
    cache: LruCache<CacheKey, Arc<RenderedPage>>,
}

impl PageCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            ),
        }
    }

    /// Get a cached page, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<RenderedPage>> {
        self.cache.get(key).cloned()
    }

    /// Check if a key is in the cache without promoting it
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a page into the cache, returning an Arc to the data
    pub fn insert(&mut self, key: CacheKey, data: RenderedPage) -> Arc<RenderedPage> {
        let arc = Arc::new(data);
        self.cache.put(key, arc.clone());
        arc
    }

    /// Clear all cached pages
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Number of cached pages
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
