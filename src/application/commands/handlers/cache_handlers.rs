//! Cache Admin Command Handlers

use std::sync::Arc;

use crate::application::cache::{CacheCoordinator, EvictionResult, IntegrityReport};
use crate::application::commands::{
    CheckIntegrity, ClearCache, EvictCache, InvalidateCache, ResetCacheStats, UpdateMaxSize,
};
use crate::application::error::ApplicationError;

// ============================================================================
// EvictCache
// ============================================================================

/// EvictCache Handler
pub struct EvictCacheHandler {
    cache: Arc<CacheCoordinator>,
}

impl EvictCacheHandler {
    pub fn new(cache: Arc<CacheCoordinator>) -> Self {
        Self { cache }
    }

    pub async fn handle(&self, command: EvictCache) -> Result<EvictionResult, ApplicationError> {
        let result = match command.count {
            Some(count) => self.cache.evict_oldest(count).await?,
            None => self.cache.evict(command.target_bytes).await?,
        };
        Ok(result)
    }
}

// ============================================================================
// InvalidateCache
// ============================================================================

#[derive(Debug, Clone)]
pub struct InvalidateCacheResponse {
    pub removed: u64,
}

/// InvalidateCache Handler
pub struct InvalidateCacheHandler {
    cache: Arc<CacheCoordinator>,
}

impl InvalidateCacheHandler {
    pub fn new(cache: Arc<CacheCoordinator>) -> Self {
        Self { cache }
    }

    pub async fn handle(
        &self,
        command: InvalidateCache,
    ) -> Result<InvalidateCacheResponse, ApplicationError> {
        let removed = self.cache.invalidate(&command.filter).await?;
        Ok(InvalidateCacheResponse { removed })
    }
}

// ============================================================================
// ClearCache
// ============================================================================

/// ClearCache Handler
pub struct ClearCacheHandler {
    cache: Arc<CacheCoordinator>,
}

impl ClearCacheHandler {
    pub fn new(cache: Arc<CacheCoordinator>) -> Self {
        Self { cache }
    }

    pub async fn handle(&self, _command: ClearCache) -> Result<(), ApplicationError> {
        self.cache.clear().await?;
        Ok(())
    }
}

// ============================================================================
// UpdateMaxSize
// ============================================================================

/// UpdateMaxSize Handler，返回实际生效的上限
pub struct UpdateMaxSizeHandler {
    cache: Arc<CacheCoordinator>,
}

impl UpdateMaxSizeHandler {
    pub fn new(cache: Arc<CacheCoordinator>) -> Self {
        Self { cache }
    }

    pub async fn handle(&self, command: UpdateMaxSize) -> Result<u64, ApplicationError> {
        if command.max_size_bytes == 0 {
            return Err(ApplicationError::validation("max_size_bytes must be positive"));
        }
        Ok(self.cache.update_max_size(command.max_size_bytes).await?)
    }
}

// ============================================================================
// ResetCacheStats
// ============================================================================

/// ResetCacheStats Handler
pub struct ResetCacheStatsHandler {
    cache: Arc<CacheCoordinator>,
}

impl ResetCacheStatsHandler {
    pub fn new(cache: Arc<CacheCoordinator>) -> Self {
        Self { cache }
    }

    pub async fn handle(&self, _command: ResetCacheStats) -> Result<(), ApplicationError> {
        self.cache.reset_stats().await?;
        tracing::info!("Cache stats reset");
        Ok(())
    }
}

// ============================================================================
// CheckIntegrity
// ============================================================================

/// CheckIntegrity Handler
pub struct CheckIntegrityHandler {
    cache: Arc<CacheCoordinator>,
}

impl CheckIntegrityHandler {
    pub fn new(cache: Arc<CacheCoordinator>) -> Self {
        Self { cache }
    }

    pub async fn handle(&self, _command: CheckIntegrity) -> Result<IntegrityReport, ApplicationError> {
        Ok(self.cache.check_integrity().await?)
    }
}
