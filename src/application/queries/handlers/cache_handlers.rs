//! Cache Query Handlers

use std::sync::Arc;

use crate::application::cache::CacheCoordinator;
use crate::application::queries::GetCacheStats;
use crate::domain::cache::CacheStatsReport;

/// GetCacheStats Handler
///
/// 存储不可用时返回全零报告，不会失败
pub struct GetCacheStatsHandler {
    cache: Arc<CacheCoordinator>,
}

impl GetCacheStatsHandler {
    pub fn new(cache: Arc<CacheCoordinator>) -> Self {
        Self { cache }
    }

    pub async fn handle(&self, _query: GetCacheStats) -> CacheStatsReport {
        self.cache.get_stats().await
    }
}
