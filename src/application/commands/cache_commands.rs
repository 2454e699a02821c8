//! Cache Admin Commands

use crate::domain::cache::InvalidationFilter;

/// 手动淘汰：指定 `count` 时按数量淘汰最旧条目，否则按字节
#[derive(Debug, Clone, Default)]
pub struct EvictCache {
    pub target_bytes: Option<u64>,
    pub count: Option<usize>,
}

/// 选择性失效
#[derive(Debug, Clone, Default)]
pub struct InvalidateCache {
    pub filter: InvalidationFilter,
}

/// 清空缓存
#[derive(Debug, Clone, Default)]
pub struct ClearCache;

/// 调整容量上限
#[derive(Debug, Clone)]
pub struct UpdateMaxSize {
    pub max_size_bytes: u64,
}

/// 重置命中统计
#[derive(Debug, Clone, Default)]
pub struct ResetCacheStats;

/// 立即执行完整性检查
#[derive(Debug, Clone, Default)]
pub struct CheckIntegrity;
