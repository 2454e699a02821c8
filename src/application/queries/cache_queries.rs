//! Cache Queries

/// 查询缓存统计
#[derive(Debug, Clone, Default)]
pub struct GetCacheStats;
