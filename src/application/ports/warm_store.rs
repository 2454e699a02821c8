//! Warm Store Port - 持久化缓存存储
//!
//! 定义 warm tier 底层存储的抽象接口，具体实现使用 Sled（生产）或 DashMap（内存/测试）
//!
//! 约定：
//! - 单 key 写入是原子的，条目整体替换，不做部分合并
//! - `delete_many` 对存储而言是一次批量操作
//! - 所有错误都是带标签的 `StorageError`，调用方按变体分派

use async_trait::async_trait;

use crate::domain::cache::{CacheEntry, EntrySummary, GlobalStats, StorageError};

/// Warm Store Port
#[async_trait]
pub trait WarmStorePort: Send + Sync {
    /// 打开底层存储；未初始化前的任何操作都返回 `StorageError::InvalidState`
    async fn init(&self) -> Result<(), StorageError>;

    /// 读取完整条目（不更新访问时间）
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError>;

    /// 读取条目摘要
    async fn summary(&self, key: &str) -> Result<Option<EntrySummary>, StorageError>;

    async fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.summary(key).await?.is_some())
    }

    /// 写入条目，返回被替换的旧条目摘要（如果存在）
    async fn put(&self, entry: &CacheEntry) -> Result<Option<EntrySummary>, StorageError>;

    /// 记录一次访问：`last_accessed_at = max(old, accessed_at)`，`access_count += 1`
    ///
    /// 条目不存在时返回 `false`
    async fn touch(&self, key: &str, accessed_at: i64) -> Result<bool, StorageError>;

    /// 批量删除，返回实际删除的条目摘要
    async fn delete_many(&self, keys: &[String]) -> Result<Vec<EntrySummary>, StorageError>;

    /// 所有条目摘要（顺序不保证）
    async fn summaries(&self) -> Result<Vec<EntrySummary>, StorageError>;

    /// 按最后访问时间升序排列的条目摘要
    async fn summaries_by_last_access(&self) -> Result<Vec<EntrySummary>, StorageError>;

    /// 指定音色的条目摘要
    async fn summaries_for_voice(&self, voice_id: &str)
        -> Result<Vec<EntrySummary>, StorageError>;

    /// 所有完整条目
    async fn get_all(&self) -> Result<Vec<CacheEntry>, StorageError>;

    /// 清空所有条目（不含统计记录）
    async fn clear(&self) -> Result<(), StorageError>;

    async fn load_stats(&self) -> Result<Option<GlobalStats>, StorageError>;

    async fn save_stats(&self, stats: &GlobalStats) -> Result<(), StorageError>;

    async fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
