//! Warm Tier - 持久层
//!
//! 在 `WarmStorePort` 之上增加：
//! - 总字节预算：写入前逐个淘汰最久未访问的条目，直到新条目放得下
//! - 基于保留期的过期清理
//! - 增量维护的 `total_size`（只是缓存值，`calculate_total_size` 全量扫描得到真值）

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::application::ports::WarmStorePort;
use crate::domain::cache::{CacheEntry, CacheError, EntrySummary, GlobalStats, StorageError};

/// 写入结果
#[derive(Debug, Clone, Default)]
pub struct PutOutcome {
    /// 为腾出空间而淘汰的条目
    pub evicted: Vec<EntrySummary>,
    /// 被同 key 新条目替换掉的旧条目
    pub replaced: Option<EntrySummary>,
}

impl PutOutcome {
    pub fn evicted_bytes(&self) -> u64 {
        self.evicted.iter().map(|e| e.size_bytes).sum()
    }
}

pub struct WarmTier {
    store: Arc<dyn WarmStorePort>,
    max_size_bytes: AtomicU64,
    retention_ms: i64,
    total_size: Mutex<u64>,
    /// 串行化“检查预算 - 淘汰 - 写入”等修改序列
    write_lock: tokio::sync::Mutex<()>,
}

impl WarmTier {
    pub fn new(store: Arc<dyn WarmStorePort>, max_size_bytes: u64, retention_ms: i64) -> Self {
        Self {
            store,
            max_size_bytes: AtomicU64::new(max_size_bytes),
            retention_ms,
            total_size: Mutex::new(0),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// 打开存储并从全量扫描初始化 `total_size`
    pub async fn init(&self) -> Result<u64, StorageError> {
        self.store.init().await?;
        let (size, count) = self.calculate_total_size().await?;
        tracing::info!(
            total_size = size,
            entry_count = count,
            max_size_bytes = self.max_size(),
            "WarmTier initialized"
        );
        Ok(size)
    }

    pub fn max_size(&self) -> u64 {
        self.max_size_bytes.load(Ordering::Relaxed)
    }

    pub fn set_max_size(&self, bytes: u64) {
        self.max_size_bytes.store(bytes, Ordering::Relaxed);
    }

    pub fn total_size(&self) -> u64 {
        *self.total_size.lock()
    }

    pub fn retention_ms(&self) -> i64 {
        self.retention_ms
    }

    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        self.store.get(key).await
    }

    pub async fn has(&self, key: &str) -> Result<bool, StorageError> {
        self.store.contains(key).await
    }

    pub async fn touch(&self, key: &str, accessed_at: i64) -> Result<bool, StorageError> {
        self.store.touch(key, accessed_at).await
    }

    /// 写入条目
    ///
    /// 当 `total_size + entry_size > max_size` 时逐个淘汰最久未访问的条目；
    /// 没有可淘汰的条目仍放不下时返回 `CacheFull`
    pub async fn put(&self, entry: &CacheEntry) -> Result<PutOutcome, CacheError> {
        let _guard = self.write_lock.lock().await;

        let max = self.max_size();
        let size = entry.total_size_bytes;
        if size > max {
            return Err(CacheError::CacheFull {
                needed: size,
                available: max,
            });
        }

        // 同 key 覆盖时旧条目的空间会被释放
        let existing = self
            .store
            .summary(&entry.key)
            .await?
            .map(|s| s.size_bytes)
            .unwrap_or(0);

        let mut evicted = Vec::new();
        if self.total_size().saturating_sub(existing) + size > max {
            let mut candidates = self
                .store
                .summaries_by_last_access()
                .await?
                .into_iter()
                .filter(|s| s.key != entry.key);

            while self.total_size().saturating_sub(existing) + size > max {
                let Some(victim) = candidates.next() else {
                    return Err(CacheError::CacheFull {
                        needed: size,
                        available: max.saturating_sub(self.total_size().saturating_sub(existing)),
                    });
                };
                let removed = self.store.delete_many(&[victim.key.clone()]).await?;
                self.subtract(&removed);
                tracing::debug!(
                    cache_key = %victim.key,
                    size_bytes = victim.size_bytes,
                    "WarmTier evicted entry to fit new entry"
                );
                evicted.extend(removed);
            }
        }

        let replaced = self.store.put(entry).await?;
        {
            let mut total = self.total_size.lock();
            let replaced_size = replaced.as_ref().map(|r| r.size_bytes).unwrap_or(0);
            *total = total.saturating_sub(replaced_size) + size;
        }

        Ok(PutOutcome { evicted, replaced })
    }

    /// 批量删除，返回实际删除的条目
    pub async fn delete_many(&self, keys: &[String]) -> Result<Vec<EntrySummary>, StorageError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let _guard = self.write_lock.lock().await;
        let removed = self.store.delete_many(keys).await?;
        self.subtract(&removed);
        Ok(removed)
    }

    /// 删除满足条件的条目（选择性失效）
    pub async fn delete_matching<F>(&self, predicate: F) -> Result<Vec<EntrySummary>, StorageError>
    where
        F: Fn(&EntrySummary) -> bool,
    {
        let keys: Vec<String> = self
            .store
            .summaries()
            .await?
            .into_iter()
            .filter(|s| predicate(s))
            .map(|s| s.key)
            .collect();
        self.delete_many(&keys).await
    }

    /// 删除指定音色下满足条件的条目（走音色索引）
    pub async fn delete_matching_voice<F>(
        &self,
        voice_id: &str,
        predicate: F,
    ) -> Result<Vec<EntrySummary>, StorageError>
    where
        F: Fn(&EntrySummary) -> bool,
    {
        let keys: Vec<String> = self
            .store
            .summaries_for_voice(voice_id)
            .await?
            .into_iter()
            .filter(|s| predicate(s))
            .map(|s| s.key)
            .collect();
        self.delete_many(&keys).await
    }

    /// 删除超过保留期的条目（按创建时间计算年龄）
    pub async fn sweep_expired(&self, now: i64) -> Result<Vec<EntrySummary>, StorageError> {
        let cutoff = now.saturating_sub(self.retention_ms);
        let removed = self.delete_matching(|s| s.created_at < cutoff).await?;
        if !removed.is_empty() {
            tracing::info!(
                removed = removed.len(),
                freed_bytes = removed.iter().map(|s| s.size_bytes).sum::<u64>(),
                "WarmTier sweep removed expired entries"
            );
        }
        Ok(removed)
    }

    pub async fn get_all(&self) -> Result<Vec<CacheEntry>, StorageError> {
        self.store.get_all().await
    }

    pub async fn summaries(&self) -> Result<Vec<EntrySummary>, StorageError> {
        self.store.summaries().await
    }

    pub async fn entries_sorted_by_last_access(&self) -> Result<Vec<EntrySummary>, StorageError> {
        self.store.summaries_by_last_access().await
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.store.clear().await?;
        *self.total_size.lock() = 0;
        Ok(())
    }

    /// 全量扫描重新计算 `(总字节数, 条目数)`，并以结果重置 `total_size`
    pub async fn calculate_total_size(&self) -> Result<(u64, u64), StorageError> {
        let _guard = self.write_lock.lock().await;
        let summaries = self.store.summaries().await?;
        let size: u64 = summaries.iter().map(|s| s.size_bytes).sum();
        let count = summaries.len() as u64;
        *self.total_size.lock() = size;
        Ok((size, count))
    }

    pub async fn load_stats(&self) -> Result<Option<GlobalStats>, StorageError> {
        self.store.load_stats().await
    }

    pub async fn save_stats(&self, stats: &GlobalStats) -> Result<(), StorageError> {
        self.store.save_stats(stats).await
    }

    pub async fn flush(&self) -> Result<(), StorageError> {
        self.store.flush().await
    }

    fn subtract(&self, removed: &[EntrySummary]) {
        let freed: u64 = removed.iter().map(|s| s.size_bytes).sum();
        let mut total = self.total_size.lock();
        *total = total.saturating_sub(freed);
    }
}
