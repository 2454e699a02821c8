//! In-Memory Warm Store Implementation
//!
//! DashMap 实现的 `WarmStorePort`，用于 `storage.backend = "memory"` 和测试。
//! 支持可选的字节配额和故障注入。

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::application::ports::WarmStorePort;
use crate::domain::cache::{CacheEntry, EntrySummary, GlobalStats, StorageError};

/// 内存 warm store
pub struct InMemoryWarmStore {
    entries: DashMap<String, CacheEntry>,
    stats: Mutex<Option<GlobalStats>>,
    initialized: AtomicBool,
    /// 存储层字节配额（模拟磁盘/配额不足）
    quota_bytes: Option<u64>,
    /// 注入的故障，设置后所有操作都返回该错误
    failure: Mutex<Option<StorageError>>,
}

impl InMemoryWarmStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            stats: Mutex::new(None),
            initialized: AtomicBool::new(false),
            quota_bytes: None,
            failure: Mutex::new(None),
        }
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::new()
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 注入故障
    pub fn fail_with(&self, error: StorageError) {
        *self.failure.lock() = Some(error);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check(&self) -> Result<(), StorageError> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        if !self.initialized.load(Ordering::Acquire) {
            return Err(StorageError::InvalidState(
                "in-memory store not initialized".to_string(),
            ));
        }
        Ok(())
    }

    fn stored_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.total_size_bytes).sum()
    }

    fn sorted_by_access(mut summaries: Vec<EntrySummary>) -> Vec<EntrySummary> {
        summaries.sort_by(|a, b| {
            a.last_accessed_at
                .cmp(&b.last_accessed_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        summaries
    }
}

impl Default for InMemoryWarmStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WarmStorePort for InMemoryWarmStore {
    async fn init(&self) -> Result<(), StorageError> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        self.initialized.store(true, Ordering::Release);
        tracing::info!("InMemoryWarmStore initialized");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        self.check()?;
        Ok(self.entries.get(key).map(|e| e.clone()))
    }

    async fn summary(&self, key: &str) -> Result<Option<EntrySummary>, StorageError> {
        self.check()?;
        Ok(self.entries.get(key).map(|e| e.summary()))
    }

    async fn put(&self, entry: &CacheEntry) -> Result<Option<EntrySummary>, StorageError> {
        self.check()?;

        if let Some(quota) = self.quota_bytes {
            let replaced = self
                .entries
                .get(&entry.key)
                .map(|e| e.total_size_bytes)
                .unwrap_or(0);
            let projected = self.stored_bytes() - replaced + entry.total_size_bytes;
            if projected > quota {
                return Err(StorageError::QuotaExceeded(format!(
                    "{} bytes would exceed quota of {} bytes",
                    projected, quota
                )));
            }
        }

        let old = self.entries.insert(entry.key.clone(), entry.clone());
        Ok(old.map(|e| e.summary()))
    }

    async fn touch(&self, key: &str, accessed_at: i64) -> Result<bool, StorageError> {
        self.check()?;
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.record_access(accessed_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_many(&self, keys: &[String]) -> Result<Vec<EntrySummary>, StorageError> {
        self.check()?;
        Ok(keys
            .iter()
            .filter_map(|k| self.entries.remove(k))
            .map(|(_, e)| e.summary())
            .collect())
    }

    async fn summaries(&self) -> Result<Vec<EntrySummary>, StorageError> {
        self.check()?;
        Ok(self.entries.iter().map(|e| e.summary()).collect())
    }

    async fn summaries_by_last_access(&self) -> Result<Vec<EntrySummary>, StorageError> {
        let summaries = self.summaries().await?;
        Ok(Self::sorted_by_access(summaries))
    }

    async fn summaries_for_voice(
        &self,
        voice_id: &str,
    ) -> Result<Vec<EntrySummary>, StorageError> {
        self.check()?;
        Ok(self
            .entries
            .iter()
            .filter(|e| e.voice_id == voice_id)
            .map(|e| e.summary())
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<CacheEntry>, StorageError> {
        self.check()?;
        Ok(self.entries.iter().map(|e| e.clone()).collect())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.check()?;
        self.entries.clear();
        Ok(())
    }

    async fn load_stats(&self) -> Result<Option<GlobalStats>, StorageError> {
        self.check()?;
        Ok(self.stats.lock().clone())
    }

    async fn save_stats(&self, stats: &GlobalStats) -> Result<(), StorageError> {
        self.check()?;
        *self.stats.lock() = Some(stats.clone());
        Ok(())
    }
}
