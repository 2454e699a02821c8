//! Eviction Policy - 执行淘汰
//!
//! 选择逻辑在 `domain::cache`，这里负责把选中的条目作为一个批次从 warm tier 删除

use std::sync::Arc;

use super::warm_tier::WarmTier;
use crate::domain::cache::{
    calculate_eviction_amount, select_for_bytes, select_oldest, EntrySummary, StorageError,
};

/// 淘汰结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionResult {
    pub bytes_freed: u64,
    pub entries_removed: u64,
    pub removed_keys: Vec<String>,
}

pub struct EvictionPolicy {
    warm: Arc<WarmTier>,
}

impl EvictionPolicy {
    pub fn new(warm: Arc<WarmTier>) -> Self {
        Self { warm }
    }

    /// 最久未访问优先，累计到 `target_bytes` 为止，一次批量删除
    pub async fn evict(
        &self,
        entries: &[EntrySummary],
        target_bytes: u64,
    ) -> Result<EvictionResult, StorageError> {
        let selected = select_for_bytes(entries, target_bytes);
        self.remove_batch(selected).await
    }

    /// 删除最旧的 `min(count, len)` 个条目
    pub async fn evict_oldest(
        &self,
        entries: &[EntrySummary],
        count: usize,
    ) -> Result<EvictionResult, StorageError> {
        let selected = select_oldest(entries, count);
        self.remove_batch(selected).await
    }

    pub fn calculate_eviction_amount(current_size: u64, max_size: u64, target_pct: f64) -> u64 {
        calculate_eviction_amount(current_size, max_size, target_pct)
    }

    async fn remove_batch(
        &self,
        selected: Vec<EntrySummary>,
    ) -> Result<EvictionResult, StorageError> {
        if selected.is_empty() {
            return Ok(EvictionResult::default());
        }

        let keys: Vec<String> = selected.into_iter().map(|e| e.key).collect();
        let removed = self.warm.delete_many(&keys).await?;

        let result = EvictionResult {
            bytes_freed: removed.iter().map(|e| e.size_bytes).sum(),
            entries_removed: removed.len() as u64,
            removed_keys: removed.into_iter().map(|e| e.key).collect(),
        };

        tracing::info!(
            bytes_freed = result.bytes_freed,
            entries_removed = result.entries_removed,
            "Evicted cache entries"
        );
        Ok(result)
    }
}
