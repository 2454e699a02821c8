//! Size Manager - 容量校验、淘汰阈值、统计维护与完整性校验
//!
//! `GlobalStats` 的所有读-改-写都在 `parking_lot::Mutex` 内完成，持锁期间不 await

use parking_lot::Mutex;
use std::sync::Arc;

use super::warm_tier::WarmTier;
use crate::domain::cache::{CacheError, GlobalStats, StorageError};

/// 淘汰检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionCheck {
    pub needed: bool,
    pub bytes_to_free: u64,
}

/// 完整性校验结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub repaired: bool,
    /// 实际值 - 记录值（字节）
    pub discrepancy: i64,
    pub tracked_size_bytes: u64,
    pub actual_size_bytes: u64,
    pub tracked_entry_count: u64,
    pub actual_entry_count: u64,
    pub checked_at: i64,
}

#[derive(Debug, Clone)]
pub struct SizeManagerConfig {
    pub max_entry_size_bytes: u64,
    pub eviction_trigger_pct: f64,
    pub eviction_target_pct: f64,
    pub integrity_tolerance_bytes: u64,
}

pub struct SizeManager {
    stats: Mutex<GlobalStats>,
    warm: Arc<WarmTier>,
    config: SizeManagerConfig,
}

impl SizeManager {
    pub fn new(warm: Arc<WarmTier>, initial: GlobalStats, config: SizeManagerConfig) -> Self {
        Self {
            stats: Mutex::new(initial),
            warm,
            config,
        }
    }

    /// 单条目大小校验：超过单条目上限或整体上限都拒绝
    pub fn validate_entry_size(size: u64, max_entry: u64, max_cache: u64) -> Result<(), CacheError> {
        if size > max_entry {
            return Err(CacheError::EntryTooLarge {
                size,
                limit: max_entry,
            });
        }
        if size > max_cache {
            return Err(CacheError::EntryTooLarge {
                size,
                limit: max_cache,
            });
        }
        Ok(())
    }

    /// 写入后占用超过 `max × trigger` 时需要淘汰，淘汰到 `max × target`
    pub fn check_eviction_needed(
        current_size: u64,
        new_entry_size: u64,
        max_size: u64,
        trigger_pct: f64,
        target_pct: f64,
    ) -> EvictionCheck {
        let projected = current_size.saturating_add(new_entry_size);
        let trigger = max_size as f64 * trigger_pct;
        if (projected as f64) <= trigger {
            return EvictionCheck {
                needed: false,
                bytes_to_free: 0,
            };
        }
        let target = (max_size as f64 * target_pct).floor() as u64;
        EvictionCheck {
            needed: true,
            bytes_to_free: projected.saturating_sub(target),
        }
    }

    pub fn validate(&self, size: u64) -> Result<(), CacheError> {
        let max_cache = self.stats.lock().max_size_bytes;
        Self::validate_entry_size(size, self.config.max_entry_size_bytes, max_cache)
    }

    pub fn check(&self, new_entry_size: u64) -> EvictionCheck {
        let (current, max) = {
            let stats = self.stats.lock();
            (stats.total_size_bytes, stats.max_size_bytes)
        };
        Self::check_eviction_needed(
            current,
            new_entry_size,
            max,
            self.config.eviction_trigger_pct,
            self.config.eviction_target_pct,
        )
    }

    /// 应用带符号的增量，结果下限为 0
    pub fn update_global_stats(&self, size_delta: i64, count_delta: i64) {
        self.stats.lock().apply_delta(size_delta, count_delta);
    }

    pub fn snapshot(&self) -> GlobalStats {
        self.stats.lock().clone()
    }

    pub fn replace(&self, stats: GlobalStats) {
        *self.stats.lock() = stats;
    }

    pub fn max_size(&self) -> u64 {
        self.stats.lock().max_size_bytes
    }

    pub fn set_max_size(&self, bytes: u64) {
        self.stats.lock().max_size_bytes = bytes;
        self.warm.set_max_size(bytes);
    }

    pub fn max_entry_size(&self) -> u64 {
        self.config.max_entry_size_bytes
    }

    pub fn target_pct(&self) -> f64 {
        self.config.eviction_target_pct
    }

    pub fn record_hit(&self) {
        self.stats.lock().hits += 1;
    }

    pub fn record_miss(&self) {
        self.stats.lock().misses += 1;
    }

    pub fn record_evictions(&self, count: u64, at: i64) {
        if count == 0 {
            return;
        }
        let mut stats = self.stats.lock();
        stats.evictions += count;
        stats.last_eviction_at = Some(at);
    }

    pub fn reset_counters(&self) {
        self.stats.lock().reset_counters();
    }

    /// 清空后的统计：容量清零，命中计数保留
    pub fn reset_usage(&self) {
        let mut stats = self.stats.lock();
        stats.total_size_bytes = 0;
        stats.entry_count = 0;
    }

    /// 用 warm tier 全量扫描结果覆盖记录值
    pub async fn reconcile_from_scan(&self) -> Result<(u64, u64), StorageError> {
        let (size, count) = self.warm.calculate_total_size().await?;
        let mut stats = self.stats.lock();
        stats.total_size_bytes = size;
        stats.entry_count = count;
        Ok((size, count))
    }

    /// 完整性校验：偏差超过容差（或条目数不一致）时以扫描结果修复
    pub async fn verify_integrity(&self, now: i64) -> Result<IntegrityReport, StorageError> {
        let (actual_size, actual_count) = self.warm.calculate_total_size().await?;

        let mut stats = self.stats.lock();
        let tracked_size = stats.total_size_bytes;
        let tracked_count = stats.entry_count;
        let discrepancy = actual_size as i64 - tracked_size as i64;

        let repaired = discrepancy.unsigned_abs() > self.config.integrity_tolerance_bytes
            || actual_count != tracked_count;
        if repaired {
            stats.total_size_bytes = actual_size;
            stats.entry_count = actual_count;
        }
        stats.last_integrity_check_at = Some(now);
        drop(stats);

        if repaired {
            tracing::info!(
                tracked_size_bytes = tracked_size,
                actual_size_bytes = actual_size,
                tracked_entry_count = tracked_count,
                actual_entry_count = actual_count,
                discrepancy = discrepancy,
                "Cache stats repaired from rescan"
            );
        } else {
            tracing::debug!(discrepancy = discrepancy, "Cache integrity check passed");
        }

        Ok(IntegrityReport {
            repaired,
            discrepancy,
            tracked_size_bytes: tracked_size,
            actual_size_bytes: actual_size,
            tracked_entry_count: tracked_count,
            actual_entry_count: actual_count,
            checked_at: now,
        })
    }

    /// 持久化统计记录
    pub async fn persist(&self) -> Result<(), StorageError> {
        let snapshot = self.snapshot();
        self.warm.save_stats(&snapshot).await
    }
}
