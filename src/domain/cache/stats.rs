//! Cache Context - Statistics
//!
//! `GlobalStats` 为每个缓存实例唯一的统计记录，随 warm tier 持久化

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::entry::EntrySummary;

/// 默认缓存上限: 100 MiB
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 100 * 1024 * 1024;
/// 默认单条目上限: 20 MiB
pub const DEFAULT_MAX_ENTRY_SIZE_BYTES: u64 = 20 * 1024 * 1024;
/// 运行时调整上限时的下界: 10 MiB
pub const MIN_MAX_SIZE_BYTES: u64 = 10 * 1024 * 1024;
/// 运行时调整上限时的上界
pub const MAX_MAX_SIZE_BYTES: u64 = DEFAULT_MAX_SIZE_BYTES * 5;
/// 当前条目结构版本
pub const SCHEMA_VERSION: u32 = 1;

/// 全局统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_size_bytes: u64,
    pub entry_count: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub max_size_bytes: u64,
    pub last_eviction_at: Option<i64>,
    pub last_integrity_check_at: Option<i64>,
    pub schema_version: u32,
}

impl GlobalStats {
    pub fn new(max_size_bytes: u64, schema_version: u32) -> Self {
        Self {
            total_size_bytes: 0,
            entry_count: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            max_size_bytes,
            last_eviction_at: None,
            last_integrity_check_at: None,
            schema_version,
        }
    }

    /// 应用带符号的增量，结果下限为 0
    pub fn apply_delta(&mut self, size_delta: i64, count_delta: i64) {
        self.total_size_bytes = apply_signed(self.total_size_bytes, size_delta);
        self.entry_count = apply_signed(self.entry_count, count_delta);
    }

    /// 开始新的统计周期（不影响容量统计）
    pub fn reset_counters(&mut self) {
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE_BYTES, SCHEMA_VERSION)
    }
}

fn apply_signed(value: u64, delta: i64) -> u64 {
    if delta >= 0 {
        value.saturating_add(delta as u64)
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}

/// 把上限限制在 `[MIN_MAX_SIZE_BYTES, MAX_MAX_SIZE_BYTES]`
pub fn clamp_max_size(bytes: u64) -> u64 {
    bytes.clamp(MIN_MAX_SIZE_BYTES, MAX_MAX_SIZE_BYTES)
}

/// 生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
}

/// 运行模式（与生命周期正交）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    Normal,
    Fallback,
}

/// 对外的统计报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatsReport {
    pub state: LifecycleState,
    pub mode: CacheMode,
    pub total_size_bytes: u64,
    pub entry_count: u64,
    pub max_size_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
    pub usage_percent: f64,
    pub average_entry_size: u64,
    pub oldest_entry_age_ms: Option<i64>,
    pub newest_entry_age_ms: Option<i64>,
    pub hot_entries: usize,
    pub hot_capacity: usize,
    pub last_eviction_at: Option<DateTime<Utc>>,
    pub last_integrity_check_at: Option<DateTime<Utc>>,
}

impl CacheStatsReport {
    /// 存储不可用时返回的全零报告
    pub fn zeroed(state: LifecycleState, mode: CacheMode) -> Self {
        Self {
            state,
            mode,
            total_size_bytes: 0,
            entry_count: 0,
            max_size_bytes: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            hit_rate: 0.0,
            usage_percent: 0.0,
            average_entry_size: 0,
            oldest_entry_age_ms: None,
            newest_entry_age_ms: None,
            hot_entries: 0,
            hot_capacity: 0,
            last_eviction_at: None,
            last_integrity_check_at: None,
        }
    }

    /// 由统计记录和 warm tier 扫描结果推导报告
    pub fn derive(
        stats: &GlobalStats,
        entries: &[EntrySummary],
        now: i64,
        state: LifecycleState,
        mode: CacheMode,
    ) -> Self {
        let usage_percent = if stats.max_size_bytes == 0 {
            0.0
        } else {
            stats.total_size_bytes as f64 / stats.max_size_bytes as f64 * 100.0
        };
        let average_entry_size = if stats.entry_count == 0 {
            0
        } else {
            stats.total_size_bytes / stats.entry_count
        };

        let oldest = entries.iter().map(|e| e.created_at).min();
        let newest = entries.iter().map(|e| e.created_at).max();

        Self {
            state,
            mode,
            total_size_bytes: stats.total_size_bytes,
            entry_count: stats.entry_count,
            max_size_bytes: stats.max_size_bytes,
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            hit_rate: stats.hit_rate(),
            usage_percent,
            average_entry_size,
            oldest_entry_age_ms: oldest.map(|t| (now - t).max(0)),
            newest_entry_age_ms: newest.map(|t| (now - t).max(0)),
            hot_entries: 0,
            hot_capacity: 0,
            last_eviction_at: stats.last_eviction_at.and_then(millis_to_datetime),
            last_integrity_check_at: stats.last_integrity_check_at.and_then(millis_to_datetime),
        }
    }

    pub fn with_hot_tier(mut self, hot_entries: usize, hot_capacity: usize) -> Self {
        self.hot_entries = hot_entries;
        self.hot_capacity = hot_capacity;
        self
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
