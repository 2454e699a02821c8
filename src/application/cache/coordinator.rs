//! Cache Coordinator - 两级缓存门面
//!
//! 生命周期: Uninitialized -> Initializing -> Ready，另有与之正交的 Normal / Fallback 模式。
//!
//! - get: 热层 -> warm tier（命中后提升到热层）-> 未命中
//! - set: 大小校验 -> 阈值淘汰 -> 写 warm tier（空间不足时激进淘汰后重试一次）-> 写热层
//! - 存储层的不可恢复错误切换到 fallback：读总是未命中，写总是失败，不抛错
//!
//! 由组合根显式构造并注入，不是进程级单例。

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::background::BackgroundTasks;
use super::clock::MonotonicClock;
use super::eviction::{EvictionPolicy, EvictionResult};
use super::fallback::FallbackState;
use super::size_manager::{IntegrityReport, SizeManager, SizeManagerConfig};
use super::warm_tier::{PutOutcome, WarmTier};
use crate::application::ports::{
    BackgroundErrorObserver, BackgroundTask, TracingObserver, WarmStorePort,
};
use crate::domain::cache::{
    clamp_max_size, CacheEntry, CacheError, CacheKey, CacheMode, CacheStatsReport, EntrySummary,
    GlobalStats, InvalidationFilter, LifecycleState, StorageError, SynthesisPayload,
    DEFAULT_MAX_ENTRY_SIZE_BYTES, DEFAULT_MAX_SIZE_BYTES, SCHEMA_VERSION,
};
use crate::infrastructure::memory::HotTier;

/// 协调器配置
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub max_size_bytes: u64,
    pub max_entry_size_bytes: u64,
    pub hot_capacity: usize,
    pub eviction_trigger_pct: f64,
    pub eviction_target_pct: f64,
    /// 写入空间不足时一次性淘汰的比例（相对 `max_size_bytes`）
    pub aggressive_eviction_pct: f64,
    pub retention: Duration,
    pub sweep_interval: Duration,
    /// `None` 表示不启动定时完整性检查
    pub integrity_interval: Option<Duration>,
    pub integrity_tolerance_bytes: u64,
    pub fallback_cooldown: Duration,
    pub schema_version: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            max_entry_size_bytes: DEFAULT_MAX_ENTRY_SIZE_BYTES,
            hot_capacity: 50,
            eviction_trigger_pct: 0.95,
            eviction_target_pct: 0.80,
            aggressive_eviction_pct: 0.50,
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            integrity_interval: Some(Duration::from_secs(24 * 60 * 60)),
            integrity_tolerance_bytes: 1024,
            fallback_cooldown: Duration::from_secs(5 * 60),
            schema_version: SCHEMA_VERSION,
        }
    }
}

pub struct CacheCoordinator {
    config: CoordinatorConfig,
    warm: Arc<WarmTier>,
    hot: Mutex<HotTier<CacheEntry>>,
    size: SizeManager,
    eviction: EvictionPolicy,
    fallback: Arc<FallbackState>,
    clock: MonotonicClock,
    observer: Arc<dyn BackgroundErrorObserver>,
    state: Mutex<LifecycleState>,
    shutdown_token: CancellationToken,
    stopped: AtomicBool,
    /// 启动时存储打开失败，退出 fallback 后需要重新初始化
    init_pending: AtomicBool,
    init_lock: tokio::sync::Mutex<()>,
}

impl CacheCoordinator {
    pub fn new(store: Arc<dyn WarmStorePort>, config: CoordinatorConfig) -> Self {
        let warm = Arc::new(WarmTier::new(
            store,
            config.max_size_bytes,
            i64::try_from(config.retention.as_millis()).unwrap_or(i64::MAX),
        ));
        let size = SizeManager::new(
            warm.clone(),
            GlobalStats::new(config.max_size_bytes, config.schema_version),
            SizeManagerConfig {
                max_entry_size_bytes: config.max_entry_size_bytes,
                eviction_trigger_pct: config.eviction_trigger_pct,
                eviction_target_pct: config.eviction_target_pct,
                integrity_tolerance_bytes: config.integrity_tolerance_bytes,
            },
        );

        Self {
            hot: Mutex::new(HotTier::new(config.hot_capacity)),
            eviction: EvictionPolicy::new(warm.clone()),
            fallback: Arc::new(FallbackState::new(config.fallback_cooldown)),
            clock: MonotonicClock::new(),
            observer: Arc::new(TracingObserver),
            state: Mutex::new(LifecycleState::Uninitialized),
            shutdown_token: CancellationToken::new(),
            stopped: AtomicBool::new(false),
            init_pending: AtomicBool::new(false),
            init_lock: tokio::sync::Mutex::new(()),
            warm,
            size,
            config,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BackgroundErrorObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub fn mode(&self) -> CacheMode {
        if self.fallback.is_active() {
            CacheMode::Fallback
        } else {
            CacheMode::Normal
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// 初始化存储并启动后台任务
    ///
    /// 存储打开失败不会返回错误，而是进入 fallback 模式
    pub async fn init(self: &Arc<Self>) -> BackgroundTasks {
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::Uninitialized {
                tracing::warn!(state = ?*state, "Cache already initialized");
                return BackgroundTasks::new(self.shutdown_token.child_token());
            }
            *state = LifecycleState::Initializing;
        }

        match self.try_init().await {
            Ok(()) => {
                let stats = self.size.snapshot();
                tracing::info!(
                    entry_count = stats.entry_count,
                    total_size_bytes = stats.total_size_bytes,
                    max_size_bytes = stats.max_size_bytes,
                    hot_capacity = self.config.hot_capacity,
                    "Cache initialized"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Cache initialization failed");
                self.init_pending.store(true, Ordering::Release);
                self.fallback.enter(&e.to_string());
            }
        }

        *self.state.lock() = LifecycleState::Ready;
        self.spawn_background()
    }

    async fn try_init(&self) -> Result<(), CacheError> {
        self.warm
            .init()
            .await
            .map_err(|e| CacheError::StorageInitFailed(e.to_string()))?;

        let stats = match self.warm.load_stats().await? {
            Some(stored) if stored.schema_version != self.config.schema_version => {
                tracing::warn!(
                    stored_version = stored.schema_version,
                    current_version = self.config.schema_version,
                    "Cache schema version changed, clearing existing entries"
                );
                self.warm.clear().await?;
                GlobalStats::new(self.config.max_size_bytes, self.config.schema_version)
            }
            Some(mut stored) => {
                stored.max_size_bytes = self.config.max_size_bytes;
                stored
            }
            None => GlobalStats::new(self.config.max_size_bytes, self.config.schema_version),
        };
        self.size.replace(stats);

        // 启动时对齐统计与实际数据
        self.size.verify_integrity(self.clock.now_millis()).await?;
        self.size.persist().await?;
        Ok(())
    }

    fn spawn_background(self: &Arc<Self>) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new(self.shutdown_token.child_token());

        let weak = Arc::downgrade(self);
        tasks.spawn_periodic(BackgroundTask::Sweep, self.config.sweep_interval, move || {
            let weak = weak.clone();
            async move {
                if let Some(cache) = weak.upgrade() {
                    cache.run_sweep().await;
                }
            }
        });

        if let Some(interval) = self.config.integrity_interval {
            let weak = Arc::downgrade(self);
            tasks.spawn_periodic(BackgroundTask::IntegrityCheck, interval, move || {
                let weak = weak.clone();
                async move {
                    if let Some(cache) = weak.upgrade() {
                        cache.run_integrity_check().await;
                    }
                }
            });
        }

        tasks
    }

    async fn run_sweep(&self) {
        if !self.ready().await {
            return;
        }
        if let Err(e) = self.sweep_expired().await {
            self.observer.on_error(BackgroundTask::Sweep, None, &e);
        }
    }

    async fn run_integrity_check(&self) {
        if !self.ready().await {
            return;
        }
        if let Err(e) = self.check_integrity().await {
            self.observer.on_error(BackgroundTask::IntegrityCheck, None, &e);
        }
    }

    // ========== 读写 ==========

    /// 查询缓存；任何存储错误都降级为未命中
    pub async fn get(&self, text: &str, voice_id: &str, speed: f32) -> Option<SynthesisPayload> {
        if !self.ready().await {
            return None;
        }
        let key = match CacheKey::generate(text, voice_id, speed) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!(error = %e, "Cache lookup skipped");
                return None;
            }
        };
        self.get_by_key(&key).await
    }

    pub async fn get_by_key(&self, key: &CacheKey) -> Option<SynthesisPayload> {
        if !self.ready().await {
            return None;
        }
        let now = self.clock.now_millis();

        let hot_hit = {
            let mut hot = self.hot.lock();
            hot.get(key.as_str()).map(|entry| {
                entry.record_access(now);
                entry.payload()
            })
        };
        if let Some(payload) = hot_hit {
            self.size.record_hit();
            self.spawn_access_refresh(key.as_str().to_string(), now);
            tracing::debug!(cache_key = %key, tier = "hot", "Cache hit");
            return Some(payload);
        }

        match self.warm.get(key.as_str()).await {
            Ok(Some(mut entry)) => {
                if let Err(e) = self.warm.touch(key.as_str(), now).await {
                    let e = self.track(e);
                    self.observer
                        .on_error(BackgroundTask::AccessRefresh, Some(key.as_str()), &e);
                }
                entry.record_access(now);
                let payload = entry.payload();
                self.hot.lock().set(key.as_str(), entry);
                self.size.record_hit();
                tracing::debug!(cache_key = %key, tier = "warm", "Cache hit, promoted to hot tier");
                Some(payload)
            }
            Ok(None) => {
                self.size.record_miss();
                tracing::debug!(cache_key = %key, "Cache miss");
                None
            }
            Err(e) => {
                let e = self.track(e);
                tracing::warn!(cache_key = %key, error = %e, "Cache read failed, treating as miss");
                self.size.record_miss();
                None
            }
        }
    }

    /// 写入缓存
    ///
    /// - `Err(EntryTooLarge)` / `Err(KeyGenerationFailed)`：输入本身不可缓存
    /// - `Ok(false)`：fallback 模式或写入失败（调用方的合成结果不受影响）
    pub async fn set(
        &self,
        text: &str,
        voice_id: &str,
        speed: f32,
        payload: SynthesisPayload,
    ) -> Result<bool, CacheError> {
        if !self.ready().await {
            tracing::debug!("Cache unavailable, skipping store");
            return Ok(false);
        }

        let key = CacheKey::generate(text, voice_id, speed)?;
        let now = self.clock.now_millis();
        let entry = CacheEntry::new(&key, text, voice_id, speed, payload, now);
        self.size.validate(entry.total_size_bytes)?;

        match self.store_entry(entry).await {
            Ok(()) => Ok(true),
            Err(e) => {
                let e = self.track(e);
                tracing::error!(cache_key = %key, error = %e, "Failed to store cache entry");
                Ok(false)
            }
        }
    }

    async fn store_entry(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let size = entry.total_size_bytes;

        let check = self.size.check(size);
        if check.needed {
            tracing::debug!(
                bytes_to_free = check.bytes_to_free,
                "Cache occupancy above trigger, evicting"
            );
            self.evict_bytes(check.bytes_to_free).await?;
            self.size.reconcile_from_scan().await?;
        }

        let outcome = match self.warm.put(&entry).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_out_of_space() => {
                let target =
                    (self.size.max_size() as f64 * self.config.aggressive_eviction_pct) as u64;
                tracing::warn!(
                    cache_key = %entry.key,
                    error = %e,
                    bytes_to_free = target,
                    "Cache out of space, evicting aggressively and retrying once"
                );
                self.evict_bytes(target).await?;
                self.size.reconcile_from_scan().await?;
                self.warm.put(&entry).await?
            }
            Err(e) => return Err(e),
        };

        self.apply_put_outcome(&entry, &outcome);
        tracing::debug!(
            cache_key = %entry.key,
            size_bytes = size,
            chunks = entry.audio_chunks.len(),
            "Cache entry stored"
        );
        self.hot.lock().set(entry.key.clone(), entry);
        self.persist_stats().await;
        Ok(())
    }

    fn apply_put_outcome(&self, entry: &CacheEntry, outcome: &PutOutcome) {
        let replaced_size = outcome.replaced.as_ref().map(|r| r.size_bytes).unwrap_or(0);
        let replaced_count = i64::from(outcome.replaced.is_some());
        let evicted_count = outcome.evicted.len() as i64;

        self.size.update_global_stats(
            entry.total_size_bytes as i64 - replaced_size as i64 - outcome.evicted_bytes() as i64,
            1 - replaced_count - evicted_count,
        );
        if !outcome.evicted.is_empty() {
            self.forget_hot(&outcome.evicted);
            self.size
                .record_evictions(outcome.evicted.len() as u64, self.clock.now_millis());
        }
    }

    pub async fn has(&self, text: &str, voice_id: &str, speed: f32) -> bool {
        if !self.ready().await {
            return false;
        }
        let Ok(key) = CacheKey::generate(text, voice_id, speed) else {
            return false;
        };
        if self.hot.lock().has(key.as_str()) {
            return true;
        }
        match self.warm.has(key.as_str()).await {
            Ok(found) => found,
            Err(e) => {
                self.track(e);
                false
            }
        }
    }

    /// 删除单个条目，返回条目是否存在
    pub async fn remove(&self, text: &str, voice_id: &str, speed: f32) -> Result<bool, CacheError> {
        self.ensure_ready().await?;
        let key = CacheKey::generate(text, voice_id, speed)?;

        self.hot.lock().delete(key.as_str());
        let removed = self
            .warm
            .delete_many(&[key.as_str().to_string()])
            .await
            .map_err(|e| self.track(e))?;
        self.account_removed(&removed);
        self.persist_stats().await;
        Ok(!removed.is_empty())
    }

    // ========== 管理操作 ==========

    /// 选择性失效，返回删除的条目数
    pub async fn invalidate(&self, filter: &InvalidationFilter) -> Result<u64, CacheError> {
        self.ensure_ready().await?;

        if filter.requires_full_clear(self.config.schema_version) {
            let count = self.size.snapshot().entry_count;
            tracing::info!(
                requested_version = ?filter.version,
                current_version = self.config.schema_version,
                "Schema version mismatch, clearing cache"
            );
            self.clear().await?;
            return Ok(count);
        }
        if filter.is_empty() {
            return Ok(0);
        }

        let removed = match filter.voice_id.as_deref() {
            Some(voice_id) => {
                self.warm
                    .delete_matching_voice(voice_id, |s| filter.matches(s))
                    .await
            }
            None => self.warm.delete_matching(|s| filter.matches(s)).await,
        }
        .map_err(|e| self.track(e))?;

        self.forget_hot(&removed);
        self.account_removed(&removed);
        self.persist_stats().await;

        tracing::info!(
            voice_id = ?filter.voice_id,
            older_than = ?filter.older_than,
            removed = removed.len(),
            "Cache entries invalidated"
        );
        Ok(removed.len() as u64)
    }

    /// 清空两级缓存，可重复调用
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.ensure_ready().await?;
        self.warm.clear().await.map_err(|e| self.track(e))?;
        self.hot.lock().clear();
        self.size.reset_usage();
        self.persist_stats().await;
        tracing::info!("Cache cleared");
        Ok(())
    }

    /// 按字节淘汰；未指定目标时淘汰到 `max × target_pct`
    pub async fn evict(&self, target_bytes: Option<u64>) -> Result<EvictionResult, CacheError> {
        self.ensure_ready().await?;
        let target = match target_bytes {
            Some(bytes) => bytes,
            None => {
                let stats = self.size.snapshot();
                EvictionPolicy::calculate_eviction_amount(
                    stats.total_size_bytes,
                    stats.max_size_bytes,
                    self.size.target_pct(),
                )
            }
        };

        let result = self
            .evict_bytes(target)
            .await
            .map_err(|e| self.track(e))?;
        self.size
            .reconcile_from_scan()
            .await
            .map_err(|e| self.track(e))?;
        self.persist_stats().await;
        Ok(result)
    }

    /// 按数量淘汰最旧的条目
    pub async fn evict_oldest(&self, count: usize) -> Result<EvictionResult, CacheError> {
        self.ensure_ready().await?;
        let entries = self.warm.summaries().await.map_err(|e| self.track(e))?;
        let result = self
            .eviction
            .evict_oldest(&entries, count)
            .await
            .map_err(|e| self.track(e))?;
        self.apply_eviction(&result);
        self.persist_stats().await;
        Ok(result)
    }

    /// 调整容量上限，返回实际生效的值
    pub async fn update_max_size(&self, bytes: u64) -> Result<u64, CacheError> {
        self.ensure_ready().await?;
        let clamped = clamp_max_size(bytes);
        self.size.set_max_size(clamped);
        tracing::info!(requested = bytes, max_size_bytes = clamped, "Cache max size updated");

        if self.size.snapshot().total_size_bytes > clamped {
            self.evict(None).await?;
        } else {
            self.persist_stats().await;
        }
        Ok(clamped)
    }

    /// 开始新的统计周期
    pub async fn reset_stats(&self) -> Result<(), CacheError> {
        self.ensure_ready().await?;
        self.size.reset_counters();
        self.persist_stats().await;
        Ok(())
    }

    pub async fn check_integrity(&self) -> Result<IntegrityReport, CacheError> {
        self.ensure_ready().await?;
        let report = self
            .size
            .verify_integrity(self.clock.now_millis())
            .await
            .map_err(|e| self.track(e))?;
        self.persist_stats().await;
        Ok(report)
    }

    /// 删除超过保留期的条目，返回删除数量
    pub async fn sweep_expired(&self) -> Result<u64, CacheError> {
        self.ensure_ready().await?;
        let removed = self
            .warm
            .sweep_expired(self.clock.now_millis())
            .await
            .map_err(|e| self.track(e))?;
        if !removed.is_empty() {
            self.forget_hot(&removed);
            self.account_removed(&removed);
            self.persist_stats().await;
        }
        Ok(removed.len() as u64)
    }

    /// 统计报告；存储不可用时返回全零报告
    pub async fn get_stats(&self) -> CacheStatsReport {
        let state = self.state();
        let mode = self.mode();
        if !self.ready().await {
            return CacheStatsReport::zeroed(state, mode);
        }

        match self.warm.summaries().await {
            Ok(entries) => {
                let (hot_entries, hot_capacity) = {
                    let hot = self.hot.lock();
                    (hot.len(), hot.capacity())
                };
                CacheStatsReport::derive(
                    &self.size.snapshot(),
                    &entries,
                    self.clock.now_millis(),
                    state,
                    mode,
                )
                .with_hot_tier(hot_entries, hot_capacity)
            }
            Err(e) => {
                let e = self.track(e);
                tracing::warn!(error = %e, "Failed to read cache stats");
                CacheStatsReport::zeroed(state, self.mode())
            }
        }
    }

    pub async fn flush(&self) -> Result<(), CacheError> {
        self.ensure_ready().await?;
        self.size.persist().await.map_err(|e| self.track(e))?;
        self.warm.flush().await.map_err(|e| self.track(e))?;
        Ok(())
    }

    /// 停止后台任务和 fallback 定时器并落盘统计，可重复调用
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown_token.cancel();
        self.fallback.shutdown();

        if self.is_operational() && !self.init_pending.load(Ordering::Acquire) {
            if let Err(e) = self.flush().await {
                tracing::warn!(error = %e, "Failed to flush cache on shutdown");
            }
        }
        tracing::info!("Cache shut down");
    }

    // ========== 内部 ==========

    fn is_operational(&self) -> bool {
        self.state() == LifecycleState::Ready && !self.fallback.is_active()
    }

    /// 可用性检查；启动失败的存储在 fallback 结束后的第一次调用时重新初始化
    async fn ready(&self) -> bool {
        if !self.is_operational() {
            return false;
        }
        if !self.init_pending.load(Ordering::Acquire) {
            return true;
        }

        let _guard = self.init_lock.lock().await;
        if !self.init_pending.load(Ordering::Acquire) {
            return self.is_operational();
        }
        match self.try_init().await {
            Ok(()) => {
                self.init_pending.store(false, Ordering::Release);
                let stats = self.size.snapshot();
                tracing::info!(
                    entry_count = stats.entry_count,
                    total_size_bytes = stats.total_size_bytes,
                    "Cache storage recovered"
                );
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cache re-initialization failed");
                self.fallback.enter(&e.to_string());
                false
            }
        }
    }

    async fn ensure_ready(&self) -> Result<(), CacheError> {
        if self.ready().await {
            Ok(())
        } else {
            Err(CacheError::Storage(StorageError::InvalidState(format!(
                "cache unavailable (state: {:?}, mode: {:?})",
                self.state(),
                self.mode()
            ))))
        }
    }

    /// 不可恢复的错误切换到 fallback 模式
    fn track(&self, err: impl Into<CacheError>) -> CacheError {
        let err = err.into();
        if err.is_critical() {
            self.fallback.enter(&err.to_string());
        }
        err
    }

    async fn evict_bytes(&self, target_bytes: u64) -> Result<EvictionResult, CacheError> {
        let entries = self.warm.entries_sorted_by_last_access().await?;
        let result = self.eviction.evict(&entries, target_bytes).await?;
        self.apply_eviction(&result);
        Ok(result)
    }

    fn apply_eviction(&self, result: &EvictionResult) {
        if result.entries_removed == 0 {
            return;
        }
        {
            let mut hot = self.hot.lock();
            for key in &result.removed_keys {
                hot.delete(key);
            }
        }
        self.size.update_global_stats(
            -(result.bytes_freed as i64),
            -(result.entries_removed as i64),
        );
        self.size
            .record_evictions(result.entries_removed, self.clock.now_millis());
    }

    fn account_removed(&self, removed: &[EntrySummary]) {
        let bytes: u64 = removed.iter().map(|s| s.size_bytes).sum();
        self.size
            .update_global_stats(-(bytes as i64), -(removed.len() as i64));
    }

    fn forget_hot(&self, removed: &[EntrySummary]) {
        let mut hot = self.hot.lock();
        for summary in removed {
            hot.delete(&summary.key);
        }
    }

    fn spawn_access_refresh(&self, key: String, accessed_at: i64) {
        let warm = self.warm.clone();
        let observer = self.observer.clone();
        let fallback = self.fallback.clone();
        tokio::spawn(async move {
            if let Err(e) = warm.touch(&key, accessed_at).await {
                let e = CacheError::from(e);
                if e.is_critical() {
                    fallback.enter(&e.to_string());
                }
                observer.on_error(BackgroundTask::AccessRefresh, Some(&key), &e);
            }
        });
    }

    async fn persist_stats(&self) {
        if let Err(e) = self.size.persist().await {
            let e = self.track(e);
            self.observer.on_error(BackgroundTask::StatsPersist, None, &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{AudioChunk, PhraseMarker};
    use crate::infrastructure::memory::InMemoryWarmStore;

    fn test_config() -> CoordinatorConfig {
        CoordinatorConfig {
            max_size_bytes: 1000,
            max_entry_size_bytes: 400,
            hot_capacity: 4,
            fallback_cooldown: Duration::from_millis(100),
            integrity_interval: None,
            ..Default::default()
        }
    }

    fn payload(size: usize) -> SynthesisPayload {
        SynthesisPayload {
            audio_chunks: vec![AudioChunk::new(vec![1u8; size])],
            metadata: vec![serde_json::json!({"chunk_index": 0})],
            phrase_timeline: Vec::new(),
        }
    }

    async fn setup_with(
        store: Arc<InMemoryWarmStore>,
        config: CoordinatorConfig,
    ) -> (Arc<CacheCoordinator>, BackgroundTasks) {
        let cache = CacheCoordinator::new(store, config).arc();
        let tasks = cache.init().await;
        (cache, tasks)
    }

    async fn setup() -> (Arc<CacheCoordinator>, Arc<InMemoryWarmStore>) {
        let store = InMemoryWarmStore::new().arc();
        let (cache, _tasks) = setup_with(store.clone(), test_config()).await;
        (cache, store)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (cache, _) = setup().await;
        let data = SynthesisPayload {
            audio_chunks: vec![AudioChunk::new(vec![1u8, 2, 3]), AudioChunk::new(vec![4u8, 5])],
            metadata: vec![serde_json::json!({"i": 0}), serde_json::json!({"i": 1})],
            phrase_timeline: vec![PhraseMarker {
                text: "Hello".to_string(),
                start_time_ms: 0.0,
                end_time_ms: 120.0,
                chunk_index: 0,
            }],
        };

        assert!(cache.set("Hello world", "bf_lily", 1.0, data.clone()).await.unwrap());
        let cached = cache.get("Hello world", "bf_lily", 1.0).await.unwrap();
        assert_eq!(cached, data);

        // 空白和语速容差命中同一个条目
        assert!(cache.get("  Hello   world ", "bf_lily", 1.04).await.is_some());
        assert!(cache.get("Hello world", "bf_emma", 1.0).await.is_none());

        let stats = cache.get_stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size_bytes, 5);
    }

    #[tokio::test]
    async fn test_warm_hit_promotes_to_hot() {
        let (cache, store) = setup().await;
        cache.set("promote me", "bf_lily", 1.0, payload(10)).await.unwrap();
        let key = CacheKey::generate("promote me", "bf_lily", 1.0).unwrap();

        cache.hot.lock().clear();
        assert!(cache.get("promote me", "bf_lily", 1.0).await.is_some());
        assert!(cache.hot.lock().has(key.as_str()));

        let summary = store.summary(key.as_str()).await.unwrap().unwrap();
        assert_eq!(summary.access_count, 1);
    }

    #[tokio::test]
    async fn test_entry_size_boundary() {
        let (cache, _) = setup().await;
        assert!(cache.set("exact", "bf_lily", 1.0, payload(400)).await.unwrap());

        let result = cache.set("over", "bf_lily", 1.0, payload(401)).await;
        assert_eq!(
            result,
            Err(CacheError::EntryTooLarge {
                size: 401,
                limit: 400
            })
        );
    }

    #[tokio::test]
    async fn test_pre_insert_eviction_uses_hysteresis() {
        let (cache, _) = setup().await;
        for text in ["a", "b", "c"] {
            assert!(cache.set(text, "bf_lily", 1.0, payload(300)).await.unwrap());
        }

        // 900 + 300 > 950，淘汰到 800 需要释放 400 字节，即两个最旧的条目
        assert!(cache.set("d", "bf_lily", 1.0, payload(300)).await.unwrap());

        assert!(!cache.has("a", "bf_lily", 1.0).await);
        assert!(!cache.has("b", "bf_lily", 1.0).await);
        assert!(cache.has("c", "bf_lily", 1.0).await);
        assert!(cache.has("d", "bf_lily", 1.0).await);

        let stats = cache.get_stats().await;
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.total_size_bytes, 600);
        assert_eq!(stats.entry_count, 2);
        assert!(stats.last_eviction_at.is_some());
    }

    #[tokio::test]
    async fn test_quota_exceeded_retries_after_aggressive_eviction() {
        let store = InMemoryWarmStore::with_quota(600).arc();
        let (cache, _tasks) = setup_with(store.clone(), test_config()).await;

        assert!(cache.set("a", "bf_lily", 1.0, payload(250)).await.unwrap());
        assert!(cache.set("b", "bf_lily", 1.0, payload(250)).await.unwrap());
        // 750 低于触发阈值，但超过存储配额
        assert!(cache.set("c", "bf_lily", 1.0, payload(250)).await.unwrap());

        assert!(!cache.has("a", "bf_lily", 1.0).await);
        assert!(!cache.has("b", "bf_lily", 1.0).await);
        assert!(cache.get("c", "bf_lily", 1.0).await.is_some());
        assert_eq!(cache.mode(), CacheMode::Normal);

        let stats = cache.get_stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size_bytes, 250);
    }

    #[tokio::test]
    async fn test_quota_retry_failure_reports_false() {
        let store = InMemoryWarmStore::with_quota(100).arc();
        let (cache, _tasks) = setup_with(store, test_config()).await;

        assert!(!cache.set("a", "bf_lily", 1.0, payload(250)).await.unwrap());
        assert_eq!(cache.mode(), CacheMode::Normal);
        assert!(cache.get("a", "bf_lily", 1.0).await.is_none());
    }

    #[tokio::test]
    async fn test_fallback_safety_and_recovery() {
        let (cache, store) = setup().await;
        cache.set("kept", "bf_lily", 1.0, payload(10)).await.unwrap();

        store.fail_with(StorageError::Unknown("disk vanished".to_string()));
        assert!(cache.get("missing", "bf_lily", 1.0).await.is_none());
        assert_eq!(cache.mode(), CacheMode::Fallback);

        store.clear_failure();
        for _ in 0..3 {
            assert!(cache.get("kept", "bf_lily", 1.0).await.is_none());
            assert!(!cache.set("new", "bf_lily", 1.0, payload(10)).await.unwrap());
        }
        let stats = cache.get_stats().await;
        assert_eq!(stats.mode, CacheMode::Fallback);
        assert_eq!(stats.entry_count, 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(cache.mode(), CacheMode::Normal);
        assert!(cache.get("kept", "bf_lily", 1.0).await.is_some());
    }

    #[tokio::test]
    async fn test_transaction_error_degrades_to_miss() {
        let (cache, store) = setup().await;
        store.fail_with(StorageError::Transaction("conflict".to_string()));

        assert!(cache.get("anything", "bf_lily", 1.0).await.is_none());
        assert_eq!(cache.mode(), CacheMode::Normal);
        assert!(!cache.set("anything", "bf_lily", 1.0, payload(10)).await.unwrap());
        assert_eq!(cache.mode(), CacheMode::Normal);
    }

    #[tokio::test]
    async fn test_init_failure_enters_fallback() {
        let store = InMemoryWarmStore::new().arc();
        store.fail_with(StorageError::InvalidState("cannot open".to_string()));
        let (cache, _tasks) = setup_with(store, test_config()).await;

        assert_eq!(cache.state(), LifecycleState::Ready);
        assert_eq!(cache.mode(), CacheMode::Fallback);
        assert!(cache.get("a", "bf_lily", 1.0).await.is_none());
        assert!(!cache.set("a", "bf_lily", 1.0, payload(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_init_failure_recovers_after_cooldown() {
        let store = InMemoryWarmStore::new().arc();
        store.fail_with(StorageError::InvalidState("cannot open".to_string()));
        let (cache, _tasks) = setup_with(store.clone(), test_config()).await;
        assert_eq!(cache.mode(), CacheMode::Fallback);

        store.clear_failure();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(cache.mode(), CacheMode::Normal);

        assert!(cache.set("after", "bf_lily", 1.0, payload(10)).await.unwrap());
        assert!(cache.get("after", "bf_lily", 1.0).await.is_some());
        assert_eq!(cache.mode(), CacheMode::Normal);
        assert_eq!(cache.get_stats().await.entry_count, 1);
    }

    #[tokio::test]
    async fn test_failed_reinit_returns_to_fallback() {
        let store = InMemoryWarmStore::new().arc();
        store.fail_with(StorageError::InvalidState("cannot open".to_string()));
        let (cache, _tasks) = setup_with(store.clone(), test_config()).await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(cache.mode(), CacheMode::Normal);
        assert!(cache.get("a", "bf_lily", 1.0).await.is_none());
        assert_eq!(cache.mode(), CacheMode::Fallback);

        store.clear_failure();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(cache.set("a", "bf_lily", 1.0, payload(10)).await.unwrap());
        assert!(cache.get("a", "bf_lily", 1.0).await.is_some());
    }

    #[tokio::test]
    async fn test_uninitialized_cache_is_inert() {
        let cache = CacheCoordinator::new(InMemoryWarmStore::new().arc(), test_config());
        assert_eq!(cache.state(), LifecycleState::Uninitialized);
        assert!(cache.get("a", "bf_lily", 1.0).await.is_none());
        assert!(!cache.set("a", "bf_lily", 1.0, payload(10)).await.unwrap());
        assert_eq!(cache.mode(), CacheMode::Normal);
    }

    #[tokio::test]
    async fn test_idempotent_clear() {
        let (cache, _) = setup().await;
        cache.set("a", "bf_lily", 1.0, payload(10)).await.unwrap();
        cache.set("b", "bf_lily", 1.0, payload(20)).await.unwrap();

        for _ in 0..2 {
            cache.clear().await.unwrap();
            let stats = cache.get_stats().await;
            assert_eq!(stats.entry_count, 0);
            assert_eq!(stats.total_size_bytes, 0);
        }
        assert!(cache.get("a", "bf_lily", 1.0).await.is_none());
    }

    #[tokio::test]
    async fn test_integrity_self_healing() {
        let (cache, _) = setup().await;
        cache.set("a", "bf_lily", 1.0, payload(300)).await.unwrap();
        cache.set("b", "bf_lily", 1.0, payload(200)).await.unwrap();

        cache.size.update_global_stats(5000, 0);
        assert_eq!(cache.get_stats().await.total_size_bytes, 5500);

        let report = cache.check_integrity().await.unwrap();
        assert!(report.repaired);
        assert_eq!(report.discrepancy, -5000);

        let stats = cache.get_stats().await;
        assert_eq!(stats.total_size_bytes, 500);
        assert!(stats.last_integrity_check_at.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_by_voice() {
        let (cache, _) = setup().await;
        cache.set("a", "bf_lily", 1.0, payload(10)).await.unwrap();
        cache.set("b", "bf_lily", 1.0, payload(10)).await.unwrap();
        cache.set("a", "am_adam", 1.0, payload(10)).await.unwrap();

        let removed = cache
            .invalidate(&InvalidationFilter::for_voice("bf_lily"))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(cache.get("a", "bf_lily", 1.0).await.is_none());
        assert!(cache.get("a", "am_adam", 1.0).await.is_some());
        assert_eq!(cache.get_stats().await.entry_count, 1);
    }

    #[tokio::test]
    async fn test_invalidate_older_than_and_empty_filter() {
        let (cache, _) = setup().await;
        cache.set("old", "bf_lily", 1.0, payload(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let cutoff = chrono::Utc::now().timestamp_millis();
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.set("new", "bf_lily", 1.0, payload(10)).await.unwrap();

        assert_eq!(cache.invalidate(&InvalidationFilter::default()).await.unwrap(), 0);
        assert_eq!(
            cache
                .invalidate(&InvalidationFilter::older_than(cutoff))
                .await
                .unwrap(),
            1
        );
        assert!(!cache.has("old", "bf_lily", 1.0).await);
        assert!(cache.has("new", "bf_lily", 1.0).await);
    }

    #[tokio::test]
    async fn test_invalidate_version_mismatch_clears() {
        let (cache, _) = setup().await;
        cache.set("a", "bf_lily", 1.0, payload(10)).await.unwrap();
        cache.set("b", "am_adam", 1.0, payload(10)).await.unwrap();

        let removed = cache
            .invalidate(&InvalidationFilter::version(SCHEMA_VERSION + 1))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.get_stats().await.entry_count, 0);
    }

    #[tokio::test]
    async fn test_schema_change_clears_on_init() {
        let store = InMemoryWarmStore::new().arc();
        {
            let (cache, _tasks) = setup_with(store.clone(), test_config()).await;
            cache.set("a", "bf_lily", 1.0, payload(10)).await.unwrap();
            cache.shutdown().await;
        }

        let config = CoordinatorConfig {
            schema_version: SCHEMA_VERSION + 1,
            ..test_config()
        };
        let (cache, _tasks) = setup_with(store.clone(), config).await;
        assert!(store.is_empty());
        assert_eq!(cache.get_stats().await.entry_count, 0);
    }

    #[tokio::test]
    async fn test_stats_survive_restart() {
        let store = InMemoryWarmStore::new().arc();
        {
            let (cache, _tasks) = setup_with(store.clone(), test_config()).await;
            cache.set("a", "bf_lily", 1.0, payload(10)).await.unwrap();
            cache.get("a", "bf_lily", 1.0).await;
            cache.shutdown().await;
        }

        let (cache, _tasks) = setup_with(store, test_config()).await;
        let stats = cache.get_stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entry_count, 1);
        // 重启后热层为空，从 warm tier 读取
        assert!(cache.get("a", "bf_lily", 1.0).await.is_some());
    }

    #[tokio::test]
    async fn test_manual_eviction() {
        let (cache, _) = setup().await;
        for text in ["a", "b", "c"] {
            cache.set(text, "bf_lily", 1.0, payload(100)).await.unwrap();
        }

        let result = cache.evict_oldest(1).await.unwrap();
        assert_eq!(result.entries_removed, 1);
        assert!(!cache.has("a", "bf_lily", 1.0).await);

        let result = cache.evict(Some(150)).await.unwrap();
        assert_eq!(result.entries_removed, 2);
        assert_eq!(result.bytes_freed, 200);

        let stats = cache.get_stats().await;
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.evictions, 3);
    }

    #[tokio::test]
    async fn test_default_eviction_target() {
        let (cache, _) = setup().await;
        for i in 0..9 {
            let text = format!("entry {}", i);
            assert!(cache.set(&text, "bf_lily", 1.0, payload(100)).await.unwrap());
        }

        // 900 字节，淘汰到 1000 × 0.8
        let result = cache.evict(None).await.unwrap();
        assert_eq!(result.entries_removed, 1);
        assert_eq!(result.bytes_freed, 100);
        assert!(!cache.has("entry 0", "bf_lily", 1.0).await);
        assert_eq!(cache.get_stats().await.total_size_bytes, 800);
    }

    #[tokio::test]
    async fn test_update_max_size_clamps() {
        let (cache, _) = setup().await;
        let applied = cache.update_max_size(1).await.unwrap();
        assert_eq!(applied, crate::domain::cache::MIN_MAX_SIZE_BYTES);
        assert_eq!(cache.get_stats().await.max_size_bytes, applied);

        let applied = cache.update_max_size(u64::MAX).await.unwrap();
        assert_eq!(applied, crate::domain::cache::MAX_MAX_SIZE_BYTES);
    }

    #[tokio::test]
    async fn test_reset_stats_keeps_usage() {
        let (cache, _) = setup().await;
        cache.set("a", "bf_lily", 1.0, payload(10)).await.unwrap();
        cache.get("a", "bf_lily", 1.0).await;
        cache.get("b", "bf_lily", 1.0).await;

        cache.reset_stats().await.unwrap();
        let stats = cache.get_stats().await;
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let (cache, _) = setup().await;
        cache.set("a", "bf_lily", 1.0, payload(10)).await.unwrap();
        assert!(cache.remove("a", "bf_lily", 1.0).await.unwrap());
        assert!(!cache.remove("a", "bf_lily", 1.0).await.unwrap());
        assert!(cache.get("a", "bf_lily", 1.0).await.is_none());
        assert_eq!(cache.get_stats().await.entry_count, 0);
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let store = InMemoryWarmStore::new().arc();
        let config = CoordinatorConfig {
            retention: Duration::from_millis(1),
            ..test_config()
        };
        let (cache, _tasks) = setup_with(store, config).await;
        cache.set("a", "bf_lily", 1.0, payload(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(cache.sweep_expired().await.unwrap(), 1);
        assert!(cache.get("a", "bf_lily", 1.0).await.is_none());
        assert_eq!(cache.get_stats().await.total_size_bytes, 0);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let store = InMemoryWarmStore::new().arc();
        let (cache, mut tasks) = setup_with(store, test_config()).await;
        assert_eq!(tasks.len(), 1);

        cache.shutdown().await;
        cache.shutdown().await;
        tasks.shutdown().await;
        tasks.shutdown().await;
        assert!(tasks.is_empty());
    }
    #[tokio::test]
    async fn test_huge_retention_keeps_fresh_entries() {
        let store = InMemoryWarmStore::new().arc();
        let config = CoordinatorConfig {
            retention: Duration::from_secs(u64::MAX),
            ..test_config()
        };
        let (cache, _tasks) = setup_with(store, config).await;
        cache.set("fresh", "bf_lily", 1.0, payload(10)).await.unwrap();

        assert_eq!(cache.sweep_expired().await.unwrap(), 0);
        assert!(cache.get("fresh", "bf_lily", 1.0).await.is_some());
    }

    #[tokio::test]
    async fn test_hot_hit_refreshes_warm_access() {
        let (cache, store) = setup().await;
        cache.set("hot", "bf_lily", 1.0, payload(10)).await.unwrap();
        let key = CacheKey::generate("hot", "bf_lily", 1.0).unwrap();
        let before = store.summary(key.as_str()).await.unwrap().unwrap();

        assert!(cache.hot.lock().has(key.as_str()));
        assert!(cache.get("hot", "bf_lily", 1.0).await.is_some());
        tokio::time::sleep(Duration::from_millis(50)).await;

        let after = store.summary(key.as_str()).await.unwrap().unwrap();
        assert_eq!(after.access_count, before.access_count + 1);
        assert!(after.last_accessed_at > before.last_accessed_at);
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<(BackgroundTask, Option<String>)>>,
    }

    impl BackgroundErrorObserver for RecordingObserver {
        fn on_error(&self, task: BackgroundTask, key: Option<&str>, _error: &CacheError) {
            self.events.lock().push((task, key.map(str::to_string)));
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_reports_to_observer() {
        let store = InMemoryWarmStore::new().arc();
        let observer = Arc::new(RecordingObserver::default());
        let cache = CacheCoordinator::new(store.clone(), test_config())
            .with_observer(observer.clone())
            .arc();
        let _tasks = cache.init().await;

        cache.set("hot", "bf_lily", 1.0, payload(10)).await.unwrap();
        let key = CacheKey::generate("hot", "bf_lily", 1.0).unwrap();
        store.fail_with(StorageError::Transaction("conflict".to_string()));

        assert!(cache.get("hot", "bf_lily", 1.0).await.is_some());
        tokio::time::sleep(Duration::from_millis(50)).await;

        let events = observer.events.lock().clone();
        assert_eq!(
            events,
            vec![(BackgroundTask::AccessRefresh, Some(key.as_str().to_string()))]
        );
        assert_eq!(cache.mode(), CacheMode::Normal);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_gets_during_eviction() {
        let store = InMemoryWarmStore::new().arc();
        let (cache, _tasks) = setup_with(store.clone(), test_config()).await;
        let texts: Vec<String> = (0..6).map(|i| format!("entry {}", i)).collect();
        for text in &texts {
            assert!(cache.set(text, "bf_lily", 1.0, payload(100)).await.unwrap());
        }

        let mut readers = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let texts = texts.clone();
            readers.push(tokio::spawn(async move {
                let mut lookups = 0u64;
                for _ in 0..25 {
                    for text in &texts {
                        let _ = cache.get(text, "bf_lily", 1.0).await;
                        lookups += 1;
                    }
                }
                lookups
            }));
        }
        let evictor = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache.evict_oldest(2).await.unwrap();
                cache.evict(Some(150)).await.unwrap();
            })
        };

        let mut lookups = 0;
        for reader in readers {
            lookups += reader.await.unwrap();
        }
        evictor.await.unwrap();

        let stats = cache.get_stats().await;
        assert_eq!(stats.hits + stats.misses, lookups);
        assert_eq!(stats.evictions, 4);
        assert_eq!(stats.entry_count, store.len() as u64);
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.total_size_bytes, 200);
        assert_eq!(cache.mode(), CacheMode::Normal);
    }
}
