//! Application State
//!
//! 包含缓存、TTS 端口和所有 Command/Query Handlers

use std::sync::Arc;

use crate::application::{
    // Command handlers
    CheckIntegrityHandler, ClearCacheHandler, EvictCacheHandler, InvalidateCacheHandler,
    ResetCacheStatsHandler, SynthesizeHandler, UpdateMaxSizeHandler,
    // Query handlers
    GetCacheStatsHandler,
    // Ports
    CacheCoordinator, TtsEnginePort,
};

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub cache: Arc<CacheCoordinator>,
    pub tts_engine: Arc<dyn TtsEnginePort>,

    // ========== Settings ==========
    pub default_voice: String,
    /// 设置后 `/api/tts` 和 `/api/cache/*` 需要 X-API-Key 或 Bearer token
    pub api_key: Option<String>,

    // ========== Command Handlers ==========
    pub synthesize_handler: SynthesizeHandler,
    pub evict_cache_handler: EvictCacheHandler,
    pub invalidate_cache_handler: InvalidateCacheHandler,
    pub clear_cache_handler: ClearCacheHandler,
    pub update_max_size_handler: UpdateMaxSizeHandler,
    pub reset_cache_stats_handler: ResetCacheStatsHandler,
    pub check_integrity_handler: CheckIntegrityHandler,

    // ========== Query Handlers ==========
    pub get_cache_stats_handler: GetCacheStatsHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        cache: Arc<CacheCoordinator>,
        tts_engine: Arc<dyn TtsEnginePort>,
        default_voice: impl Into<String>,
    ) -> Self {
        Self {
            // Ports
            cache: cache.clone(),
            tts_engine: tts_engine.clone(),

            default_voice: default_voice.into(),
            api_key: None,

            // Command handlers
            synthesize_handler: SynthesizeHandler::new(cache.clone(), tts_engine.clone()),
            evict_cache_handler: EvictCacheHandler::new(cache.clone()),
            invalidate_cache_handler: InvalidateCacheHandler::new(cache.clone()),
            clear_cache_handler: ClearCacheHandler::new(cache.clone()),
            update_max_size_handler: UpdateMaxSizeHandler::new(cache.clone()),
            reset_cache_stats_handler: ResetCacheStatsHandler::new(cache.clone()),
            check_integrity_handler: CheckIntegrityHandler::new(cache.clone()),

            // Query handlers
            get_cache_stats_handler: GetCacheStatsHandler::new(cache.clone()),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}
