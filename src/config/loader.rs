//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, StorageBackend};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `TTS_CACHE_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `TTS_CACHE_SERVER__PORT=8080`
/// - `TTS_CACHE_TTS__URL=http://tts-server:3000`
/// - `TTS_CACHE_CACHE__MAX_SIZE_BYTES=209715200`
/// - `TTS_CACHE_STORAGE__BACKEND=memory`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    let defaults = AppConfig::default();
    builder = builder
        .set_default("server.host", defaults.server.host)?
        .set_default("server.port", defaults.server.port as i64)?
        .set_default("tts.url", defaults.tts.url)?
        .set_default("tts.timeout_secs", defaults.tts.timeout_secs as i64)?
        .set_default("tts.default_voice", defaults.tts.default_voice)?
        .set_default("tts.fake", defaults.tts.fake)?
        .set_default("cache.max_size_bytes", defaults.cache.max_size_bytes as i64)?
        .set_default("cache.max_entry_size_bytes", defaults.cache.max_entry_size_bytes as i64)?
        .set_default("cache.hot_capacity", defaults.cache.hot_capacity as i64)?
        .set_default("cache.eviction_trigger_pct", defaults.cache.eviction_trigger_pct)?
        .set_default("cache.eviction_target_pct", defaults.cache.eviction_target_pct)?
        .set_default("cache.aggressive_eviction_pct", defaults.cache.aggressive_eviction_pct)?
        .set_default("cache.retention_secs", defaults.cache.retention_secs as i64)?
        .set_default("cache.sweep_interval_secs", defaults.cache.sweep_interval_secs as i64)?
        .set_default("cache.integrity_interval_secs", defaults.cache.integrity_interval_secs as i64)?
        .set_default("cache.integrity_tolerance_bytes", defaults.cache.integrity_tolerance_bytes as i64)?
        .set_default("cache.fallback_cooldown_secs", defaults.cache.fallback_cooldown_secs as i64)?
        .set_default("cache.schema_version", defaults.cache.schema_version as i64)?
        .set_default("storage.backend", defaults.storage.backend.to_string())?
        .set_default(
            "storage.db_path",
            defaults.storage.db_path.to_string_lossy().to_string(),
        )?
        .set_default("log.level", defaults.log.level)?
        .set_default("log.json", defaults.log.json)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: TTS_CACHE_TTS__URL=http://tts-server:3000
    builder = builder.add_source(
        Environment::with_prefix("TTS_CACHE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("Server port cannot be 0"));
    }

    if !config.tts.fake && config.tts.url.is_empty() {
        return Err(invalid("TTS URL cannot be empty"));
    }

    if config.storage.backend == StorageBackend::Sled
        && config.storage.db_path.as_os_str().is_empty()
    {
        return Err(invalid("Storage db_path cannot be empty"));
    }

    let cache = &config.cache;
    if cache.hot_capacity == 0 {
        return Err(invalid("Hot cache capacity cannot be 0"));
    }

    let in_range = |pct: f64| pct > 0.0 && pct <= 1.0;
    if !in_range(cache.eviction_trigger_pct) || !in_range(cache.eviction_target_pct) {
        return Err(invalid("Eviction percentages must be in (0, 1]"));
    }
    if cache.eviction_target_pct >= cache.eviction_trigger_pct {
        return Err(invalid(
            "Eviction target percentage must be lower than trigger percentage",
        ));
    }
    if !in_range(cache.aggressive_eviction_pct) {
        return Err(invalid("Aggressive eviction percentage must be in (0, 1]"));
    }

    if cache.max_entry_size_bytes > cache.max_size_bytes {
        return Err(invalid("Max entry size cannot exceed max cache size"));
    }

    if cache.sweep_interval_secs == 0 {
        return Err(invalid("Sweep interval cannot be 0"));
    }

    if cache.retention_secs == 0 {
        return Err(invalid("Retention cannot be 0"));
    }
    // 保留期以 i64 毫秒参与计算
    if cache.retention_secs > i64::MAX as u64 / 1000 {
        return Err(invalid("Retention is out of range"));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    if config.tts.fake {
        tracing::info!("TTS: fake engine");
    } else {
        tracing::info!("TTS URL: {}", config.tts.url);
        tracing::info!("TTS Timeout: {}s", config.tts.timeout_secs);
    }
    tracing::info!("Default Voice: {}", config.tts.default_voice);
    tracing::info!("Storage Backend: {}", config.storage.backend);
    if config.storage.backend == StorageBackend::Sled {
        tracing::info!("Database: {:?}", config.storage.db_path);
    }
    tracing::info!("Cache Max Size: {} bytes", config.cache.max_size_bytes);
    tracing::info!("Cache Max Entry Size: {} bytes", config.cache.max_entry_size_bytes);
    tracing::info!("Hot Capacity: {}", config.cache.hot_capacity);
    tracing::info!("Retention: {}s", config.cache.retention_secs);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
