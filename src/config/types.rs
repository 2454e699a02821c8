//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::CoordinatorConfig;
use crate::domain::cache::{DEFAULT_MAX_ENTRY_SIZE_BYTES, DEFAULT_MAX_SIZE_BYTES, SCHEMA_VERSION};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// TTS 服务配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 缓存配置
    #[serde(default)]
    pub cache: CacheConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 设置后合成与缓存管理接口需要 X-API-Key 或 Bearer token
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// TTS 服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// TTS 服务基础 URL
    #[serde(default = "default_tts_url")]
    pub url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    /// 请求未指定音色时使用的默认音色
    #[serde(default = "default_voice")]
    pub default_voice: String,

    /// 通过 X-API-Key 发送的访问密钥
    #[serde(default)]
    pub api_key: Option<String>,

    /// 使用离线的 FakeTtsClient 代替 HTTP 服务
    #[serde(default)]
    pub fake: bool,
}

fn default_tts_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_tts_timeout() -> u64 {
    120
}

fn default_voice() -> String {
    "bf_lily".to_string()
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            url: default_tts_url(),
            timeout_secs: default_tts_timeout(),
            default_voice: default_voice(),
            api_key: None,
            fake: false,
        }
    }
}

/// 缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// 缓存总容量上限（字节）
    #[serde(default = "default_max_size")]
    pub max_size_bytes: u64,

    /// 单个条目上限（字节）
    #[serde(default = "default_max_entry_size")]
    pub max_entry_size_bytes: u64,

    /// 热层容量（条目数）
    #[serde(default = "default_hot_capacity")]
    pub hot_capacity: usize,

    /// 触发淘汰的使用率
    #[serde(default = "default_trigger_pct")]
    pub eviction_trigger_pct: f64,

    /// 淘汰后的目标使用率
    #[serde(default = "default_target_pct")]
    pub eviction_target_pct: f64,

    /// 空间不足时一次淘汰的比例
    #[serde(default = "default_aggressive_pct")]
    pub aggressive_eviction_pct: f64,

    /// 条目保留时间（秒）
    #[serde(default = "default_retention")]
    pub retention_secs: u64,

    /// 过期清理间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// 完整性检查间隔（秒），0 表示关闭
    #[serde(default = "default_integrity_interval")]
    pub integrity_interval_secs: u64,

    /// 完整性检查允许的偏差（字节）
    #[serde(default = "default_integrity_tolerance")]
    pub integrity_tolerance_bytes: u64,

    /// fallback 冷却时间（秒）
    #[serde(default = "default_fallback_cooldown")]
    pub fallback_cooldown_secs: u64,

    /// 条目结构版本，变化时启动会清空缓存
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

fn default_max_size() -> u64 {
    DEFAULT_MAX_SIZE_BYTES
}

fn default_max_entry_size() -> u64 {
    DEFAULT_MAX_ENTRY_SIZE_BYTES
}

fn default_hot_capacity() -> usize {
    50
}

fn default_trigger_pct() -> f64 {
    0.95
}

fn default_target_pct() -> f64 {
    0.80
}

fn default_aggressive_pct() -> f64 {
    0.50
}

fn default_retention() -> u64 {
    7 * 24 * 3600 // 7 天
}

fn default_sweep_interval() -> u64 {
    3600 // 1 小时
}

fn default_integrity_interval() -> u64 {
    24 * 3600
}

fn default_integrity_tolerance() -> u64 {
    1024
}

fn default_fallback_cooldown() -> u64 {
    300
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size(),
            max_entry_size_bytes: default_max_entry_size(),
            hot_capacity: default_hot_capacity(),
            eviction_trigger_pct: default_trigger_pct(),
            eviction_target_pct: default_target_pct(),
            aggressive_eviction_pct: default_aggressive_pct(),
            retention_secs: default_retention(),
            sweep_interval_secs: default_sweep_interval(),
            integrity_interval_secs: default_integrity_interval(),
            integrity_tolerance_bytes: default_integrity_tolerance(),
            fallback_cooldown_secs: default_fallback_cooldown(),
            schema_version: default_schema_version(),
        }
    }
}

impl CacheConfig {
    /// 转换为协调器配置
    pub fn to_coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            max_size_bytes: self.max_size_bytes,
            max_entry_size_bytes: self.max_entry_size_bytes,
            hot_capacity: self.hot_capacity,
            eviction_trigger_pct: self.eviction_trigger_pct,
            eviction_target_pct: self.eviction_target_pct,
            aggressive_eviction_pct: self.aggressive_eviction_pct,
            retention: Duration::from_secs(self.retention_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            integrity_interval: (self.integrity_interval_secs > 0)
                .then(|| Duration::from_secs(self.integrity_interval_secs)),
            integrity_tolerance_bytes: self.integrity_tolerance_bytes,
            fallback_cooldown: Duration::from_secs(self.fallback_cooldown_secs),
            schema_version: self.schema_version,
        }
    }
}

/// 存储后端
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sled,
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Sled => write!(f, "sled"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 存储后端
    #[serde(default)]
    pub backend: StorageBackend,

    /// Sled 数据库目录
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/cache.sled")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            db_path: default_db_path(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
