//! tts-cache - TTS 音频两级缓存服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Cache Context: 缓存键、条目、统计、淘汰选择、失效过滤
//!
//! 应用层 (application/):
//! - Ports: 端口定义（WarmStore, TtsEngine, BackgroundErrorObserver）
//! - Cache: CacheCoordinator 及 WarmTier / SizeManager / EvictionPolicy
//! - Commands: CQRS 命令处理器
//! - Queries: CQRS 查询处理器
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: 合成接口 + 缓存管理接口
//! - Memory: 热层 LRU、内存 warm store
//! - Persistence: Sled warm store
//! - Adapters: TTS Client

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
