//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（WarmStore、TtsEngine、BackgroundErrorObserver）
//! - cache: 两级缓存编排（CacheCoordinator 及其组件）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod cache;
pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;

// Re-exports
pub use cache::{BackgroundTasks, CacheCoordinator, CoordinatorConfig};

pub use commands::{
    handlers::{
        CheckIntegrityHandler, ClearCacheHandler, EvictCacheHandler, InvalidateCacheHandler,
        InvalidateCacheResponse, ResetCacheStatsHandler, SynthesizeHandler, UpdateMaxSizeHandler,
    },
    CheckIntegrity, ClearCache, EvictCache, InvalidateCache, ResetCacheStats, Synthesize,
    SynthesizeResponse, UpdateMaxSize,
};

pub use error::ApplicationError;

pub use ports::{
    BackgroundErrorObserver, BackgroundTask, SynthesisRequest, TracingObserver, TtsEnginePort,
    TtsError, WarmStorePort,
};

pub use queries::{handlers::GetCacheStatsHandler, GetCacheStats};
