//! 两级缓存编排
//!
//! - WarmTier: 持久层预算、过期清理、总量维护
//! - SizeManager: 容量校验、淘汰阈值、统计与完整性校验
//! - EvictionPolicy: 批量淘汰执行
//! - CacheCoordinator: 对外门面（热层 + warm tier + fallback）

mod background;
mod clock;
mod coordinator;
mod eviction;
mod fallback;
mod size_manager;
mod warm_tier;

pub use background::BackgroundTasks;
pub use clock::MonotonicClock;
pub use coordinator::{CacheCoordinator, CoordinatorConfig};
pub use eviction::{EvictionPolicy, EvictionResult};
pub use fallback::FallbackState;
pub use size_manager::{EvictionCheck, IntegrityReport, SizeManager, SizeManagerConfig};
pub use warm_tier::{PutOutcome, WarmTier};
