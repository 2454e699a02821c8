//! Memory Layer - In-Memory Cache State
//!
//! - HotTier: 内存 LRU（热层）
//! - InMemoryWarmStore: DashMap 实现的 warm store

mod hot_tier;
mod warm_store;

pub use hot_tier::HotTier;
pub use warm_store::InMemoryWarmStore;
