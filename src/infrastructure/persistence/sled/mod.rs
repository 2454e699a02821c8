//! Sled 持久化实现

mod warm_store;

pub use warm_store::SledWarmStore;
