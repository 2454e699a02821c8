//! Query Handlers

mod cache_handlers;

pub use cache_handlers::GetCacheStatsHandler;
