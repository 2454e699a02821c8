//! Command Handlers

mod cache_handlers;
mod synthesize_handler;

pub use cache_handlers::{
    CheckIntegrityHandler, ClearCacheHandler, EvictCacheHandler, InvalidateCacheHandler,
    InvalidateCacheResponse, ResetCacheStatsHandler, UpdateMaxSizeHandler,
};
pub use synthesize_handler::SynthesizeHandler;
