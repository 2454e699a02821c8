//! Cache Context - TTS 音频缓存上下文
//!
//! 纯领域模型：缓存 key、条目、统计、失效条件、淘汰选择

mod entry;
mod errors;
mod eviction;
mod invalidation;
mod key;
mod stats;

pub use entry::{AudioChunk, CacheEntry, EntrySummary, PhraseMarker, SynthesisPayload};
pub use errors::{CacheError, StorageError};
pub use eviction::{calculate_eviction_amount, select_for_bytes, select_oldest, sort_oldest_first};
pub use invalidation::InvalidationFilter;
pub use key::{hash_text, normalize_text, CacheKey, KeyParts, KEY_DELIMITER};
pub use stats::{
    clamp_max_size, CacheMode, CacheStatsReport, GlobalStats, LifecycleState,
    DEFAULT_MAX_ENTRY_SIZE_BYTES, DEFAULT_MAX_SIZE_BYTES, MAX_MAX_SIZE_BYTES, MIN_MAX_SIZE_BYTES,
    SCHEMA_VERSION,
};
