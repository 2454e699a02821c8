//! 领域层
//!
//! - cache: 音频缓存上下文

pub mod cache;
