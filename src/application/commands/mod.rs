//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：合成（读穿缓存）与缓存管理

mod cache_commands;
mod synthesize_commands;

pub mod handlers;

pub use cache_commands::*;
pub use synthesize_commands::*;
