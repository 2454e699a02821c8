//! HTTP Handlers

mod cache;
mod ping;
mod tts;

pub use cache::*;
pub use ping::*;
pub use tts::*;
