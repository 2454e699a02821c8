//! Synthesize Commands

use crate::domain::cache::SynthesisPayload;

/// 合成命令（先查缓存，未命中再调用 TTS 服务）
#[derive(Debug, Clone)]
pub struct Synthesize {
    pub text: String,
    pub voice_id: String,
    pub speed: f32,
}

/// 合成响应
#[derive(Debug, Clone)]
pub struct SynthesizeResponse {
    pub cache_key: String,
    pub cache_hit: bool,
    pub payload: SynthesisPayload,
}
