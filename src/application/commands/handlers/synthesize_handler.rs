//! Synthesize Handler - 读穿缓存的合成
//!
//! 缓存命中直接返回；未命中调用 TTS 服务并写回缓存。
//! 写缓存失败只记录日志，不影响合成结果。

use std::sync::Arc;

use crate::application::cache::CacheCoordinator;
use crate::application::commands::{Synthesize, SynthesizeResponse};
use crate::application::error::ApplicationError;
use crate::application::ports::{SynthesisRequest, TtsEnginePort};
use crate::domain::cache::CacheKey;

/// Synthesize Handler
pub struct SynthesizeHandler {
    cache: Arc<CacheCoordinator>,
    tts_engine: Arc<dyn TtsEnginePort>,
}

impl SynthesizeHandler {
    pub fn new(cache: Arc<CacheCoordinator>, tts_engine: Arc<dyn TtsEnginePort>) -> Self {
        Self { cache, tts_engine }
    }

    pub async fn handle(&self, command: Synthesize) -> Result<SynthesizeResponse, ApplicationError> {
        if command.text.trim().is_empty() {
            return Err(ApplicationError::validation("text must not be empty"));
        }
        let key = CacheKey::generate(&command.text, &command.voice_id, command.speed)?;

        if let Some(payload) = self.cache.get_by_key(&key).await {
            return Ok(SynthesizeResponse {
                cache_key: key.into_string(),
                cache_hit: true,
                payload,
            });
        }

        let payload = self
            .tts_engine
            .synthesize(SynthesisRequest {
                text: command.text.clone(),
                voice_id: command.voice_id.clone(),
                speed: command.speed,
            })
            .await?;

        match self
            .cache
            .set(&command.text, &command.voice_id, command.speed, payload.clone())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(cache_key = %key, "Synthesis result not cached");
            }
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Synthesis result not cacheable");
            }
        }

        tracing::info!(
            cache_key = %key,
            chunks = payload.audio_chunks.len(),
            size_bytes = payload.size_bytes(),
            "Synthesis completed"
        );

        Ok(SynthesizeResponse {
            cache_key: key.into_string(),
            cache_hit: false,
            payload,
        })
    }
}
