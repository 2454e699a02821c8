//! TTS Handler - 带缓存的语音合成

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::application::Synthesize;
use crate::infrastructure::http::dto::TtsRequest;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

pub const CACHE_STATUS_HEADER: &str = "x-cache";
pub const CACHE_KEY_HEADER: &str = "x-cache-key";

/// 合成语音，返回按播放顺序拼接的音频
pub async fn synthesize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TtsRequest>,
) -> Result<Response, ApiError> {
    let voice_id = req
        .voice
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| state.default_voice.clone());

    let command = Synthesize {
        text: req.text,
        voice_id,
        speed: req.speed,
    };
    let result = state.synthesize_handler.handle(command).await?;

    let content_type = result
        .payload
        .metadata
        .first()
        .and_then(|m| m.get("content_type"))
        .and_then(|v| v.as_str())
        .unwrap_or("audio/wav")
        .to_string();
    let audio = result.payload.concat_audio();
    let cache_key = HeaderValue::from_str(&result.cache_key)
        .map_err(|e| ApiError::Internal(format!("Invalid cache key header: {}", e)))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, audio.len())
        .header(
            CACHE_STATUS_HEADER,
            if result.cache_hit { "HIT" } else { "MISS" },
        )
        .header(CACHE_KEY_HEADER, cache_key)
        .body(Body::from(audio))
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}
