//! TTS Engine Port - TTS 合成服务抽象
//!
//! 定义 TTS 合成的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::cache::SynthesisPayload;

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// TTS 合成请求
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// 要合成的文本内容
    pub text: String,
    /// 音色 ID
    pub voice_id: String,
    /// 语速
    pub speed: f32,
}

/// TTS Engine Port
///
/// 外部合成服务的抽象接口，缓存只消费它的结果，从不自己合成
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 执行合成，返回按播放顺序排列的音频分片及元数据
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisPayload, TtsError>;

    /// 检查 TTS 服务是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}
