//! Fake TTS Client - 离线/测试用的 TTS 客户端
//!
//! 不调用外部服务，按句子切分文本并生成确定性的音频字节

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::application::ports::{SynthesisRequest, TtsEnginePort, TtsError};
use crate::domain::cache::{AudioChunk, PhraseMarker, SynthesisPayload};

/// Fake TTS Client 配置
#[derive(Debug, Clone)]
pub struct FakeTtsClientConfig {
    /// 每个字符生成的字节数
    pub bytes_per_char: usize,
    /// 每个字符对应的时长（毫秒，1.0 倍速）
    pub ms_per_char: f64,
    /// 模拟合成延迟
    pub latency: Duration,
}

impl Default for FakeTtsClientConfig {
    fn default() -> Self {
        Self {
            bytes_per_char: 32,
            ms_per_char: 60.0,
            latency: Duration::ZERO,
        }
    }
}

/// Fake TTS Client
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
    calls: AtomicUsize,
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        tracing::info!(
            bytes_per_char = config.bytes_per_char,
            latency_ms = config.latency.as_millis() as u64,
            "FakeTtsClient initialized"
        );
        Self {
            config,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeTtsClientConfig::default())
    }

    /// 已执行的合成次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// 按句末标点切分，保留标点
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?' | '。' | '！' | '？') {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisPayload, TtsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        let speed = if request.speed > 0.0 { request.speed as f64 } else { 1.0 };
        let mut payload = SynthesisPayload::default();
        let mut offset_ms = 0.0;

        for (index, sentence) in split_sentences(&request.text).into_iter().enumerate() {
            let seed = md5::compute(format!("{}|{}|{}", sentence, request.voice_id, request.speed));
            let len = sentence.chars().count() * self.config.bytes_per_char;
            let data: Vec<u8> = seed.0.iter().copied().cycle().take(len).collect();

            let duration_ms = sentence.chars().count() as f64 * self.config.ms_per_char / speed;
            payload.audio_chunks.push(AudioChunk::new(data));
            payload.metadata.push(serde_json::json!({
                "chunk_index": index,
                "text": sentence,
                "duration_ms": duration_ms,
            }));
            payload.phrase_timeline.push(PhraseMarker {
                text: sentence,
                start_time_ms: offset_ms,
                end_time_ms: offset_ms + duration_ms,
                chunk_index: index,
            });
            offset_ms += duration_ms;
        }

        tracing::debug!(
            voice_id = %request.voice_id,
            chunks = payload.audio_chunks.len(),
            "FakeTtsClient: generated audio"
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str) -> SynthesisRequest {
        SynthesisRequest {
            text: text.to_string(),
            voice_id: "bf_lily".to_string(),
            speed: 1.0,
        }
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("Hello there. How are you?  Fine"),
            vec!["Hello there.", "How are you?", "Fine"]
        );
        assert!(split_sentences("   ").is_empty());
    }

    #[tokio::test]
    async fn test_deterministic_output() {
        let client = FakeTtsClient::with_defaults();
        let a = client.synthesize(request("One. Two.")).await.unwrap();
        let b = client.synthesize(request("One. Two.")).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.audio_chunks.len(), 2);
        assert_eq!(a.metadata.len(), 2);
        assert_eq!(a.audio_chunks[0].byte_length, 4 * 32);
        assert!(a.phrase_timeline[1].start_time_ms >= a.phrase_timeline[0].end_time_ms);
        assert_eq!(client.call_count(), 2);
    }
}
