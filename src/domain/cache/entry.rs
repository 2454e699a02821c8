//! Cache Context - Entities
//!
//! 缓存条目及其组成部分

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::key::CacheKey;

/// 诊断用文本预览的最大字符数
pub const TEXT_PREVIEW_CHARS: usize = 80;

/// 音频分片（播放顺序）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioChunk {
    pub data: Arc<[u8]>,
    pub byte_length: u64,
}

impl AudioChunk {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        let byte_length = data.len() as u64;
        Self { data, byte_length }
    }
}

/// 短语时间轴记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseMarker {
    pub text: String,
    pub start_time_ms: f64,
    pub end_time_ms: f64,
    pub chunk_index: usize,
}

/// 合成服务返回的结果（缓存的写入内容）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisPayload {
    pub audio_chunks: Vec<AudioChunk>,
    /// 每个分片的合成元数据，对缓存不透明
    pub metadata: Vec<serde_json::Value>,
    pub phrase_timeline: Vec<PhraseMarker>,
}

impl SynthesisPayload {
    /// 分片字节数之和
    pub fn size_bytes(&self) -> u64 {
        self.audio_chunks.iter().map(|c| c.data.len() as u64).sum()
    }

    /// 按播放顺序拼接所有分片
    pub fn concat_audio(&self) -> Vec<u8> {
        let mut audio = Vec::with_capacity(self.size_bytes() as usize);
        for chunk in &self.audio_chunks {
            audio.extend_from_slice(&chunk.data);
        }
        audio
    }
}

/// 缓存条目
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub audio_chunks: Vec<AudioChunk>,
    pub metadata: Vec<serde_json::Value>,
    pub phrase_timeline: Vec<PhraseMarker>,
    /// 总是由分片重新计算，不信任调用方传入的长度
    pub total_size_bytes: u64,
    pub created_at: i64,
    pub last_accessed_at: i64,
    pub access_count: u64,
    pub voice_id: String,
    pub speed: f32,
    pub text_preview: String,
}

impl CacheEntry {
    /// 从合成结果创建条目
    pub fn new(
        key: &CacheKey,
        text: &str,
        voice_id: &str,
        speed: f32,
        payload: SynthesisPayload,
        now: i64,
    ) -> Self {
        let SynthesisPayload {
            audio_chunks,
            metadata,
            mut phrase_timeline,
        } = payload;

        let audio_chunks: Vec<AudioChunk> = audio_chunks
            .into_iter()
            .map(|c| AudioChunk::new(c.data))
            .collect();
        let total_size_bytes = audio_chunks.iter().map(|c| c.byte_length).sum();

        // 稳定排序，保证开始时间单调不减
        phrase_timeline.sort_by(|a, b| a.start_time_ms.total_cmp(&b.start_time_ms));

        Self {
            key: key.as_str().to_string(),
            audio_chunks,
            metadata,
            phrase_timeline,
            total_size_bytes,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            voice_id: voice_id.to_string(),
            speed: (speed * 10.0).round() / 10.0,
            text_preview: text_preview(text),
        }
    }

    /// 命中时的访问记录
    pub fn record_access(&mut self, at: i64) {
        self.last_accessed_at = self.last_accessed_at.max(at);
        self.access_count += 1;
    }

    pub fn payload(&self) -> SynthesisPayload {
        SynthesisPayload {
            audio_chunks: self.audio_chunks.clone(),
            metadata: self.metadata.clone(),
            phrase_timeline: self.phrase_timeline.clone(),
        }
    }

    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            key: self.key.clone(),
            voice_id: self.voice_id.clone(),
            speed: self.speed,
            size_bytes: self.total_size_bytes,
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
            access_count: self.access_count,
            text_preview: self.text_preview.clone(),
        }
    }
}

/// 条目摘要（不含音频数据），用于淘汰、统计和索引
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub key: String,
    pub voice_id: String,
    pub speed: f32,
    pub size_bytes: u64,
    pub created_at: i64,
    pub last_accessed_at: i64,
    pub access_count: u64,
    pub text_preview: String,
}

fn text_preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= TEXT_PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let mut preview: String = trimmed.chars().take(TEXT_PREVIEW_CHARS).collect();
    preview.push('…');
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> SynthesisPayload {
        SynthesisPayload {
            audio_chunks: vec![
                AudioChunk {
                    data: Arc::from(vec![1u8; 100]),
                    // 调用方给出的长度不可信
                    byte_length: 7,
                },
                AudioChunk::new(vec![2u8; 50]),
            ],
            metadata: vec![serde_json::json!({"chunk_index": 0}), serde_json::json!({"chunk_index": 1})],
            phrase_timeline: vec![
                PhraseMarker {
                    text: "second".to_string(),
                    start_time_ms: 500.0,
                    end_time_ms: 900.0,
                    chunk_index: 1,
                },
                PhraseMarker {
                    text: "first".to_string(),
                    start_time_ms: 0.0,
                    end_time_ms: 400.0,
                    chunk_index: 0,
                },
            ],
        }
    }

    #[test]
    fn test_size_recomputed_from_chunks() {
        let key = CacheKey::generate("hello", "bf_lily", 1.0).unwrap();
        let entry = CacheEntry::new(&key, "hello", "bf_lily", 1.0, payload(), 1_000);
        assert_eq!(entry.total_size_bytes, 150);
        assert_eq!(entry.audio_chunks[0].byte_length, 100);
        assert_eq!(entry.audio_chunks[1].byte_length, 50);
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.created_at, entry.last_accessed_at);
    }

    #[test]
    fn test_phrase_timeline_sorted() {
        let key = CacheKey::generate("hello", "bf_lily", 1.0).unwrap();
        let entry = CacheEntry::new(&key, "hello", "bf_lily", 1.0, payload(), 1_000);
        assert_eq!(entry.phrase_timeline[0].text, "first");
        assert_eq!(entry.phrase_timeline[1].text, "second");
    }

    #[test]
    fn test_record_access_is_monotonic() {
        let key = CacheKey::generate("hello", "bf_lily", 1.0).unwrap();
        let mut entry = CacheEntry::new(&key, "hello", "bf_lily", 1.0, payload(), 1_000);
        entry.record_access(2_000);
        entry.record_access(1_500);
        assert_eq!(entry.last_accessed_at, 2_000);
        assert_eq!(entry.access_count, 2);
    }

    #[test]
    fn test_text_preview_truncated() {
        let long_text = "a".repeat(200);
        let key = CacheKey::generate(&long_text, "bf_lily", 1.0).unwrap();
        let entry = CacheEntry::new(&key, &long_text, "bf_lily", 1.0, payload(), 0);
        assert_eq!(entry.text_preview.chars().count(), TEXT_PREVIEW_CHARS + 1);
        assert!(entry.text_preview.ends_with('…'));
    }

    #[test]
    fn test_concat_audio_preserves_order() {
        let p = payload();
        let audio = p.concat_audio();
        assert_eq!(audio.len(), 150);
        assert_eq!(audio[0], 1);
        assert_eq!(audio[149], 2);
    }
}
