//! Cache Context - Invalidation Filter

use serde::Deserialize;

use super::entry::EntrySummary;

/// 选择性失效条件
///
/// - `version` 与当前结构版本不一致时整体清空
/// - 否则删除同时满足 `voice_id` 和 `older_than` 的条目
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InvalidationFilter {
    #[serde(default)]
    pub voice_id: Option<String>,
    /// 毫秒时间戳，删除创建时间早于该值的条目
    #[serde(default)]
    pub older_than: Option<i64>,
    #[serde(default)]
    pub version: Option<u32>,
}

impl InvalidationFilter {
    pub fn for_voice(voice_id: impl Into<String>) -> Self {
        Self {
            voice_id: Some(voice_id.into()),
            ..Default::default()
        }
    }

    pub fn older_than(timestamp_ms: i64) -> Self {
        Self {
            older_than: Some(timestamp_ms),
            ..Default::default()
        }
    }

    pub fn version(version: u32) -> Self {
        Self {
            version: Some(version),
            ..Default::default()
        }
    }

    /// 没有任何删除条件
    pub fn is_empty(&self) -> bool {
        self.voice_id.is_none() && self.older_than.is_none()
    }

    pub fn requires_full_clear(&self, schema_version: u32) -> bool {
        self.version.is_some_and(|v| v != schema_version)
    }

    pub fn matches(&self, entry: &EntrySummary) -> bool {
        if self.is_empty() {
            return false;
        }
        let voice_ok = self
            .voice_id
            .as_deref()
            .map_or(true, |v| entry.voice_id == v);
        let age_ok = self.older_than.map_or(true, |t| entry.created_at < t);
        voice_ok && age_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(voice: &str, created_at: i64) -> EntrySummary {
        EntrySummary {
            key: format!("{}-{}", voice, created_at),
            voice_id: voice.to_string(),
            speed: 1.0,
            size_bytes: 10,
            created_at,
            last_accessed_at: created_at,
            access_count: 0,
            text_preview: String::new(),
        }
    }

    #[test]
    fn test_voice_filter() {
        let filter = InvalidationFilter::for_voice("bf_lily");
        assert!(filter.matches(&entry("bf_lily", 1)));
        assert!(!filter.matches(&entry("am_adam", 1)));
    }

    #[test]
    fn test_age_filter() {
        let filter = InvalidationFilter::older_than(100);
        assert!(filter.matches(&entry("bf_lily", 99)));
        assert!(!filter.matches(&entry("bf_lily", 100)));
    }

    #[test]
    fn test_combined_filter() {
        let filter = InvalidationFilter {
            voice_id: Some("bf_lily".to_string()),
            older_than: Some(100),
            version: None,
        };
        assert!(filter.matches(&entry("bf_lily", 50)));
        assert!(!filter.matches(&entry("bf_lily", 150)));
        assert!(!filter.matches(&entry("am_adam", 50)));
    }

    #[test]
    fn test_empty_filter_matches_nothing() {
        let filter = InvalidationFilter::default();
        assert!(filter.is_empty());
        assert!(!filter.matches(&entry("bf_lily", 1)));
    }

    #[test]
    fn test_version_mismatch() {
        assert!(InvalidationFilter::version(2).requires_full_clear(1));
        assert!(!InvalidationFilter::version(1).requires_full_clear(1));
        assert!(!InvalidationFilter::default().requires_full_clear(1));
    }
}
