//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::application::cache::{EvictionResult, IntegrityReport};
use crate::domain::cache::InvalidationFilter;

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 空数据响应
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    /// 成功但无数据
    pub fn ok() -> Self {
        Self::success(Empty {})
    }
}

// ============================================================================
// TTS DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    /// 缺省时使用配置的默认音色
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_speed() -> f32 {
    1.0
}

// ============================================================================
// Cache DTOs
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct EvictRequest {
    #[serde(default)]
    pub target_bytes: Option<u64>,
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct EvictResponse {
    pub bytes_freed: u64,
    pub entries_removed: u64,
}

impl From<EvictionResult> for EvictResponse {
    fn from(result: EvictionResult) -> Self {
        Self {
            bytes_freed: result.bytes_freed,
            entries_removed: result.entries_removed,
        }
    }
}

pub type InvalidateRequest = InvalidationFilter;

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub removed: u64,
}

#[derive(Debug, Deserialize)]
pub struct MaxSizeRequest {
    pub max_size_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct MaxSizeResponse {
    /// 限制到合法区间后的实际值
    pub max_size_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct IntegrityResponse {
    pub repaired: bool,
    pub discrepancy_bytes: i64,
    pub tracked_size_bytes: u64,
    pub actual_size_bytes: u64,
    pub tracked_entry_count: u64,
    pub actual_entry_count: u64,
    pub checked_at: i64,
}

impl From<IntegrityReport> for IntegrityResponse {
    fn from(report: IntegrityReport) -> Self {
        Self {
            repaired: report.repaired,
            discrepancy_bytes: report.discrepancy,
            tracked_size_bytes: report.tracked_size_bytes,
            actual_size_bytes: report.actual_size_bytes,
            tracked_entry_count: report.tracked_entry_count,
            actual_entry_count: report.actual_entry_count,
            checked_at: report.checked_at,
        }
    }
}
