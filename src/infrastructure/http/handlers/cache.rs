//! Cache Admin Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::{
    CheckIntegrity, ClearCache, EvictCache, GetCacheStats, InvalidateCache, ResetCacheStats,
    UpdateMaxSize,
};
use crate::domain::cache::CacheStatsReport;
use crate::infrastructure::http::dto::{
    ApiResponse, Empty, EvictRequest, EvictResponse, IntegrityResponse, InvalidateRequest,
    InvalidateResponse, MaxSizeRequest, MaxSizeResponse,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 缓存统计
pub async fn get_cache_stats(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<CacheStatsReport>> {
    let report = state.get_cache_stats_handler.handle(GetCacheStats).await;
    Json(ApiResponse::success(report))
}

/// 立即执行完整性检查
pub async fn check_integrity(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<IntegrityResponse>>, ApiError> {
    let report = state.check_integrity_handler.handle(CheckIntegrity).await?;
    Ok(Json(ApiResponse::success(report.into())))
}

/// 手动淘汰
pub async fn evict_cache(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EvictRequest>,
) -> Result<Json<ApiResponse<EvictResponse>>, ApiError> {
    let command = EvictCache {
        target_bytes: req.target_bytes,
        count: req.count,
    };
    let result = state.evict_cache_handler.handle(command).await?;
    Ok(Json(ApiResponse::success(result.into())))
}

/// 选择性失效
pub async fn invalidate_cache(
    State(state): State<Arc<AppState>>,
    Json(filter): Json<InvalidateRequest>,
) -> Result<Json<ApiResponse<InvalidateResponse>>, ApiError> {
    let result = state
        .invalidate_cache_handler
        .handle(InvalidateCache { filter })
        .await?;
    Ok(Json(ApiResponse::success(InvalidateResponse {
        removed: result.removed,
    })))
}

/// 清空缓存
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    state.clear_cache_handler.handle(ClearCache).await?;
    Ok(Json(ApiResponse::ok()))
}

/// 调整容量上限
pub async fn update_max_size(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MaxSizeRequest>,
) -> Result<Json<ApiResponse<MaxSizeResponse>>, ApiError> {
    let max_size_bytes = state
        .update_max_size_handler
        .handle(UpdateMaxSize {
            max_size_bytes: req.max_size_bytes,
        })
        .await?;
    Ok(Json(ApiResponse::success(MaxSizeResponse { max_size_bytes })))
}

/// 重置命中统计
pub async fn reset_cache_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    state.reset_cache_stats_handler.handle(ResetCacheStats).await?;
    Ok(Json(ApiResponse::ok()))
}
