//! Ping Handler

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::domain::cache::{CacheMode, LifecycleState};
use crate::infrastructure::http::state::AppState;

/// Ping 响应
#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub cache_state: LifecycleState,
    pub cache_mode: CacheMode,
}

/// Ping endpoint - 健康检查
///
/// 缓存处于 fallback 时服务仍然可用（只是不走缓存），因此 status 始终为 ok
pub async fn ping(State(state): State<Arc<AppState>>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cache_state: state.cache.state(),
        cache_mode: state.cache.mode(),
    })
}
