//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                GET   健康检查（不校验 API Key）
//! - /api/tts                 POST  合成语音（先查缓存）
//! - /api/cache/stats         GET   缓存统计
//! - /api/cache/integrity     POST  完整性检查
//! - /api/cache/evict         POST  手动淘汰（按字节或按数量）
//! - /api/cache/invalidate    POST  按音色/时间/版本失效
//! - /api/cache/clear         POST  清空缓存
//! - /api/cache/max_size      POST  调整容量上限
//! - /api/cache/reset_stats   POST  重置命中统计

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::middleware::api_key_middleware;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new().nest("/api", api_routes(state))
}

/// API 路由
fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/tts", post(handlers::synthesize))
        .nest("/cache", cache_routes())
        .route_layer(middleware::from_fn_with_state(state, api_key_middleware));

    Router::new()
        .route("/ping", get(handlers::ping))
        .merge(protected)
}

/// Cache 路由
fn cache_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(handlers::get_cache_stats))
        .route("/integrity", post(handlers::check_integrity))
        .route("/evict", post(handlers::evict_cache))
        .route("/invalidate", post(handlers::invalidate_cache))
        .route("/clear", post(handlers::clear_cache))
        .route("/max_size", post(handlers::update_max_size))
        .route("/reset_stats", post(handlers::reset_cache_stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use crate::application::{BackgroundTasks, CacheCoordinator, CoordinatorConfig};
    use crate::infrastructure::adapters::{FakeTtsClient, FakeTtsClientConfig};
    use crate::infrastructure::http::handlers::CACHE_STATUS_HEADER;
    use crate::infrastructure::memory::InMemoryWarmStore;

    async fn setup(api_key: Option<&str>) -> (Router, Arc<FakeTtsClient>, BackgroundTasks) {
        let config = CoordinatorConfig {
            integrity_interval: None,
            ..Default::default()
        };
        let cache = CacheCoordinator::new(Arc::new(InMemoryWarmStore::new()), config).arc();
        let tasks = cache.init().await;

        let tts = Arc::new(FakeTtsClient::new(FakeTtsClientConfig::default()));
        let state = AppState::new(cache, tts.clone(), "bf_lily")
            .with_api_key(api_key.map(str::to_string))
            .arc();
        let router = create_routes(state.clone()).with_state(state);
        (router, tts, tasks)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let (app, _, mut tasks) = setup(Some("secret")).await;
        let response = app.oneshot(get("/api/ping")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["cache_state"], "ready");
        assert_eq!(json["cache_mode"], "normal");
        tasks.shutdown().await;
    }

    #[tokio::test]
    async fn test_tts_miss_then_hit() {
        let (app, tts, mut tasks) = setup(None).await;

        let request = || post_json("/api/tts", json!({"text": "Hello there. Bye.", "speed": 1.0}));
        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[CACHE_STATUS_HEADER], "MISS");
        let first_audio = axum::body::to_bytes(first.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(!first_audio.is_empty());

        let second = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(second.headers()[CACHE_STATUS_HEADER], "HIT");
        let second_audio = axum::body::to_bytes(second.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(first_audio, second_audio);
        assert_eq!(tts.call_count(), 1);

        let stats = json_body(app.oneshot(get("/api/cache/stats")).await.unwrap()).await;
        assert_eq!(stats["errno"], 0);
        assert_eq!(stats["data"]["entry_count"], 1);
        assert_eq!(stats["data"]["hits"], 1);
        assert_eq!(stats["data"]["misses"], 1);
        tasks.shutdown().await;
    }

    #[tokio::test]
    async fn test_tts_empty_text_is_bad_request() {
        let (app, _, mut tasks) = setup(None).await;
        let response = app
            .oneshot(post_json("/api/tts", json!({"text": "   "})))
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["errno"], 400);
        tasks.shutdown().await;
    }

    #[tokio::test]
    async fn test_admin_operations() {
        let (app, _, mut tasks) = setup(None).await;
        for text in ["one", "two", "three"] {
            let response = app
                .clone()
                .oneshot(post_json("/api/tts", json!({"text": text, "voice": "am_adam"})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let evict = json_body(
            app.clone()
                .oneshot(post_json("/api/cache/evict", json!({"count": 1})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(evict["data"]["entries_removed"], 1);

        let invalidate = json_body(
            app.clone()
                .oneshot(post_json("/api/cache/invalidate", json!({"voice_id": "am_adam"})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(invalidate["data"]["removed"], 2);

        let integrity = json_body(
            app.clone()
                .oneshot(post_json("/api/cache/integrity", json!({})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(integrity["data"]["repaired"], false);
        assert_eq!(integrity["data"]["actual_entry_count"], 0);

        let max_size = json_body(
            app.clone()
                .oneshot(post_json("/api/cache/max_size", json!({"max_size_bytes": 1})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(max_size["data"]["max_size_bytes"], 10 * 1024 * 1024);

        let reset = json_body(
            app.clone()
                .oneshot(post_json("/api/cache/reset_stats", json!({})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(reset["errno"], 0);

        let clear = json_body(
            app.clone()
                .oneshot(post_json("/api/cache/clear", json!({})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(clear["errno"], 0);

        let stats = json_body(app.oneshot(get("/api/cache/stats")).await.unwrap()).await;
        assert_eq!(stats["data"]["entry_count"], 0);
        assert_eq!(stats["data"]["misses"], 0);
        tasks.shutdown().await;
    }

    #[tokio::test]
    async fn test_api_key_required() {
        let (app, _, mut tasks) = setup(Some("secret")).await;

        let json = json_body(app.clone().oneshot(get("/api/cache/stats")).await.unwrap()).await;
        assert_eq!(json["errno"], 401);

        let request = Request::builder()
            .uri("/api/cache/stats")
            .header("X-API-Key", "wrong")
            .body(Body::empty())
            .unwrap();
        let json = json_body(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(json["errno"], 401);

        let request = Request::builder()
            .uri("/api/cache/stats")
            .header("Authorization", "Bearer secret")
            .body(Body::empty())
            .unwrap();
        let json = json_body(app.oneshot(request).await.unwrap()).await;
        assert_eq!(json["errno"], 0);
        tasks.shutdown().await;
    }
}
