//! tts-cache - TTS 音频两级缓存服务
//!
//! 组合根：加载配置、初始化日志、装配缓存与 TTS 客户端、启动 HTTP 服务

use std::sync::Arc;

use tts_cache::application::{CacheCoordinator, TtsEnginePort, WarmStorePort};
use tts_cache::config::{load_config, print_config, AppConfig, StorageBackend};
use tts_cache::infrastructure::adapters::{
    FakeTtsClient, FakeTtsClientConfig, HttpTtsClient, HttpTtsClientConfig,
};
use tts_cache::infrastructure::http::{AppState, HttpServer, ServerConfig};
use tts_cache::infrastructure::memory::InMemoryWarmStore;
use tts_cache::infrastructure::persistence::SledWarmStore;

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},tts_cache={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn create_store(config: &AppConfig) -> anyhow::Result<Arc<dyn WarmStorePort>> {
    let store: Arc<dyn WarmStorePort> = match config.storage.backend {
        StorageBackend::Sled => {
            if let Some(parent) = config.storage.db_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            Arc::new(SledWarmStore::new(&config.storage.db_path))
        }
        StorageBackend::Memory => Arc::new(InMemoryWarmStore::new()),
    };
    Ok(store)
}

fn create_tts_engine(config: &AppConfig) -> anyhow::Result<Arc<dyn TtsEnginePort>> {
    if config.tts.fake {
        return Ok(Arc::new(FakeTtsClient::new(FakeTtsClientConfig::default())));
    }
    let tts_config = HttpTtsClientConfig {
        base_url: config.tts.url.clone(),
        timeout_secs: config.tts.timeout_secs,
        api_key: config.tts.api_key.clone(),
    };
    Ok(Arc::new(HttpTtsClient::new(tts_config)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);
    tracing::info!("tts-cache v{}", env!("CARGO_PKG_VERSION"));
    print_config(&config);

    // 缓存：init 失败时进入 fallback，服务照常启动
    let store = create_store(&config).await?;
    let cache = CacheCoordinator::new(store, config.cache.to_coordinator_config()).arc();
    let mut background = cache.init().await;

    let tts_engine = create_tts_engine(&config)?;
    if !config.tts.fake && !tts_engine.health_check().await {
        tracing::warn!(url = %config.tts.url, "TTS service is not reachable yet");
    }

    let state = AppState::new(cache.clone(), tts_engine, config.tts.default_voice.clone())
        .with_api_key(config.server.api_key.clone())
        .arc();
    let server = HttpServer::new(
        ServerConfig::new(&config.server.host, config.server.port),
        state,
    );

    let result = server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await;

    // 先停后台任务，再落盘统计
    background.shutdown().await;
    cache.shutdown().await;

    tracing::info!("Server shutdown complete");
    result?;
    Ok(())
}
