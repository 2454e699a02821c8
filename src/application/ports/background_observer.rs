//! Background Error Observer - 后台尽力而为任务的错误观察者
//!
//! 命中时的访问时间刷新、定时清理等任务不会把错误返回给调用方，
//! 而是交给观察者处理

use crate::domain::cache::CacheError;

/// 后台任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundTask {
    /// 热层命中后刷新 warm tier 的访问时间
    AccessRefresh,
    /// 过期条目清理
    Sweep,
    /// 定时完整性检查
    IntegrityCheck,
    /// 统计记录持久化
    StatsPersist,
}

impl BackgroundTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundTask::AccessRefresh => "access_refresh",
            BackgroundTask::Sweep => "sweep",
            BackgroundTask::IntegrityCheck => "integrity_check",
            BackgroundTask::StatsPersist => "stats_persist",
        }
    }
}

/// Background Error Observer Port
pub trait BackgroundErrorObserver: Send + Sync {
    fn on_error(&self, task: BackgroundTask, key: Option<&str>, error: &CacheError);
}

/// 默认观察者：写入 tracing 日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BackgroundErrorObserver for TracingObserver {
    fn on_error(&self, task: BackgroundTask, key: Option<&str>, error: &CacheError) {
        tracing::warn!(
            task = task.as_str(),
            cache_key = key.unwrap_or("-"),
            error = %error,
            "Background cache task failed"
        );
    }
}
