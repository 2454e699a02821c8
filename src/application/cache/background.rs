//! 后台任务句柄
//!
//! `CacheCoordinator::init` 启动的定时任务（过期清理、完整性检查）都挂在同一个
//! `CancellationToken` 上，由 `BackgroundTasks::shutdown` 取消并等待结束

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::BackgroundTask;

pub struct BackgroundTasks {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            handles: Vec::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 启动周期任务；第一次执行在一个完整周期之后
    pub fn spawn_periodic<F, Fut>(&mut self, task: BackgroundTask, period: Duration, mut run: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period.is_zero() {
            tracing::warn!(task = task.as_str(), "Zero period, background task not started");
            return;
        }
        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval 的第一次 tick 立即返回
            ticker.tick().await;

            tracing::debug!(
                task = task.as_str(),
                period_secs = period.as_secs(),
                "Background task started"
            );
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => run().await,
                }
            }
            tracing::debug!(task = task.as_str(), "Background task stopped");
        });
        self.handles.push(handle);
    }

    /// 取消并等待所有任务结束，可重复调用
    pub async fn shutdown(&mut self) {
        self.token.cancel();
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "Background task ended abnormally");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_periodic_runs_until_shutdown() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut tasks = BackgroundTasks::new(CancellationToken::new());

        let c = counter.clone();
        tasks.spawn_periodic(BackgroundTask::Sweep, Duration::from_millis(10), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(tasks.len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        tasks.shutdown().await;
        let runs = counter.load(Ordering::SeqCst);
        assert!(runs >= 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), runs);

        // 第二次调用不会出错
        tasks.shutdown().await;
        assert!(tasks.is_empty());
    }
}
