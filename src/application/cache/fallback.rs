//! Fallback 模式
//!
//! 存储出现不可恢复错误时进入 fallback：所有读写变成廉价的空操作。
//! 冷却时间到期后无条件退出（不重新验证底层故障是否已恢复）。

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct FallbackState {
    active: Arc<AtomicBool>,
    cooldown: Duration,
    recovery: Mutex<Option<JoinHandle<()>>>,
}

impl FallbackState {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
            cooldown,
            recovery: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// 进入 fallback 模式并启动恢复定时器；已处于 fallback 时返回 false
    pub fn enter(&self, reason: &str) -> bool {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        tracing::warn!(
            reason = %reason,
            cooldown_secs = self.cooldown.as_secs(),
            "Cache entering fallback mode"
        );

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No tokio runtime, fallback recovery timer not started");
            return true;
        };

        let active = self.active.clone();
        let cooldown = self.cooldown;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(cooldown).await;
            active.store(false, Ordering::Release);
            tracing::info!("Cache cooldown elapsed, exiting fallback mode");
        });

        if let Some(previous) = self.recovery.lock().replace(handle) {
            previous.abort();
        }
        true
    }

    /// 取消恢复定时器（保持当前模式）
    pub fn shutdown(&self) {
        if let Some(handle) = self.recovery.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for FallbackState {
    fn drop(&mut self) {
        self.shutdown();
    }
}
