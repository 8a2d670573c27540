//! 后台任务调度
//!
//! 写入时序库、评估接近提醒等副作用都以独立的后台任务执行。
//! 每次尝试都有超时限制，失败后按指数退避重试，结果只记录到日志，
//! 不会影响发起请求的返回值。

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::AppError;

#[derive(Debug, Clone, Copy)]
pub struct BackgroundPolicy {
    /// 单次尝试的超时时间
    pub timeout: Duration,
    /// 首次失败后的最大重试次数
    pub max_retries: u32,
    /// 第一次重试前的等待时间，之后逐次翻倍
    pub backoff: Duration,
}

impl Default for BackgroundPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            backoff: Duration::from_millis(200),
        }
    }
}

/// 已派发的后台任务
///
/// 丢弃该值不会取消任务。
#[derive(Debug, Default)]
pub struct BackgroundWork {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundWork {
    pub fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 等待所有任务结束
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Background task panicked: {}", e);
            }
        }
    }
}

/// 派发一个带超时和重试策略的后台任务
pub fn spawn_with_policy<F, Fut>(task: &'static str, policy: BackgroundPolicy, op: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    tokio::spawn(async move {
        run_with_policy(task, policy, op).await;
    })
}

async fn run_with_policy<F, Fut>(task: &'static str, policy: BackgroundPolicy, op: F) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), AppError>>,
{
    let attempts = policy.max_retries + 1;

    for attempt in 1..=attempts {
        match tokio::time::timeout(policy.timeout, op()).await {
            Ok(Ok(())) => {
                debug!(task, attempt, "Background task finished");
                return true;
            }
            Ok(Err(e)) => {
                warn!(task, attempt, error = %e, "Background task failed");
            }
            Err(_) => {
                warn!(task, attempt, timeout_ms = policy.timeout.as_millis() as u64, "Background task timed out");
            }
        }

        if attempt < attempts {
            // 指数退避
            let delay = policy.backoff.saturating_mul(2u32.saturating_pow(attempt - 1));
            tokio::time::sleep(delay).await;
        }
    }

    error!(task, attempts, "Background task gave up after all retries");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> BackgroundPolicy {
        BackgroundPolicy {
            timeout: Duration::from_millis(50),
            max_retries,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let ok = run_with_policy("flaky", fast_policy(3), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AppError::Upstream("boom".into()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_timeouts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let ok = run_with_policy("slow", fast_policy(1), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        })
        .await;

        assert!(!ok);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn spawned_work_can_be_joined() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut work = BackgroundWork::default();
        work.push(spawn_with_policy("once", fast_policy(0), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        assert_eq!(work.len(), 1);
        work.join().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
