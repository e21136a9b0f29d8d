use crate::config::RetryConfig;
use crate::error::ApiError;
use std::future::Future;
use std::time::Duration;

/// 外部API共通の再試行ポリシー
///
/// 一時的なエラー（[`ApiError::is_transient`]）のみ、最大 `max_attempts` 回まで
/// 固定間隔で試行する。恒久的なエラーは即座に返す。
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    /// 再試行なし（1回のみ）
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `op` をポリシーに従って実行
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    log::warn!(
                        "{}: 一時的なエラー ({}/{}回目): {}",
                        label,
                        attempt,
                        self.max_attempts,
                        e
                    );
                    attempt += 1;
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
