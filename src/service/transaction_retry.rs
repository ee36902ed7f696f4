// 链上调用重试机制
//
// 只用于真实链桥接（gas 估算、交易提交）：
// - 每次尝试都有独立的超时
// - 失败后指数退避
// - 参数类错误（地址、金额）不重试

use std::{future::Future, time::Duration};

use tokio::time::sleep;

use crate::{config::BlockchainConfig, domain::errors::EvmError, metrics};

/// 重试配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 最大重试次数（不含首次尝试）
    pub max_retries: u32,
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 退避倍数
    pub backoff_multiplier: f64,
    /// 单次尝试超时
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&BlockchainConfig> for RetryConfig {
    fn from(config: &BlockchainConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            attempt_timeout: Duration::from_secs(config.rpc_timeout_secs),
            ..Self::default()
        }
    }
}

/// 链调用重试器
#[derive(Debug, Clone)]
pub struct TransactionRetrier {
    config: RetryConfig,
}

fn is_retryable(err: &EvmError) -> bool {
    matches!(err, EvmError::Chain(_) | EvmError::Timeout(_))
}

impl TransactionRetrier {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.config.attempt_timeout
    }

    /// 带超时和指数退避的重试
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, EvmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EvmError>>,
    {
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let started = std::time::Instant::now();

            let result = match tokio::time::timeout(self.config.attempt_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(EvmError::Timeout(self.config.attempt_timeout.as_secs())),
            };
            metrics::observe_chain_latency_ms(started.elapsed().as_millis(), result.is_ok());

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation = %operation, attempt, "Chain call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if is_retryable(&e) && attempt <= self.config.max_retries => {
                    tracing::warn!(
                        operation = %operation,
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %e,
                        next_retry_in_ms = backoff.as_millis() as u64,
                        "Chain call failed, will retry"
                    );

                    // 指数退避
                    sleep(backoff).await;
                    backoff = backoff.mul_f64(self.config.backoff_multiplier);
                }
                Err(e) => {
                    tracing::error!(
                        operation = %operation,
                        attempt,
                        error = %e,
                        "Chain call failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}
