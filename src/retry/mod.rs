//! 指数退避重试
//!
//! `execute` 对任何错误都重试；`execute_http` 额外把 429 响应视为失败，
//! 并在每次发送前等待出站令牌桶。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::limiter::TokenBucket;

/// 能够表示"被上游限流"的响应
pub trait RateLimitedResponse {
    fn is_rate_limited(&self) -> bool;
}

impl RateLimitedResponse for reqwest::Response {
    fn is_rate_limited(&self) -> bool {
        self.status() == StatusCode::TOO_MANY_REQUESTS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` 为总尝试次数（含第一次），至少为 1
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 第 `attempt` 次失败（从 0 开始）之后的等待时间：base * 2^attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.checked_pow(attempt).unwrap_or(u32::MAX))
    }

    fn is_last(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_attempts
    }

    /// 执行操作，失败后按指数退避重试
    ///
    /// 最后一次失败的错误原样返回，不做包装。
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} attempts", attempt + 1);
                    }
                    return Ok(value);
                }
                Err(e) if self.is_last(attempt) => {
                    warn!(
                        "Giving up after {} attempts. Last error: {}",
                        self.max_attempts, e
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "Retry {}/{} after {:?}: {}",
                        attempt + 1,
                        self.max_attempts,
                        delay,
                        e
                    );
                    sleep(delay).await;
                }
            }
            attempt += 1;
        }
    }

    /// HTTP 调用的重试
    ///
    /// 每次发送前先从令牌桶取令牌。网络错误或 429 响应触发退避；
    /// 最后一次仍为 429 时把响应交还调用方处理。
    pub async fn execute_http<F, Fut, R, E>(
        &self,
        limiter: &TokenBucket,
        mut send: F,
    ) -> Result<R, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, E>>,
        R: RateLimitedResponse,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            let waited = limiter.remove_tokens(1.0).await;
            if !waited.is_zero() {
                debug!("Outbound rate limit: waited {:?} for a token", waited);
            }

            match send().await {
                Ok(response) if response.is_rate_limited() && !self.is_last(attempt) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "Rate limited. Retrying in {:?}. Retries left: {}",
                        delay,
                        self.max_attempts - attempt - 1
                    );
                    sleep(delay).await;
                }
                Ok(response) => return Ok(response),
                Err(e) if self.is_last(attempt) => {
                    warn!("Request failed after {} attempts: {}", self.max_attempts, e);
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "Request error: {}. Retrying in {:?}. Retries left: {}",
                        e,
                        delay,
                        self.max_attempts - attempt - 1
                    );
                    sleep(delay).await;
                }
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    struct FakeResponse(u16);

    impl RateLimitedResponse for FakeResponse {
        fn is_rate_limited(&self) -> bool {
            self.0 == 429
        }
    }

    fn roomy_bucket() -> TokenBucket {
        TokenBucket::new(100.0, 100.0, Duration::from_secs(1))
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1000));
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_k_failures() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        let calls = Arc::new(AtomicU32::new(0));

        let start = Instant::now();
        let result: Result<&str, String> = policy
            .execute(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 3 { Err(format!("failure {n}")) } else { Ok("done") }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 100 + 200 + 400
        assert!(start.elapsed() >= Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_operation_runs_max_attempts_and_keeps_last_error() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), String> = policy
            .execute(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    Err(format!("failure {n}"))
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), "failure 4");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn http_retries_on_429_then_returns_success() {
        let policy = RetryPolicy::new(5, Duration::from_secs(10));
        let bucket = roomy_bucket();
        let calls = Arc::new(AtomicU32::new(0));

        let start = Instant::now();
        let response: Result<FakeResponse, String> = policy
            .execute_http(&bucket, || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    Ok(if n < 2 { FakeResponse(429) } else { FakeResponse(200) })
                }
            })
            .await;

        assert_eq!(response.unwrap().0, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn http_hands_back_final_429() {
        let policy = RetryPolicy::new(3, Duration::from_millis(5));
        let bucket = roomy_bucket();
        let calls = Arc::new(AtomicU32::new(0));

        let response: Result<FakeResponse, String> = policy
            .execute_http(&bucket, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(FakeResponse(429))
                }
            })
            .await;

        assert_eq!(response.unwrap().0, 429);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn http_does_not_retry_other_statuses() {
        let policy = RetryPolicy::new(5, Duration::from_millis(5));
        let bucket = roomy_bucket();
        let calls = Arc::new(AtomicU32::new(0));

        let response: Result<FakeResponse, String> = policy
            .execute_http(&bucket, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(FakeResponse(404))
                }
            })
            .await;

        assert_eq!(response.unwrap().0, 404);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn http_propagates_transport_error_after_last_attempt() {
        let policy = RetryPolicy::new(2, Duration::from_millis(5));
        let bucket = roomy_bucket();
        let calls = Arc::new(AtomicU32::new(0));

        let response: Result<FakeResponse, String> = policy
            .execute_http(&bucket, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("connection reset".to_string())
                }
            })
            .await;

        assert_eq!(response.err().as_deref(), Some("connection reset"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn http_waits_for_outbound_tokens() {
        let policy = RetryPolicy::new(1, Duration::ZERO);
        let bucket = TokenBucket::new(1.0, 1.0, Duration::from_secs(1));

        let start = Instant::now();
        for _ in 0..3 {
            let response: Result<FakeResponse, String> = policy
                .execute_http(&bucket, || async { Ok(FakeResponse(200)) })
                .await;
            assert!(response.is_ok());
        }
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
