use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, sleep};

/// 令牌桶
///
/// 按经过的时间补充令牌，上限为桶容量。
pub struct TokenBucket {
    capacity: f64,
    tokens_per_interval: f64,
    interval: Duration,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// 创建一个装满令牌的桶
    pub fn new(capacity: f64, tokens_per_interval: f64, interval: Duration) -> Self {
        let capacity = capacity.max(1.0);
        Self {
            capacity,
            tokens_per_interval: tokens_per_interval.max(f64::MIN_POSITIVE),
            interval: interval.max(Duration::from_millis(1)),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// 当前可用令牌数（会先补充）
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        state.tokens
    }

    /// 尝试取出 `count` 个令牌
    ///
    /// 令牌充足时扣减并返回剩余数量（非负）；不足时不扣减，
    /// 返回负数表示缺口。超过容量的请求按容量计算。
    pub fn try_remove_tokens(&self, count: f64) -> f64 {
        let count = count.clamp(0.0, self.capacity);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);

        if state.tokens >= count {
            state.tokens -= count;
            state.tokens
        } else {
            state.tokens - count
        }
    }

    /// 非阻塞模式，用于入站请求准入
    pub fn try_acquire(&self) -> bool {
        self.try_remove_tokens(1.0) >= 0.0
    }

    /// 补足 `deficit` 个令牌所需的时间
    pub fn wait_for_deficit(&self, deficit: f64) -> Duration {
        if deficit <= 0.0 {
            return Duration::ZERO;
        }
        let per_token = self.interval.as_secs_f64() / self.tokens_per_interval;
        Duration::try_from_secs_f64(deficit * per_token).unwrap_or(Duration::MAX)
    }

    /// 阻塞模式：等待直到取得令牌，返回实际等待的时间
    pub async fn remove_tokens(&self, count: f64) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let remaining = self.try_remove_tokens(count);
            if remaining >= 0.0 {
                return waited;
            }

            let wait = self.wait_for_deficit(-remaining);
            tracing::debug!("Token bucket empty, waiting {:?}", wait);
            sleep(wait).await;
            waited += wait;
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        let added = elapsed.as_secs_f64() / self.interval.as_secs_f64() * self.tokens_per_interval;
        state.tokens = (state.tokens + added).min(self.capacity);
        state.last_refill = now;
    }
}
