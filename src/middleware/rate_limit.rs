use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{config::Config, error::AppError, limiter::TokenBucket};

/// 入站请求限流
///
/// 无令牌时立即返回 429，不排队、不等待。
#[derive(Clone)]
pub struct RateLimiter {
    bucket: Arc<TokenBucket>,
}

impl RateLimiter {
    pub fn new(config: &Config) -> Self {
        Self::from_bucket(Arc::new(TokenBucket::new(
            config.bucket_size,
            config.bucket_tokens_per_interval,
            config.bucket_interval(),
        )))
    }

    pub fn from_bucket(bucket: Arc<TokenBucket>) -> Self {
        Self { bucket }
    }

    pub fn is_rate_limited(&self) -> bool {
        !self.bucket.try_acquire()
    }

    pub async fn check_rate_limit(self: Arc<Self>, req: Request<Body>, next: Next) -> Response {
        if self.is_rate_limited() {
            tracing::warn!("Inbound rate limit exceeded for {}", req.uri().path());
            return AppError::InboundRateLimited.into_response();
        }

        next.run(req).await
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}
