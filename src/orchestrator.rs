//! 获取与分析流程的编排
//!
//! 缓存查询 → （未命中时）串行队列 + 重试 + 限流的上游调用 → 写缓存 → 返回。
//! 只有完全成功的结果才会写入缓存。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::analysis::{build_prompt, parse_analysis};
use crate::cache::{ResultCache, keys};
use crate::config::Config;
use crate::error::{AppError, UpstreamError};
use crate::limiter::TokenBucket;
use crate::models::{PredictionAnalysis, Tweet, TwitterUser, UserData};
use crate::queue::SerialRequestQueue;
use crate::retry::RetryPolicy;
use crate::upstream::{CompletionClient, OpenAiClient, TwitterClient};

pub struct AnalysisOrchestrator {
    twitter: TwitterClient,
    twitter_bearer_token: Option<String>,
    completion: Option<Arc<dyn CompletionClient>>,
    llm_retry: RetryPolicy,
    queue: SerialRequestQueue,
    user_cache: ResultCache<UserData>,
    analysis_cache: ResultCache<PredictionAnalysis>,
}

impl AnalysisOrchestrator {
    /// 根据配置创建上游客户端、出站令牌桶、串行队列和两个缓存
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;

        let outbound_limiter = Arc::new(TokenBucket::new(
            config.bucket_size,
            config.bucket_tokens_per_interval,
            config.bucket_interval(),
        ));
        let twitter = TwitterClient::new(
            http.clone(),
            config.twitter_api_base.clone(),
            config.twitter_user_agent.clone(),
            outbound_limiter,
            RetryPolicy::new(config.twitter_max_attempts, config.twitter_base_delay()),
        );

        let completion = config.openai_api_key.as_ref().map(|key| {
            Arc::new(OpenAiClient::new(
                http.clone(),
                config.openai_api_base.clone(),
                key.clone(),
                config.openai_model.clone(),
            )) as Arc<dyn CompletionClient>
        });

        Ok(Self {
            twitter,
            twitter_bearer_token: config.twitter_bearer_token.clone(),
            completion,
            llm_retry: RetryPolicy::new(config.llm_max_attempts, config.llm_base_delay()),
            queue: SerialRequestQueue::new(config.queue_delay()),
            user_cache: ResultCache::new(config.user_data_cache_ttl()),
            analysis_cache: ResultCache::new(config.analysis_cache_ttl()),
        })
    }

    /// 替换 LLM 客户端
    pub fn with_completion_client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.completion = Some(client);
        self
    }

    pub fn user_cache(&self) -> &ResultCache<UserData> {
        &self.user_cache
    }

    pub fn analysis_cache(&self) -> &ResultCache<PredictionAnalysis> {
        &self.analysis_cache
    }

    /// 清除两个缓存中的过期条目，返回清除总数
    pub fn purge_expired(&self) -> usize {
        self.user_cache.purge_expired() + self.analysis_cache.purge_expired()
    }

    /// 启动定期清理过期缓存的后台任务
    ///
    /// 任务只持有弱引用，编排器释放后在下一次触发时退出。
    pub fn spawn_cache_purger(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let orchestrator = Arc::downgrade(self);
        let period = period.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 第一次 tick 立即返回
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(orchestrator) = orchestrator.upgrade() else {
                    debug!("Orchestrator dropped, stopping cache purger");
                    return;
                };
                let purged = orchestrator.purge_expired();
                if purged > 0 {
                    debug!("Purged {} expired cache entries", purged);
                }
            }
        })
    }

    /// 获取用户资料和最近推文
    ///
    /// 资料和推文两次请求共用一个队列位置，不会与其他用户的请求交错。
    pub async fn fetch_user_data(&self, username: &str) -> Result<UserData, AppError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }

        let cache_key = keys::user_data_key(username);
        if let Some(cached) = self.user_cache.get(&cache_key) {
            info!("Returning cached data for: {}", username);
            return Ok(cached);
        }

        let bearer_token = self.twitter_bearer_token.clone().ok_or_else(|| {
            AppError::Configuration("Twitter API credentials are not configured".to_string())
        })?;

        info!(
            "Fetching data for username: {} ({} requests waiting)",
            username,
            self.queue.pending()
        );
        let twitter = self.twitter.clone();
        let target = username.to_string();
        let result = self
            .queue
            .enqueue(move || async move {
                let user = twitter.fetch_user(&target, &bearer_token).await?;
                let tweets = twitter.fetch_tweets(&user.id, &bearer_token).await?;
                Ok::<_, UpstreamError>(UserData { user, tweets })
            })
            .await;

        match result {
            Ok(data) => {
                self.user_cache.set(cache_key, data.clone());
                Ok(data)
            }
            Err(e) => {
                error!("Failed to fetch data for {}: {}", username, e);
                Err(AppError::UpstreamExhausted(e.to_string()))
            }
        }
    }

    /// 生成预测分析
    ///
    /// LLM 调用的任何错误都会触发重试。
    pub async fn analyze_predictions(
        &self,
        user: &TwitterUser,
        tweets: &[Tweet],
    ) -> Result<PredictionAnalysis, AppError> {
        let cache_key = keys::analysis_key(&user.username);
        if let Some(cached) = self.analysis_cache.get(&cache_key) {
            info!("Returning cached analysis for: {}", user.username);
            return Ok(cached);
        }

        let completion = self.completion.as_ref().ok_or_else(|| {
            AppError::Configuration("OpenAI API credentials are not configured".to_string())
        })?;

        let prompt = build_prompt(user, tweets);
        let text = self
            .llm_retry
            .execute(|| completion.complete(&prompt))
            .await
            .map_err(|e| {
                error!("Error analyzing predictions for {}: {}", user.username, e);
                AppError::AnalysisFailed(e.to_string())
            })?;

        if text.trim().is_empty() {
            error!("Empty completion for {}", user.username);
            return Err(AppError::AnalysisFailed(
                UpstreamError::EmptyCompletion.to_string(),
            ));
        }

        let analysis = parse_analysis(&text);
        self.analysis_cache.set(cache_key, analysis.clone());
        Ok(analysis)
    }
}
