use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub twitter_bearer_token: Option<String>,
    pub twitter_api_base: String,
    pub twitter_user_agent: String,
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    pub openai_model: String,
    pub user_data_cache_ttl_secs: u64,
    pub analysis_cache_ttl_secs: u64,
    pub cache_purge_interval_secs: u64,
    pub queue_delay_ms: u64,
    pub twitter_max_attempts: u32,
    pub twitter_base_delay_ms: u64,
    pub llm_max_attempts: u32,
    pub llm_base_delay_ms: u64,
    pub bucket_size: f64,
    pub bucket_tokens_per_interval: f64,
    pub bucket_interval_ms: u64,
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            api_base_uri: "/api".to_string(),
            twitter_bearer_token: None,
            twitter_api_base: "https://api.twitter.com/2".to_string(),
            twitter_user_agent: "PredionAnalyzer/1.0".to_string(),
            openai_api_key: None,
            openai_api_base: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-3.5-turbo-16k".to_string(),
            user_data_cache_ttl_secs: 300,
            analysis_cache_ttl_secs: 3600,
            cache_purge_interval_secs: 60,
            queue_delay_ms: 5000,
            twitter_max_attempts: 5,
            twitter_base_delay_ms: 10_000,
            llm_max_attempts: 5,
            llm_base_delay_ms: 1000,
            bucket_size: 10.0,
            bucket_tokens_per_interval: 1.0,
            bucket_interval_ms: 1000,
            http_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        Ok(Config {
            server_host: var_or("SERVER_HOST", defaults.server_host)?,
            server_port: var_or("SERVER_PORT", defaults.server_port)?,
            api_base_uri: var_or("API_BASE_URI", defaults.api_base_uri)?,
            // 凭据缺失不是启动错误，只在对应接口被调用时报 500
            twitter_bearer_token: optional_var("TWITTER_BEARER_TOKEN")?,
            twitter_api_base: var_or("TWITTER_API_BASE", defaults.twitter_api_base)?,
            twitter_user_agent: var_or("TWITTER_USER_AGENT", defaults.twitter_user_agent)?,
            openai_api_key: optional_var("OPENAI_API_KEY")?,
            openai_api_base: var_or("OPENAI_API_BASE", defaults.openai_api_base)?,
            openai_model: var_or("OPENAI_MODEL", defaults.openai_model)?,
            user_data_cache_ttl_secs: var_or(
                "USER_DATA_CACHE_TTL",
                defaults.user_data_cache_ttl_secs,
            )?,
            analysis_cache_ttl_secs: var_or(
                "ANALYSIS_CACHE_TTL",
                defaults.analysis_cache_ttl_secs,
            )?,
            cache_purge_interval_secs: var_or(
                "CACHE_PURGE_INTERVAL",
                defaults.cache_purge_interval_secs,
            )?,
            queue_delay_ms: var_or("QUEUE_DELAY_MS", defaults.queue_delay_ms)?,
            twitter_max_attempts: var_or("TWITTER_MAX_ATTEMPTS", defaults.twitter_max_attempts)?,
            twitter_base_delay_ms: var_or(
                "TWITTER_BASE_DELAY_MS",
                defaults.twitter_base_delay_ms,
            )?,
            llm_max_attempts: var_or("LLM_MAX_ATTEMPTS", defaults.llm_max_attempts)?,
            llm_base_delay_ms: var_or("LLM_BASE_DELAY_MS", defaults.llm_base_delay_ms)?,
            bucket_size: var_or("BUCKET_SIZE", defaults.bucket_size)?,
            bucket_tokens_per_interval: var_or(
                "BUCKET_TOKENS_PER_INTERVAL",
                defaults.bucket_tokens_per_interval,
            )?,
            bucket_interval_ms: var_or("BUCKET_INTERVAL_MS", defaults.bucket_interval_ms)?,
            http_timeout_secs: var_or("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
        })
    }

    pub fn user_data_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.user_data_cache_ttl_secs)
    }

    pub fn analysis_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.analysis_cache_ttl_secs)
    }

    pub fn cache_purge_interval(&self) -> Duration {
        Duration::from_secs(self.cache_purge_interval_secs)
    }

    pub fn queue_delay(&self) -> Duration {
        Duration::from_millis(self.queue_delay_ms)
    }

    pub fn twitter_base_delay(&self) -> Duration {
        Duration::from_millis(self.twitter_base_delay_ms)
    }

    pub fn llm_base_delay(&self) -> Duration {
        Duration::from_millis(self.llm_base_delay_ms)
    }

    pub fn bucket_interval(&self) -> Duration {
        Duration::from_millis(self.bucket_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

// 未设置时使用默认值，解析失败同样回退到默认值
fn var_or<T: FromStr>(key: &str, default: T) -> Result<T, env::VarError> {
    match env::var(key) {
        Ok(value) => Ok(value.trim().parse().unwrap_or(default)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(e),
    }
}

fn optional_var(key: &str) -> Result<Option<String>, env::VarError> {
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upstream_policies() {
        let config = Config::default();
        assert_eq!(config.user_data_cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.analysis_cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.cache_purge_interval(), Duration::from_secs(60));
        assert_eq!(config.queue_delay(), Duration::from_secs(5));
        assert_eq!(config.twitter_max_attempts, 5);
        assert_eq!(config.twitter_base_delay(), Duration::from_secs(10));
        assert_eq!(config.llm_max_attempts, 5);
        assert_eq!(config.llm_base_delay(), Duration::from_secs(1));
        assert_eq!(config.bucket_size, 10.0);
        assert!(config.twitter_bearer_token.is_none());
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn missing_variables_fall_back_to_defaults() {
        let port: u16 = var_or("PREDION_TEST_UNSET_PORT", 4321).unwrap();
        assert_eq!(port, 4321);
        assert_eq!(optional_var("PREDION_TEST_UNSET_TOKEN").unwrap(), None);
    }
}
