use std::sync::Arc;

use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::error::UpstreamError;
use crate::limiter::TokenBucket;
use crate::models::{Tweet, TwitterUser};
use crate::retry::RetryPolicy;

#[derive(Deserialize)]
struct UserEnvelope {
    data: TwitterUser,
}

// 没有推文时 Twitter 不返回 data 字段
#[derive(Deserialize)]
struct TweetsEnvelope {
    #[serde(default)]
    data: Vec<Tweet>,
}

/// Twitter v2 API 客户端
///
/// 每次请求都经过出站令牌桶和重试策略。
#[derive(Clone)]
pub struct TwitterClient {
    http: Client,
    base_url: String,
    user_agent: String,
    limiter: Arc<TokenBucket>,
    retry: RetryPolicy,
}

impl TwitterClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
        limiter: Arc<TokenBucket>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            user_agent: user_agent.into(),
            limiter,
            retry,
        }
    }

    /// GET /users/by/username/{username}
    pub async fn fetch_user(
        &self,
        username: &str,
        bearer_token: &str,
    ) -> Result<TwitterUser, UpstreamError> {
        let url = self.endpoint(&["users", "by", "username", username])?;
        let response = self.get(url, &[], bearer_token).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Twitter API error (user): {} {}", status, body);
            return Err(UpstreamError::Rejected {
                context: "Failed to fetch user data",
                status,
                body,
            });
        }

        let envelope: UserEnvelope = response.json().await?;
        debug!("User data: {:?}", envelope.data);
        Ok(envelope.data)
    }

    /// GET /users/{id}/tweets?max_results=10&tweet.fields=text
    pub async fn fetch_tweets(
        &self,
        user_id: &str,
        bearer_token: &str,
    ) -> Result<Vec<Tweet>, UpstreamError> {
        let url = self.endpoint(&["users", user_id, "tweets"])?;
        let query = [("max_results", "10"), ("tweet.fields", "text")];
        let response = self.get(url, &query, bearer_token).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Twitter API error (tweets): {} {}", status, body);
            return Err(UpstreamError::Rejected {
                context: "Failed to fetch tweets",
                status,
                body,
            });
        }

        let envelope: TweetsEnvelope = response.json().await?;
        debug!("Fetched {} tweets for user {}", envelope.data.len(), user_id);
        Ok(envelope.data)
    }

    async fn get(
        &self,
        url: Url,
        query: &[(&str, &str)],
        bearer_token: &str,
    ) -> Result<reqwest::Response, UpstreamError> {
        info!("Fetching URL: {}", url);
        let response = self
            .retry
            .execute_http(&self.limiter, || {
                self.http
                    .get(url.clone())
                    .query(query)
                    .bearer_auth(bearer_token)
                    .header(reqwest::header::USER_AGENT, &self.user_agent)
                    .send()
            })
            .await?;
        info!("Response status: {}", response.status());
        Ok(response)
    }

    // 路径段逐个转义，用户名中的特殊字符不会改变请求路径
    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(base_url: &str) -> TwitterClient {
        TwitterClient::new(
            Client::new(),
            base_url,
            "PredionAnalyzer/1.0",
            Arc::new(TokenBucket::new(100.0, 100.0, Duration::from_secs(1))),
            RetryPolicy::new(3, Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn endpoint_keeps_base_path_and_escapes_segments() {
        let url = client("https://api.twitter.com/2")
            .endpoint(&["users", "by", "username", "a/b"])
            .unwrap();
        assert_eq!(url.as_str(), "https://api.twitter.com/2/users/by/username/a%2Fb");

        let url = client("http://127.0.0.1:8080/")
            .endpoint(&["users", "42", "tweets"])
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/users/42/tweets");
    }

    #[tokio::test]
    async fn invalid_base_url_is_reported() {
        let err = client("not a url").endpoint(&["users"]).unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn fetches_profile_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users/by/username/jack")
            .match_header("authorization", "Bearer secret")
            .match_header("user-agent", "PredionAnalyzer/1.0")
            .with_status(200)
            .with_body(r#"{"data":{"id":"12","name":"jack","username":"jack"}}"#)
            .create_async()
            .await;

        let user = client(&server.url()).fetch_user("jack", "secret").await.unwrap();
        assert_eq!(user.id, "12");
        assert_eq!(user.username, "jack");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn persistent_429_is_retried_then_reported() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("GET", "/users/by/username/jack")
            .with_status(429)
            .with_body("Too Many Requests")
            .expect(3)
            .create_async()
            .await;

        let err = client(&server.url()).fetch_user("jack", "secret").await.unwrap_err();
        match err {
            UpstreamError::Rejected { status, .. } => assert_eq!(status.as_u16(), 429),
            other => panic!("unexpected error: {other:?}"),
        }
        limited.assert_async().await;
    }

    #[tokio::test]
    async fn missing_tweet_data_yields_empty_list() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex(r"^/users/12/tweets".to_string()))
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("max_results".into(), "10".into()),
                mockito::Matcher::UrlEncoded("tweet.fields".into(), "text".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"meta":{"result_count":0}}"#)
            .create_async()
            .await;

        let tweets = client(&server.url()).fetch_tweets("12", "secret").await.unwrap();
        assert!(tweets.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_becomes_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/by/username/ghost")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let err = client(&server.url()).fetch_user("ghost", "secret").await.unwrap_err();
        match err {
            UpstreamError::Rejected { status, body, .. } => {
                assert_eq!(status.as_u16(), 404);
                assert_eq!(body, "not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
