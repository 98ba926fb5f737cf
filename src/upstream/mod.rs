// 上游服务客户端：Twitter v2 API 与 LLM

mod openai;
mod twitter;

use async_trait::async_trait;

use crate::error::UpstreamError;

pub use openai::OpenAiClient;
pub use twitter::TwitterClient;

/// 文本补全服务
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// 发送单条用户消息，返回第一个候选的文本
    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError>;
}
