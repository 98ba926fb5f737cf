use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::queue::QueueError;

/// 对外暴露的错误，映射为 HTTP 状态码和统一的错误响应体
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Configuration(String),

    #[error("Rate limit exceeded. Please try again in a moment.")]
    InboundRateLimited,

    #[error("{0}")]
    UpstreamExhausted(String),

    #[error("Failed to analyze predictions: {0}")]
    AnalysisFailed(String),
}

/// 上游（Twitter / LLM）调用失败
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{context}: {body}")]
    Rejected {
        context: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),

    #[error("No response from the language model")]
    EmptyCompletion,

    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InboundRateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::UpstreamExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::AnalysisFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::UpstreamExhausted(message) => ErrorResponse {
                error: message,
                details: Some("Please try again later.".to_string()),
            },
            // 内部原因只写日志，不返回给前端
            AppError::AnalysisFailed(_) => ErrorResponse {
                error: "Failed to analyze predictions".to_string(),
                details: None,
            },
            other => ErrorResponse {
                error: other.to_string(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}
