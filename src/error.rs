//! 统一错误处理
//!
//! 提供 `ApiError` 枚举实现 `IntoResponse`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::services::deploy::DeployError;

/// API 错误响应结构
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// 统一 API 错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 400 - 请求无效，响应体为纯文本提示
    BadRequest(String),
    /// 500 - 内部错误，细节只写日志
    Internal(String),
}

impl ApiError {
    /// 创建请求无效错误
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<DeployError> for ApiError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::Validation(e) => ApiError::bad_request(e.to_string()),
            DeployError::Pipeline(e) => ApiError::internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Unhandled error while processing request");
                let body = ErrorResponse::new("internal_error", "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(m) => write!(f, "Bad request: {}", m),
            ApiError::Internal(m) => write!(f, "Internal error: {}", m),
        }
    }
}

impl std::error::Error for ApiError {}

/// 便捷类型别名
pub type ApiResult<T> = Result<T, ApiError>;
