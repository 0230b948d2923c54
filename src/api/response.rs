use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::services::PreloadOutcome;

/// 统一的API响应包装器
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// 创建成功响应（仅消息）
    pub fn message(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// 批量预加载响应
///
/// 结果顺序为完成顺序，调用方需要按 `url` 自行对应
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success_count: usize,
    pub failure_count: usize,
    pub total: usize,
    pub results: Vec<PreloadOutcome>,
}

impl BatchResponse {
    pub fn new(results: Vec<PreloadOutcome>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            success_count,
            failure_count: results.len() - success_count,
            total: results.len(),
            results,
        }
    }
}

impl IntoResponse for BatchResponse {
    fn into_response(self) -> Response {
        let status = if self.failure_count == 0 {
            StatusCode::OK
        } else {
            StatusCode::MULTI_STATUS
        };

        (status, Json(ApiResponse::success(self))).into_response()
    }
}

/// 辅助函数：创建成功响应
pub fn success<T: Serialize>(data: T) -> impl IntoResponse {
    ApiResponse::success(data)
}

/// 辅助函数：创建成功消息响应
pub fn success_message(message: impl Into<String>) -> impl IntoResponse {
    ApiResponse::<()>::message(message)
}
