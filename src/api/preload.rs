// 预加载 API
//
// 提供图片预加载缓存的 HTTP API 端点，包括：
// - 单个 URL 预加载
// - 批量预加载 / 展示预加载
// - 状态查询、统计信息与清空

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::PhotoRecord;
use crate::services::preload::{BatchOptions, LoadStatus, PreloadOptions, Priority};

use super::error::{ApiError, ApiResult};
use super::response::{success, success_message, BatchResponse};
use super::AppState;

/// 请求体中可覆盖的加载选项，未提供的字段使用配置中的默认值
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoadOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl LoadOverrides {
    pub fn apply(&self, defaults: &PreloadOptions) -> PreloadOptions {
        PreloadOptions {
            retries: self.retries.unwrap_or(defaults.retries),
            retry_delay_ms: self.retry_delay_ms.unwrap_or(defaults.retry_delay_ms),
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
            priority: self.priority.unwrap_or(defaults.priority),
        }
    }
}

/// 批量请求的选项：并发数加上加载选项
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    #[serde(flatten)]
    pub load: LoadOverrides,
}

impl BatchOverrides {
    pub fn apply(&self, defaults: &BatchOptions) -> BatchOptions {
        BatchOptions {
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            load: self.load.apply(&defaults.load),
        }
    }
}

/// 单个预加载请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreloadRequest {
    pub url: String,

    #[serde(flatten)]
    pub options: LoadOverrides,
}

/// 预加载单个 URL
///
/// # 端点
/// POST /api/preload
///
/// # 请求体
/// ```json
/// { "url": "/api/photos/1/medium.jpg", "retries": 2, "timeout_ms": 5000 }
/// ```
pub async fn preload_url(
    State(state): State<AppState>,
    Json(request): Json<PreloadRequest>,
) -> ApiResult<impl IntoResponse> {
    let options = request.options.apply(&state.config.defaults);

    let outcome = state.image_cache.preload(&request.url, &options).await;
    Ok(success(outcome))
}

/// 批量预加载请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPreloadRequest {
    pub urls: Vec<String>,

    #[serde(flatten)]
    pub options: BatchOverrides,
}

/// 批量预加载
///
/// # 端点
/// POST /api/preload/batch
///
/// # 请求体
/// ```json
/// { "urls": ["/a.jpg", "/b.jpg"], "concurrency": 2, "retries": 1 }
/// ```
///
/// # 响应
/// 全部成功返回 200，部分失败返回 207。结果按完成顺序排列。
pub async fn preload_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchPreloadRequest>,
) -> ApiResult<impl IntoResponse> {
    state.check_batch_size(request.urls.len())?;

    let options = request.options.apply(&state.batch_defaults());
    let results = state.image_cache.preload_batch(request.urls, &options).await;

    Ok(BatchResponse::new(results))
}

/// 展示预加载请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayPreloadRequest {
    pub photos: Vec<PhotoRecord>,

    #[serde(flatten)]
    pub options: BatchOverrides,
}

/// 为展示预加载照片
///
/// # 端点
/// POST /api/preload/display
pub async fn preload_for_display(
    State(state): State<AppState>,
    Json(request): Json<DisplayPreloadRequest>,
) -> ApiResult<impl IntoResponse> {
    let url_count = request
        .photos
        .iter()
        .filter(|photo| photo.display_url().is_some())
        .count();
    state.check_batch_size(url_count)?;

    let options = request.options.apply(&state.batch_defaults());
    let results = state
        .image_cache
        .preload_for_display(&request.photos, &options)
        .await;

    Ok(BatchResponse::new(results))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub url: String,
    pub status: LoadStatus,
    pub loaded: bool,
}

/// 查询 URL 的加载状态
///
/// # 端点
/// GET /api/preload/status?url=...
pub async fn get_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<impl IntoResponse> {
    let url = state
        .image_cache
        .normalize(&query.url)
        .ok_or_else(|| ApiError::BadRequest("url is required".to_string()))?;

    Ok(success(StatusResponse {
        status: state.image_cache.status(&url),
        loaded: state.image_cache.is_loaded(&url),
        url,
    }))
}

/// 获取缓存统计信息
///
/// # 端点
/// GET /api/preload/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.image_cache.get_stats()))
}

/// 清空缓存
///
/// # 端点
/// POST /api/preload/clear
pub async fn clear_cache(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.image_cache.clear();
    Ok(success_message("Preload cache cleared"))
}
