pub mod error;
pub mod preload;
pub mod response;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::services::preload::{BatchOptions, ImageCache, ImageLoader, PreloadConfig};
use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub image_cache: ImageCache<Arc<dyn ImageLoader>>,
    pub config: Arc<PreloadConfig>,
}

impl AppState {
    /// 请求未指定批量选项时使用的默认值
    pub fn batch_defaults(&self) -> BatchOptions {
        BatchOptions {
            concurrency: self.config.batch_concurrency,
            load: self.config.defaults.clone(),
        }
    }

    /// 单批数量超过缓存容量时，先加载的图片会被同批后加载的淘汰
    pub fn check_batch_size(&self, len: usize) -> ApiResult<()> {
        if len > self.config.max_size {
            return Err(ApiError::Validation(format!(
                "batch of {} exceeds cache capacity {}",
                len, self.config.max_size
            )));
        }
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Gallery Preload Backend API v1.0" }))
        .route("/api/preload", post(preload::preload_url))
        .route("/api/preload/batch", post(preload::preload_batch))
        .route("/api/preload/display", post(preload::preload_for_display))
        .route("/api/preload/status", get(preload::get_status))
        .route("/api/preload/stats", get(preload::get_stats))
        .route("/api/preload/clear", post(preload::clear_cache))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
