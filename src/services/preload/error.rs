// 预加载模块错误类型定义
//
// 定义了图片预加载过程中可能出现的各种错误类型

use std::time::Duration;
use thiserror::Error;

/// 单次预加载的错误
///
/// 所有变体在重试循环中被同等对待，重试耗尽后最后一个错误会随结果返回
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreloadError {
    #[error("URL 为空")]
    EmptyUrl,

    #[error("加载超时 ({0:?})")]
    Timeout(Duration),

    #[error("加载错误: {0}")]
    Load(#[from] LoadError),

    #[error("图片已加载但似乎已损坏 ({width}x{height})")]
    BrokenImage { width: u32, height: u32 },
}

/// 图片加载器返回的错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("网络错误: {0}")]
    Network(String),

    #[error("HTTP 错误: 状态码 {0}")]
    HttpError(u16),

    #[error("图片超过大小上限 ({limit} 字节)")]
    TooLarge { limit: u64 },

    #[error("图片解码失败: {0}")]
    Decode(String),

    #[error("任务执行失败: {0}")]
    Task(String),
}

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("无效的基础地址: {0}")]
    InvalidOrigin(String),

    #[error("无效的环境变量 {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

// 实现从 reqwest::Error 到 LoadError 的转换
impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_status() {
            if let Some(status) = err.status() {
                return LoadError::HttpError(status.as_u16());
            }
        }
        LoadError::Network(err.to_string())
    }
}

impl From<image::ImageError> for LoadError {
    fn from(err: image::ImageError) -> Self {
        LoadError::Decode(err.to_string())
    }
}
