// 图片加载器 - 下载并解码图片
//
// 本模块定义缓存所依赖的加载原语，包括：
// - `ImageLoader` trait：单次加载（不含重试和超时，由缓存负责）
// - `DecodedImage`：解码后的图片句柄，提供尺寸查询
// - `HttpImageLoader`：基于 reqwest + image 的默认实现

use crate::services::preload::error::LoadError;
use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task;
use tracing::debug;

/// 解码后的图片
#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: DynamicImage,
}

impl DecodedImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// 图片加载原语
///
/// 实现者只负责一次加载；超时、重试、尺寸校验和去重都由 `ImageCache` 处理。
/// 超时时加载 future 会被直接丢弃。
#[async_trait]
pub trait ImageLoader: Send + Sync + 'static {
    async fn load(&self, url: &str) -> Result<DecodedImage, LoadError>;
}

#[async_trait]
impl<L: ImageLoader + ?Sized> ImageLoader for Arc<L> {
    async fn load(&self, url: &str) -> Result<DecodedImage, LoadError> {
        (**self).load(url).await
    }
}

/// HTTP 图片加载器
///
/// 使用连接池下载图片，在阻塞线程池中解码，解码并发受信号量限制
pub struct HttpImageLoader {
    /// HTTP 客户端
    client: Client,

    /// 解码并发控制
    decode_semaphore: Arc<Semaphore>,

    /// 响应体字节上限
    max_image_bytes: u64,
}

impl HttpImageLoader {
    /// 创建新的 HTTP 加载器
    ///
    /// # 参数
    /// - `decode_concurrency`: 同时解码的图片数上限（最小为 1）
    /// - `max_image_bytes`: 单张图片响应体的字节上限
    pub fn new(decode_concurrency: usize, max_image_bytes: u64) -> Result<Self, LoadError> {
        let client = Client::builder()
            .pool_max_idle_per_host(10) // 每个主机最多保持 10 个空闲连接
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| LoadError::Network(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            client,
            decode_semaphore: Arc::new(Semaphore::new(decode_concurrency.max(1))),
            max_image_bytes,
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::HttpError(status.as_u16()));
        }

        let limit = self.max_image_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(LoadError::TooLarge { limit });
        }

        // Content-Length 可能缺失或不实，按块读取时继续检查
        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (data.len() + chunk.len()) as u64 > limit {
                return Err(LoadError::TooLarge { limit });
            }
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }

    async fn decode(&self, data: Vec<u8>) -> Result<DecodedImage, LoadError> {
        self.run_decode(move || image::load_from_memory(&data))
            .await?
            .map(DecodedImage::new)
            .map_err(LoadError::from)
    }

    /// 在阻塞线程池中执行解码任务
    ///
    /// 许可随任务一起移入阻塞线程，超时丢弃外层 future 后解码仍占用许可直到结束
    async fn run_decode<T, F>(&self, job: F) -> Result<T, LoadError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.decode_semaphore)
            .acquire_owned()
            .await
            .map_err(|e| LoadError::Task(format!("获取解码许可失败: {}", e)))?;

        task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| LoadError::Task(e.to_string()))
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> Result<DecodedImage, LoadError> {
        let data = self.fetch_bytes(url).await?;
        debug!("图片下载完成: {} ({} 字节)", url, data.len());

        self.decode(data).await
    }
}
