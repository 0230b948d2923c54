// 图片预加载缓存 - 单飞加载、重试、并发受限的批量预加载
//
// 本模块是预加载功能的核心，负责：
// - 每个规范化 URL 至多一次下载与解码
// - 同一 URL 的并发请求共享同一次加载（单飞）
// - 失败后线性退避重试，单次尝试带超时
// - 批量预加载时限制并发数
// - 容量满时按插入顺序淘汰

use crate::models::PhotoRecord;
use crate::services::preload::config::{BatchOptions, PreloadConfig, PreloadOptions};
use crate::services::preload::error::{LoadError, PreloadError};
use crate::services::preload::loader::{DecodedImage, ImageLoader};
use crate::services::preload::store::{CacheEntry, EntryStatus, EntryStore};
use crate::services::preload::url_normalizer::UrlNormalizer;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

/// 预加载结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreloadOutcome {
    pub success: bool,
    /// 规范化后的 URL（规范化失败时为原始输入）
    pub url: String,
    /// 是否直接命中缓存
    pub cached: bool,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<PreloadError>,
}

impl PreloadOutcome {
    fn loaded(url: String) -> Self {
        Self {
            success: true,
            url,
            cached: false,
            error: None,
        }
    }

    fn cached(url: String) -> Self {
        Self {
            success: true,
            url,
            cached: true,
            error: None,
        }
    }

    fn failure(url: String, error: PreloadError) -> Self {
        Self {
            success: false,
            url,
            cached: false,
            error: Some(error),
        }
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<PreloadError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// 单个 URL 的加载状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Unknown,
    Loading,
    Loaded,
    Failed,
}

/// 缓存统计信息（快照）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub loaded: usize,
    pub failed: usize,
    pub total: usize,
    pub loading: usize,
}

type SharedLoad = Shared<BoxFuture<'static, PreloadOutcome>>;

/// 正在进行的加载
struct InFlightLoad {
    /// 区分 clear() 前后对同一 URL 的注册
    id: u64,
    load: SharedLoad,
}

enum Slot {
    Cached,
    Pending(SharedLoad),
}

struct CacheInner<L> {
    loader: L,
    normalizer: UrlNormalizer,
    entries: Mutex<EntryStore>,
    in_flight: Mutex<HashMap<String, InFlightLoad>>,
    next_load_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 图片预加载缓存
///
/// 克隆开销很小，所有克隆共享同一份状态。由宿主应用创建并注入，
/// 测试可以各自创建独立实例。
pub struct ImageCache<L: ImageLoader> {
    inner: Arc<CacheInner<L>>,
}

impl<L: ImageLoader> Clone for ImageCache<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: ImageLoader> ImageCache<L> {
    /// 创建新的预加载缓存
    ///
    /// # 参数
    /// - `loader`: 图片加载原语
    /// - `base_origin`: 相对路径的基础地址
    /// - `max_size`: 条目上限（最小为 1）
    pub fn new(loader: L, base_origin: impl Into<String>, max_size: usize) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                loader,
                normalizer: UrlNormalizer::new(base_origin),
                entries: Mutex::new(EntryStore::new(max_size)),
                in_flight: Mutex::new(HashMap::new()),
                next_load_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config(loader: L, config: &PreloadConfig) -> Self {
        Self::new(loader, config.base_origin.clone(), config.max_size)
    }

    pub fn normalize(&self, url: &str) -> Option<String> {
        self.inner.normalizer.normalize(url)
    }

    /// 预加载单个 URL
    ///
    /// # 行为
    /// - URL 为空时立即返回失败，不分配任何状态
    /// - 已加载时返回 `cached = true`
    /// - 同一 URL 已在加载中时等待同一次加载的结果
    /// - 否则启动新的加载（后台任务，调用方放弃等待也会运行到结束）
    ///
    /// 失败条目不会短路，每次调用都会重新尝试。
    pub async fn preload(&self, url: &str, options: &PreloadOptions) -> PreloadOutcome {
        let Some(key) = self.inner.normalizer.normalize(url) else {
            return PreloadOutcome::failure(url.to_string(), PreloadError::EmptyUrl);
        };

        match self.join_or_start(key.clone(), options) {
            Slot::Cached => {
                debug!("命中缓存: {}", key);
                PreloadOutcome::cached(key)
            }
            Slot::Pending(load) => load.await,
        }
    }

    /// 查找已加载条目或正在进行的加载，都不存在时启动新加载
    fn join_or_start(&self, key: String, options: &PreloadOptions) -> Slot {
        let mut in_flight = lock(&self.inner.in_flight);

        if let Some(pending) = in_flight.get(&key) {
            debug!("加入正在进行的加载: {}", key);
            return Slot::Pending(pending.load.clone());
        }

        // 加载任务先写入条目再注销，因此未注册时条目状态已是最终状态
        if self.inner.is_loaded(&key) {
            return Slot::Cached;
        }

        let id = self.inner.next_load_id.fetch_add(1, Ordering::Relaxed);
        let load = self.spawn_load(key.clone(), id, options.clone());
        in_flight.insert(
            key,
            InFlightLoad {
                id,
                load: load.clone(),
            },
        );

        Slot::Pending(load)
    }

    fn spawn_load(&self, key: String, id: u64, options: PreloadOptions) -> SharedLoad {
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let outcome = inner.run_load(&task_key, &options).await;
            inner.finish_load(&task_key, id);
            outcome
        });

        let inner = Arc::clone(&self.inner);
        handle
            .map(move |joined| {
                joined.unwrap_or_else(|e| {
                    error!("预加载任务执行失败: {} - {:?}", key, e);
                    inner.finish_load(&key, id);
                    PreloadOutcome::failure(
                        key.clone(),
                        PreloadError::Load(LoadError::Task(e.to_string())),
                    )
                })
            })
            .boxed()
            .shared()
    }

    /// 批量预加载（并发受限）
    ///
    /// 启动 `min(concurrency, urls.len())` 个工作者，依次从共享队列取出 URL
    /// 调用 [`preload`](Self::preload)。
    ///
    /// 结果顺序取决于完成顺序，不保证与输入顺序一致。
    pub async fn preload_batch<I, S>(&self, urls: I, options: &BatchOptions) -> Vec<PreloadOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue: VecDeque<String> = urls.into_iter().map(Into::into).collect();
        if queue.is_empty() {
            return Vec::new();
        }

        let total = queue.len();
        let workers = options.concurrency.max(1).min(total);
        info!("开始批量预加载，共 {} 个 URL，并发数 {}", total, workers);

        let queue = Mutex::new(queue);
        let results = Mutex::new(Vec::with_capacity(total));

        join_all((0..workers).map(|_| self.run_worker(&queue, &results, &options.load))).await;

        let results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        info!(
            "批量预加载完成，成功: {}, 失败: {}",
            results.iter().filter(|r| r.success).count(),
            results.iter().filter(|r| !r.success).count()
        );

        results
    }

    async fn run_worker(
        &self,
        queue: &Mutex<VecDeque<String>>,
        results: &Mutex<Vec<PreloadOutcome>>,
        options: &PreloadOptions,
    ) {
        loop {
            let next = lock(queue).pop_front();
            let Some(url) = next else {
                break;
            };

            let outcome = self.preload(&url, options).await;
            lock(results).push(outcome);
        }
    }

    /// 为展示预加载照片：优先中等尺寸缩略图，回退到原图，两者都没有的记录跳过
    pub async fn preload_for_display(
        &self,
        photos: &[PhotoRecord],
        options: &BatchOptions,
    ) -> Vec<PreloadOutcome> {
        let urls: Vec<String> = photos
            .iter()
            .filter_map(PhotoRecord::display_url)
            .map(str::to_string)
            .collect();

        debug!("展示预加载: {} 张照片, {} 个地址", photos.len(), urls.len());
        self.preload_batch(urls, options).await
    }

    pub fn is_loaded(&self, url: &str) -> bool {
        self.normalize(url)
            .map(|key| self.inner.is_loaded(&key))
            .unwrap_or(false)
    }

    /// 获取已加载的图片，未知或失败时返回 `None`
    pub fn get_cached_element(&self, url: &str) -> Option<Arc<DecodedImage>> {
        let key = self.normalize(url)?;
        let entries = lock(&self.inner.entries);
        entries
            .get(&key)
            .filter(|entry| entry.status == EntryStatus::Loaded)
            .and_then(|entry| entry.element.clone())
    }

    /// 查询 URL 的加载状态（会读取失败条目）
    pub fn status(&self, url: &str) -> LoadStatus {
        let Some(key) = self.normalize(url) else {
            return LoadStatus::Unknown;
        };

        if lock(&self.inner.in_flight).contains_key(&key) {
            return LoadStatus::Loading;
        }

        match lock(&self.inner.entries).get(&key).map(|entry| entry.status) {
            Some(EntryStatus::Loaded) => LoadStatus::Loaded,
            Some(EntryStatus::Failed) => LoadStatus::Failed,
            None => LoadStatus::Unknown,
        }
    }

    /// 清空所有条目和加载注册
    ///
    /// 已启动的加载会继续运行，等待者仍会拿到结果，其写入落在清空后的存储中。
    pub fn clear(&self) {
        lock(&self.inner.entries).clear();
        lock(&self.inner.in_flight).clear();
        info!("预加载缓存已清空");
    }

    pub fn get_stats(&self) -> CacheStats {
        let (loaded, failed, total) = {
            let entries = lock(&self.inner.entries);
            (
                entries.count(EntryStatus::Loaded),
                entries.count(EntryStatus::Failed),
                entries.len(),
            )
        };

        CacheStats {
            loaded,
            failed,
            total,
            loading: lock(&self.inner.in_flight).len(),
        }
    }
}

impl<L: ImageLoader> CacheInner<L> {
    fn is_loaded(&self, key: &str) -> bool {
        lock(&self.entries)
            .get(key)
            .map(|entry| entry.status == EntryStatus::Loaded)
            .unwrap_or(false)
    }

    /// 重试循环：最多尝试 retries + 1 次，第 k 次重试前等待 retry_delay * k
    async fn run_load(&self, key: &str, options: &PreloadOptions) -> PreloadOutcome {
        let max_attempts = u64::from(options.retries) + 1;
        debug!("开始预加载: {} (优先级: {:?})", key, options.priority);

        let mut attempt = 0;
        let error = loop {
            match self.load_once(key, options.timeout()).await {
                Ok(image) => {
                    self.store(key, CacheEntry::loaded(Arc::new(image), Instant::now()));
                    info!(
                        "图片预加载成功: {} (尝试 {}/{})",
                        key,
                        attempt + 1,
                        max_attempts
                    );
                    return PreloadOutcome::loaded(key.to_string());
                }
                Err(e) => {
                    warn!(
                        "图片预加载失败 (尝试 {}/{}): {} - 错误: {}",
                        attempt + 1,
                        max_attempts,
                        key,
                        e
                    );

                    if attempt >= options.retries {
                        break e;
                    }

                    sleep(options.backoff(attempt)).await;
                    attempt += 1;
                }
            }
        };

        self.store(key, CacheEntry::failed(Instant::now()));
        error!(
            "图片预加载失败，已尝试 {} 次: {} - 错误: {}",
            max_attempts, key, error
        );

        PreloadOutcome::failure(key.to_string(), error)
    }

    /// 单次加载（带超时），并校验解码尺寸
    async fn load_once(&self, key: &str, limit: Duration) -> Result<DecodedImage, PreloadError> {
        let image = match timeout(limit, self.loader.load(key)).await {
            Ok(result) => result?,
            Err(_) => return Err(PreloadError::Timeout(limit)),
        };

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PreloadError::BrokenImage { width, height });
        }

        Ok(image)
    }

    fn store(&self, key: &str, entry: CacheEntry) {
        if let Some(evicted) = lock(&self.entries).insert(key.to_string(), entry) {
            debug!("缓存已满，淘汰最早的条目: {}", evicted);
        }
    }

    /// 注销加载，只移除同一次加载的注册
    fn finish_load(&self, key: &str, id: u64) {
        let mut in_flight = lock(&self.in_flight);
        if in_flight.get(key).map(|pending| pending.id) == Some(id) {
            in_flight.remove(key);
        }
    }
}
