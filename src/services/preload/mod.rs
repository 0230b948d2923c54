// 预加载模块 - 图片预加载与内存缓存
//
// 本模块提供照片的预加载功能，包括：
// - URL 规范化（缓存键）
// - 单飞加载与失败重试
// - 并发受限的批量预加载
// - 按插入顺序淘汰的有界缓存

pub mod config;
pub mod error;
pub mod image_cache;
pub mod loader;
pub mod store;
pub mod url_normalizer;

pub use config::{BatchOptions, PreloadConfig, PreloadOptions, Priority};
pub use error::{ConfigError, LoadError, PreloadError};
pub use image_cache::{CacheStats, ImageCache, LoadStatus, PreloadOutcome};
pub use loader::{DecodedImage, HttpImageLoader, ImageLoader};
pub use store::{CacheEntry, EntryStatus, EntryStore};
pub use url_normalizer::UrlNormalizer;
