// 缓存条目存储 - 按插入顺序淘汰的有界映射
//
// 每个规范化 URL 至多一个条目。容量满时插入新的 Loaded 条目会先淘汰最早插入的键；
// 记录 Failed 条目从不淘汰已有图片。覆盖已有键不改变其插入位置。

use crate::services::preload::loader::DecodedImage;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::time::Instant;

/// 条目状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Loaded,
    Failed,
}

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: EntryStatus,
    /// 仅当 status = Loaded 时存在
    pub element: Option<Arc<DecodedImage>>,
    /// 插入时间（单调时钟）
    pub timestamp: Instant,
}

impl CacheEntry {
    pub fn loaded(element: Arc<DecodedImage>, timestamp: Instant) -> Self {
        Self {
            status: EntryStatus::Loaded,
            element: Some(element),
            timestamp,
        }
    }

    pub fn failed(timestamp: Instant) -> Self {
        Self {
            status: EntryStatus::Failed,
            element: None,
            timestamp,
        }
    }
}

/// 有界 FIFO 条目存储
#[derive(Debug)]
pub struct EntryStore {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
    max_size: usize,
}

impl EntryStore {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_size: max_size.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// 插入或覆盖条目，返回被淘汰的键
    ///
    /// 只有新键的 Loaded 条目会触发淘汰，因此 Failed 条目可以让长度暂时超过上限
    pub fn insert(&mut self, key: String, entry: CacheEntry) -> Option<String> {
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = entry;
            return None;
        }

        let at_capacity = self.entries.len() >= self.max_size;
        let evicted = if entry.status == EntryStatus::Loaded && at_capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.order.push_back(key.clone());
        self.entries.insert(key, entry);
        evicted
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let oldest = self.order.pop_front()?;
        self.entries.remove(&oldest);
        Some(oldest)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, status: EntryStatus) -> usize {
        self.entries.values().filter(|e| e.status == status).count()
    }

    /// 按插入顺序返回键
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}
