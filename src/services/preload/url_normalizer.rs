// URL 规范化 - 缓存键的来源
//
// 将相对路径补全为绝对 URL，其余输入原样返回。
// 两个规范化结果相同的原始字符串共享同一个缓存条目。

use regex::Regex;
use std::sync::OnceLock;

/// URL 规范化器
#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    base_origin: String,
}

impl UrlNormalizer {
    pub fn new(base_origin: impl Into<String>) -> Self {
        Self {
            base_origin: base_origin.into(),
        }
    }

    /// 规范化 URL
    ///
    /// # 规则
    /// - 空字符串（或只有空白）返回 `None`
    /// - 已带网络协议（`scheme://`）原样返回
    /// - 以 `/` 开头时拼接基础地址
    /// - 其他情况原样返回（如 `data:` URI）
    ///
    /// # 示例
    /// ```
    /// use gallery_preload_backend::services::preload::UrlNormalizer;
    ///
    /// let normalizer = UrlNormalizer::new("https://gallery.example.com");
    /// assert_eq!(
    ///     normalizer.normalize("/api/photos/1.jpg").as_deref(),
    ///     Some("https://gallery.example.com/api/photos/1.jpg")
    /// );
    /// assert_eq!(normalizer.normalize(""), None);
    /// ```
    pub fn normalize(&self, raw: &str) -> Option<String> {
        if raw.trim().is_empty() {
            return None;
        }

        if Self::has_network_scheme(raw) {
            return Some(raw.to_string());
        }

        if raw.starts_with('/') {
            return Some(format!("{}{}", self.base_origin, raw));
        }

        Some(raw.to_string())
    }

    fn has_network_scheme(raw: &str) -> bool {
        static SCHEME_REGEX: OnceLock<Regex> = OnceLock::new();

        let regex = SCHEME_REGEX.get_or_init(|| {
            Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("URL 协议正则表达式编译失败")
        });

        regex.is_match(raw)
    }
}
