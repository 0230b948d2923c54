// 预加载配置数据结构
//
// 定义了预加载缓存的配置，包括：
// - 单次预加载选项（重试、退避、超时、优先级）
// - 批量预加载选项（并发数）
// - 缓存全局配置（基础地址、容量）及其加载方式

use crate::services::preload::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// 预加载优先级
///
/// 仅作为提示随请求记录，不影响调度顺序
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

/// 单个 URL 的预加载选项
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreloadOptions {
    /// 失败后的重试次数（总尝试次数 = retries + 1）
    pub retries: u32,

    /// 重试基础间隔，第 k 次重试前等待 retry_delay_ms * k
    pub retry_delay_ms: u64,

    /// 单次尝试的超时时间
    pub timeout_ms: u64,

    pub priority: Priority,
}

impl Default for PreloadOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay_ms: 500,
            timeout_ms: 15_000,
            priority: Priority::Normal,
        }
    }
}

impl PreloadOptions {
    /// 第 `attempt` 次尝试（从 0 开始）失败后的等待时间
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(u64::from(attempt) + 1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 批量预加载选项
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchOptions {
    /// 同一批次内最多同时进行的预加载数
    pub concurrency: usize,

    #[serde(flatten)]
    pub load: PreloadOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            load: PreloadOptions::default(),
        }
    }
}

/// 预加载缓存配置（可存储在 preload_config.json）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreloadConfig {
    /// 相对路径 URL 的基础地址，如 "https://gallery.example.com"
    pub base_origin: String,

    /// 缓存条目上限，超出时淘汰最早插入的条目
    pub max_size: usize,

    /// 批量预加载的默认并发数
    pub batch_concurrency: usize,

    /// HTTP 加载器同时解码图片的上限
    pub decode_concurrency: usize,

    /// 单张图片响应体的字节上限
    pub max_image_bytes: u64,

    /// 未显式指定时使用的预加载选项
    pub defaults: PreloadOptions,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            base_origin: "http://localhost:3000".to_string(),
            max_size: 200,
            batch_concurrency: 4,
            decode_concurrency: 3,
            max_image_bytes: 20 * 1024 * 1024,
            defaults: PreloadOptions::default(),
        }
    }
}

impl PreloadConfig {
    /// 默认配置文件路径
    const DEFAULT_CONFIG_PATH: &'static str = "preload_config.json";

    /// 从配置文件加载配置，再应用环境变量覆盖
    ///
    /// # 行为
    /// - 配置文件不存在时使用默认配置
    /// - 配置文件损坏时记录警告并使用默认配置
    /// - `PRELOAD_BASE_ORIGIN`、`PRELOAD_MAX_SIZE` 覆盖文件中的值
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = config_path
            .or_else(|| std::env::var("PRELOAD_CONFIG_PATH").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_PATH));

        let mut config = Self::read_file(&config_path).await?;
        config.apply_env()?;
        config.validate()?;

        tracing::info!(
            "预加载配置: base_origin={}, max_size={}",
            config.base_origin,
            config.max_size
        );

        Ok(config)
    }

    async fn read_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            tracing::info!("配置文件不存在，使用默认配置: {:?}", config_path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).await?;
        match serde_json::from_str::<Self>(&content) {
            Ok(config) => {
                tracing::info!("成功加载预加载配置: {:?}", config_path);
                Ok(config)
            }
            Err(e) => {
                tracing::warn!("配置文件损坏，使用默认配置: {}", e);
                Ok(Self::default())
            }
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(origin) = std::env::var("PRELOAD_BASE_ORIGIN") {
            self.base_origin = origin;
        }

        if let Ok(value) = std::env::var("PRELOAD_MAX_SIZE") {
            self.max_size = value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PRELOAD_MAX_SIZE",
                value,
            })?;
        }

        Ok(())
    }

    /// 校验基础地址并去掉末尾的 `/`
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.base_origin)
            .map_err(|e| ConfigError::InvalidOrigin(format!("{}: {}", self.base_origin, e)))?;

        if parsed.cannot_be_a_base() {
            return Err(ConfigError::InvalidOrigin(self.base_origin.clone()));
        }

        self.base_origin = self.base_origin.trim_end_matches('/').to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_options() {
        let options = PreloadOptions::default();
        assert_eq!(options.retries, 3);
        assert_eq!(options.retry_delay_ms, 500);
        assert_eq!(options.timeout(), Duration::from_secs(15));
        assert_eq!(options.priority, Priority::Normal);
    }

    #[test]
    fn test_backoff_is_linear() {
        let options = PreloadOptions {
            retry_delay_ms: 10,
            ..Default::default()
        };
        assert_eq!(options.backoff(0), Duration::from_millis(10));
        assert_eq!(options.backoff(1), Duration::from_millis(20));
        assert_eq!(options.backoff(4), Duration::from_millis(50));
    }

    #[test]
    fn test_partial_options_json() {
        let options: PreloadOptions =
            serde_json::from_str(r#"{"retries": 1, "priority": "high"}"#).unwrap();
        assert_eq!(options.retries, 1);
        assert_eq!(options.retry_delay_ms, 500);
        assert_eq!(options.priority, Priority::High);
    }

    #[test]
    fn test_batch_options_flatten() {
        let options: BatchOptions =
            serde_json::from_str(r#"{"concurrency": 2, "timeout_ms": 50}"#).unwrap();
        assert_eq!(options.concurrency, 2);
        assert_eq!(options.load.timeout_ms, 50);
        assert_eq!(options.load.retries, 3);
    }

    #[test]
    fn test_validate_trims_trailing_slash() {
        let mut config = PreloadConfig {
            base_origin: "https://gallery.example.com/".to_string(),
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.base_origin, "https://gallery.example.com");
    }

    #[test]
    fn test_validate_rejects_garbage_origin() {
        let mut config = PreloadConfig {
            base_origin: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOrigin(_))
        ));
    }

    #[tokio::test]
    async fn test_read_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = PreloadConfig::read_file(&temp_dir.path().join("missing.json"))
            .await
            .unwrap();
        assert_eq!(config, PreloadConfig::default());
    }

    #[tokio::test]
    async fn test_read_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("preload_config.json");
        fs::write(
            &path,
            r#"{"base_origin": "https://photos.example.org", "max_size": 50}"#,
        )
        .await
        .unwrap();

        let config = PreloadConfig::read_file(&path).await.unwrap();
        assert_eq!(config.base_origin, "https://photos.example.org");
        assert_eq!(config.max_size, 50);
        assert_eq!(config.batch_concurrency, 4);
    }

    #[tokio::test]
    async fn test_read_corrupted_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("preload_config.json");
        fs::write(&path, "{ not json").await.unwrap();

        let config = PreloadConfig::read_file(&path).await.unwrap();
        assert_eq!(config, PreloadConfig::default());
    }
}
