use serde::{Deserialize, Serialize};

/// 照片记录 - 预加载只读取这两个地址字段
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhotoRecord {
    /// 中等尺寸缩略图地址
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_medium_url: Option<String>,

    /// 原图地址
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PhotoRecord {
    /// 展示用地址：优先中等尺寸缩略图，回退到原图
    pub fn display_url(&self) -> Option<&str> {
        non_empty(&self.thumbnail_medium_url).or_else(|| non_empty(&self.url))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_url_prefers_medium() {
        let photo = PhotoRecord {
            thumbnail_medium_url: Some("/thumbs/m/1.jpg".to_string()),
            url: Some("/photos/1.jpg".to_string()),
        };
        assert_eq!(photo.display_url(), Some("/thumbs/m/1.jpg"));
    }

    #[test]
    fn test_display_url_falls_back() {
        let photo = PhotoRecord {
            thumbnail_medium_url: Some(String::new()),
            url: Some("/photos/1.jpg".to_string()),
        };
        assert_eq!(photo.display_url(), Some("/photos/1.jpg"));

        assert_eq!(PhotoRecord::default().display_url(), None);
    }

    #[test]
    fn test_ignores_unknown_fields() {
        let photo: PhotoRecord = serde_json::from_str(
            r#"{"id": 7, "url": "/photos/7.jpg", "title": "harbour"}"#,
        )
        .unwrap();
        assert_eq!(photo.display_url(), Some("/photos/7.jpg"));
    }
}
