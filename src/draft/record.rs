use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
}

/// 视频元数据
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: String,
    pub language: String,
    pub allow_comments: bool,
    pub add_to_playlist: bool,
    pub visibility: Visibility,
    /// 定时发布时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// 选中的自动缩略图序号
    pub thumbnail_index: u32,
    /// 裁剪起点（秒），默认 0，清除时写成 null
    pub trim_start: Option<f64>,
    /// 裁剪终点（秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_end: Option<f64>,
}

impl Default for VideoMetadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            tags: Vec::new(),
            category: String::new(),
            language: "vi".to_string(),
            allow_comments: true,
            add_to_playlist: false,
            visibility: Visibility::Public,
            scheduled_at: None,
            thumbnail_index: 0,
            trim_start: Some(0.0),
            trim_end: None,
        }
    }
}

impl VideoMetadata {
    /// Untitled metadata is not worth autosaving.
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

/// 保存时间的字段名，与记录字段同级
pub const SAVED_AT_FIELD: &str = "savedAt";

/// 已保存的草稿：记录本身加上保存时间
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Draft<T> {
    #[serde(flatten)]
    pub record: T,
    #[serde(rename = "savedAt")]
    pub saved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_is_flat_camel_case() {
        let draft = Draft {
            record: VideoMetadata {
                title: "Trip".to_string(),
                allow_comments: false,
                ..Default::default()
            },
            saved_at: "2026-10-18T08:00:00Z".parse().unwrap(),
        };

        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["title"], "Trip");
        assert_eq!(value["allowComments"], false);
        assert_eq!(value["visibility"], "public");
        assert_eq!(value["savedAt"], "2026-10-18T08:00:00Z");
        assert!(value.get("scheduledAt").is_none());
        assert_eq!(value["trimStart"], 0.0);
    }

    #[test]
    fn test_cleared_trim_start_stays_cleared() {
        let draft = Draft {
            record: VideoMetadata { trim_start: None, ..Default::default() },
            saved_at: "2026-10-18T08:00:00Z".parse().unwrap(),
        };

        let json = serde_json::to_string(&draft).unwrap();
        assert!(json.contains(r#""trimStart":null"#));

        let loaded: Draft<VideoMetadata> = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.record.trim_start, None);
        assert_eq!(loaded, draft);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let draft: Draft<VideoMetadata> =
            serde_json::from_str(r#"{"title":"Only title","savedAt":"2026-10-18T08:00:00Z"}"#).unwrap();

        assert_eq!(draft.record.title, "Only title");
        assert_eq!(draft.record.language, "vi");
        assert!(draft.record.allow_comments);
    }

    #[test]
    fn test_has_title() {
        assert!(!VideoMetadata::default().has_title());
        let metadata = VideoMetadata { title: "  ".to_string(), ..Default::default() };
        assert!(!metadata.has_title());
    }
}
