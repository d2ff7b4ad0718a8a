//! 剪贴板快照模块
//!
//! 一次粘贴触发只读取一次剪贴板，读出的内容封装为不可变的
//! `ClipboardSnapshot`，预览在构造时生成一次，之后不再重算。

use std::sync::Arc;

use image::{DynamicImage, RgbaImage};
use serde::Serialize;

use crate::error::AppError;

/// 文本预览的最大字符数
pub const TEXT_PREVIEW_CHARS: usize = 200;
/// 缩略图边长上限（像素）
pub const THUMBNAIL_EDGE: u32 = 150;

/// 内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
}

/// 剪贴板中的原始 RGBA 图像
#[derive(Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for RawImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// 从剪贴板读出 / 准备写回剪贴板的内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardContent {
    Text(String),
    Image(RawImage),
}

impl ClipboardContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            ClipboardContent::Text(_) => ContentKind::Text,
            ClipboardContent::Image(_) => ContentKind::Image,
        }
    }
}

/// 缩略图（RGBA 像素）
#[derive(Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Thumbnail({}x{})", self.width, self.height)
    }
}

impl Thumbnail {
    /// 按比例缩放到 `THUMBNAIL_EDGE` 以内；本身更小的图片保持原尺寸
    pub fn from_raw(raw: &RawImage) -> Result<Self, AppError> {
        let width = u32::try_from(raw.width)
            .map_err(|_| AppError::Capture(format!("图片宽度超出范围: {}", raw.width)))?;
        let height = u32::try_from(raw.height)
            .map_err(|_| AppError::Capture(format!("图片高度超出范围: {}", raw.height)))?;
        let buffer = RgbaImage::from_raw(width, height, raw.rgba.clone())
            .ok_or_else(|| AppError::Capture("创建图像缓冲区失败".to_string()))?;

        let image = DynamicImage::ImageRgba8(buffer);
        let scaled = if width > THUMBNAIL_EDGE || height > THUMBNAIL_EDGE {
            image.thumbnail(THUMBNAIL_EDGE, THUMBNAIL_EDGE)
        } else {
            image
        };
        let rgba = scaled.to_rgba8();
        Ok(Self {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }
}

/// 快照预览
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    Text(String),
    Image(Arc<Thumbnail>),
}

/// 一次粘贴触发时的剪贴板快照
#[derive(Debug, Clone)]
pub struct ClipboardSnapshot {
    content: ClipboardContent,
    preview: Preview,
    captured_at: i64,
}

impl ClipboardSnapshot {
    /// 由剪贴板内容构造快照并生成预览
    pub fn capture(content: ClipboardContent) -> Result<Self, AppError> {
        let preview = match &content {
            ClipboardContent::Text(text) => Preview::Text(text_preview(text)),
            ClipboardContent::Image(raw) => Preview::Image(Arc::new(Thumbnail::from_raw(raw)?)),
        };
        Ok(Self {
            content,
            preview,
            captured_at: chrono::Utc::now().timestamp_millis(),
        })
    }

    pub fn kind(&self) -> ContentKind {
        self.content.kind()
    }

    pub fn content(&self) -> &ClipboardContent {
        &self.content
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    /// 采集时间（Unix 毫秒）
    pub fn captured_at(&self) -> i64 {
        self.captured_at
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            ClipboardContent::Text(text) => Some(text),
            ClipboardContent::Image(_) => None,
        }
    }
}

/// 截取前 `TEXT_PREVIEW_CHARS` 个字符，被截断时追加 `...`
pub fn text_preview(text: &str) -> String {
    let mut chars = text.char_indices();
    match chars.nth(TEXT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_image(width: usize, height: usize) -> RawImage {
        RawImage {
            width,
            height,
            rgba: vec![200; width * height * 4],
        }
    }

    #[test]
    fn short_text_preview_is_unchanged() {
        assert_eq!(text_preview("abc"), "abc");
    }

    #[test]
    fn long_text_preview_is_truncated_on_char_boundary() {
        let text = "가".repeat(250);
        let preview = text_preview(&text);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), TEXT_PREVIEW_CHARS + 3);
    }

    #[test]
    fn exact_length_text_is_not_truncated() {
        let text = "a".repeat(TEXT_PREVIEW_CHARS);
        assert_eq!(text_preview(&text), text);
    }

    #[test]
    fn large_image_thumbnail_fits_edge() {
        let thumb = Thumbnail::from_raw(&solid_image(600, 300)).unwrap();
        assert_eq!(thumb.width, 150);
        assert_eq!(thumb.height, 75);
        assert_eq!(thumb.rgba.len(), 150 * 75 * 4);
    }

    #[test]
    fn small_image_keeps_size() {
        let thumb = Thumbnail::from_raw(&solid_image(40, 20)).unwrap();
        assert_eq!((thumb.width, thumb.height), (40, 20));
    }

    #[test]
    fn mismatched_buffer_is_capture_error() {
        let raw = RawImage { width: 10, height: 10, rgba: vec![0; 12] };
        assert!(matches!(Thumbnail::from_raw(&raw), Err(AppError::Capture(_))));
    }

    #[test]
    fn snapshot_kind_follows_content() {
        let snapshot = ClipboardSnapshot::capture(ClipboardContent::Text("hi".into())).unwrap();
        assert_eq!(snapshot.kind(), ContentKind::Text);
        assert_eq!(snapshot.text(), Some("hi"));
        assert_eq!(snapshot.preview(), &Preview::Text("hi".into()));
    }
}
