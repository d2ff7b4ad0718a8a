//! `history.json` 的记录格式
//!
//! ```json
//! {
//!   "timestamp": 1718000000000,
//!   "type": "text",
//!   "preview": "...",
//!   "content": "...",
//!   "process": "chrome.exe",
//!   "app_name": "Chrome",
//!   "is_sensitive": true,
//!   "_content_encrypted": true,
//!   "_preview_encrypted": true
//! }
//! ```
//!
//! 图片条目的 `preview` / `content` 是 PNG 的 Base64，不做混淆；
//! 无法还原的字段写为 `null`。

use std::io::Cursor;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::clipboard::{ContentKind, Thumbnail};
use crate::error::AppError;
use crate::obfuscation::ObfuscationCodec;

use super::item::{HistoryItem, ItemData, display_name};

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(super) struct HistoryRecord {
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub process: String,
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub is_sensitive: bool,
    #[serde(rename = "_content_encrypted", default, skip_serializing_if = "is_false")]
    pub content_encrypted: bool,
    #[serde(rename = "_preview_encrypted", default, skip_serializing_if = "is_false")]
    pub preview_encrypted: bool,
}

impl HistoryRecord {
    /// 落盘格式：敏感文本字段经过混淆
    pub fn seal(item: &HistoryItem, codec: &ObfuscationCodec) -> Result<Self, AppError> {
        Self::build(item, Some(codec))
    }

    /// 导出格式：所有字段保持明文
    pub fn plain(item: &HistoryItem) -> Result<Self, AppError> {
        Self::build(item, None)
    }

    fn build(item: &HistoryItem, codec: Option<&ObfuscationCodec>) -> Result<Self, AppError> {
        let codec = codec.filter(|_| item.is_sensitive && item.kind == ContentKind::Text);

        let encode = |data: &ItemData| -> Result<(Option<String>, bool), AppError> {
            match (data, codec) {
                (ItemData::Text(text), Some(codec)) => Ok((Some(codec.obfuscate(text)), true)),
                (ItemData::Text(text), None) => Ok((Some(text.clone()), false)),
                (ItemData::Image(thumb), _) => Ok((Some(encode_png(thumb)?), false)),
                (ItemData::Unavailable, _) => Ok((None, false)),
            }
        };

        let (preview, preview_encrypted) = encode(&item.preview)?;
        let (content, content_encrypted) = encode(&item.content)?;

        Ok(Self {
            timestamp: item.timestamp,
            kind: item.kind,
            preview,
            content,
            process: item.source_process.clone(),
            app_name: item.display_name.clone(),
            is_sensitive: item.is_sensitive,
            content_encrypted,
            preview_encrypted,
        })
    }

    /// 还原为内存条目；单个字段失败只影响该字段
    pub fn open(self, codec: &ObfuscationCodec) -> HistoryItem {
        let kind = self.kind;
        let timestamp = self.timestamp;
        let decode = |raw: Option<String>, encrypted: bool, field: &str| -> ItemData {
            let Some(raw) = raw else {
                return ItemData::Unavailable;
            };
            match kind {
                ContentKind::Text if encrypted => match codec.deobfuscate(&raw) {
                    Ok(text) => ItemData::Text(text),
                    Err(e) => {
                        log::warn!("⚠️ 历史记录 {} 的 {} 字段无法还原: {}", timestamp, field, e);
                        ItemData::Unavailable
                    }
                },
                ContentKind::Text => ItemData::Text(raw),
                ContentKind::Image => match decode_png(&raw) {
                    Ok(thumb) => ItemData::Image(Arc::new(thumb)),
                    Err(e) => {
                        log::warn!("⚠️ 历史记录 {} 的 {} 图片无法解码: {}", timestamp, field, e);
                        ItemData::Unavailable
                    }
                },
            }
        };

        let preview = decode(self.preview, self.preview_encrypted, "preview");
        let content = decode(self.content, self.content_encrypted, "content");
        let display_name = if self.app_name.is_empty() {
            display_name(&self.process)
        } else {
            self.app_name
        };

        HistoryItem {
            timestamp,
            kind,
            preview,
            content,
            source_process: self.process,
            display_name,
            is_sensitive: self.is_sensitive,
            // 敏感文本落盘时总是混淆，与字段能否还原无关
            content_obfuscated: self.is_sensitive && kind == ContentKind::Text,
        }
    }
}

fn encode_png(thumb: &Thumbnail) -> Result<String, AppError> {
    let buffer = RgbaImage::from_raw(thumb.width, thumb.height, thumb.rgba.clone())
        .ok_or_else(|| AppError::Storage("缩略图像素数据不完整".to_string()))?;
    let mut bytes = Cursor::new(Vec::new());
    buffer
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|e| AppError::Storage(format!("缩略图 PNG 编码失败: {}", e)))?;
    Ok(general_purpose::STANDARD.encode(bytes.into_inner()))
}

fn decode_png(data: &str) -> Result<Thumbnail, String> {
    let bytes = general_purpose::STANDARD
        .decode(data)
        .map_err(|e| format!("Base64 解码失败: {}", e))?;
    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
        .map_err(|e| format!("PNG 解码失败: {}", e))?
        .to_rgba8();
    Ok(Thumbnail {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}
