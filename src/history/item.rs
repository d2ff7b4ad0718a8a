use std::sync::Arc;

use crate::clipboard::{ClipboardContent, ContentKind, Preview, Thumbnail};
use crate::error::AppError;
use crate::policy::PasteRequest;

/// 历史条目中的一个数据字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemData {
    Text(String),
    Image(Arc<Thumbnail>),
    /// 加载时无法还原（解码失败或数据损坏）
    Unavailable,
}

impl ItemData {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ItemData::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ItemData::Unavailable)
    }
}

/// 一条已放行的粘贴记录
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryItem {
    /// 放行时间（Unix 毫秒）
    pub timestamp: i64,
    pub kind: ContentKind,
    pub preview: ItemData,
    /// 完整文本；图片只保存缩略图
    pub content: ItemData,
    pub source_process: String,
    pub display_name: String,
    pub is_sensitive: bool,
    /// 落盘时 `content` 是否经过混淆
    pub content_obfuscated: bool,
}

impl HistoryItem {
    pub fn from_request(request: &PasteRequest) -> Result<Self, AppError> {
        let snapshot = &request.snapshot;
        let (preview, content) = match (snapshot.preview(), snapshot.content()) {
            (Preview::Text(preview), ClipboardContent::Text(text)) => {
                (ItemData::Text(preview.clone()), ItemData::Text(text.clone()))
            }
            (Preview::Image(thumb), ClipboardContent::Image(_)) => {
                (ItemData::Image(Arc::clone(thumb)), ItemData::Image(Arc::clone(thumb)))
            }
            _ => return Err(AppError::Capture("快照预览与内容类型不一致".to_string())),
        };

        let kind = snapshot.kind();
        Ok(Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            kind,
            preview,
            content,
            source_process: request.source_process().to_string(),
            display_name: display_name(request.source_process()),
            is_sensitive: request.is_sensitive,
            content_obfuscated: request.is_sensitive && kind == ContentKind::Text,
        })
    }
}

/// 由进程名推导显示名：去掉 `.exe` 后缀并按单词首字母大写
///
/// `notepad.exe` → `Notepad`，`visual studio code.exe` → `Visual Studio Code`
pub fn display_name(process: &str) -> String {
    let trimmed = process.trim();
    let stem = match trimmed.len().checked_sub(4) {
        Some(cut) if trimmed.is_char_boundary(cut) && trimmed[cut..].eq_ignore_ascii_case(".exe") => {
            &trimmed[..cut]
        }
        _ => trimmed,
    };

    let mut out = String::with_capacity(stem.len());
    let mut prev_alpha = false;
    for ch in stem.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}
