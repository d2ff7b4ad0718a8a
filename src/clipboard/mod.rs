//! 剪贴板模块
//!
//! # 设计思路
//!
//! 统一管理拦截链路中与剪贴板有关的能力：
//! - **读取**：粘贴触发时抓取一次剪贴板，图片优先，没有图片时才读取文本
//! - **写回**：放行时把批准的内容重新写入剪贴板，再由回放线程发送粘贴按键
//! - **快照**：`snapshot` 子模块定义不可变快照与预览
//! - **敏感检测**：`sensitivity` 子模块识别邮箱、电话、卡号、身份证号
//!
//! # 实现思路
//!
//! - `ClipboardAccess` trait 是控制器与系统剪贴板之间的接缝，测试中替换为内存实现。
//! - `SystemClipboard` 基于 `arboard`，每次操作新建句柄，避免跨线程持有。
//! - 写入失败（剪贴板被其他进程占用）按指数退避做有限重试。

pub mod sensitivity;
pub mod snapshot;

use std::borrow::Cow;
use std::thread;
use std::time::Duration;

use crate::error::AppError;

pub use snapshot::{ClipboardContent, ClipboardSnapshot, ContentKind, Preview, RawImage, Thumbnail};

const WRITE_RETRIES: u32 = 3;
const WRITE_RETRY_BASE_DELAY_MS: u64 = 50;
const WRITE_RETRY_MAX_DELAY_MS: u64 = 200;

/// 系统剪贴板访问接口
pub trait ClipboardAccess: Send + Sync {
    /// 读取当前内容；剪贴板为空时返回 `Ok(None)`
    fn read(&self) -> Result<Option<ClipboardContent>, AppError>;

    /// 用给定内容替换剪贴板
    fn write(&self, content: &ClipboardContent) -> Result<(), AppError>;
}

/// 基于 `arboard` 的系统剪贴板
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    fn open() -> Result<arboard::Clipboard, AppError> {
        arboard::Clipboard::new().map_err(|e| AppError::Clipboard(format!("打开剪贴板失败: {}", e)))
    }

    fn write_once(content: &ClipboardContent) -> Result<(), arboard::Error> {
        let mut clipboard = arboard::Clipboard::new()?;
        match content {
            ClipboardContent::Text(text) => clipboard.set_text(text.as_str()),
            ClipboardContent::Image(raw) => clipboard.set_image(arboard::ImageData {
                width: raw.width,
                height: raw.height,
                bytes: Cow::Borrowed(&raw.rgba),
            }),
        }
    }
}

impl ClipboardAccess for SystemClipboard {
    fn read(&self) -> Result<Option<ClipboardContent>, AppError> {
        let mut clipboard = Self::open()?;

        match clipboard.get_image() {
            Ok(image) => {
                return Ok(Some(ClipboardContent::Image(RawImage {
                    width: image.width,
                    height: image.height,
                    rgba: image.bytes.into_owned(),
                })));
            }
            Err(arboard::Error::ContentNotAvailable) => {}
            Err(e) => log::debug!("读取剪贴板图片失败，继续尝试文本: {}", e),
        }

        match clipboard.get_text() {
            Ok(text) if !text.is_empty() => Ok(Some(ClipboardContent::Text(text))),
            Ok(_) | Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(AppError::Capture(format!("读取剪贴板文本失败: {}", e))),
        }
    }

    fn write(&self, content: &ClipboardContent) -> Result<(), AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::write_once(content) {
                Ok(()) => {
                    if attempt > 1 {
                        log::debug!("第 {} 次尝试写入剪贴板成功", attempt);
                    }
                    return Ok(());
                }
                Err(e) if attempt < WRITE_RETRIES => {
                    let delay = compute_retry_delay_ms(attempt);
                    log::warn!("写入剪贴板失败（attempt={}），{}ms 后重试: {}", attempt, delay, e);
                    thread::sleep(Duration::from_millis(delay));
                }
                Err(e) => {
                    return Err(AppError::Clipboard(format!("写入剪贴板失败（已重试 {} 次）: {}", attempt, e)));
                }
            }
        }
    }
}

fn compute_retry_delay_ms(attempt: u32) -> u64 {
    let exp = 1_u64 << attempt.saturating_sub(1).min(6);
    WRITE_RETRY_BASE_DELAY_MS
        .saturating_mul(exp)
        .min(WRITE_RETRY_MAX_DELAY_MS)
}
