//! 敏感内容检测模块
//!
//! # 设计思路
//!
//! 粘贴确认弹窗需要知道内容是否“看起来敏感”，以提升提示级别，
//! 并让历史记录对该条目做落盘混淆。本模块只看文本形状，不做任何语义判断，
//! 也从不扫描图片。
//!
//! # 实现思路
//!
//! - 按固定顺序排列的正则：邮箱、电话号码、16 位卡号、身份证号。
//! - 命中第一个即返回；顺序只影响速度，不影响结果。
//! - 通过 `once_cell::sync::Lazy` 在首次调用时编译正则，后续零成本复用。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// 命中的敏感模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitiveKind {
    Email,
    Phone,
    CardNumber,
    NationalId,
}

/// 预编译的敏感模式，按检测顺序排列
///
/// 1. 邮箱地址
/// 2. 电话号码（2~4 位区号，可选 `-` / `.` 分隔）
/// 3. 卡号（4 组 4 位，可选空格 / `-` 分隔）
/// 4. 身份证号（6 位 + 可选 `-` + 7 位）
static SENSITIVE_PATTERNS: Lazy<Vec<(SensitiveKind, Regex)>> = Lazy::new(|| {
    [
        (SensitiveKind::Email, r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b"),
        (SensitiveKind::Phone, r"\b\d{2,4}[-.]?\d{3,4}[-.]?\d{4}\b"),
        (SensitiveKind::CardNumber, r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b"),
        (SensitiveKind::NationalId, r"\b\d{6}-?\d{7}\b"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).unwrap()))
    .collect()
});

/// 返回第一个命中的敏感模式
pub fn detect(text: &str) -> Option<SensitiveKind> {
    SENSITIVE_PATTERNS
        .iter()
        .find(|(_, regex)| regex.is_match(text))
        .map(|(kind, _)| *kind)
}

/// 判断文本是否可能包含敏感信息
///
/// 无命中是合法结果，不是错误。
pub fn is_sensitive(text: &str) -> bool {
    match detect(text) {
        Some(kind) => {
            log::debug!("⚠️ 检测到敏感信息模式: {:?}", kind);
            true
        }
        None => false,
    }
}
