//! 全局粘贴快捷键钩子
//!
//! # 设计思路
//!
//! 钩子只负责“看见”粘贴快捷键并询问控制器怎么处理这一次触发：
//! 放行给目标窗口、吞掉、或者吞掉并认领后续处理。
//! 认领之后的采集与判定绝不在钩子回调里执行，而是交给独立的工作线程，
//! 系统对低级键盘钩子有超时限制，回调必须立即返回。
//!
//! # 实现思路
//!
//! - `TriggerSink`：控制器实现，`filter_trigger` 必须廉价且不阻塞。
//! - `KeyHook`：平台钩子，安装时接收一个 sink，卸载后不再回调。
//! - Windows 使用 `WH_KEYBOARD_LL`，其他平台安装直接返回错误。

#[cfg(target_os = "windows")]
mod win32;

use std::sync::Arc;

use crate::error::AppError;

#[cfg(target_os = "windows")]
pub use win32::LowLevelKeyboardHook as SystemHook;

/// 钩子回调对一次触发的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// 交给目标窗口（监控关闭，或识别为自身回放的按键）
    PassThrough,
    /// 吞掉并丢弃（已有请求在处理中）
    Suppress,
    /// 吞掉，随后必须调用一次 `process_trigger`
    Claimed,
}

impl TriggerDecision {
    pub fn suppresses(self) -> bool {
        !matches!(self, TriggerDecision::PassThrough)
    }
}

/// 接收粘贴触发的一方
pub trait TriggerSink: Send + Sync {
    /// 在钩子回调内同步调用
    fn filter_trigger(&self) -> TriggerDecision;

    /// `filter_trigger` 返回 `Claimed` 后，在钩子回调之外调用一次
    fn process_trigger(&self);
}

/// 平台键盘钩子
pub trait KeyHook: Send + Sync {
    /// 安装钩子；已安装时为空操作
    fn install(&self, sink: Arc<dyn TriggerSink>) -> Result<(), AppError>;

    /// 卸载钩子；未安装时为空操作
    fn uninstall(&self);
}

/// 不支持全局钩子的平台
#[cfg(not(target_os = "windows"))]
#[derive(Debug, Default)]
pub struct SystemHook;

#[cfg(not(target_os = "windows"))]
impl KeyHook for SystemHook {
    fn install(&self, _sink: Arc<dyn TriggerSink>) -> Result<(), AppError> {
        Err(AppError::Hook("全局键盘钩子仅在 Windows 上支持".to_string()))
    }

    fn uninstall(&self) {}
}
