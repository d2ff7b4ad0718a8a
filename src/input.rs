//! 输入模拟模块（分层门面）
//!
//! - `services`：基于 `enigo` 的粘贴按键注入
//! - `platform`：平台相关实现（Win32 前台进程查询与焦点恢复 / 非 Windows 占位）
//!
//! 控制器只依赖本模块导出的两个 trait，测试中以内存实现替换。

#[path = "input/platform.rs"]
mod platform;
#[path = "input/services.rs"]
mod services;

use serde::Serialize;

use crate::error::AppError;

pub use services::EnigoInjector;

/// 粘贴目标：触发时位于前台的窗口及其所属进程
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForegroundTarget {
    /// 进程可执行文件名（小写，例如 `notepad.exe`）
    pub process_name: String,
    /// 平台窗口句柄，无法获取时为 `None`
    #[serde(skip)]
    pub window: Option<isize>,
}

impl ForegroundTarget {
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            window: None,
        }
    }
}

/// 前台窗口查询与焦点恢复
pub trait ForegroundProbe: Send + Sync {
    fn foreground(&self) -> Result<ForegroundTarget, AppError>;

    fn restore_focus(&self, target: &ForegroundTarget) -> Result<(), AppError>;
}

/// 粘贴按键注入
pub trait KeystrokeInjector: Send + Sync {
    /// 发送一次平台粘贴组合键（Windows/Linux 为 Ctrl+V，macOS 为 Cmd+V）
    fn send_paste(&self) -> Result<(), AppError>;
}

/// 系统前台窗口探测器
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemForeground;

impl ForegroundProbe for SystemForeground {
    fn foreground(&self) -> Result<ForegroundTarget, AppError> {
        platform::foreground_target()
    }

    fn restore_focus(&self, target: &ForegroundTarget) -> Result<(), AppError> {
        match target.window {
            Some(window) => platform::restore_focus(window),
            None => Ok(()),
        }
    }
}

/// 从完整路径中提取小写的可执行文件名
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn executable_name(path: &str) -> String {
    path.rsplit(['\\', '/'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("unknown")
        .to_lowercase()
}
