//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，拦截链路中的每一类失败都对应一个分支：
//! 采集失败、解码失败、持久化失败、回放失败、钩子安装失败与裁决误用。
//!
//! 控制器只在本地记录这些错误并回到空闲状态，不会让任何一个分支
//! 终止监控循环；持久化与配置相关的错误则原样返回给调用方。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `DecodeError`、`std::io::Error`、`serde_json::Error` 提供 `From` 转换，
//!   调用侧直接使用 `?`。
//! - `ErrorKind` 是去掉负载的分类标签，随 `Error` 事件一起发布给订阅方。

use serde::Serialize;

use crate::obfuscation::DecodeError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 采集失败：剪贴板为空、读取失败或前台窗口查询失败
    #[error("采集失败: {0}")]
    Capture(String),

    /// 剪贴板写入失败
    #[error("剪贴板操作失败: {0}")]
    Clipboard(String),

    /// 混淆字段无法还原
    #[error("{0}")]
    Decode(#[from] DecodeError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 历史或配置文件内容无法解析
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 存储目录不可用
    #[error("存储目录不可用: {0}")]
    Storage(String),

    /// 按键注入或焦点恢复失败
    #[error("回放失败: {0}")]
    Replay(String),

    /// 全局键盘钩子安装失败
    #[error("键盘钩子错误: {0}")]
    Hook(String),

    /// 当前没有等待确认的粘贴请求
    #[error("当前没有等待确认的粘贴请求")]
    NoPendingRequest,

    /// 裁决对应的请求已经结束或被替换
    #[error("请求 #{0} 已失效")]
    StaleVerdict(u64),
}

impl AppError {
    /// 返回错误分类，供事件总线上的订阅方区分来源
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Capture(_) => ErrorKind::Capture,
            AppError::Decode(_) => ErrorKind::Decode,
            AppError::Io(_) | AppError::Serialization(_) | AppError::Storage(_) => ErrorKind::Io,
            AppError::Clipboard(_) | AppError::Replay(_) => ErrorKind::Replay,
            AppError::Hook(_) => ErrorKind::Hook,
            AppError::NoPendingRequest | AppError::StaleVerdict(_) => ErrorKind::Verdict,
        }
    }
}

/// `AppError` 的分类标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Capture,
    Decode,
    Io,
    Replay,
    Hook,
    Verdict,
}

/// 将错误序列化为人类可读的字符串，便于前端或日志直接展示。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
