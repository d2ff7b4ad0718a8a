//! 粘贴历史模块
//!
//! # 设计思路
//!
//! 只记录最终被放行的粘贴（自动放行或用户确认），被拒绝的请求不留痕。
//! 历史是一个容量固定（10 条）的“最新在前”列表，每次变更后写入
//! `history.json`，启动时从磁盘恢复。
//!
//! 敏感文本落盘前对 `content` / `preview` 做混淆，并写入
//! `_content_encrypted` / `_preview_encrypted` 标记；图片以 PNG 的 Base64 保存。
//!
//! # 实现思路
//!
//! - `item`：内存中的历史条目与显示名推导。
//! - `record`：磁盘记录格式，负责混淆 / 还原与图片编解码。
//!   单个字段还原失败时该字段变为 `Unavailable`，整条记录结构无效时跳过。
//! - `store`：有界列表 + 持久化，列表的读写都在同一把互斥锁下进行。

mod item;
mod record;
mod store;

pub use item::{HistoryItem, ItemData, display_name};
pub use store::{HISTORY_CAPACITY, HistoryStore};
