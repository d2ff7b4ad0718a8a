//! # 粘贴守卫 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │         外部协作者（确认弹窗 / 托盘 / 设置窗口）          │
//! │                                                          │
//! │  ConfirmationReceiver ── NotificationBus 订阅            │
//! │       │  (票据 → 确认 / 总是允许 / 拒绝)                 │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ tokio mpsc (ConfirmationTicket)
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            拦截引擎 (Rust)                       │
//! │                                                          │
//! │  ┌─ controller ─ 钩子生命周期 + 状态机 + 回放            │
//! │  │   ├─ hook           WH_KEYBOARD_LL 全局钩子           │
//! │  │   ├─ input          前台进程查询 / 按键注入           │
//! │  │   └─ clipboard      快照 + 敏感内容检测               │
//! │  │                                                       │
//! │  ├─ policy ───── 白名单 / 监控开关 → 放行或确认          │
//! │  ├─ history ──── 10 条有界历史 + 选择性混淆持久化        │
//! │  ├─ obfuscation  SHA-256 派生密钥的异或混淆              │
//! │  ├─ events ───── 进程内发布 / 订阅                       │
//! │  ├─ settings     config.json 读写                        │
//! │  ├─ storage      数据目录 (返回 Result)                  │
//! │  └─ error ────── AppError (统一错误类型)                 │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` 与错误分类 |
//! | [`clipboard`] | 系统剪贴板读写、快照与预览、敏感内容检测 |
//! | [`obfuscation`] | 本机派生密钥的可逆混淆（不是加密） |
//! | [`history`] | 有界粘贴历史、`history.json` 持久化与导出 |
//! | [`events`] | 生命周期事件的发布与订阅 |
//! | [`policy`] | 粘贴请求、判定规则、运行期配置 |
//! | [`settings`] | `config.json` 的加载、默认值合并与保存 |
//! | [`storage`] | 数据目录的解析与自动创建 |
//! | [`input`] | 前台窗口查询、焦点恢复、粘贴按键注入 |
//! | [`hook`] | 全局粘贴快捷键钩子 |
//! | [`controller`] | 拦截状态机、确认票据、回放与收尾 |

pub mod error;
pub mod clipboard;
pub mod obfuscation;
pub mod history;
pub mod events;
pub mod policy;
pub mod settings;
pub mod storage;
pub mod input;
pub mod hook;
pub mod controller;

pub use controller::{
    ConfirmationReceiver, ConfirmationTicket, ControllerOptions, InterceptionController, Platform,
    Services, Verdict,
};
pub use error::AppError;
