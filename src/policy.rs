//! 策略判定模块
//!
//! # 设计思路
//!
//! 一次拦截到的粘贴只有两种去向：直接放行，或交给用户确认。
//! 判定规则按优先级依次为：
//! 1. 来源进程在白名单中 → 放行
//! 2. 对应内容类型的监控开关已关闭 → 放行
//! 3. 其余一律需要确认
//!
//! 敏感内容检测只影响记录与提示，不改变判定结果。
//!
//! # 实现思路
//!
//! - `decide` 是纯函数，输入请求与配置快照，输出 `Decision`。
//! - 运行期配置放在 `ConfigHandle`（`parking_lot::RwLock`）中，
//!   所有修改走同一把写锁；读取方带超时取快照，超时返回 `None`，
//!   由控制器按“需要确认”处理。
//! - 白名单条目统一转为小写，Windows 上进程名不区分大小写。

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::clipboard::{ClipboardSnapshot, ContentKind};
use crate::input::ForegroundTarget;

/// 粘贴请求编号，单调递增
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 请求在生命周期中的判定状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    AutoAllowed,
    Confirmed,
    Denied,
}

/// 一次被拦截的粘贴
#[derive(Debug, Clone)]
pub struct PasteRequest {
    pub id: RequestId,
    pub snapshot: Arc<ClipboardSnapshot>,
    pub target: ForegroundTarget,
    pub is_sensitive: bool,
    pub state: RequestState,
}

impl PasteRequest {
    pub fn source_process(&self) -> &str {
        &self.target.process_name
    }

    pub fn kind(&self) -> ContentKind {
        self.snapshot.kind()
    }
}

/// 判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AutoAllow,
    RequireConfirmation,
}

/// 拦截策略配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    pub monitor_text: bool,
    pub monitor_image: bool,
    whitelist: BTreeSet<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            monitor_text: true,
            monitor_image: true,
            whitelist: BTreeSet::new(),
        }
    }
}

impl PolicyConfig {
    pub fn with_monitor_text(mut self, on: bool) -> Self {
        self.monitor_text = on;
        self
    }

    pub fn with_monitor_image(mut self, on: bool) -> Self {
        self.monitor_image = on;
        self
    }

    pub fn with_whitelist<I, S>(mut self, processes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.whitelist = processes
            .into_iter()
            .map(|p| normalize_process(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    pub fn is_whitelisted(&self, process: &str) -> bool {
        self.whitelist.contains(&normalize_process(process))
    }

    /// 白名单（已排序、小写）
    pub fn whitelist(&self) -> impl Iterator<Item = &str> {
        self.whitelist.iter().map(String::as_str)
    }

    pub fn monitors(&self, kind: ContentKind) -> bool {
        match kind {
            ContentKind::Text => self.monitor_text,
            ContentKind::Image => self.monitor_image,
        }
    }
}

fn normalize_process(process: &str) -> String {
    process.trim().to_lowercase()
}

/// 对单个请求做出判定
pub fn decide(request: &PasteRequest, config: &PolicyConfig) -> Decision {
    if config.is_whitelisted(request.source_process()) {
        log::debug!("来源进程 {} 在白名单中，直接放行", request.source_process());
        return Decision::AutoAllow;
    }
    if !config.monitors(request.kind()) {
        log::debug!("{:?} 类型未开启监控，直接放行", request.kind());
        return Decision::AutoAllow;
    }
    Decision::RequireConfirmation
}

/// 单项配置变更
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigDelta {
    AddToWhitelist(String),
    RemoveFromWhitelist(String),
    SetMonitorText(bool),
    SetMonitorImage(bool),
}

impl ConfigDelta {
    /// 变更项名称，与 `config.json` 中的键一致
    pub fn setting(&self) -> &'static str {
        match self {
            ConfigDelta::AddToWhitelist(_) | ConfigDelta::RemoveFromWhitelist(_) => "whitelist",
            ConfigDelta::SetMonitorText(_) => "monitor_text",
            ConfigDelta::SetMonitorImage(_) => "monitor_image",
        }
    }
}

/// 运行期共享配置
#[derive(Debug, Clone, Default)]
pub struct ConfigHandle {
    inner: Arc<RwLock<PolicyConfig>>,
}

impl ConfigHandle {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// 在 `timeout` 内取得配置快照；锁被长时间占用时返回 `None`
    pub fn snapshot(&self, timeout: Duration) -> Option<PolicyConfig> {
        self.inner.try_read_for(timeout).map(|guard| guard.clone())
    }

    /// 阻塞读取当前配置
    pub fn current(&self) -> PolicyConfig {
        self.inner.read().clone()
    }

    /// 应用一项变更，返回配置是否真的发生了变化
    pub fn apply(&self, delta: &ConfigDelta) -> bool {
        let mut config = self.inner.write();
        match delta {
            ConfigDelta::AddToWhitelist(process) => {
                let process = normalize_process(process);
                !process.is_empty() && config.whitelist.insert(process)
            }
            ConfigDelta::RemoveFromWhitelist(process) => {
                config.whitelist.remove(&normalize_process(process))
            }
            ConfigDelta::SetMonitorText(on) => {
                std::mem::replace(&mut config.monitor_text, *on) != *on
            }
            ConfigDelta::SetMonitorImage(on) => {
                std::mem::replace(&mut config.monitor_image, *on) != *on
            }
        }
    }
}
