//! 粘贴拦截控制器
//!
//! # 设计思路
//!
//! 控制器持有全局钩子的生命周期，把一次 Ctrl+V 变成一个 `PasteRequest`，
//! 按策略直接放行或交给确认界面，最后回放按键、记录历史、发布事件。
//!
//! 状态机：
//!
//! ```text
//! Idle ──触发──▶ Processing ──放行──▶ Completing ──▶ Idle
//!                    │                    ▲
//!                    └──需确认──▶ AwaitingConfirmation（确认 / 总是允许 / 拒绝）
//! ```
//!
//! - 任一时刻最多只有一个请求在途，其余触发一律吞掉（处理中时不排队）。
//! - 回放前设置一次性“自身按键”标记，钩子看到回放的按键时清除标记并放行，
//!   因此一次确认只产生一次注入，且不会被再次拦截。
//! - 采集失败、回放失败都只记录日志并发布 `Error` 事件，钩子始终保持安装。
//!   工作线程中的 panic 同样被捕获：清除回放标记，回到空闲。
//!
//! # 实现思路
//!
//! - `Phase` 放在 `parking_lot::Mutex` 中；监控开关与回放标记是 `AtomicBool`。
//! - 钩子回调只调用 `filter_trigger`，认领后的处理由钩子的工作线程调用 `process_trigger`。
//! - 需要确认时通过 `tokio::sync::mpsc` 无界通道把 `ConfirmationTicket` 交给界面线程，
//!   界面消费票据即给出裁决；票据被丢弃视为拒绝。
//! - 回放在独立线程中执行，只有固定的几段等待时间会阻塞。
//! - 确认超时由单个可取消的计时线程负责，裁决到达即取消。

mod replay;
mod ticket;
mod watchdog;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::clipboard::{ClipboardAccess, ClipboardSnapshot, SystemClipboard, sensitivity};
use crate::error::AppError;
use crate::events::{Event, EventKind, NotificationBus, SubscriptionId};
use crate::history::{HistoryItem, HistoryStore};
use crate::hook::{KeyHook, SystemHook, TriggerDecision, TriggerSink};
use crate::input::{EnigoInjector, ForegroundProbe, KeystrokeInjector, SystemForeground};
use crate::policy::{self, ConfigDelta, ConfigHandle, Decision, PasteRequest, RequestId, RequestState};
use crate::settings::SettingsStore;

pub use ticket::ConfirmationTicket;

use replay::Approval;
use watchdog::Watchdog;

/// 平台适配器集合
pub struct Platform {
    pub hook: Box<dyn KeyHook>,
    pub clipboard: Arc<dyn ClipboardAccess>,
    pub injector: Arc<dyn KeystrokeInjector>,
    pub foreground: Arc<dyn ForegroundProbe>,
}

impl Platform {
    /// 当前操作系统的真实实现
    pub fn system() -> Self {
        Self {
            hook: Box::new(SystemHook::default()),
            clipboard: Arc::new(SystemClipboard),
            injector: Arc::new(EnigoInjector),
            foreground: Arc::new(SystemForeground),
        }
    }
}

/// 控制器依赖的共享服务
#[derive(Debug, Clone)]
pub struct Services {
    pub config: ConfigHandle,
    pub history: Arc<HistoryStore>,
    pub bus: Arc<NotificationBus>,
    /// 配置变更后写回 `config.json`；为 `None` 时只在内存中生效
    pub settings: Option<SettingsStore>,
}

/// 时序参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    /// 自动放行时，注入前等待触发按键完全释放
    pub settle_before_auto: Duration,
    /// 确认放行时，等待确认界面关闭
    pub settle_before_confirmed: Duration,
    /// 恢复焦点后再等待的时间
    pub settle_after_focus: Duration,
    /// 读取配置快照的最长等待时间
    pub config_lock_timeout: Duration,
    /// 等待确认的超时时间，`None` 表示一直等待
    pub confirmation_timeout: Option<Duration>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            settle_before_auto: Duration::from_millis(100),
            settle_before_confirmed: Duration::from_millis(150),
            settle_after_focus: Duration::from_millis(50),
            config_lock_timeout: Duration::from_millis(50),
            confirmation_timeout: None,
        }
    }
}

/// 用户对一次请求的裁决
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Confirm,
    /// 放行并把来源进程加入白名单
    AlwaysAllow,
    Deny,
}

enum Phase {
    Idle,
    Processing,
    AwaitingConfirmation(PasteRequest),
    Completing,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Processing => "Processing",
            Phase::AwaitingConfirmation(_) => "AwaitingConfirmation",
            Phase::Completing => "Completing",
        }
    }
}

struct Inner {
    platform: Platform,
    services: Services,
    options: ControllerOptions,
    phase: Mutex<Phase>,
    monitoring: AtomicBool,
    /// 一次性标记：下一次看到的粘贴触发来自回放
    replay_mark: AtomicBool,
    next_id: AtomicU64,
    tickets: UnboundedSender<ConfirmationTicket>,
    watchdog: Watchdog,
}

/// 粘贴拦截控制器（可克隆的句柄）
#[derive(Clone)]
pub struct InterceptionController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for InterceptionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionController")
            .field("monitoring", &self.is_monitoring())
            .field("phase", &self.inner.phase.lock().name())
            .finish()
    }
}

/// 确认界面一侧的票据接收端
#[derive(Debug)]
pub struct ConfirmationReceiver {
    rx: UnboundedReceiver<ConfirmationTicket>,
}

impl ConfirmationReceiver {
    /// 阻塞等待下一张票据；不能在异步运行时内部调用
    pub fn recv_blocking(&mut self) -> Option<ConfirmationTicket> {
        self.rx.blocking_recv()
    }

    pub async fn recv(&mut self) -> Option<ConfirmationTicket> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ConfirmationTicket> {
        self.rx.try_recv().ok()
    }
}

impl InterceptionController {
    pub fn new(
        platform: Platform,
        services: Services,
        options: ControllerOptions,
    ) -> (Self, ConfirmationReceiver) {
        let (tx, rx) = unbounded_channel();
        let inner = Arc::new(Inner {
            platform,
            services,
            options,
            phase: Mutex::new(Phase::Idle),
            monitoring: AtomicBool::new(false),
            replay_mark: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            tickets: tx,
            watchdog: Watchdog::default(),
        });
        (Self { inner }, ConfirmationReceiver { rx })
    }

    /// 安装钩子并开始拦截；已在监控时为空操作
    pub fn start_monitoring(&self) -> Result<(), AppError> {
        let inner = &self.inner;
        if inner.monitoring.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        inner.replay_mark.store(false, Ordering::SeqCst);

        let sink: Arc<dyn TriggerSink> = Arc::new(SinkHandle(Arc::downgrade(inner)));
        if let Err(e) = inner.platform.hook.install(sink) {
            inner.monitoring.store(false, Ordering::SeqCst);
            log::error!("❌ 启动粘贴监控失败: {}", e);
            return Err(e);
        }
        log::info!("🛡️ 粘贴监控已启动");
        Ok(())
    }

    /// 卸载钩子、清除回放标记、丢弃等待中的确认；未在监控时为空操作
    pub fn stop_monitoring(&self) {
        self.inner.shutdown();
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner.monitoring.load(Ordering::SeqCst)
    }

    /// 当前等待确认的请求
    pub fn pending_request(&self) -> Option<RequestId> {
        match &*self.inner.phase.lock() {
            Phase::AwaitingConfirmation(request) => Some(request.id),
            _ => None,
        }
    }

    pub fn submit_verdict(&self, id: RequestId, verdict: Verdict) -> Result<(), AppError> {
        self.inner.resolve(id, verdict)
    }

    pub fn submit_confirm(&self) -> Result<(), AppError> {
        self.submit_current(Verdict::Confirm)
    }

    pub fn submit_always_allow(&self) -> Result<(), AppError> {
        self.submit_current(Verdict::AlwaysAllow)
    }

    pub fn submit_deny(&self) -> Result<(), AppError> {
        self.submit_current(Verdict::Deny)
    }

    fn submit_current(&self, verdict: Verdict) -> Result<(), AppError> {
        let id = self.pending_request().ok_or(AppError::NoPendingRequest)?;
        self.inner.resolve(id, verdict)
    }

    /// 修改策略配置，下一次请求生效；返回配置是否发生变化
    pub fn update_config(&self, delta: ConfigDelta) -> Result<bool, AppError> {
        self.inner.update_config(delta)
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.inner.services.config
    }

    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.inner.services.bus
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.services.bus.subscribe(kind, handler)
    }

    /// 最新在前的历史记录
    pub fn get_history(&self) -> Vec<HistoryItem> {
        self.inner.services.history.list()
    }

    pub fn clear_history(&self) -> Result<(), AppError> {
        self.inner.services.history.clear()
    }

    /// 从磁盘恢复历史，返回恢复的条目数
    pub fn load_history(&self) -> Result<usize, AppError> {
        self.inner.services.history.load().map(|items| items.len())
    }

    pub fn export_history(&self, path: impl AsRef<Path>, include_sensitive: bool) -> Result<usize, AppError> {
        self.inner.services.history.export(path, include_sensitive)
    }
}

/// 交给钩子的弱引用，控制器释放后钩子回调一律放行
struct SinkHandle(Weak<Inner>);

impl TriggerSink for SinkHandle {
    fn filter_trigger(&self) -> TriggerDecision {
        match self.0.upgrade() {
            Some(inner) => inner.filter_trigger(),
            None => TriggerDecision::PassThrough,
        }
    }

    fn process_trigger(&self) {
        let Some(inner) = self.0.upgrade() else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| inner.process_trigger())).is_err() {
            inner.recover(AppError::Capture("处理粘贴触发时发生异常".to_string()));
        }
    }
}

impl Inner {
    fn filter_trigger(&self) -> TriggerDecision {
        if !self.monitoring.load(Ordering::SeqCst) {
            return TriggerDecision::PassThrough;
        }
        if self.replay_mark.swap(false, Ordering::SeqCst) {
            log::debug!("识别到回放的粘贴按键，放行");
            return TriggerDecision::PassThrough;
        }

        let mut phase = self.phase.lock();
        if matches!(*phase, Phase::Idle) {
            *phase = Phase::Processing;
            return TriggerDecision::Claimed;
        }
        log::debug!("已有粘贴请求在 {} 阶段，忽略本次触发", phase.name());
        TriggerDecision::Suppress
    }

    fn process_trigger(self: &Arc<Self>) {
        match self.capture() {
            Ok(request) => self.route(request),
            Err(e) => {
                self.report(e);
                self.enter_idle();
            }
        }
    }

    fn capture(&self) -> Result<PasteRequest, AppError> {
        let target = self.platform.foreground.foreground()?;
        let content = self
            .platform
            .clipboard
            .read()?
            .ok_or_else(|| AppError::Capture("剪贴板为空".to_string()))?;
        let snapshot = Arc::new(ClipboardSnapshot::capture(content)?);
        let is_sensitive = snapshot.text().is_some_and(sensitivity::is_sensitive);
        let id = RequestId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);

        log::info!(
            "📋 拦截到粘贴 {}: 来源 {}，类型 {:?}，敏感 {}",
            id,
            target.process_name,
            snapshot.kind(),
            is_sensitive
        );
        Ok(PasteRequest {
            id,
            snapshot,
            target,
            is_sensitive,
            state: RequestState::Pending,
        })
    }

    fn route(self: &Arc<Self>, mut request: PasteRequest) {
        let decision = match self.services.config.snapshot(self.options.config_lock_timeout) {
            Some(config) => policy::decide(&request, &config),
            None => {
                log::warn!("⚠️ 读取配置超时，请求 {} 需要确认", request.id);
                Decision::RequireConfirmation
            }
        };

        if !self.monitoring.load(Ordering::SeqCst) {
            log::info!("监控已停止，丢弃请求 {}", request.id);
            self.enter_idle();
            return;
        }

        match decision {
            Decision::AutoAllow => {
                request.state = RequestState::AutoAllowed;
                *self.phase.lock() = Phase::Completing;
                self.spawn_replay(request, Approval::auto());
            }
            Decision::RequireConfirmation => self.await_confirmation(request),
        }
    }

    fn await_confirmation(self: &Arc<Self>, request: PasteRequest) {
        let id = request.id;
        let ticket = ConfirmationTicket::new(&request, Arc::downgrade(self));
        let event = Event::PasteRequested {
            request_id: id.0,
            source_process: request.source_process().to_string(),
            kind: request.kind(),
            is_sensitive: request.is_sensitive,
        };
        *self.phase.lock() = Phase::AwaitingConfirmation(request);
        if let Some(timeout) = self.options.confirmation_timeout {
            self.arm_confirmation_timeout(id, timeout);
        }

        self.services.bus.publish(&event);
        // 发送失败时票据随错误一起被丢弃，按拒绝处理
        if self.tickets.send(ticket).is_err() {
            log::warn!("⚠️ 没有确认界面在接收请求，{} 按拒绝处理", id);
        }
    }

    fn arm_confirmation_timeout(self: &Arc<Self>, id: RequestId, timeout: Duration) {
        let weak = Arc::downgrade(self);
        let armed = self.watchdog.arm(timeout, move || {
            if let Some(inner) = weak.upgrade() {
                if inner.resolve(id, Verdict::Deny).is_ok() {
                    log::info!("⏱️ 请求 {} 等待确认超时，已拒绝", id);
                }
            }
        });
        if let Err(e) = armed {
            log::warn!("启动确认超时计时失败: {}", e);
        }
    }

    /// 对等待中的请求给出裁决；编号不匹配时返回 `StaleVerdict`
    fn resolve(self: &Arc<Self>, id: RequestId, verdict: Verdict) -> Result<(), AppError> {
        let mut request = {
            let mut phase = self.phase.lock();
            match std::mem::replace(&mut *phase, Phase::Completing) {
                Phase::AwaitingConfirmation(request) if request.id == id => request,
                other => {
                    *phase = other;
                    return Err(AppError::StaleVerdict(id.0));
                }
            }
        };
        self.watchdog.disarm();

        log::info!("用户对请求 {} 的裁决: {:?}", id, verdict);
        match verdict {
            Verdict::Deny => {
                request.state = RequestState::Denied;
                self.finish_denied(&request);
            }
            Verdict::Confirm => {
                request.state = RequestState::Confirmed;
                self.spawn_replay(request, Approval::confirmed(false));
            }
            Verdict::AlwaysAllow => {
                request.state = RequestState::Confirmed;
                let delta = ConfigDelta::AddToWhitelist(request.source_process().to_string());
                if let Err(e) = self.update_config(delta) {
                    self.report(e);
                }
                self.spawn_replay(request, Approval::confirmed(true));
            }
        }
        Ok(())
    }

    fn update_config(&self, delta: ConfigDelta) -> Result<bool, AppError> {
        let config = &self.services.config;
        if !config.apply(&delta) {
            return Ok(false);
        }

        let current = config.current();
        let value = match &delta {
            ConfigDelta::AddToWhitelist(_) | ConfigDelta::RemoveFromWhitelist(_) => {
                serde_json::Value::from(current.whitelist().collect::<Vec<_>>())
            }
            ConfigDelta::SetMonitorText(on) | ConfigDelta::SetMonitorImage(on) => serde_json::Value::from(*on),
        };
        log::info!("⚙️ 配置已更新: {} = {}", delta.setting(), value);

        if let ConfigDelta::AddToWhitelist(process) = &delta {
            self.services.bus.publish(&Event::WhitelistAdded {
                process_name: process.trim().to_lowercase(),
            });
        }
        self.services.bus.publish(&Event::ConfigChanged {
            setting: delta.setting().to_string(),
            value,
        });

        if let Some(settings) = &self.services.settings {
            settings.save_policy(&current)?;
        }
        Ok(true)
    }

    fn shutdown(&self) {
        if !self.monitoring.swap(false, Ordering::SeqCst) {
            return;
        }
        self.platform.hook.uninstall();
        self.replay_mark.store(false, Ordering::SeqCst);
        self.watchdog.disarm();

        {
            let mut phase = self.phase.lock();
            let pending = match &*phase {
                Phase::AwaitingConfirmation(request) => Some(request.id),
                _ => None,
            };
            if let Some(id) = pending {
                log::info!("监控停止，丢弃等待确认的请求 {}", id);
                *phase = Phase::Idle;
            }
        }
        log::info!("🛑 粘贴监控已停止");
    }

    fn enter_idle(&self) {
        *self.phase.lock() = Phase::Idle;
    }

    /// 工作线程 panic 后回到可用状态
    fn recover(&self, error: AppError) {
        log::error!("❌ 工作线程异常中止: {}", error);
        self.replay_mark.store(false, Ordering::SeqCst);
        self.enter_idle();
        self.report(error);
    }

    /// 记录可恢复错误并通知订阅方
    fn report(&self, error: AppError) {
        log::warn!("⚠️ {}", error);
        self.services.bus.publish(&Event::Error {
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if self.monitoring.load(Ordering::SeqCst) {
            self.platform.hook.uninstall();
        }
    }
}
