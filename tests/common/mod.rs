// 内存中的平台替身：剪贴板、按键注入、前台窗口与键盘钩子
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use paste_guardian::clipboard::{ClipboardAccess, ClipboardContent, RawImage};
use paste_guardian::events::{Event, EventKind, NotificationBus};
use paste_guardian::history::HistoryStore;
use paste_guardian::hook::{KeyHook, TriggerDecision, TriggerSink};
use paste_guardian::input::{ForegroundProbe, ForegroundTarget, KeystrokeInjector};
use paste_guardian::obfuscation::ObfuscationCodec;
use paste_guardian::policy::{ConfigHandle, PolicyConfig};
use paste_guardian::settings::SettingsStore;
use paste_guardian::{
    AppError, ConfirmationReceiver, ControllerOptions, InterceptionController, Platform, Services,
};

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// 模拟全局钩子：`fire` 相当于用户按下一次 Ctrl+V
#[derive(Default)]
pub struct FakeHook {
    sink: Mutex<Option<Arc<dyn TriggerSink>>>,
    pub installs: AtomicUsize,
    pub fail_install: AtomicBool,
}

impl FakeHook {
    /// 按钩子线程的顺序调用：先过滤，认领后再处理
    pub fn fire(&self) -> TriggerDecision {
        let sink = self.sink.lock().clone();
        match sink {
            Some(sink) => {
                let decision = sink.filter_trigger();
                if decision == TriggerDecision::Claimed {
                    sink.process_trigger();
                }
                decision
            }
            None => TriggerDecision::PassThrough,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.sink.lock().is_some()
    }
}

pub struct HookHandle(pub Arc<FakeHook>);

impl KeyHook for HookHandle {
    fn install(&self, sink: Arc<dyn TriggerSink>) -> Result<(), AppError> {
        if self.0.fail_install.load(Ordering::SeqCst) {
            return Err(AppError::Hook("拒绝安装".into()));
        }
        self.0.installs.fetch_add(1, Ordering::SeqCst);
        *self.0.sink.lock() = Some(sink);
        Ok(())
    }

    fn uninstall(&self) {
        self.0.sink.lock().take();
    }
}

#[derive(Default)]
pub struct FakeClipboard {
    pub content: Mutex<Option<ClipboardContent>>,
    pub writes: Mutex<Vec<ClipboardContent>>,
    pub fail_write: AtomicBool,
    pub panic_on_read: AtomicBool,
}

impl ClipboardAccess for FakeClipboard {
    fn read(&self) -> Result<Option<ClipboardContent>, AppError> {
        if self.panic_on_read.load(Ordering::SeqCst) {
            panic!("剪贴板读取崩溃");
        }
        Ok(self.content.lock().clone())
    }

    fn write(&self, content: &ClipboardContent) -> Result<(), AppError> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(AppError::Clipboard("剪贴板被占用".into()));
        }
        self.writes.lock().push(content.clone());
        Ok(())
    }
}

/// 注入的按键会再次经过钩子，和真实系统一样
pub struct FakeInjector {
    hook: Arc<FakeHook>,
    pub injected: AtomicUsize,
    pub observed: Mutex<Vec<TriggerDecision>>,
    pub fail: AtomicBool,
    pub panic_on_send: AtomicBool,
}

impl KeystrokeInjector for FakeInjector {
    fn send_paste(&self) -> Result<(), AppError> {
        if self.panic_on_send.load(Ordering::SeqCst) {
            panic!("注入崩溃");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Replay("注入被拒绝".into()));
        }
        self.injected.fetch_add(1, Ordering::SeqCst);
        let decision = self.hook.fire();
        self.observed.lock().push(decision);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeForeground {
    pub process: Mutex<String>,
    pub fail: AtomicBool,
    pub restores: AtomicUsize,
}

impl ForegroundProbe for FakeForeground {
    fn foreground(&self) -> Result<ForegroundTarget, AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Capture("没有前台窗口".into()));
        }
        Ok(ForegroundTarget::new(self.process.lock().clone()))
    }

    fn restore_focus(&self, _target: &ForegroundTarget) -> Result<(), AppError> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn codec() -> ObfuscationCodec {
    ObfuscationCodec::derive("test-host-test-user-PasteGuardian")
}

pub fn fast_options() -> ControllerOptions {
    ControllerOptions {
        settle_before_auto: Duration::ZERO,
        settle_before_confirmed: Duration::ZERO,
        settle_after_focus: Duration::ZERO,
        ..ControllerOptions::default()
    }
}

pub fn text(value: &str) -> ClipboardContent {
    ClipboardContent::Text(value.to_string())
}

pub fn image(width: usize, height: usize) -> ClipboardContent {
    ClipboardContent::Image(RawImage {
        width,
        height,
        rgba: vec![128; width * height * 4],
    })
}

pub struct Harness {
    pub controller: InterceptionController,
    pub tickets: ConfirmationReceiver,
    pub hook: Arc<FakeHook>,
    pub clipboard: Arc<FakeClipboard>,
    pub injector: Arc<FakeInjector>,
    pub foreground: Arc<FakeForeground>,
    pub history: Arc<HistoryStore>,
    pub settings: SettingsStore,
    pub events: Arc<Mutex<Vec<Event>>>,
    event_rx: mpsc::Receiver<Event>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(config: PolicyConfig) -> Self {
        Self::with_options(config, fast_options())
    }

    pub fn with_options(config: PolicyConfig, options: ControllerOptions) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let hook = Arc::new(FakeHook::default());
        let clipboard = Arc::new(FakeClipboard::default());
        let injector = Arc::new(FakeInjector {
            hook: Arc::clone(&hook),
            injected: AtomicUsize::new(0),
            observed: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            panic_on_send: AtomicBool::new(false),
        });
        let foreground = Arc::new(FakeForeground::default());
        let history = Arc::new(HistoryStore::new(
            dir.path().join("history.json"),
            codec(),
        ));
        let settings = SettingsStore::new(dir.path().join("config.json"));

        let bus = Arc::new(NotificationBus::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let (event_tx, event_rx) = mpsc::channel();
        let event_tx = Arc::new(Mutex::new(event_tx));
        for kind in [
            EventKind::PasteRequested,
            EventKind::PasteApproved,
            EventKind::PasteDenied,
            EventKind::WhitelistAdded,
            EventKind::ConfigChanged,
            EventKind::Error,
        ] {
            let events = Arc::clone(&events);
            let event_tx = Arc::clone(&event_tx);
            bus.subscribe(kind, move |event| {
                events.lock().push(event.clone());
                let _ = event_tx.lock().send(event.clone());
            });
        }

        let platform = Platform {
            hook: Box::new(HookHandle(Arc::clone(&hook))),
            clipboard: clipboard.clone(),
            injector: injector.clone(),
            foreground: foreground.clone(),
        };
        let services = Services {
            config: ConfigHandle::new(config),
            history: Arc::clone(&history),
            bus,
            settings: Some(settings.clone()),
        };
        let (controller, tickets) = InterceptionController::new(platform, services, options);
        controller.start_monitoring().expect("start monitoring failed");

        Self {
            controller,
            tickets,
            hook,
            clipboard,
            injector,
            foreground,
            history,
            settings,
            events,
            event_rx,
            dir,
        }
    }

    /// 在 `process` 前台时按下 Ctrl+V，剪贴板内容为 `content`
    pub fn paste(&self, process: &str, content: Option<ClipboardContent>) -> TriggerDecision {
        *self.foreground.process.lock() = process.to_string();
        *self.clipboard.content.lock() = content;
        self.hook.fire()
    }

    /// 等待下一个指定类型的事件
    pub fn wait_for(&self, kind: EventKind) -> Event {
        loop {
            let event = self
                .event_rx
                .recv_timeout(EVENT_TIMEOUT)
                .unwrap_or_else(|_| panic!("timed out waiting for {:?}", kind));
            if event.kind() == kind {
                return event;
            }
        }
    }

    /// 停止当前控制器，在同一数据目录上重新创建一个，相当于重启进程
    pub fn restart(&self) -> (InterceptionController, ConfirmationReceiver) {
        self.controller.stop_monitoring();

        let settings = SettingsStore::new(self.dir.path().join("config.json"));
        let policy = settings.load().expect("load settings failed").policy();
        let platform = Platform {
            hook: Box::new(HookHandle(Arc::new(FakeHook::default()))),
            clipboard: self.clipboard.clone(),
            injector: self.injector.clone(),
            foreground: self.foreground.clone(),
        };
        let services = Services {
            config: ConfigHandle::new(policy),
            history: Arc::new(HistoryStore::new(self.dir.path().join("history.json"), codec())),
            bus: Arc::new(NotificationBus::new()),
            settings: Some(settings),
        };
        InterceptionController::new(platform, services, fast_options())
    }

    pub fn injected(&self) -> usize {
        self.injector.injected.load(Ordering::SeqCst)
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }
}
