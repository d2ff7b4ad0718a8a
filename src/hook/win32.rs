//! `WH_KEYBOARD_LL` 低级键盘钩子
//!
//! 钩子线程只跑消息循环，回调里调用 `filter_trigger` 后立即返回；
//! 被认领的触发经由通道交给 `paste-trigger` 工作线程执行 `process_trigger`。

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, VK_CONTROL};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, KBDLLHOOKSTRUCT, MSG, PM_NOREMOVE,
    PeekMessageW, PostThreadMessageW, SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx,
    WH_KEYBOARD_LL, WM_KEYDOWN, WM_QUIT, WM_SYSKEYDOWN,
};

use crate::error::AppError;

use super::{KeyHook, TriggerDecision, TriggerSink};

const HC_ACTION: i32 = 0;
const VK_V: u32 = 0x56;

/// 回调线程可见的当前 sink
struct ActiveSink {
    sink: Arc<dyn TriggerSink>,
    claims: UnboundedSender<()>,
}

static ACTIVE: Mutex<Option<ActiveSink>> = Mutex::new(None);

struct Running {
    hook_thread_id: u32,
    hook_thread: JoinHandle<()>,
    worker: JoinHandle<()>,
}

/// Windows 低级键盘钩子
#[derive(Default)]
pub struct LowLevelKeyboardHook {
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for LowLevelKeyboardHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LowLevelKeyboardHook")
            .field("installed", &self.running.lock().is_some())
            .finish()
    }
}

impl KeyHook for LowLevelKeyboardHook {
    fn install(&self, sink: Arc<dyn TriggerSink>) -> Result<(), AppError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }

        let (claim_tx, mut claim_rx) = unbounded_channel::<()>();
        *ACTIVE.lock() = Some(ActiveSink {
            sink: Arc::clone(&sink),
            claims: claim_tx,
        });

        let worker = thread::Builder::new()
            .name("paste-trigger".to_string())
            .spawn(move || {
                while claim_rx.blocking_recv().is_some() {
                    sink.process_trigger();
                }
                log::debug!("粘贴处理线程退出");
            })
            .inspect_err(|_| {
                ACTIVE.lock().take();
            })?;

        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let spawned = thread::Builder::new()
            .name("keyboard-hook".to_string())
            .spawn(move || run_hook_thread(ready_tx));

        let ready = match spawned {
            Ok(hook_thread) => ready_rx
                .recv()
                .unwrap_or_else(|_| Err(AppError::Hook("钩子线程意外退出".to_string())))
                .map(|hook_thread_id| (hook_thread_id, hook_thread)),
            Err(e) => Err(e.into()),
        };

        match ready {
            Ok((hook_thread_id, hook_thread)) => {
                *running = Some(Running {
                    hook_thread_id,
                    hook_thread,
                    worker,
                });
                Ok(())
            }
            Err(e) => {
                ACTIVE.lock().take();
                let _ = worker.join();
                Err(e)
            }
        }
    }

    fn uninstall(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        let posted = unsafe { PostThreadMessageW(running.hook_thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
        if let Err(e) = posted {
            log::error!("通知钩子线程退出失败: {}", e);
        }
        let _ = running.hook_thread.join();

        // 释放发送端后工作线程处理完当前触发即退出
        ACTIVE.lock().take();
        if running.worker.thread().id() != thread::current().id() {
            let _ = running.worker.join();
        }
        log::info!("⌨️ 低级键盘钩子已卸载");
    }
}

fn run_hook_thread(ready: std::sync::mpsc::Sender<Result<u32, AppError>>) {
    let installed = unsafe {
        GetModuleHandleW(None)
            .and_then(|module| SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), Some(module.into()), 0))
    };
    let hook = match installed {
        Ok(hook) => hook,
        Err(e) => {
            let _ = ready.send(Err(AppError::Hook(format!("安装低级键盘钩子失败: {}", e))));
            return;
        }
    };

    let mut msg = MSG::default();
    unsafe {
        // 确保线程消息队列已创建，之后才能接收 WM_QUIT
        let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
        let _ = ready.send(Ok(GetCurrentThreadId()));
    }
    log::info!("⌨️ 低级键盘钩子已安装");

    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
        if let Err(e) = UnhookWindowsHookEx(hook) {
            log::warn!("卸载低级键盘钩子失败: {}", e);
        }
    }
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION && unsafe { is_paste_keydown(wparam, lparam) } && dispatch().suppresses() {
        return LRESULT(1);
    }
    unsafe { CallNextHookEx(None, code, wparam, lparam) }
}

unsafe fn is_paste_keydown(wparam: WPARAM, lparam: LPARAM) -> bool {
    let message = wparam.0 as u32;
    if message != WM_KEYDOWN && message != WM_SYSKEYDOWN {
        return false;
    }
    let info = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };
    if info.vkCode != VK_V {
        return false;
    }
    let ctrl = unsafe { GetAsyncKeyState(i32::from(VK_CONTROL.0)) };
    (ctrl as u16 & 0x8000) != 0
}

fn dispatch() -> TriggerDecision {
    let (sink, claims) = match ACTIVE.lock().as_ref() {
        Some(active) => (Arc::clone(&active.sink), active.claims.clone()),
        None => return TriggerDecision::PassThrough,
    };

    let decision = sink.filter_trigger();
    if decision == TriggerDecision::Claimed && claims.send(()).is_err() {
        log::error!("粘贴处理线程已退出，本次触发无法处理");
    }
    decision
}
