//! 等待确认的超时计时
//!
//! 同一时刻最多一个计时线程。裁决到达时丢弃发送端，
//! 计时线程的 `recv_timeout` 立即返回并退出。

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub(super) struct Watchdog {
    cancel: Mutex<Option<Sender<()>>>,
}

impl Watchdog {
    /// 开始计时，超时后在计时线程上调用 `on_timeout`；上一次计时随之取消
    pub(super) fn arm<F>(&self, timeout: Duration, on_timeout: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("paste-confirm-timeout".to_string())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = rx.recv_timeout(timeout) {
                    on_timeout();
                }
            })?;
        *self.cancel.lock() = Some(tx);
        Ok(handle)
    }

    /// 取消当前计时
    pub(super) fn disarm(&self) {
        self.cancel.lock().take();
    }
}
