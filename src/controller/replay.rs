//! 回放与收尾
//!
//! 放行的请求在独立线程中回放：等待触发按键释放（确认路径还要先恢复焦点），
//! 把批准的内容写回剪贴板，设置回放标记，再注入一次粘贴按键。
//! 回放成功与否都会进入收尾：记录历史、持久化、发布事件、回到空闲。
//! 回放线程 panic 时清除回放标记并回到空闲。

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;

use crate::error::AppError;
use crate::events::Event;
use crate::history::HistoryItem;
use crate::policy::PasteRequest;

use super::Inner;

/// 放行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Approval {
    auto_approved: bool,
    added_to_whitelist: bool,
}

impl Approval {
    pub(super) fn auto() -> Self {
        Self {
            auto_approved: true,
            added_to_whitelist: false,
        }
    }

    pub(super) fn confirmed(added_to_whitelist: bool) -> Self {
        Self {
            auto_approved: false,
            added_to_whitelist,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Replayed,
    Failed,
    /// 回放前监控已停止
    Abandoned,
}

impl Inner {
    pub(super) fn spawn_replay(self: &Arc<Self>, request: PasteRequest, approval: Approval) {
        let inner = Arc::clone(self);
        let id = request.id;
        let spawned = thread::Builder::new()
            .name("paste-replay".to_string())
            .spawn(move || {
                let completed = catch_unwind(AssertUnwindSafe(|| {
                    let outcome = inner.replay(&request, approval);
                    inner.finish_approved(request, approval, outcome);
                }));
                if completed.is_err() {
                    inner.recover(AppError::Replay(format!("请求 {} 的回放线程异常中止", id)));
                }
            });

        if let Err(e) = spawned {
            log::error!("❌ 启动回放线程失败，请求 {} 被放弃: {}", id, e);
            self.report(e.into());
            self.enter_idle();
        }
    }

    fn replay(&self, request: &PasteRequest, approval: Approval) -> Outcome {
        let options = &self.options;
        if approval.auto_approved {
            thread::sleep(options.settle_before_auto);
        } else {
            thread::sleep(options.settle_before_confirmed);
            if let Err(e) = self.platform.foreground.restore_focus(&request.target) {
                log::warn!("⚠️ 恢复 {} 的焦点失败: {}", request.source_process(), e);
            }
            thread::sleep(options.settle_after_focus);
        }

        if !self.monitoring.load(Ordering::SeqCst) {
            log::info!("监控已停止，放弃回放请求 {}", request.id);
            return Outcome::Abandoned;
        }

        if let Err(e) = self.platform.clipboard.write(request.snapshot.content()) {
            self.report(e);
            return Outcome::Failed;
        }

        self.replay_mark.store(true, Ordering::SeqCst);
        if let Err(e) = self.platform.injector.send_paste() {
            self.replay_mark.store(false, Ordering::SeqCst);
            self.report(e);
            return Outcome::Failed;
        }

        log::debug!("请求 {} 已回放", request.id);
        Outcome::Replayed
    }

    fn finish_approved(&self, request: PasteRequest, approval: Approval, outcome: Outcome) {
        if outcome == Outcome::Abandoned {
            self.enter_idle();
            return;
        }

        let history = &self.services.history;
        match HistoryItem::from_request(&request) {
            Ok(item) => {
                history.append(item);
                if let Err(e) = history.persist() {
                    log::error!("❌ 保存历史记录失败: {}", e);
                    self.report(e);
                }
            }
            Err(e) => self.report(e),
        }

        self.enter_idle();
        log::info!(
            "✅ 请求 {} 已放行（{}）",
            request.id,
            if approval.auto_approved { "自动" } else { "确认" }
        );
        self.services.bus.publish(&Event::PasteApproved {
            request_id: request.id.0,
            source_process: request.source_process().to_string(),
            kind: request.kind(),
            auto_approved: approval.auto_approved,
            added_to_whitelist: approval.added_to_whitelist,
            replayed: outcome == Outcome::Replayed,
        });
    }

    pub(super) fn finish_denied(&self, request: &PasteRequest) {
        self.enter_idle();
        log::info!("🚫 请求 {} 已拒绝", request.id);
        self.services.bus.publish(&Event::PasteDenied {
            request_id: request.id.0,
            source_process: request.source_process().to_string(),
        });
    }
}
