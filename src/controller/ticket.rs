use std::sync::Weak;

use crate::clipboard::{ContentKind, Preview};
use crate::error::AppError;
use crate::history::display_name;
use crate::policy::{PasteRequest, RequestId};

use super::{Inner, Verdict};

/// 一次待确认请求的票据
///
/// 确认界面展示票据中的预览，然后消费票据给出裁决。
/// 票据未裁决就被丢弃（例如弹窗被直接关闭）时按拒绝处理。
pub struct ConfirmationTicket {
    id: RequestId,
    source_process: String,
    kind: ContentKind,
    preview: Preview,
    is_sensitive: bool,
    controller: Weak<Inner>,
    resolved: bool,
}

impl std::fmt::Debug for ConfirmationTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationTicket")
            .field("id", &self.id)
            .field("source_process", &self.source_process)
            .field("kind", &self.kind)
            .field("is_sensitive", &self.is_sensitive)
            .finish()
    }
}

impl ConfirmationTicket {
    pub(super) fn new(request: &PasteRequest, controller: Weak<Inner>) -> Self {
        Self {
            id: request.id,
            source_process: request.source_process().to_string(),
            kind: request.kind(),
            preview: request.snapshot.preview().clone(),
            is_sensitive: request.is_sensitive,
            controller,
            resolved: false,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn source_process(&self) -> &str {
        &self.source_process
    }

    /// 展示用的应用名
    pub fn display_name(&self) -> String {
        display_name(&self.source_process)
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    /// 敏感内容时确认界面应使用更醒目的提示
    pub fn is_sensitive(&self) -> bool {
        self.is_sensitive
    }

    pub fn confirm(self) -> Result<(), AppError> {
        self.resolve(Verdict::Confirm)
    }

    pub fn always_allow(self) -> Result<(), AppError> {
        self.resolve(Verdict::AlwaysAllow)
    }

    pub fn deny(self) -> Result<(), AppError> {
        self.resolve(Verdict::Deny)
    }

    fn resolve(mut self, verdict: Verdict) -> Result<(), AppError> {
        self.resolved = true;
        match self.controller.upgrade() {
            Some(inner) => inner.resolve(self.id, verdict),
            None => Err(AppError::StaleVerdict(self.id.0)),
        }
    }
}

impl Drop for ConfirmationTicket {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        if let Some(inner) = self.controller.upgrade() {
            if inner.resolve(self.id, Verdict::Deny).is_ok() {
                log::info!("确认票据 {} 未裁决即被丢弃，按拒绝处理", self.id);
            }
        }
    }
}
