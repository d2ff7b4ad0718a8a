//! 进程内事件总线
//!
//! # 设计思路
//!
//! 拦截引擎不直接调用任何展示层代码，而是在生命周期节点发布事件：
//! 请求确认、放行、拒绝、加入白名单、配置变更、错误。
//! 托盘、提示气泡、设置窗口等外部协作者按事件类型订阅即可。
//!
//! # 实现思路
//!
//! - 同步分发：在发布者线程上按注册顺序依次调用处理器。
//! - 分发前复制处理器列表并释放锁，处理器内部可以再订阅 / 退订。
//! - 单个处理器 panic 会被 `catch_unwind` 捕获并记录，后续处理器照常收到事件。
//! - 不持久化、不重放，进程重启后订阅关系需要重新建立。

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::clipboard::ContentKind;
use crate::error::ErrorKind;

/// 生命周期事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// 需要用户确认的粘贴请求
    PasteRequested {
        request_id: u64,
        source_process: String,
        kind: ContentKind,
        is_sensitive: bool,
    },
    /// 粘贴已放行（自动或经确认）
    PasteApproved {
        request_id: u64,
        source_process: String,
        kind: ContentKind,
        auto_approved: bool,
        added_to_whitelist: bool,
        /// 回放是否真正完成；为 `false` 时用户侧看到的是“什么也没粘贴”
        replayed: bool,
    },
    /// 粘贴被拒绝
    PasteDenied {
        request_id: u64,
        source_process: String,
    },
    /// 进程被加入白名单
    WhitelistAdded { process_name: String },
    /// 策略配置发生变化
    ConfigChanged {
        setting: String,
        value: serde_json::Value,
    },
    /// 链路中的可恢复错误
    Error { kind: ErrorKind, message: String },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::PasteRequested { .. } => EventKind::PasteRequested,
            Event::PasteApproved { .. } => EventKind::PasteApproved,
            Event::PasteDenied { .. } => EventKind::PasteDenied,
            Event::WhitelistAdded { .. } => EventKind::WhitelistAdded,
            Event::ConfigChanged { .. } => EventKind::ConfigChanged,
            Event::Error { .. } => EventKind::Error,
        }
    }
}

/// 事件类型（订阅键）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PasteRequested,
    PasteApproved,
    PasteDenied,
    WhitelistAdded,
    ConfigChanged,
    Error,
}

/// 订阅凭据，用于退订
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(SubscriptionId, Handler)>>,
}

/// 发布 / 订阅注册表
#[derive(Default)]
pub struct NotificationBus {
    registry: Mutex<Registry>,
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.lock();
        let count: usize = registry.handlers.values().map(Vec::len).sum();
        f.debug_struct("NotificationBus").field("handlers", &count).finish()
    }
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅某一类事件
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// 退订；返回是否确实移除了处理器
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock();
        let Some(handlers) = registry.handlers.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        before != handlers.len()
    }

    /// 同步发布事件
    pub fn publish(&self, event: &Event) {
        let handlers: Vec<Handler> = {
            let registry = self.registry.lock();
            registry
                .handlers
                .get(&event.kind())
                .map(|list| list.iter().map(|(_, handler)| Arc::clone(handler)).collect())
                .unwrap_or_default()
        };

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                log::error!("事件处理器执行失败（{:?}），继续分发给后续处理器", event.kind());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn denied(id: u64) -> Event {
        Event::PasteDenied {
            request_id: id,
            source_process: "notepad.exe".into(),
        }
    }

    #[test]
    fn delivers_in_registration_order() {
        let bus = NotificationBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.subscribe(EventKind::PasteDenied, move |_| order.lock().push(tag));
        }

        bus.publish(&denied(1));
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn only_matching_kind_is_delivered() {
        let bus = NotificationBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.subscribe(EventKind::PasteApproved, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&denied(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_handler_does_not_block_later_handlers() {
        let bus = NotificationBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::PasteDenied, |_| panic!("handler failure"));
        let counter = Arc::clone(&hits);
        bus.subscribe(EventKind::PasteDenied, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&denied(1));
        bus.publish(&denied(2));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = NotificationBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = bus.subscribe(EventKind::PasteDenied, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.unsubscribe(EventKind::PasteDenied, id));
        assert!(!bus.unsubscribe(EventKind::PasteDenied, id));
        bus.publish(&denied(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_may_subscribe_during_dispatch() {
        let bus = Arc::new(NotificationBus::new());
        let inner_bus = Arc::clone(&bus);
        bus.subscribe(EventKind::PasteDenied, move |_| {
            inner_bus.subscribe(EventKind::Error, |_| {});
        });

        bus.publish(&denied(1));
        assert_eq!(format!("{:?}", bus), "NotificationBus { handlers: 2 }");
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(denied(3)).unwrap();
        assert_eq!(json["type"], "paste_denied");
        assert_eq!(json["request_id"], 3);
    }
}
