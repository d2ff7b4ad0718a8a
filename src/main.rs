//! # 粘贴守卫 — 应用入口
//!
//! 本文件仅负责初始化日志、配置、历史与控制器，并提供一个终端确认界面。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。
//!
//! 数据目录默认位于系统数据目录下的 `PasteGuardian`，
//! 可通过环境变量 `PASTE_GUARDIAN_DATA_DIR` 覆盖。

use std::io::{self, Write};
use std::sync::Arc;

use paste_guardian::clipboard::Preview;
use paste_guardian::events::{Event, EventKind, NotificationBus};
use paste_guardian::history::HistoryStore;
use paste_guardian::obfuscation::ObfuscationCodec;
use paste_guardian::policy::ConfigHandle;
use paste_guardian::settings::SettingsStore;
use paste_guardian::storage::DataDir;
use paste_guardian::{
    AppError, ConfirmationTicket, ControllerOptions, InterceptionController, Platform, Services,
};

const DATA_DIR_ENV: &str = "PASTE_GUARDIAN_DATA_DIR";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        log::error!("❌ 粘贴守卫异常退出: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let custom_dir = std::env::var(DATA_DIR_ENV).ok();
    let data_dir = DataDir::resolve(custom_dir.as_deref())?;
    log::info!("setup: 数据目录 {}", data_dir.root().display());

    let settings = SettingsStore::new(data_dir.config_file());
    let config = ConfigHandle::new(settings.load()?.policy());

    let history = Arc::new(HistoryStore::new(
        data_dir.history_file(),
        ObfuscationCodec::for_this_machine(),
    ));
    if let Err(err) = history.load() {
        log::warn!("setup: 历史记录加载失败，从空列表开始: {err}");
    }

    let bus = Arc::new(NotificationBus::new());
    register_console_listeners(&bus);

    let (controller, mut tickets) = InterceptionController::new(
        Platform::system(),
        Services {
            config,
            history,
            bus,
            settings: Some(settings),
        },
        ControllerOptions::default(),
    );
    controller.start_monitoring()?;
    println!("粘贴守卫已启动，按 Ctrl+C 退出。");

    while let Some(ticket) = tickets.recv_blocking() {
        if !ask(ticket)? {
            break;
        }
    }

    controller.stop_monitoring();
    Ok(())
}

fn register_console_listeners(bus: &NotificationBus) {
    bus.subscribe(EventKind::PasteApproved, |event| {
        if let Event::PasteApproved { source_process, replayed, .. } = event {
            if *replayed {
                println!("✅ 已粘贴到 {source_process}");
            } else {
                println!("⚠️ 已放行，但未能粘贴到 {source_process}");
            }
        }
    });
    bus.subscribe(EventKind::PasteDenied, |event| {
        if let Event::PasteDenied { source_process, .. } = event {
            println!("🚫 已阻止粘贴到 {source_process}");
        }
    });
    bus.subscribe(EventKind::WhitelistAdded, |event| {
        if let Event::WhitelistAdded { process_name } = event {
            println!("➕ {process_name} 已加入白名单");
        }
    });
    bus.subscribe(EventKind::Error, |event| {
        if let Event::Error { kind, message } = event {
            log::debug!("事件: {kind:?} {message}");
        }
    });
}

/// 在终端询问一次裁决；标准输入关闭时返回 `Ok(false)`
fn ask(ticket: ConfirmationTicket) -> Result<bool, AppError> {
    println!();
    println!("📋 {} 请求粘贴", ticket.display_name());
    match ticket.preview() {
        Preview::Text(text) if ticket.is_sensitive() => {
            println!("⚠️ 内容可能包含敏感信息（{} 个字符）", text.chars().count());
        }
        Preview::Text(text) => println!("{text}"),
        Preview::Image(thumb) => println!("[图片 {}x{}]", thumb.width, thumb.height),
    }
    print!("允许粘贴？[y] 允许 / [a] 总是允许 / [n] 拒绝: ");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        // 票据在此被丢弃，按拒绝处理
        return Ok(false);
    }

    let resolved = match line.trim().to_lowercase().as_str() {
        "y" | "yes" => ticket.confirm(),
        "a" | "always" => ticket.always_allow(),
        _ => ticket.deny(),
    };
    if let Err(err) = resolved {
        println!("裁决未生效: {err}");
    }
    Ok(true)
}
