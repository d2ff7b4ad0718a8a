use enigo::{
    Direction::{Click, Press, Release},
    Enigo, Key, Keyboard, Settings,
};

use crate::error::AppError;

use super::KeystrokeInjector;

/// 基于 `enigo` 的按键注入器
///
/// 每次注入新建 `Enigo` 实例，回放线程之间不共享输入句柄。
#[derive(Debug, Default, Clone, Copy)]
pub struct EnigoInjector;

impl KeystrokeInjector for EnigoInjector {
    fn send_paste(&self) -> Result<(), AppError> {
        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| AppError::Replay(format!("初始化输入模拟失败: {}", e)))?;

        #[cfg(target_os = "macos")]
        {
            enigo
                .key(Key::Meta, Press)
                .and_then(|_| enigo.key(Key::Unicode('v'), Click))
                .and_then(|_| enigo.key(Key::Meta, Release))
                .map_err(|e| AppError::Replay(format!("模拟粘贴按键失败: {}", e)))?;
        }
        #[cfg(not(target_os = "macos"))]
        {
            enigo
                .key(Key::Control, Press)
                .and_then(|_| enigo.key(Key::Unicode('v'), Click))
                .and_then(|_| enigo.key(Key::Control, Release))
                .map_err(|e| AppError::Replay(format!("模拟粘贴按键失败: {}", e)))?;
        }

        log::debug!("已注入粘贴按键");
        Ok(())
    }
}
