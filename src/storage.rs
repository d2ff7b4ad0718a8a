//! 数据目录管理模块
//!
//! # 设计思路
//!
//! 统一管理 `config.json` 与 `history.json` 的存放位置，支持自定义目录，
//! 并在目录不存在时自动创建。
//!
//! # 实现思路
//!
//! - 优先使用调用方指定的自定义目录（命令行 / 环境变量）。
//! - 未指定时回退到 `dirs::data_dir()` 下的 `PasteGuardian` 子目录。
//! - 目录不存在时自动 `create_dir_all`，避免上层判断。
//! - 所有可能失败的操作均返回 `Result`，不使用 `expect()` / `unwrap()`。

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// 默认数据目录名
pub const APP_DIR_NAME: &str = "PasteGuardian";
const CONFIG_FILE: &str = "config.json";
const HISTORY_FILE: &str = "history.json";

/// 已确认可用的数据目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// 解析数据目录
    ///
    /// # 参数
    /// * `custom_dir` - 自定义目录（可选，空字符串视为未设置）
    ///
    /// # 返回
    /// - `Ok(DataDir)` — 可用的数据目录
    /// - `Err(AppError::Storage)` — 无法获取或创建目录
    pub fn resolve(custom_dir: Option<&str>) -> Result<Self, AppError> {
        if let Some(dir) = custom_dir.filter(|d| !d.trim().is_empty()) {
            return Self::at(dir);
        }

        let base = dirs::data_dir()
            .ok_or_else(|| AppError::Storage("无法获取系统数据目录".to_string()))?;
        Self::at(base.join(APP_DIR_NAME))
    }

    /// 使用指定目录，不存在时创建
    pub fn at(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let root = path.as_ref().to_path_buf();
        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| {
                AppError::Storage(format!("创建数据目录 '{}' 失败: {}", root.display(), e))
            })?;
            log::info!("📁 已创建数据目录: {}", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn history_file(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }
}

/// 先写临时文件再重命名，避免写到一半时崩溃留下残缺文件
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
