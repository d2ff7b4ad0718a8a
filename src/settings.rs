//! 配置文件读写
//!
//! `config.json` 是一个扁平对象：拦截策略相关的键由本模块解析，
//! 其余展示类设置（透明度、主题、强调色以及未知键）原样保留，
//! 保存时一并写回。文件缺失或内容无法解析时使用默认值。

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::policy::PolicyConfig;
use crate::storage;

fn default_true() -> bool {
    true
}

fn default_opacity() -> f64 {
    0.95
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_accent() -> String {
    "#3B82F6".to_string()
}

/// `config.json` 的内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub monitor_text: bool,
    #[serde(default = "default_true")]
    pub monitor_image: bool,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default = "default_opacity")]
    pub popup_opacity: f64,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_accent")]
    pub accent_color: String,
    /// 其他协作者写入的键
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            monitor_text: true,
            monitor_image: true,
            whitelist: Vec::new(),
            popup_opacity: default_opacity(),
            theme: default_theme(),
            accent_color: default_accent(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Settings {
    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig::default()
            .with_monitor_text(self.monitor_text)
            .with_monitor_image(self.monitor_image)
            .with_whitelist(&self.whitelist)
    }

    /// 用运行期策略覆盖对应的键
    pub fn absorb(&mut self, policy: &PolicyConfig) {
        self.monitor_text = policy.monitor_text;
        self.monitor_image = policy.monitor_image;
        self.whitelist = policy.whitelist().map(str::to_string).collect();
    }
}

/// 配置文件存取
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取配置；文件不存在或格式错误时返回默认值
    pub fn load(&self) -> Result<Settings, AppError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("配置文件不存在，使用默认配置: {}", self.path.display());
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Settings>(&content) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                log::warn!("⚠️ 解析配置文件失败，使用默认配置: {}", e);
                Ok(Settings::default())
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), AppError> {
        let content = serde_json::to_string_pretty(settings)?;
        storage::write_atomically(&self.path, content.as_bytes())?;
        log::debug!("配置已保存: {}", self.path.display());
        Ok(())
    }

    /// 读取磁盘上的配置，写入新的策略部分后保存，保留其他键
    pub fn save_policy(&self, policy: &PolicyConfig) -> Result<(), AppError> {
        let mut settings = self.load()?;
        settings.absorb(policy);
        self.save(&settings)
    }
}
