use std::collections::VecDeque;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::AppError;
use crate::obfuscation::ObfuscationCodec;
use crate::storage;

use super::item::HistoryItem;
use super::record::HistoryRecord;

/// 内存与磁盘上保留的最大条目数
pub const HISTORY_CAPACITY: usize = 10;

/// 有界粘贴历史
///
/// `items` 保护内存列表；`io` 串行化所有读写历史文件的操作，
/// 快照与写盘在同一把锁内完成，`clear` 之后不会有旧快照被写回。
pub struct HistoryStore {
    items: Mutex<VecDeque<HistoryItem>>,
    io: Mutex<()>,
    capacity: usize,
    path: PathBuf,
    codec: ObfuscationCodec,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("path", &self.path)
            .finish()
    }
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, codec: ObfuscationCodec) -> Self {
        Self::with_capacity(path, codec, HISTORY_CAPACITY)
    }

    pub fn with_capacity(path: impl Into<PathBuf>, codec: ObfuscationCodec, capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            io: Mutex::new(()),
            capacity,
            path: path.into(),
            codec,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// 插入到最前，超出容量时从尾部淘汰
    pub fn append(&self, item: HistoryItem) {
        let mut items = self.items.lock();
        items.push_front(item);
        while items.len() > self.capacity {
            if let Some(evicted) = items.pop_back() {
                log::debug!(
                    "历史已满，淘汰最旧条目: {} ({:?})",
                    evicted.source_process,
                    evicted.kind
                );
            }
        }
    }

    /// 最新在前的快照
    pub fn list(&self) -> Vec<HistoryItem> {
        self.items.lock().iter().cloned().collect()
    }

    /// 写入历史文件，敏感文本字段混淆后保存
    pub fn persist(&self) -> Result<(), AppError> {
        let _io = self.io.lock();
        let items = self.list();
        let records = items
            .iter()
            .map(|item| HistoryRecord::seal(item, &self.codec))
            .collect::<Result<Vec<_>, _>>()?;
        let json = serde_json::to_string_pretty(&records)?;
        storage::write_atomically(&self.path, json.as_bytes())?;
        log::debug!("💾 已保存 {} 条历史记录", records.len());
        Ok(())
    }

    /// 从历史文件恢复，替换内存中的列表
    ///
    /// 文件不存在时得到空列表；结构无效的记录被跳过，
    /// 无法还原的字段标记为 `Unavailable`。
    pub fn load(&self) -> Result<Vec<HistoryItem>, AppError> {
        let _io = self.io.lock();
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.items.lock().clear();
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let raw: Vec<serde_json::Value> = serde_json::from_str(&content)?;
        let total = raw.len();
        let mut loaded: Vec<HistoryItem> = raw
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value::<HistoryRecord>(value) {
                Ok(record) => Some(record.open(&self.codec)),
                Err(e) => {
                    log::warn!("⚠️ 跳过第 {} 条无效历史记录: {}", index, e);
                    None
                }
            })
            .collect();

        loaded.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        loaded.truncate(self.capacity);
        log::info!("📜 已加载 {}/{} 条历史记录", loaded.len(), total);

        *self.items.lock() = loaded.iter().cloned().collect();
        Ok(loaded)
    }

    /// 清空内存并删除历史文件
    pub fn clear(&self) -> Result<(), AppError> {
        let _io = self.io.lock();
        self.items.lock().clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// 导出当前列表为明文 JSON，返回写出的条目数
    ///
    /// `include_sensitive` 为 `false` 时跳过敏感条目。
    pub fn export(&self, path: impl AsRef<Path>, include_sensitive: bool) -> Result<usize, AppError> {
        let records = self
            .list()
            .iter()
            .filter(|item| include_sensitive || !item.is_sensitive)
            .map(HistoryRecord::plain)
            .collect::<Result<Vec<_>, _>>()?;
        let json = serde_json::to_string_pretty(&records)?;
        storage::write_atomically(path.as_ref(), json.as_bytes())?;
        log::info!("📤 已导出 {} 条历史记录到 {}", records.len(), path.as_ref().display());
        Ok(records.len())
    }
}
