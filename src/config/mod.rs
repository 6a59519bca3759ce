// ==========================================
// 记录导入引擎 - 配置层
// ==========================================
// 职责: 单次导入的运行选项（试运行/历史/进度间隔）
// 存储: config_kv 表（global scope, import/ 前缀）
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::ImportConfigReader;

use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};

/// 默认进度日志间隔（行）
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1000;

// ==========================================
// RunOptions - 单次导入运行选项
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// 试运行：计算全部计数但不提交
    pub dry_run: bool,
    /// 是否记录变更历史（仅对 keep_history 列生效）
    pub keep_history: bool,
    /// 每处理多少行输出一次进度日志（0 = 不输出）
    pub progress_interval: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            keep_history: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl RunOptions {
    /// 从 JSON 文本加载（缺省字段取默认值）
    pub fn from_json(raw: &str) -> ImportResult<Self> {
        serde_json::from_str(raw).map_err(|e| ImportError::ConfigValueError {
            key: "run_options".to_string(),
            value: raw.to_string(),
            message: e.to_string(),
        })
    }

    pub fn dry_run(mut self, on: bool) -> Self {
        self.dry_run = on;
        self
    }

    pub fn keep_history(mut self, on: bool) -> Self {
        self.keep_history = on;
        self
    }
}
