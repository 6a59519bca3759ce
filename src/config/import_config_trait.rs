// ==========================================
// 记录导入引擎 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入运行所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::config_manager::config_keys;
use crate::config::RunOptions;
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use std::str::FromStr;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入引擎所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 读取单个配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    async fn get_config_value(&self, key: &str) -> ImportResult<Option<String>>;

    /// 组装运行选项（缺失的键取默认值）
    ///
    /// # 默认值
    /// - import/dry_run = false
    /// - import/keep_history = false
    /// - import/progress_interval = 1000
    async fn load_run_options(&self) -> ImportResult<RunOptions> {
        let defaults = RunOptions::default();
        Ok(RunOptions {
            dry_run: read_parsed(self, config_keys::DRY_RUN)
                .await?
                .unwrap_or(defaults.dry_run),
            keep_history: read_parsed(self, config_keys::KEEP_HISTORY)
                .await?
                .unwrap_or(defaults.keep_history),
            progress_interval: read_parsed(self, config_keys::PROGRESS_INTERVAL)
                .await?
                .unwrap_or(defaults.progress_interval),
        })
    }
}

/// 读取并解析配置值
async fn read_parsed<C, T>(reader: &C, key: &str) -> ImportResult<Option<T>>
where
    C: ImportConfigReader + ?Sized,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match reader.get_config_value(key).await? {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ImportError::ConfigValueError {
                key: key.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}
