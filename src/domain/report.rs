// ==========================================
// 记录导入引擎 - 导入报告
// ==========================================
// 职责: 汇总单次导入的计数器（按数据源 + 全局）与钩子输出
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 钩子输出（任意有价值的计数信息）
pub type HookOutput = BTreeMap<String, i64>;

// ==========================================
// SourceStats - 单个数据源的计数
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    pub name: String,
    /// 通过主键/模式检查并完成字段比对的行数
    pub read: usize,
    /// should_import 否决的行数
    pub ignored: usize,
    pub ignored_missing_key: usize,
    pub ignored_not_created: usize,
    pub ignored_not_updated: usize,
    /// validate_updates 否决的行数
    pub rejected: usize,
    /// 本数据源未匹配到的已有记录数
    pub not_found: usize,
}

impl SourceStats {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

// ==========================================
// ImportReport - 导入报告
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: String,
    pub dry_run: bool,
    pub sources: Vec<SourceStats>,
    pub created: usize,
    pub updated: usize,
    pub history_created: usize,
    /// 应用阶段引擎级校验否决的记录数
    pub rejected: usize,
    pub preprocess: HookOutput,
    pub postprocess: HookOutput,
    pub precommit: HookOutput,
    pub postcommit: HookOutput,
    pub elapsed_ms: u64,
}

impl ImportReport {
    pub fn new(run_id: impl Into<String>, dry_run: bool) -> Self {
        Self {
            run_id: run_id.into(),
            dry_run,
            ..Default::default()
        }
    }

    /// 按名称查找数据源计数
    pub fn source(&self, name: &str) -> Option<&SourceStats> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// 是否有任何落库变更
    pub fn has_changes(&self) -> bool {
        self.created > 0 || self.updated > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_counters() {
        let mut report = ImportReport::new("run-1", true);
        report.sources.push(SourceStats::new("csv"));
        report.created = 2;

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["created"], 2);
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["sources"][0]["name"], "csv");
        assert!(report.has_changes());
        assert!(report.source("csv").is_some());
    }
}
