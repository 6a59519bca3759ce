// ==========================================
// 记录导入引擎 - 变更历史
// ==========================================
// 职责: 记录一次导入中对已有记录的字段变更（旧值/新值）
// 说明: 每条被更新的记录每次导入最多一条历史；新建记录不产生历史
// ==========================================

use crate::domain::value::Value;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 单个字段的变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Value,
    pub new_value: Value,
}

// ==========================================
// HistoryEntry - 历史记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// 被更新记录的主键值
    pub record_key: Value,
    pub changes: Vec<FieldChange>,
    /// 应用阶段结束时打上的时间戳
    pub recorded_at: Option<NaiveDateTime>,
}

impl HistoryEntry {
    pub fn new(record_key: Value) -> Self {
        Self {
            record_key,
            changes: Vec::new(),
            recorded_at: None,
        }
    }

    pub fn record_change(&mut self, field: &str, old_value: Value, new_value: Value) {
        self.changes.push(FieldChange {
            field: field.to_string(),
            old_value,
            new_value,
        });
    }

    pub fn stamp(&mut self, at: NaiveDateTime) {
        self.recorded_at = Some(at);
    }

    /// 查找某字段的变更
    pub fn change_for(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }
}
