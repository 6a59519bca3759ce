// ==========================================
// 记录导入引擎 - 目标记录
// ==========================================
// 职责: 目标记录的字段读写接口 + 通用实现 DataRecord
// ==========================================

use crate::domain::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// Record Trait
// ==========================================
// 用途: 引擎按字段名读取/写入目标记录
// 实现者: DataRecord（或调用方自定义结构体）
pub trait Record: Clone + Send + Sync + 'static {
    /// 读取字段值（未设置的字段返回 Value::Null）
    fn get(&self, field: &str) -> Value;

    /// 写入字段值
    fn set(&mut self, field: &str, value: Value);
}

// ==========================================
// DataRecord - 按字段名存储的通用记录
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    fields: BTreeMap<String, Value>,
}

impl DataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式设置字段（构造测试数据/初始记录）
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}

impl Record for DataRecord {
    fn get(&self, field: &str) -> Value {
        self.fields.get(field).cloned().unwrap_or_default()
    }

    fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }
}

impl From<BTreeMap<String, Value>> for DataRecord {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_field_is_null() {
        let record = DataRecord::new().with("id", 1);
        assert_eq!(record.get("id"), Value::Int(1));
        assert_eq!(record.get("missing"), Value::Null);
    }

    #[test]
    fn test_set_overwrites() {
        let mut record = DataRecord::new().with("col1", "X");
        record.set("col1", Value::from("Z"));
        assert_eq!(record.get("col1"), Value::from("Z"));
        assert_eq!(record.fields().len(), 1);
    }
}
