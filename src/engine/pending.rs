// ==========================================
// 记录导入引擎 - 待应用变更集合
// ==========================================
// 职责: 匹配阶段按记录暂存字段变更，应用阶段按暂存顺序取出
// 不变量: 撤销导致字段集合为空时，整条记录的暂存被移除
// ==========================================

use crate::domain::value::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ==========================================
// StagedFields - 单条记录的暂存字段（保持暂存顺序）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedFields {
    fields: Vec<(String, Value)>,
}

impl StagedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// 暂存（已存在则原位覆盖）
    pub fn set(&mut self, field: &str, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((field.to_string(), value)),
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(name, _)| name == field)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 按字段名排序的副本（便于断言）
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.fields.iter().cloned().collect()
    }
}

// ==========================================
// PendingUpdate - 单条记录的暂存
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingUpdate {
    pub fields: StagedFields,
    /// 需要记录历史的字段
    pub history_fields: BTreeSet<String>,
    /// 是否为本次新建的记录
    pub creating: bool,
}

// ==========================================
// PendingUpdates - 工作集下标 → 暂存
// ==========================================
#[derive(Debug, Default)]
pub struct PendingUpdates {
    entries: HashMap<usize, PendingUpdate>,
    order: Vec<usize>,
}

impl PendingUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始一条记录的暂存（已存在则不变）
    pub fn begin(&mut self, idx: usize, creating: bool) {
        if !self.entries.contains_key(&idx) {
            self.entries.insert(
                idx,
                PendingUpdate {
                    creating,
                    ..Default::default()
                },
            );
            self.order.push(idx);
        }
    }

    /// 暂存字段值；keep_history 仅追加历史标记，不会清除
    pub fn stage(&mut self, idx: usize, field: &str, value: Value, keep_history: bool) {
        self.begin(idx, false);
        if let Some(entry) = self.entries.get_mut(&idx) {
            entry.fields.set(field, value);
            if keep_history {
                entry.history_fields.insert(field.to_string());
            }
        }
    }

    /// 撤销字段暂存（移除的是最后一个字段时丢弃整条记录）
    pub fn cancel(&mut self, idx: usize, field: &str) {
        let emptied = match self.entries.get_mut(&idx) {
            Some(entry) => {
                entry.history_fields.remove(field);
                entry.fields.remove(field).is_some() && entry.fields.is_empty()
            }
            None => false,
        };
        if emptied {
            self.discard(idx);
        }
    }

    /// 丢弃整条记录的暂存
    pub fn discard(&mut self, idx: usize) {
        if self.entries.remove(&idx).is_some() {
            self.order.retain(|&i| i != idx);
        }
    }

    pub fn get(&self, idx: usize) -> Option<&PendingUpdate> {
        self.entries.get(&idx)
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.entries.contains_key(&idx)
    }

    pub fn staged_value(&self, idx: usize, field: &str) -> Option<&Value> {
        self.entries.get(&idx).and_then(|entry| entry.fields.get(field))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按暂存顺序取出全部记录
    pub fn drain_in_order(&mut self) -> Vec<(usize, PendingUpdate)> {
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .filter_map(|idx| self.entries.remove(&idx).map(|entry| (idx, entry)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_and_cancel_removes_empty_entry() {
        let mut pending = PendingUpdates::new();
        pending.stage(0, "col1", Value::from("P"), true);
        assert_eq!(pending.staged_value(0, "col1"), Some(&Value::from("P")));
        assert!(pending.get(0).unwrap().history_fields.contains("col1"));

        pending.cancel(0, "col1");
        assert!(!pending.contains(0));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_cancel_keeps_other_fields() {
        let mut pending = PendingUpdates::new();
        pending.stage(3, "a", Value::Int(1), false);
        pending.stage(3, "b", Value::Int(2), true);
        pending.cancel(3, "b");

        let entry = pending.get(3).unwrap();
        assert_eq!(entry.fields.names(), vec!["a".to_string()]);
        assert!(entry.history_fields.is_empty());
    }

    #[test]
    fn test_cancel_missing_is_noop() {
        let mut pending = PendingUpdates::new();
        pending.cancel(9, "a");
        pending.begin(1, true);
        pending.cancel(1, "a");
        // 新建记录的空暂存在撤销不存在的字段时不受影响
        assert!(pending.contains(1));
    }

    #[test]
    fn test_begin_keeps_creating_flag() {
        let mut pending = PendingUpdates::new();
        pending.begin(2, true);
        pending.stage(2, "id", Value::Int(2), false);
        assert!(pending.get(2).unwrap().creating);
    }

    #[test]
    fn test_drain_follows_staging_order() {
        let mut pending = PendingUpdates::new();
        pending.stage(5, "a", Value::Int(1), false);
        pending.stage(1, "a", Value::Int(1), false);
        pending.stage(3, "a", Value::Int(1), false);
        pending.discard(1);
        pending.stage(1, "a", Value::Int(2), false);
        pending.stage(5, "b", Value::Int(2), false);

        let order: Vec<usize> = pending.drain_in_order().into_iter().map(|(i, _)| i).collect();
        assert_eq!(order, vec![5, 3, 1]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_staged_fields_overwrite_in_place() {
        let mut fields = StagedFields::new();
        fields.set("x", Value::Int(1));
        fields.set("y", Value::Int(2));
        fields.set("x", Value::Int(3));
        assert_eq!(fields.names(), vec!["x".to_string(), "y".to_string()]);
        assert_eq!(fields.get("x"), Some(&Value::Int(3)));
        assert_eq!(fields.remove("y"), Some(Value::Int(2)));
        assert_eq!(fields.len(), 1);
    }
}
