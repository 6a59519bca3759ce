// ==========================================
// 记录导入引擎 - 目标表结构元数据
// ==========================================
// 职责: 描述目标表每个字段的类型标签/可空/默认值/主键
// 用途: Mapping 绑定时推断默认解析器；引擎计算必填字段集合
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// FieldType - 字段类型标签
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldType {
    Bool,
    Int,
    Numeric,
    /// 字符串（可选长度上限）
    Text { max_len: Option<usize> },
    Date,
    DateTime,
    Time,
    /// 不支持的类型（保留声明原文，绑定时需显式解析器）
    Other(String),
}

impl FieldType {
    /// 从 SQLite 声明类型推断类型标签
    ///
    /// # 示例
    /// - "VARCHAR(10)" → Text { max_len: Some(10) }
    /// - "DATETIME" → DateTime
    /// - "BLOB" → Other("BLOB")
    pub fn from_declared(declared: &str) -> FieldType {
        let upper = declared.trim().to_uppercase();

        // DATETIME/TIMESTAMP 需先于 DATE/TIME 判断
        if upper.contains("DATETIME") || upper.contains("TIMESTAMP") {
            return FieldType::DateTime;
        }
        if upper.contains("DATE") {
            return FieldType::Date;
        }
        if upper.contains("TIME") {
            return FieldType::Time;
        }
        if upper.contains("BOOL") {
            return FieldType::Bool;
        }
        if upper.contains("INT") {
            return FieldType::Int;
        }
        if upper.contains("CHAR") || upper.contains("TEXT") || upper.contains("CLOB") {
            return FieldType::Text {
                max_len: parse_length(&upper),
            };
        }
        if upper.contains("REAL")
            || upper.contains("FLOA")
            || upper.contains("DOUB")
            || upper.contains("NUMERIC")
            || upper.contains("DECIMAL")
        {
            return FieldType::Numeric;
        }

        FieldType::Other(declared.trim().to_string())
    }
}

/// 解析 "VARCHAR(10)" 中的长度
fn parse_length(declared: &str) -> Option<usize> {
    let start = declared.find('(')?;
    let end = declared[start..].find(')')? + start;
    declared[start + 1..end]
        .split(',')
        .next()
        .and_then(|s| s.trim().parse().ok())
}

// ==========================================
// FieldSpec - 单个字段的元数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub has_default: bool,
    pub primary_key: bool,
}

impl FieldSpec {
    /// 创建可空、无默认值、非主键的字段
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
            has_default: false,
            primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// 是否为必填字段（导入后必须非空）
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.primary_key && !self.has_default
    }
}

// ==========================================
// Schema - 目标表结构
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub table: String,
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(table: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            table: table.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// 必填字段名列表（非空、非主键、无默认值）
    pub fn required_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.is_required())
            .map(|f| f.name.clone())
            .collect()
    }

    /// 主键字段名（无主键时返回 None）
    pub fn primary_key(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.primary_key)
            .map(|f| f.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_declared() {
        assert_eq!(FieldType::from_declared("INTEGER"), FieldType::Int);
        assert_eq!(
            FieldType::from_declared("varchar(10)"),
            FieldType::Text { max_len: Some(10) }
        );
        assert_eq!(FieldType::from_declared("TEXT"), FieldType::Text { max_len: None });
        assert_eq!(FieldType::from_declared("DATETIME"), FieldType::DateTime);
        assert_eq!(FieldType::from_declared("TIMESTAMP"), FieldType::DateTime);
        assert_eq!(FieldType::from_declared("DATE"), FieldType::Date);
        assert_eq!(FieldType::from_declared("TIME"), FieldType::Time);
        assert_eq!(FieldType::from_declared("BOOLEAN"), FieldType::Bool);
        assert_eq!(FieldType::from_declared("DECIMAL(10,2)"), FieldType::Numeric);
        assert_eq!(FieldType::from_declared("REAL"), FieldType::Numeric);
        assert_eq!(
            FieldType::from_declared("BLOB"),
            FieldType::Other("BLOB".to_string())
        );
    }

    #[test]
    fn test_required_fields() {
        let schema = Schema::new(
            "items",
            vec![
                FieldSpec::new("id", FieldType::Int).primary_key(),
                FieldSpec::new("code", FieldType::Text { max_len: Some(1) }).not_null(),
                FieldSpec::new("status", FieldType::Int).not_null().with_default(),
                FieldSpec::new("note", FieldType::Text { max_len: None }),
            ],
        );

        assert_eq!(schema.required_fields(), vec!["code".to_string()]);
        assert_eq!(schema.primary_key(), Some("id"));
        assert!(schema.field("note").is_some());
        assert!(schema.field("missing").is_none());
    }
}
