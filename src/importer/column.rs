// ==========================================
// 记录导入引擎 - 列模型
// ==========================================
// 职责: "从行中读取一个值 + 更新策略" 的单元
// 变体:
// - PositionalColumn: 按列号读取文本行
// - ComputedColumn:   组合多个子列（计算列 / 计算字段）
// - StaticColumn:     常量值
// - FieldColumn:      按点分路径读取结构化行
// 缓存: 以 ColumnId 为键的 ValueCache，每行重置，由调用方显式传入
// ==========================================

use crate::domain::schema::{FieldSpec, FieldType};
use crate::domain::value::Value;
use crate::importer::error::{ColumnError, ImportError, ImportResult};
use crate::importer::parsers::{default_parser, Parser};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 文本行（CSV / 表格）
pub type TextRow = Vec<String>;

/// 结构化行（查询结果）
pub type StructuredRow = serde_json::Value;

/// 比较器：解析值 vs 当前值，相等返回 true
pub type Comparator = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// 导出格式化
pub type Formatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// 计算列组合函数（入参为各子列的类型化值）
pub type Combinator = Arc<dyn Fn(&[Value]) -> Result<Value, ColumnError> + Send + Sync>;

/// 结构化值解析器（字段列使用）
pub type JsonParser = Arc<dyn Fn(&serde_json::Value) -> Result<Value, ColumnError> + Send + Sync>;

// ==========================================
// ColumnId - 列标识
// ==========================================
// 构造时分配的顺序号，作为 ValueCache 的键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(u64);

static NEXT_COLUMN_ID: AtomicU64 = AtomicU64::new(1);

impl ColumnId {
    fn next() -> Self {
        ColumnId(NEXT_COLUMN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// ==========================================
// ValueCache - 单行提取结果缓存
// ==========================================
#[derive(Debug, Default)]
pub struct ValueCache {
    values: HashMap<ColumnId, Value>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ColumnId) -> Option<&Value> {
        self.values.get(&id)
    }

    pub fn insert(&mut self, id: ColumnId, value: Value) {
        self.values.insert(id, value);
    }

    pub fn contains(&self, id: ColumnId) -> bool {
        self.values.contains_key(&id)
    }

    /// 每行开始前调用
    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ==========================================
// ColumnPolicy - 更新策略
// ==========================================
#[derive(Clone)]
pub struct ColumnPolicy {
    /// 解析失败时告警（否则静默跳过）
    pub warn_on_error: bool,
    /// 解析值为空时告警
    pub warn_if_empty: bool,
    /// false: 仅新建时使用该列
    pub should_update: bool,
    /// true: 仅当当前值为 null 时更新
    pub should_update_only_if_null: bool,
    /// 变更时记录历史
    pub keep_history: bool,
    pub comparator: Option<Comparator>,
    pub formatter: Option<Formatter>,
    pub header: Option<String>,
}

impl Default for ColumnPolicy {
    fn default() -> Self {
        Self {
            warn_on_error: true,
            warn_if_empty: false,
            should_update: true,
            should_update_only_if_null: false,
            keep_history: false,
            comparator: None,
            formatter: None,
            header: None,
        }
    }
}

impl fmt::Debug for ColumnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnPolicy")
            .field("warn_on_error", &self.warn_on_error)
            .field("warn_if_empty", &self.warn_if_empty)
            .field("should_update", &self.should_update)
            .field("should_update_only_if_null", &self.should_update_only_if_null)
            .field("keep_history", &self.keep_history)
            .field("custom_comparator", &self.comparator.is_some())
            .field("custom_formatter", &self.formatter.is_some())
            .field("header", &self.header)
            .finish()
    }
}

// ==========================================
// Extractor Trait
// ==========================================
// 用途: 列的取值方式
// 实现者: PositionalColumn, ComputedColumn, StaticColumn, FieldColumn
pub trait Extractor<R>: Send + Sync {
    /// 原始字符串值（每次重新计算，用于诊断日志）
    fn raw_values(&self, row: &R) -> Result<Vec<String>, ColumnError>;

    /// 类型化值（子列通过 cache 复用）
    fn extract(&self, row: &R, cache: &mut ValueCache) -> Result<Value, ColumnError>;

    /// 绑定到目标字段（补全默认解析器等）
    ///
    /// # 参数
    /// - name: 列名（即目标字段名）
    /// - spec: 目标表中的同名字段（不存在时为 None）
    fn bind(&mut self, name: &str, spec: Option<&FieldSpec>) -> ImportResult<()>;

    /// 是否依赖列名定位数据（匿名子列无法满足）
    fn locates_by_name(&self) -> bool {
        false
    }
}

// ==========================================
// Column - 列 = 提取器 + 策略
// ==========================================
pub struct Column<R> {
    id: ColumnId,
    name: String,
    policy: ColumnPolicy,
    extractor: Box<dyn Extractor<R>>,
}

impl<R> Column<R> {
    pub fn new(name: impl Into<String>, extractor: impl Extractor<R> + 'static) -> Self {
        Self {
            id: ColumnId::next(),
            name: name.into(),
            policy: ColumnPolicy::default(),
            extractor: Box::new(extractor),
        }
    }

    /// 创建匿名子列（计算列的输入）
    pub fn child(extractor: impl Extractor<R> + 'static) -> Self {
        Self::new(String::new(), extractor)
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &ColumnPolicy {
        &self.policy
    }

    /// 取值（命中缓存直接返回；出错不写缓存）
    pub fn get(&self, row: &R, cache: &mut ValueCache) -> Result<Value, ColumnError> {
        if let Some(value) = cache.get(self.id) {
            return Ok(value.clone());
        }
        let value = self.extractor.extract(row, cache)?;
        cache.insert(self.id, value.clone());
        Ok(value)
    }

    pub fn raw_values(&self, row: &R) -> Result<Vec<String>, ColumnError> {
        self.extractor.raw_values(row)
    }

    /// 使用比较器判断是否相等（默认 ==）
    pub fn compare(&self, parsed: &Value, current: &Value) -> bool {
        match &self.policy.comparator {
            Some(cmp) => cmp(parsed, current),
            None => parsed == current,
        }
    }

    /// 导出格式化（默认字符串化，null → 空串）
    pub fn format(&self, value: &Value) -> String {
        match &self.policy.formatter {
            Some(fmt) => fmt(value),
            None => value.to_string(),
        }
    }

    /// 导出表头（默认列名）
    pub fn header(&self) -> &str {
        self.policy.header.as_deref().unwrap_or(&self.name)
    }

    pub(crate) fn rename(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub(crate) fn bind(&mut self, spec: Option<&FieldSpec>) -> ImportResult<()> {
        self.extractor.bind(&self.name, spec)?;
        if self.policy.header.is_none() && !self.name.is_empty() {
            self.policy.header = Some(self.name.clone());
        }
        Ok(())
    }

    // ===== 策略设置（链式） =====

    pub fn warn_on_error(&mut self, on: bool) -> &mut Self {
        self.policy.warn_on_error = on;
        self
    }

    pub fn warn_if_empty(&mut self, on: bool) -> &mut Self {
        self.policy.warn_if_empty = on;
        self
    }

    pub fn should_update(&mut self, on: bool) -> &mut Self {
        self.policy.should_update = on;
        self
    }

    pub fn should_update_only_if_null(&mut self, on: bool) -> &mut Self {
        self.policy.should_update_only_if_null = on;
        self
    }

    pub fn keep_history(&mut self, on: bool) -> &mut Self {
        self.policy.keep_history = on;
        self
    }

    pub fn comparator<F>(&mut self, cmp: F) -> &mut Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.policy.comparator = Some(Arc::new(cmp));
        self
    }

    pub fn formatter<F>(&mut self, fmt: F) -> &mut Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.policy.formatter = Some(Arc::new(fmt));
        self
    }

    pub fn set_header(&mut self, header: impl Into<String>) -> &mut Self {
        self.policy.header = Some(header.into());
        self
    }
}

impl<R> fmt::Debug for Column<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish()
    }
}

// ==========================================
// PositionalColumn - 按列号读取
// ==========================================
pub struct PositionalColumn {
    index: usize,
    parser: Option<Parser>,
    fail_on_out_of_range: bool,
}

impl PositionalColumn {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            parser: None,
            fail_on_out_of_range: true,
        }
    }

    pub fn with_parser(mut self, parser: Parser) -> Self {
        self.parser = Some(parser);
        self
    }

    /// 列号越界时返回空串而不是报错
    pub fn lenient(mut self) -> Self {
        self.fail_on_out_of_range = false;
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    fn raw(&self, row: &TextRow) -> Result<String, ColumnError> {
        match row.get(self.index) {
            Some(cell) => Ok(cell.clone()),
            None if self.fail_on_out_of_range => Err(ColumnError::OutOfRange {
                index: self.index,
                len: row.len(),
            }),
            None => Ok(String::new()),
        }
    }
}

impl Extractor<TextRow> for PositionalColumn {
    fn raw_values(&self, row: &TextRow) -> Result<Vec<String>, ColumnError> {
        Ok(vec![self.raw(row)?])
    }

    fn extract(&self, row: &TextRow, _cache: &mut ValueCache) -> Result<Value, ColumnError> {
        let raw = self.raw(row)?;
        let parser = self
            .parser
            .as_ref()
            .ok_or_else(|| ColumnError::Fatal(format!("列 {} 未绑定解析器", self.index)))?;
        parser(&raw)
    }

    fn bind(&mut self, name: &str, spec: Option<&FieldSpec>) -> ImportResult<()> {
        if self.parser.is_some() {
            return Ok(());
        }
        let spec = spec.ok_or_else(|| ImportError::UnknownField(name.to_string()))?;
        let parser = default_parser(&spec.field_type).ok_or_else(|| {
            ImportError::UnsupportedFieldType {
                field: name.to_string(),
                field_type: format!("{:?}", spec.field_type),
            }
        })?;
        self.parser = Some(parser);
        Ok(())
    }
}

// ==========================================
// ComputedColumn - 组合多个子列
// ==========================================
pub struct ComputedColumn<R> {
    children: Vec<Column<R>>,
    combinator: Option<Combinator>,
}

impl<R> ComputedColumn<R> {
    pub fn new<F>(children: Vec<Column<R>>, combinator: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ColumnError> + Send + Sync + 'static,
    {
        Self {
            children,
            combinator: Some(Arc::new(combinator)),
        }
    }

    /// 未指定组合函数（绑定时报错）
    pub fn without_combinator(children: Vec<Column<R>>) -> Self {
        Self {
            children,
            combinator: None,
        }
    }

    pub fn children(&self) -> &[Column<R>] {
        &self.children
    }
}

impl<R: Send + Sync + 'static> Extractor<R> for ComputedColumn<R> {
    fn raw_values(&self, row: &R) -> Result<Vec<String>, ColumnError> {
        let mut values = Vec::new();
        for child in &self.children {
            values.extend(child.raw_values(row)?);
        }
        Ok(values)
    }

    fn extract(&self, row: &R, cache: &mut ValueCache) -> Result<Value, ColumnError> {
        let combinator = self
            .combinator
            .as_ref()
            .ok_or_else(|| ColumnError::Fatal("计算列缺少组合函数".to_string()))?;
        let values = self
            .children
            .iter()
            .map(|child| child.get(row, cache))
            .collect::<Result<Vec<_>, _>>()?;
        combinator(&values)
    }

    fn bind(&mut self, name: &str, _spec: Option<&FieldSpec>) -> ImportResult<()> {
        if self.combinator.is_none() {
            return Err(ImportError::MissingCombinator(name.to_string()));
        }
        for (idx, child) in self.children.iter_mut().enumerate() {
            if child.name().is_empty() {
                let child_name = format!("{}[{}]", name, idx);
                if child.extractor.locates_by_name() {
                    return Err(ImportError::MissingFieldPath(child_name));
                }
                child.rename(&child_name);
            }
            // 子列不对应目标字段，必须显式提供解析器
            match child.extractor.bind(&child.name, None) {
                Err(ImportError::UnknownField(_)) => {
                    return Err(ImportError::MissingParser(child.name.clone()))
                }
                other => other?,
            }
        }
        Ok(())
    }
}

// ==========================================
// StaticColumn - 常量列
// ==========================================
pub struct StaticColumn {
    value: Value,
}

impl StaticColumn {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl<R> Extractor<R> for StaticColumn {
    fn raw_values(&self, _row: &R) -> Result<Vec<String>, ColumnError> {
        Ok(vec![self.value.to_string()])
    }

    fn extract(&self, _row: &R, _cache: &mut ValueCache) -> Result<Value, ColumnError> {
        Ok(self.value.clone())
    }

    fn bind(&mut self, _name: &str, _spec: Option<&FieldSpec>) -> ImportResult<()> {
        Ok(())
    }
}

// ==========================================
// FieldColumn - 按点分路径读取结构化行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// "a.b.c" → [a, b, c]
    pub fn parse(dotted: &str) -> Self {
        FieldPath(dotted.split('.').map(str::to_string).collect())
    }

    pub fn steps(&self) -> &[String] {
        &self.0
    }

    /// 逐级访问；遇到 null 中间值立即返回 None
    fn resolve<'a>(&self, row: &'a serde_json::Value) -> Result<Option<&'a serde_json::Value>, ColumnError> {
        let mut current = row;
        for step in &self.0 {
            if current.is_null() {
                return Ok(None);
            }
            current = current
                .as_object()
                .and_then(|map| map.get(step))
                .ok_or_else(|| ColumnError::MissingAttribute(step.clone()))?;
        }
        if current.is_null() {
            Ok(None)
        } else {
            Ok(Some(current))
        }
    }
}

pub struct FieldColumn {
    path: Option<FieldPath>,
    parser: Option<JsonParser>,
}

impl FieldColumn {
    /// 路径默认取列名
    pub fn new() -> Self {
        Self {
            path: None,
            parser: None,
        }
    }

    pub fn at(dotted: &str) -> Self {
        Self {
            path: Some(FieldPath::parse(dotted)),
            parser: None,
        }
    }

    pub fn with_parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(&serde_json::Value) -> Result<Value, ColumnError> + Send + Sync + 'static,
    {
        self.parser = Some(Arc::new(parser));
        self
    }

    pub fn path(&self) -> Option<&FieldPath> {
        self.path.as_ref()
    }

    fn resolve<'a>(&self, row: &'a StructuredRow) -> Result<Option<&'a serde_json::Value>, ColumnError> {
        match &self.path {
            Some(path) => path.resolve(row),
            None => Err(ColumnError::Fatal("字段列未绑定路径".to_string())),
        }
    }
}

impl Default for FieldColumn {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor<StructuredRow> for FieldColumn {
    fn raw_values(&self, row: &StructuredRow) -> Result<Vec<String>, ColumnError> {
        let raw = match self.resolve(row)? {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Ok(vec![raw])
    }

    fn extract(&self, row: &StructuredRow, _cache: &mut ValueCache) -> Result<Value, ColumnError> {
        let null = serde_json::Value::Null;
        let resolved = self.resolve(row)?.unwrap_or(&null);
        match &self.parser {
            Some(parser) => parser(resolved),
            None => Ok(Value::from_json(resolved)),
        }
    }

    fn bind(&mut self, name: &str, spec: Option<&FieldSpec>) -> ImportResult<()> {
        if self.path.is_none() {
            self.path = Some(FieldPath::parse(name));
        }
        if self.parser.is_none() {
            if let Some(spec) = spec {
                let field_type = spec.field_type.clone();
                self.parser = Some(Arc::new(move |json| coerce_json(json, &field_type)));
            }
        }
        Ok(())
    }

    fn locates_by_name(&self) -> bool {
        self.path.is_none()
    }
}

/// 结构化值按目标字段类型归一（字符串走默认解析器）
fn coerce_json(json: &serde_json::Value, field_type: &FieldType) -> Result<Value, ColumnError> {
    match (json, field_type) {
        (serde_json::Value::Null, _) => Ok(Value::Null),
        (serde_json::Value::String(s), FieldType::Text { .. }) => Ok(Value::Text(s.clone())),
        (serde_json::Value::String(s), FieldType::Other(_)) => Ok(Value::Text(s.clone())),
        (serde_json::Value::String(s), other) => match default_parser(other) {
            Some(parser) => parser(s),
            None => Ok(Value::Text(s.clone())),
        },
        (serde_json::Value::Number(n), FieldType::Int) => Ok(match n.as_i64() {
            Some(i) => Value::Int(i),
            // 1.0 与整型主键 1 视为同一值
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Value::Int(f as i64),
                Some(f) => Value::Float(f),
                None => Value::Null,
            },
        }),
        (serde_json::Value::Number(n), FieldType::Numeric) => {
            Ok(n.as_f64().map(Value::Float).unwrap_or(Value::Null))
        }
        (serde_json::Value::Number(n), FieldType::Bool) => {
            Ok(Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false)))
        }
        _ => Ok(Value::from_json(json)),
    }
}
