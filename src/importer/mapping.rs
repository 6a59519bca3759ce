// ==========================================
// 记录导入引擎 - 列映射
// ==========================================
// 职责: 按名称登记列，绑定到目标表结构，定位主键列
// 绑定规则:
// - 未显式指定解析器的列按同名字段的类型标签查表
// - 找不到主键列 / 计算列缺组合函数 / 类型不支持 → 致命错误
// ==========================================

use crate::domain::record::Record;
use crate::domain::schema::Schema;
use crate::domain::value::Value;
use crate::importer::column::{
    Column, ComputedColumn, Extractor, FieldColumn, PositionalColumn, StaticColumn, StructuredRow,
    TextRow, ValueCache,
};
use crate::importer::column_letters::column_index;
use crate::importer::error::{ColumnError, ImportError, ImportResult};
use crate::importer::parsers::Parser;
use std::sync::Arc;
use tracing::debug;

/// 主键归一函数（作用于已存记录的主键值与解析出的主键值）
pub type KeyNormalizer = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// 默认主键字段名
pub const DEFAULT_KEY_FIELD: &str = "id";

/// 列引用：列字母（"A"/"AG"）或列号（从 0 开始）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    Letters(String),
    Index(usize),
}

impl From<&str> for ColumnRef {
    fn from(letters: &str) -> Self {
        ColumnRef::Letters(letters.to_string())
    }
}

impl From<usize> for ColumnRef {
    fn from(index: usize) -> Self {
        ColumnRef::Index(index)
    }
}

impl ColumnRef {
    fn resolve(&self) -> ImportResult<usize> {
        match self {
            ColumnRef::Index(idx) => Ok(*idx),
            ColumnRef::Letters(letters) => {
                column_index(letters).ok_or_else(|| ImportError::InvalidColumnRef(letters.clone()))
            }
        }
    }
}

// ==========================================
// Mapping - 列映射
// ==========================================
pub struct Mapping<R> {
    columns: Vec<Column<R>>,
    next_index: usize,
    key_field: String,
    key_normalizer: Option<KeyNormalizer>,
    /// 跳过 line_idx <= header_line_number 的行；-1 表示不跳过
    header_line_number: i64,
    key_index: Option<usize>,
}

impl<R> Default for Mapping<R> {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            next_index: 0,
            key_field: DEFAULT_KEY_FIELD.to_string(),
            key_normalizer: None,
            header_line_number: 0,
            key_index: None,
        }
    }
}

impl<R> Mapping<R> {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== 配置覆盖 =====

    pub fn set_key_field(&mut self, name: impl Into<String>) -> &mut Self {
        self.key_field = name.into();
        self
    }

    pub fn set_key_normalizer<F>(&mut self, normalizer: F) -> &mut Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.key_normalizer = Some(Arc::new(normalizer));
        self
    }

    pub fn set_header_line_number(&mut self, n: i64) -> &mut Self {
        self.header_line_number = n;
        self
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn header_line_number(&self) -> i64 {
        self.header_line_number
    }

    /// 该行是否属于表头（需跳过）
    pub fn is_header_line(&self, line_idx: usize) -> bool {
        (line_idx as i64) <= self.header_line_number
    }

    // ===== 登记 =====

    /// 登记列（同名列被替换，保留原位置）
    pub fn register(
        &mut self,
        name: impl Into<String>,
        extractor: impl Extractor<R> + 'static,
    ) -> &mut Column<R> {
        let column = Column::new(name, extractor);
        let existing = self.columns.iter().position(|c| c.name() == column.name());
        let idx = match existing {
            Some(idx) => {
                self.columns[idx] = column;
                idx
            }
            None => {
                self.columns.push(column);
                self.columns.len() - 1
            }
        };
        self.key_index = None;
        &mut self.columns[idx]
    }

    /// 常量列
    pub fn static_value(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Column<R> {
        self.register(name, StaticColumn::new(value))
    }

    /// 计算列（组合多个子列）
    pub fn computed<F>(
        &mut self,
        name: impl Into<String>,
        children: Vec<Column<R>>,
        combinator: F,
    ) -> &mut Column<R>
    where
        R: Send + Sync + 'static,
        F: Fn(&[Value]) -> Result<Value, ColumnError> + Send + Sync + 'static,
    {
        self.register(name, ComputedColumn::new(children, combinator))
    }

    // ===== 查询 =====

    pub fn columns(&self) -> &[Column<R>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column<R>> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column<R>> {
        self.columns.iter_mut().find(|c| c.name() == name)
    }

    /// 已绑定的主键列
    pub fn key_column(&self) -> Option<&Column<R>> {
        self.key_index.and_then(|idx| self.columns.get(idx))
    }

    // ===== 绑定 =====

    /// 绑定到目标表结构
    ///
    /// # 返回
    /// - Ok(usize): 主键列在 columns() 中的下标
    /// - Err: 类型不支持 / 计算列缺组合函数 / 找不到主键列
    pub fn bind(&mut self, schema: &Schema) -> ImportResult<usize> {
        for column in self.columns.iter_mut() {
            let spec = schema.field(column.name());
            column.bind(spec)?;
        }

        let key_index = self
            .columns
            .iter()
            .position(|c| c.name() == self.key_field)
            .ok_or_else(|| ImportError::KeyColumnNotFound(self.key_field.clone()))?;
        self.key_index = Some(key_index);

        debug!(
            table = %schema.table,
            columns = self.columns.len(),
            key_field = %self.key_field,
            "映射绑定完成"
        );
        Ok(key_index)
    }

    /// 主键归一（null 保持 null）
    pub fn normalize_key(&self, value: Value) -> Value {
        match (&self.key_normalizer, value.is_null()) {
            (Some(normalizer), false) => normalizer(&value),
            _ => value,
        }
    }

    /// 提取当前行的主键（已归一）
    pub fn extract_key(&self, row: &R, cache: &mut ValueCache) -> ImportResult<Result<Value, ColumnError>> {
        let key_column = self
            .key_column()
            .ok_or_else(|| ImportError::KeyColumnNotFound(self.key_field.clone()))?;
        Ok(key_column
            .get(row, cache)
            .map(|value| self.normalize_key(value)))
    }

    // ===== 导出 =====

    /// 导出表头
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header().to_string()).collect()
    }

    /// 按列顺序格式化一条记录
    pub fn format_record<Rec: Record>(&self, record: &Rec) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.format(&record.get(c.name())))
            .collect()
    }
}

// ==========================================
// 文本行映射（CSV / 表格）
// ==========================================
impl Mapping<TextRow> {
    /// 登记下一个可用列号的位置列
    pub fn auto(&mut self, name: impl Into<String>) -> &mut Column<TextRow> {
        let idx = self.next_index;
        self.next_index += 1;
        self.register(name, PositionalColumn::new(idx))
    }

    /// 同 auto，显式指定解析器
    pub fn auto_with(&mut self, name: impl Into<String>, parser: Parser) -> &mut Column<TextRow> {
        let idx = self.next_index;
        self.next_index += 1;
        self.register(name, PositionalColumn::new(idx).with_parser(parser))
    }

    /// 登记指定列字母/列号的位置列，并重置下一个可用列号
    pub fn col(
        &mut self,
        name: impl Into<String>,
        position: impl Into<ColumnRef>,
    ) -> ImportResult<&mut Column<TextRow>> {
        let idx = position.into().resolve()?;
        self.next_index = idx + 1;
        Ok(self.register(name, PositionalColumn::new(idx)))
    }
}

// ==========================================
// 结构化行映射（查询结果）
// ==========================================
impl Mapping<StructuredRow> {
    /// 同名字段
    pub fn field(&mut self, name: impl Into<String>) -> &mut Column<StructuredRow> {
        self.register(name, FieldColumn::new())
    }

    /// 点分路径字段
    pub fn field_path(&mut self, name: impl Into<String>, dotted: &str) -> &mut Column<StructuredRow> {
        self.register(name, FieldColumn::at(dotted))
    }

    /// 计算字段（子列为字段列）
    pub fn computed_field<F>(
        &mut self,
        name: impl Into<String>,
        children: Vec<Column<StructuredRow>>,
        combinator: F,
    ) -> &mut Column<StructuredRow>
    where
        F: Fn(&[Value]) -> Result<Value, ColumnError> + Send + Sync + 'static,
    {
        self.computed(name, children, combinator)
    }
}
