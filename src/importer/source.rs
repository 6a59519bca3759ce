// ==========================================
// 记录导入引擎 - 数据源
// ==========================================
// 职责: 一个数据来源 + 列映射 + 行级过滤/否决钩子 + 导入模式
// 实现者: RowSource<Rec, P>（CSV / 查询结果 / 表格）或调用方自定义
// ==========================================

use crate::domain::record::Record;
use crate::engine::pending::StagedFields;
use crate::importer::error::ImportResult;
use crate::importer::mapping::Mapping;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 行迭代器（逐行产出，读取失败为致命错误）
pub type RowIter<Row> = Box<dyn Iterator<Item = ImportResult<Row>> + Send>;

// ==========================================
// ImportMode - 导入模式
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportMode {
    /// 仅新建
    Create,
    /// 仅更新
    Update,
    /// 新建 + 更新
    #[default]
    CreateAndUpdate,
}

impl ImportMode {
    pub fn allows_create(self) -> bool {
        matches!(self, ImportMode::Create | ImportMode::CreateAndUpdate)
    }

    pub fn allows_update(self) -> bool {
        matches!(self, ImportMode::Update | ImportMode::CreateAndUpdate)
    }
}

// ==========================================
// ImportSource Trait
// ==========================================
// 用途: 引擎按声明顺序逐个处理数据源
pub trait ImportSource<Rec: Record>: Send {
    type Row: Send + 'static;

    /// 数据源名称（日志 span 与报告使用）
    fn name(&self) -> &str;

    fn mapping(&self) -> &Mapping<Self::Row>;

    fn mapping_mut(&mut self) -> &mut Mapping<Self::Row>;

    fn mode(&self) -> ImportMode {
        ImportMode::CreateAndUpdate
    }

    /// 打开数据源，产出行序列（含表头行，由引擎按映射跳过）
    fn rows(&mut self) -> ImportResult<RowIter<Self::Row>>;

    /// 提取前过滤（false → 计入 ignored）
    fn should_import(&self, _row: &Self::Row) -> bool {
        true
    }

    /// 对完整暂存集合的否决（false → 丢弃该记录全部暂存，计入 rejected）
    fn validate_updates(
        &self,
        _record: &Rec,
        _row: &Self::Row,
        _updates: &StagedFields,
        _creating: bool,
    ) -> ImportResult<bool> {
        Ok(true)
    }

    /// 本数据源未匹配到的已有记录（每条调用一次）
    fn on_data_not_found(&mut self, _record: &Rec) -> ImportResult<()> {
        Ok(())
    }
}

// ==========================================
// RowProvider Trait
// ==========================================
// 用途: 内置数据源的"行来源"部分
// 实现者: CsvFile, QueryRows, SpreadsheetFile
pub trait RowProvider: Send {
    type Row: Send + 'static;

    /// 默认数据源名称
    fn describe(&self) -> String;

    fn open(&mut self) -> ImportResult<RowIter<Self::Row>>;
}

type ShouldImportFn<Row> = Arc<dyn Fn(&Row) -> bool + Send + Sync>;
type ValidateFn<Rec, Row> =
    Arc<dyn Fn(&Rec, &Row, &StagedFields, bool) -> ImportResult<bool> + Send + Sync>;
type NotFoundFn<Rec> = Box<dyn FnMut(&Rec) -> ImportResult<()> + Send>;

// ==========================================
// RowSource - 内置数据源（行来源 + 映射 + 钩子）
// ==========================================
pub struct RowSource<Rec, P: RowProvider> {
    name: String,
    mode: ImportMode,
    mapping: Mapping<P::Row>,
    provider: P,
    should_import: Option<ShouldImportFn<P::Row>>,
    validate_updates: Option<ValidateFn<Rec, P::Row>>,
    on_data_not_found: Option<NotFoundFn<Rec>>,
}

impl<Rec: Record, P: RowProvider> RowSource<Rec, P> {
    pub fn from_provider(provider: P, mapping: Mapping<P::Row>) -> Self {
        Self {
            name: provider.describe(),
            mode: ImportMode::default(),
            mapping,
            provider,
            should_import: None,
            validate_updates: None,
            on_data_not_found: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_mode(mut self, mode: ImportMode) -> Self {
        self.mode = mode;
        self
    }

    /// 行过滤钩子
    pub fn filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&P::Row) -> bool + Send + Sync + 'static,
    {
        self.should_import = Some(Arc::new(f));
        self
    }

    /// 暂存集合否决钩子
    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Rec, &P::Row, &StagedFields, bool) -> ImportResult<bool> + Send + Sync + 'static,
    {
        self.validate_updates = Some(Arc::new(f));
        self
    }

    /// 未匹配记录回调
    pub fn on_not_found<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Rec) -> ImportResult<()> + Send + 'static,
    {
        self.on_data_not_found = Some(Box::new(f));
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub(crate) fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }
}

impl<Rec: Record, P: RowProvider> ImportSource<Rec> for RowSource<Rec, P> {
    type Row = P::Row;

    fn name(&self) -> &str {
        &self.name
    }

    fn mapping(&self) -> &Mapping<P::Row> {
        &self.mapping
    }

    fn mapping_mut(&mut self) -> &mut Mapping<P::Row> {
        &mut self.mapping
    }

    fn mode(&self) -> ImportMode {
        self.mode
    }

    fn rows(&mut self) -> ImportResult<RowIter<P::Row>> {
        self.provider.open()
    }

    fn should_import(&self, row: &P::Row) -> bool {
        self.should_import.as_ref().map_or(true, |f| f(row))
    }

    fn validate_updates(
        &self,
        record: &Rec,
        row: &P::Row,
        updates: &StagedFields,
        creating: bool,
    ) -> ImportResult<bool> {
        match &self.validate_updates {
            Some(f) => f(record, row, updates, creating),
            None => Ok(true),
        }
    }

    fn on_data_not_found(&mut self, record: &Rec) -> ImportResult<()> {
        match self.on_data_not_found.as_mut() {
            Some(f) => f(record),
            None => Ok(()),
        }
    }
}
