// ==========================================
// 记录导入引擎 - 导入对账引擎
// ==========================================
// 职责: 加载现有记录 → 按顺序逐个数据源匹配/比对/暂存 → 应用 → 单次提交
// 红线: 匹配阶段只读记录，所有写入发生在应用阶段
// 红线: 非试运行时 commit 恰好调用一次；任何致命错误均在提交前返回
// ==========================================

use crate::config::RunOptions;
use crate::domain::history::HistoryEntry;
use crate::domain::record::Record;
use crate::domain::report::{HookOutput, ImportReport, SourceStats};
use crate::domain::schema::Schema;
use crate::domain::value::Value;
use crate::engine::pending::{PendingUpdates, StagedFields};
use crate::engine::runner::TaskRunner;
use crate::importer::column::ValueCache;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::mapping::DEFAULT_KEY_FIELD;
use crate::importer::source::ImportSource;
use crate::repository::record_store::{CommitBatch, RecordStore, RecordUpdate};
use chrono::Local;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// RequiredFields - 导入后必须非空的字段
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    /// 非空、非主键、无默认值的字段
    pub fn from_schema(schema: &Schema) -> Self {
        Self {
            fields: schema.required_fields(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.fields
    }

    /// 第一个应用后仍为空的必填字段（暂存值优先，否则取当前值）
    pub fn first_missing<R: Record>(&self, record: &R, updates: &StagedFields) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| {
                updates
                    .get(field)
                    .cloned()
                    .unwrap_or_else(|| record.get(field))
                    .is_null()
            })
            .map(String::as_str)
    }

    /// 默认的引擎级校验：任一必填字段为空则拒绝
    pub fn check<R: Record>(&self, record: &R, updates: &StagedFields) -> bool {
        match self.first_missing(record, updates) {
            Some(field) => {
                warn!(field = field, "拒绝更新: 字段为空");
                false
            }
            None => true,
        }
    }
}

// ==========================================
// ImportTask Trait - 一次导入任务的钩子集合
// ==========================================
pub trait ImportTask<R: Record> {
    /// 任务名称（日志 span 使用）
    fn name(&self) -> &str {
        "import"
    }

    /// 新建一条空记录（数据源中出现未知主键时调用）
    fn create_record(&self) -> R;

    /// 为被更新的记录创建历史记录（返回 None 表示该记录不记历史）
    fn create_history(&self, _record: &R, key: &Value) -> Option<HistoryEntry> {
        Some(HistoryEntry::new(key.clone()))
    }

    /// 数据源列表（按返回顺序处理）
    fn sources(&mut self) -> ImportResult<Vec<Box<dyn SourcePass<R>>>>;

    /// 过滤加载到的现有记录（默认全部参与匹配）
    fn select_records(&self, records: Vec<R>) -> Vec<R> {
        records
    }

    /// 应用前的引擎级校验（默认: 必填字段非空）
    fn validate_updates(
        &self,
        record: &R,
        updates: &StagedFields,
        _creating: bool,
        required: &RequiredFields,
    ) -> ImportResult<bool> {
        Ok(required.check(record, updates))
    }

    fn pre_process(&mut self) -> ImportResult<HookOutput> {
        Ok(HookOutput::new())
    }

    /// 全部数据源处理完、应用变更之前
    fn post_process(&mut self, _records: &[R]) -> ImportResult<HookOutput> {
        Ok(HookOutput::new())
    }

    /// 变更已应用、提交之前
    fn pre_commit(&mut self, _batch: &CommitBatch<R>) -> ImportResult<HookOutput> {
        Ok(HookOutput::new())
    }

    fn post_commit(&mut self) -> ImportResult<HookOutput> {
        Ok(HookOutput::new())
    }
}

// ==========================================
// ReconcileContext - 单个数据源处理时可见的运行状态
// ==========================================
pub struct ReconcileContext<'a, R: Record> {
    pub schema: &'a Schema,
    /// 工作集（现有记录 + 本次新建的记录）
    pub records: &'a mut Vec<R>,
    pub pending: &'a mut PendingUpdates,
    pub runner: &'a TaskRunner,
    pub create_record: &'a dyn Fn() -> R,
    /// 行级缓存，每行开始前清空
    pub cache: ValueCache,
}

impl<'a, R: Record> ReconcileContext<'a, R> {
    /// 字段的当前有效值（已暂存则取暂存值）
    pub fn effective_value(&self, idx: usize, field: &str) -> Value {
        self.pending
            .staged_value(idx, field)
            .cloned()
            .unwrap_or_else(|| self.records[idx].get(field))
    }
}

// ==========================================
// SourcePass Trait - 可装箱的数据源处理单元
// ==========================================
// 说明: 不同数据源的行类型不同，引擎通过该 trait 统一处理
pub trait SourcePass<R: Record>: Send {
    fn name(&self) -> &str;

    fn run(&mut self, ctx: &mut ReconcileContext<'_, R>) -> ImportResult<SourceStats>;
}

impl<R: Record, S: ImportSource<R>> SourcePass<R> for S {
    fn name(&self) -> &str {
        ImportSource::name(self)
    }

    fn run(&mut self, ctx: &mut ReconcileContext<'_, R>) -> ImportResult<SourceStats> {
        reconcile_source(self, ctx)
    }
}

/// 装箱数据源
pub fn boxed<R, S>(source: S) -> Box<dyn SourcePass<R>>
where
    R: Record,
    S: ImportSource<R> + 'static,
{
    Box::new(source)
}

/// 单个数据源的匹配/比对/暂存
#[instrument(skip_all, fields(source = %ImportSource::name(source)))]
fn reconcile_source<R, S>(source: &mut S, ctx: &mut ReconcileContext<'_, R>) -> ImportResult<SourceStats>
where
    R: Record,
    S: ImportSource<R> + ?Sized,
{
    let mut stats = SourceStats::new(ImportSource::name(source));

    // === 步骤 1: 绑定映射 ===
    source.mapping_mut().bind(ctx.schema)?;
    let key_field = source.mapping().key_field().to_string();

    // === 步骤 2: 以当前工作集建立主键查找表 ===
    let mut lookup: HashMap<Value, usize> = HashMap::new();
    let mut unmatched: BTreeSet<usize> = BTreeSet::new();
    for idx in 0..ctx.records.len() {
        let key = source
            .mapping()
            .normalize_key(ctx.effective_value(idx, &key_field));
        if !key.is_null() {
            lookup.insert(key, idx);
        }
        unmatched.insert(idx);
    }

    // === 步骤 3: 逐行处理 ===
    let mode = source.mode();
    let rows = source.rows()?;
    let runner = ctx.runner;
    let description = format!("读取 {}", stats.name);

    for (line_idx, row) in runner.progress(rows.enumerate(), &description) {
        let mapping = source.mapping();
        if mapping.is_header_line(line_idx) {
            continue;
        }
        let row = row?;

        ctx.cache.clear();
        if !source.should_import(&row) {
            stats.ignored += 1;
            continue;
        }

        let key = match mapping.extract_key(&row, &mut ctx.cache)? {
            Ok(key) => key,
            Err(e) if e.is_recoverable() => {
                debug!(row = line_idx, error = %e, "主键无法解析，按缺失处理");
                Value::Null
            }
            Err(e) => {
                return Err(ImportError::Extraction {
                    column: key_field.clone(),
                    row: line_idx,
                    source: e,
                })
            }
        };
        if key.is_null() {
            stats.ignored_missing_key += 1;
            continue;
        }

        let (idx, creating) = match lookup.get(&key) {
            None => {
                if !mode.allows_create() {
                    stats.ignored_not_created += 1;
                    continue;
                }
                // 先放入工作集末尾，校验被拒时弹出
                let idx = ctx.records.len();
                ctx.records.push((ctx.create_record)());
                ctx.pending.begin(idx, true);
                (idx, true)
            }
            Some(&idx) => {
                unmatched.remove(&idx);
                if !mode.allows_update() {
                    stats.ignored_not_updated += 1;
                    continue;
                }
                (idx, false)
            }
        };

        for column in mapping.columns() {
            let policy = column.policy();
            if !creating && !policy.should_update {
                continue;
            }

            let name = column.name();
            let current = ctx.effective_value(idx, name);
            if !creating && policy.should_update_only_if_null && !current.is_null() {
                continue;
            }

            let parsed = match column.get(&row, &mut ctx.cache) {
                Ok(value) => value,
                Err(e) if e.is_recoverable() => {
                    if policy.warn_on_error {
                        let raw = column.raw_values(&row).unwrap_or_default();
                        warn!(
                            row = line_idx,
                            key = %key,
                            column = name,
                            raw = ?raw,
                            error = %e,
                            "字段值无效"
                        );
                    }
                    continue;
                }
                Err(e) => {
                    return Err(ImportError::Extraction {
                        column: name.to_string(),
                        row: line_idx,
                        source: e,
                    })
                }
            };

            if policy.warn_if_empty && parsed.is_empty() {
                warn!(row = line_idx, key = %key, column = name, "字段值为空");
            }

            if column.compare(&parsed, &current) {
                continue;
            }
            let original = ctx.records[idx].get(name);
            if column.compare(&parsed, &original) {
                // 重复/矛盾的行把字段改回了原值
                ctx.pending.cancel(idx, name);
            } else {
                ctx.pending
                    .stage(idx, name, parsed, !creating && policy.keep_history);
            }
        }
        stats.read += 1;

        if let Some(entry) = ctx.pending.get(idx).filter(|e| !e.fields.is_empty()) {
            if !source.validate_updates(&ctx.records[idx], &row, &entry.fields, creating)? {
                stats.rejected += 1;
                ctx.pending.discard(idx);
                if creating {
                    ctx.records.pop();
                }
                continue;
            }
        }

        if creating {
            lookup.insert(key, idx);
        }
    }

    // === 步骤 4: 本数据源未匹配到的记录 ===
    for idx in unmatched {
        source.on_data_not_found(&ctx.records[idx])?;
        stats.not_found += 1;
    }

    info!(
        read = stats.read,
        ignored = stats.ignored,
        ignored_missing_key = stats.ignored_missing_key,
        ignored_not_created = stats.ignored_not_created,
        ignored_not_updated = stats.ignored_not_updated,
        rejected = stats.rejected,
        not_found = stats.not_found,
        "数据源处理完成"
    );
    Ok(stats)
}

// ==========================================
// ImportOutcome - 一次导入的结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ImportOutcome<R> {
    pub report: ImportReport,
    /// 应用变更后的工作集
    pub records: Vec<R>,
    /// 本次产生的历史记录
    pub history: Vec<HistoryEntry>,
}

// ==========================================
// ImportEngine - 导入对账引擎
// ==========================================
/// 导入对账引擎
///
/// # 流程
/// 1. pre_process 钩子；加载现有记录；计算必填字段
/// 2. 按顺序处理每个数据源（匹配/比对/暂存）
/// 3. post_process 钩子
/// 4. 按暂存顺序校验并应用变更，生成历史记录
/// 5. pre_commit → commit（试运行跳过）→ post_commit
pub struct ImportEngine<S: RecordStore> {
    store: S,
    options: RunOptions,
}

impl<S: RecordStore> ImportEngine<S> {
    pub fn new(store: S, options: RunOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// 执行一次导入
    #[instrument(skip_all, fields(task = %task.name(), run_id = tracing::field::Empty))]
    pub async fn run<T>(&self, task: &mut T) -> ImportResult<ImportOutcome<S::Record>>
    where
        T: ImportTask<S::Record>,
    {
        let start_time = std::time::Instant::now();
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        let runner = TaskRunner::from_options(&self.options);
        let mut report = ImportReport::new(run_id, runner.is_dry_run());

        // === 步骤 1: 预处理 + 加载 ===
        report.preprocess = task.pre_process()?;
        let schema = self.store.schema().await?;
        let loaded = self.store.load_all().await?;
        let mut records = task.select_records(loaded);
        let required = RequiredFields::from_schema(&schema);
        debug!(
            records = records.len(),
            required = ?required.names(),
            "现有记录已加载"
        );

        // === 步骤 2: 逐个数据源匹配 ===
        let mut sources = task.sources()?;
        let mut pending = PendingUpdates::new();
        {
            let factory = || task.create_record();
            for source in sources.iter_mut() {
                let mut ctx = ReconcileContext {
                    schema: &schema,
                    records: &mut records,
                    pending: &mut pending,
                    runner: &runner,
                    create_record: &factory,
                    cache: ValueCache::new(),
                };
                let stats = source.run(&mut ctx)?;
                report.sources.push(stats);
            }
        }
        drop(sources);

        // === 步骤 3: 后处理 ===
        report.postprocess = task.post_process(&records)?;

        // === 步骤 4: 应用变更 ===
        let key_field = schema.primary_key().unwrap_or(DEFAULT_KEY_FIELD).to_string();
        let mut batch = CommitBatch::default();
        for (idx, entry) in runner.progress(pending.drain_in_order().into_iter(), "应用变更") {
            let record = &mut records[idx];
            if !task.validate_updates(record, &entry.fields, entry.creating, &required)? {
                report.rejected += 1;
                continue;
            }

            let key = record.get(&key_field);
            let mut history: Option<HistoryEntry> = None;
            let mut applied = false;
            for (name, value) in entry.fields.iter() {
                if self.options.keep_history && entry.history_fields.contains(name) {
                    if history.is_none() {
                        history = task.create_history(record, &key);
                    }
                    if let Some(h) = history.as_mut() {
                        h.record_change(name, record.get(name), value.clone());
                    }
                }
                record.set(name, value.clone());
                applied = true;
            }

            if entry.creating {
                report.created += 1;
                batch.inserts.push(record.clone());
            } else if applied {
                report.updated += 1;
                batch.updates.push(RecordUpdate {
                    key,
                    record: record.clone(),
                    fields: entry.fields.names(),
                });
                if let Some(mut h) = history {
                    h.stamp(Local::now().naive_local());
                    batch.history.push(h);
                    report.history_created += 1;
                }
            }
        }
        let history = batch.history.clone();

        // === 步骤 5: 提交 ===
        report.precommit = task.pre_commit(&batch)?;
        runner
            .execute("提交变更", async {
                self.store.commit(batch).await.map_err(ImportError::from)
            })
            .await?;
        report.postcommit = task.post_commit()?;

        report.elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            created = report.created,
            updated = report.updated,
            history_created = report.history_created,
            rejected = report.rejected,
            dry_run = report.dry_run,
            elapsed_ms = report.elapsed_ms,
            "导入完成"
        );

        Ok(ImportOutcome {
            report,
            records,
            history,
        })
    }
}
