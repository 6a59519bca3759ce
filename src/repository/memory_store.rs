// ==========================================
// 记录导入引擎 - 内存目标记录仓储
// ==========================================
// 职责: 无数据库场景下的 RecordStore 实现（测试/嵌入调用方）
// 说明: 提交按主键定位更新；保留每次提交的批次以便核对
// ==========================================

use crate::domain::history::HistoryEntry;
use crate::domain::record::Record;
use crate::domain::schema::Schema;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_store::{CommitBatch, CommitSummary, RecordStore};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

pub struct MemoryStore<R: Record> {
    schema: Schema,
    records: Mutex<Vec<R>>,
    history: Mutex<Vec<HistoryEntry>>,
    commits: Mutex<Vec<CommitBatch<R>>>,
}

impl<R: Record> MemoryStore<R> {
    pub fn new(schema: Schema, records: Vec<R>) -> Self {
        Self {
            schema,
            records: Mutex::new(records),
            history: Mutex::new(Vec::new()),
            commits: Mutex::new(Vec::new()),
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> RepositoryResult<MutexGuard<'_, T>> {
        mutex
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 当前持久化的记录快照
    pub fn records(&self) -> RepositoryResult<Vec<R>> {
        Ok(Self::lock(&self.records)?.clone())
    }

    /// 已写入的历史记录
    pub fn history(&self) -> RepositoryResult<Vec<HistoryEntry>> {
        Ok(Self::lock(&self.history)?.clone())
    }

    /// 提交次数
    pub fn commit_count(&self) -> RepositoryResult<usize> {
        Ok(Self::lock(&self.commits)?.len())
    }

    /// 最近一次提交的批次
    pub fn last_commit(&self) -> RepositoryResult<Option<CommitBatch<R>>> {
        Ok(Self::lock(&self.commits)?.last().cloned())
    }

    fn key_field(&self) -> &str {
        self.schema.primary_key().unwrap_or("id")
    }
}

#[async_trait]
impl<R: Record> RecordStore for MemoryStore<R> {
    type Record = R;

    async fn schema(&self) -> RepositoryResult<Schema> {
        Ok(self.schema.clone())
    }

    async fn load_all(&self) -> RepositoryResult<Vec<R>> {
        self.records()
    }

    async fn commit(&self, batch: CommitBatch<R>) -> RepositoryResult<CommitSummary> {
        let key_field = self.key_field().to_string();
        let mut records = Self::lock(&self.records)?;

        // 先校验全部更新目标，保证失败时不做任何修改
        let mut targets = Vec::with_capacity(batch.updates.len());
        for update in &batch.updates {
            let pos = records
                .iter()
                .position(|r| r.get(&key_field) == update.key)
                .ok_or_else(|| RepositoryError::NotFound {
                    entity: self.schema.table.clone(),
                    id: update.key.to_string(),
                })?;
            targets.push(pos);
        }

        for (pos, update) in targets.into_iter().zip(&batch.updates) {
            records[pos] = update.record.clone();
        }
        records.extend(batch.inserts.iter().cloned());
        Self::lock(&self.history)?.extend(batch.history.iter().cloned());

        let summary = CommitSummary {
            inserted: batch.inserts.len(),
            updated: batch.updates.len(),
            history: batch.history.len(),
        };
        drop(records);
        Self::lock(&self.commits)?.push(batch);
        Ok(summary)
    }
}
