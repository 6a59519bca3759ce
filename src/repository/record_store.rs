// ==========================================
// 记录导入引擎 - 目标记录仓储 Trait
// ==========================================
// 职责: 定义持久化接口（表结构、全量加载、单次事务提交）
// 实现者: SqliteRecordStore, MemoryStore
// 红线: 每次非试运行的导入只调用一次 commit
// ==========================================

use crate::domain::history::HistoryEntry;
use crate::domain::record::Record;
use crate::domain::schema::Schema;
use crate::domain::value::Value;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ==========================================
// RecordUpdate - 已有记录的更新
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate<R> {
    /// 更新前的主键值（定位目标行）
    pub key: Value,
    /// 应用变更后的完整记录
    pub record: R,
    /// 被修改的字段
    pub fields: Vec<String>,
}

// ==========================================
// CommitBatch - 单次提交的全部变更
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct CommitBatch<R> {
    pub inserts: Vec<R>,
    pub updates: Vec<RecordUpdate<R>>,
    pub history: Vec<HistoryEntry>,
}

impl<R> Default for CommitBatch<R> {
    fn default() -> Self {
        Self {
            inserts: Vec::new(),
            updates: Vec::new(),
            history: Vec::new(),
        }
    }
}

impl<R> CommitBatch<R> {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.history.is_empty()
    }
}

/// 提交结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub history: usize,
}

// ==========================================
// RecordStore Trait
// ==========================================
#[async_trait]
pub trait RecordStore: Send + Sync {
    type Record: Record;

    /// 目标表结构（绑定映射、计算必填字段）
    async fn schema(&self) -> RepositoryResult<Schema>;

    /// 加载全部现有记录
    async fn load_all(&self) -> RepositoryResult<Vec<Self::Record>>;

    /// 事务化提交（任一失败则全部回滚）
    async fn commit(&self, batch: CommitBatch<Self::Record>) -> RepositoryResult<CommitSummary>;
}
