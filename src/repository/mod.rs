// ==========================================
// 记录导入引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 目标表结构、现有记录加载、事务化提交
// 约束: 所有字段值使用参数化绑定
// ==========================================

pub mod error;
pub mod memory_store;
pub mod record_store;
pub mod sqlite_record_store;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use memory_store::MemoryStore;
pub use record_store::{CommitBatch, CommitSummary, RecordStore, RecordUpdate};
pub use sqlite_record_store::SqliteRecordStore;
