// ==========================================
// 记录导入引擎 - 引擎层
// ==========================================
// 职责: 多数据源匹配/比对/暂存、应用变更、单次提交
// 红线: Engine 不拼 SQL，持久化只通过 RecordStore
// ==========================================

pub mod import_engine;
pub mod pending;
pub mod runner;

// 重导出核心引擎
pub use import_engine::{
    boxed, ImportEngine, ImportOutcome, ImportTask, ReconcileContext, RequiredFields, SourcePass,
};
pub use pending::{PendingUpdate, PendingUpdates, StagedFields};
pub use runner::{Progress, TaskRunner};
