// ==========================================
// 记录导入引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 多数据源记录导入与对账（匹配 → 暂存 → 应用 → 单次提交）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 字段值/表结构/记录/历史/报告
pub mod domain;

// 数据仓储层 - 目标记录持久化
pub mod repository;

// 引擎层 - 导入对账
pub mod engine;

// 导入层 - 列模型/映射/数据源
pub mod importer;

// 配置层 - 运行选项
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use config::{ConfigManager, ImportConfigReader, RunOptions};
pub use domain::{
    DataRecord, FieldSpec, FieldType, HistoryEntry, ImportReport, Record, Schema, SourceStats,
    Value,
};
pub use engine::{boxed, ImportEngine, ImportOutcome, ImportTask, RequiredFields, SourcePass};
pub use importer::{
    CsvSource, ImportError, ImportMode, ImportResult, ImportSource, Mapping, QuerySource,
    SpreadsheetSource,
};
pub use repository::{MemoryStore, RecordStore, RepositoryError, SqliteRecordStore};

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
