// ==========================================
// 记录导入引擎 - 领域模型层
// ==========================================
// 职责: 字段值、表结构元数据、目标记录、变更历史、导入报告
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod history;
pub mod record;
pub mod report;
pub mod schema;
pub mod value;

// 重导出核心类型
pub use history::{FieldChange, HistoryEntry};
pub use record::{DataRecord, Record};
pub use report::{HookOutput, ImportReport, SourceStats};
pub use schema::{FieldSpec, FieldType, Schema};
pub use value::Value;
