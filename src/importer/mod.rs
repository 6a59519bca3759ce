// ==========================================
// 记录导入引擎 - 导入层
// ==========================================
// 职责: 列模型、列映射、数据源
// 支持: CSV, 表格文件(xlsx/xls/ods), 查询结果
// ==========================================

// 模块声明
pub mod column;
pub mod column_letters;
pub mod csv_source;
pub mod error;
pub mod mapping;
pub mod parsers;
pub mod query_source;
pub mod source;
pub mod spreadsheet_source;

// 重导出核心类型
pub use column::{
    Column, ColumnId, ColumnPolicy, ComputedColumn, Extractor, FieldColumn, FieldPath,
    PositionalColumn, StaticColumn, StructuredRow, TextRow, ValueCache,
};
pub use column_letters::{column_index, column_letters};
pub use csv_source::{CsvFile, CsvSource};
pub use error::{ColumnError, ImportError, ImportResult};
pub use mapping::{ColumnRef, Mapping};
pub use parsers::{default_parser, parser, DateOrder, Parser};
pub use query_source::{QueryRows, QuerySource};
pub use source::{ImportMode, ImportSource, RowIter, RowProvider, RowSource};
pub use spreadsheet_source::{SpreadsheetFile, SpreadsheetSource};
