// ==========================================
// 记录导入引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类:
// - 配置错误（绑定阶段，致命）
// - 数据源错误（读取阶段，致命）
// - 单值解析错误 ColumnError（Format/Lookup/MissingAttribute 可恢复）
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 配置错误（绑定阶段） =====
    #[error("映射中找不到主键列: {0}")]
    KeyColumnNotFound(String),

    #[error("计算列缺少组合函数: {0}")]
    MissingCombinator(String),

    #[error("无法为字段 {field} 推断解析器（类型 {field_type}），请显式指定 parser")]
    UnsupportedFieldType { field: String, field_type: String },

    #[error("目标表中不存在字段: {0}（请显式指定 parser）")]
    UnknownField(String),

    #[error("列 {0} 未绑定解析器（需先调用 bind）")]
    MissingParser(String),

    #[error("结构化子列 {0} 未指定字段路径")]
    MissingFieldPath(String),

    #[error("无效的列引用: {0}")]
    InvalidColumnRef(String),

    // ===== 数据源错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv/.xlsx/.xls/.ods）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    // ===== 致命提取错误 =====
    #[error("字段提取失败 (行 {row}, 列 {column}): {source}")]
    Extraction {
        column: String,
        row: usize,
        #[source]
        source: ColumnError,
    },

    // ===== 配置读取错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    // ===== 持久化错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::DatabaseQueryError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

// ==========================================
// ColumnError - 单值提取/解析错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ColumnError {
    /// 值格式错误（日期/时间无法解析等）
    #[error("格式错误: {0}")]
    Format(String),

    /// 查找失败（调用方解析器查表未命中）
    #[error("查找失败: {0}")]
    Lookup(String),

    /// 结构化行缺少属性
    #[error("缺少属性: {0}")]
    MissingAttribute(String),

    /// 列号超出行长度（fail_on_out_of_range = true）
    #[error("列号越界: index={index}, len={len}")]
    OutOfRange { index: usize, len: usize },

    /// 其他不可恢复错误
    #[error("{0}")]
    Fatal(String),
}

impl ColumnError {
    /// 是否可恢复（按 warn_on_error 告警后跳过该字段）
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ColumnError::Format(_) | ColumnError::Lookup(_) | ColumnError::MissingAttribute(_)
        )
    }
}
