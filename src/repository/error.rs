// ==========================================
// 记录导入引擎 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约束失败按 SQLite 消息归类，提交时整体回滚
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 定位 =====
    #[error("记录未找到: {entity} (key={id})")]
    NotFound { entity: String, id: String },

    // ===== 连接与事务 =====
    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    // ===== 约束 =====
    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("非空约束违反: {0}")]
    NotNullViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 提交内容 =====
    #[error("提交数据无效: {0}")]
    ValidationError(String),

    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => classify_constraint(msg),
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "记录".to_string(),
                id: "-".to_string(),
            },
            other => RepositoryError::DatabaseQueryError(other.to_string()),
        }
    }
}

/// 按 SQLite 错误消息归类约束失败
fn classify_constraint(msg: String) -> RepositoryError {
    if msg.contains("UNIQUE") {
        RepositoryError::UniqueConstraintViolation(msg)
    } else if msg.contains("NOT NULL") {
        RepositoryError::NotNullViolation(msg)
    } else if msg.contains("FOREIGN KEY") {
        RepositoryError::ForeignKeyViolation(msg)
    } else {
        RepositoryError::DatabaseQueryError(msg)
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::InternalError(format!("历史记录序列化失败: {}", err))
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn table() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             INSERT INTO t VALUES (1, 'a');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_unique_violation_is_classified() {
        let err = table()
            .execute("INSERT INTO t VALUES (1, 'b')", [])
            .unwrap_err();
        assert!(matches!(
            RepositoryError::from(err),
            RepositoryError::UniqueConstraintViolation(_)
        ));
    }

    #[test]
    fn test_not_null_violation_is_classified() {
        let err = table()
            .execute("INSERT INTO t (id) VALUES (2)", [])
            .unwrap_err();
        assert!(matches!(
            RepositoryError::from(err),
            RepositoryError::NotNullViolation(_)
        ));
    }
}
