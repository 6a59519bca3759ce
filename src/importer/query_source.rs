// ==========================================
// 记录导入引擎 - 查询结果数据源
// ==========================================
// 职责: 一次性物化查询结果为结构化行（列名 → JSON 值）
// 来源: SQLite 查询 或 调用方提供的行集合
// ==========================================

use crate::domain::record::Record;
use crate::importer::column::StructuredRow;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::mapping::Mapping;
use crate::importer::source::{RowIter, RowProvider, RowSource};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::debug;

// ==========================================
// QueryRows - 查询结果行来源
// ==========================================
pub enum QueryRows {
    Sql {
        conn: Arc<Mutex<Connection>>,
        sql: String,
    },
    Rows(Vec<StructuredRow>),
}

impl QueryRows {
    pub fn sql(conn: Arc<Mutex<Connection>>, sql: impl Into<String>) -> Self {
        QueryRows::Sql {
            conn,
            sql: sql.into(),
        }
    }

    fn fetch(conn: &Arc<Mutex<Connection>>, sql: &str) -> ImportResult<Vec<StructuredRow>> {
        let conn = conn
            .lock()
            .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))?;

        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();

        let rows = stmt
            .query_map([], |row| {
                let mut object = serde_json::Map::with_capacity(names.len());
                for (idx, name) in names.iter().enumerate() {
                    object.insert(name.clone(), value_ref_to_json(row.get_ref(idx)?));
                }
                Ok(serde_json::Value::Object(object))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(rows = rows.len(), "查询结果物化完成");
        Ok(rows)
    }
}

impl RowProvider for QueryRows {
    type Row = StructuredRow;

    fn describe(&self) -> String {
        match self {
            QueryRows::Sql { sql, .. } => format!("query: {}", sql),
            QueryRows::Rows(rows) => format!("rows[{}]", rows.len()),
        }
    }

    fn open(&mut self) -> ImportResult<RowIter<StructuredRow>> {
        let rows = match self {
            QueryRows::Sql { conn, sql } => Self::fetch(conn, sql)?,
            QueryRows::Rows(rows) => rows.clone(),
        };
        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}

/// SQLite 单元格 → JSON 值（BLOB 转十六进制文本）
fn value_ref_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => {
            serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Blob(bytes) => {
            serde_json::Value::String(bytes.iter().map(|b| format!("{:02x}", b)).collect())
        }
    }
}

/// 查询结果数据源
pub type QuerySource<Rec> = RowSource<Rec, QueryRows>;

impl<Rec: Record> RowSource<Rec, QueryRows> {
    /// 基于 SQLite 查询
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        sql: impl Into<String>,
        mapping: Mapping<StructuredRow>,
    ) -> Self {
        Self::from_provider(QueryRows::sql(conn, sql), mapping)
    }

    /// 基于已有行集合
    pub fn from_rows(rows: Vec<StructuredRow>, mapping: Mapping<StructuredRow>) -> Self {
        Self::from_provider(QueryRows::Rows(rows), mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_rows_materialize_as_objects() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE src (id INTEGER, name TEXT, ratio REAL, note TEXT);
             INSERT INTO src VALUES (1, 'a', 0.5, NULL);
             INSERT INTO src VALUES (2, 'b', 1.5, 'x');",
        )
        .unwrap();

        let mut provider = QueryRows::sql(
            Arc::new(Mutex::new(conn)),
            "SELECT id, name, ratio, note FROM src ORDER BY id",
        );
        let rows: Vec<StructuredRow> = provider
            .open()
            .unwrap()
            .collect::<ImportResult<Vec<_>>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[0]["name"], "a");
        assert_eq!(rows[0]["ratio"], 0.5);
        assert!(rows[0]["note"].is_null());
        assert_eq!(rows[1]["note"], "x");
    }

    #[test]
    fn test_invalid_sql_is_query_error() {
        let conn = Connection::open_in_memory().unwrap();
        let mut provider = QueryRows::sql(Arc::new(Mutex::new(conn)), "SELECT * FROM missing");
        assert!(matches!(
            provider.open(),
            Err(ImportError::DatabaseQueryError(_))
        ));
    }
}
