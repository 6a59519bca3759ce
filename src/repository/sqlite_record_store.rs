// ==========================================
// 记录导入引擎 - SQLite 目标记录仓储
// ==========================================
// 职责: 表结构自省、全量加载、单事务提交（插入/按主键更新/历史）
// 红线: Repository 不含业务逻辑；提交失败整体回滚
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::history::HistoryEntry;
use crate::domain::record::{DataRecord, Record};
use crate::domain::schema::{FieldSpec, FieldType, Schema};
use crate::domain::value::{Value, DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_store::{CommitBatch, CommitSummary, RecordStore, RecordUpdate};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

// ==========================================
// SqliteRecordStore
// ==========================================
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
    history_table: Option<String>,
}

impl SqliteRecordStore {
    /// 打开数据库文件并绑定目标表
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - table: 目标表名
    pub fn new(db_path: &str, table: impl Into<String>) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn)), table))
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>, table: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
            history_table: None,
        }
    }

    /// 指定历史表（提交时写入历史记录）
    pub fn with_history_table(mut self, table: impl Into<String>) -> Self {
        self.history_table = Some(table.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn history_table(&self) -> Option<&str> {
        self.history_table.as_deref()
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建历史表（已存在则跳过）
    pub fn ensure_history_table(&self) -> RepositoryResult<()> {
        let Some(history_table) = &self.history_table else {
            return Ok(());
        };
        let conn = self.get_conn()?;
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                history_id INTEGER PRIMARY KEY AUTOINCREMENT,
                record_key TEXT NOT NULL,
                changed_at TEXT,
                changes_json TEXT NOT NULL
            );
            "#,
            quote_ident(history_table)
        ))?;
        Ok(())
    }

    /// 读取表结构（同步版本，供 schema/load_all 复用）
    fn read_schema(conn: &Connection, table: &str) -> RepositoryResult<Schema> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let fields = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let declared: String = row.get::<_, Option<String>>(2)?.unwrap_or_default();
                let not_null: i64 = row.get(3)?;
                let default_value: Option<String> = row.get(4)?;
                let pk: i64 = row.get(5)?;

                let mut spec = FieldSpec::new(name, FieldType::from_declared(&declared));
                if not_null != 0 {
                    spec = spec.not_null();
                }
                if default_value.is_some() {
                    spec = spec.with_default();
                }
                if pk != 0 {
                    spec = spec.primary_key();
                }
                Ok(spec)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if fields.is_empty() {
            return Err(RepositoryError::NotFound {
                entity: "table".to_string(),
                id: table.to_string(),
            });
        }

        Ok(Schema::new(table, fields))
    }

    fn insert_tx(tx: &Transaction, schema: &Schema, record: &DataRecord) -> RepositoryResult<()> {
        // 空值列不写入，交给表默认值
        let (columns, values): (Vec<String>, Vec<SqlValue>) = record
            .fields()
            .iter()
            .filter(|(name, value)| !value.is_null() && schema.field(name).is_some())
            .map(|(name, value)| (quote_ident(name), to_sql_value(value)))
            .unzip();

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&schema.table))
        } else {
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(&schema.table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        tx.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    fn update_tx(
        tx: &Transaction,
        schema: &Schema,
        pk: &str,
        update: &RecordUpdate<DataRecord>,
    ) -> RepositoryResult<usize> {
        let fields: Vec<&String> = update
            .fields
            .iter()
            .filter(|name| schema.field(name).is_some())
            .collect();
        if fields.is_empty() {
            return Ok(0);
        }

        let assignments: Vec<String> = fields
            .iter()
            .enumerate()
            .map(|(i, name)| format!("{} = ?{}", quote_ident(name), i + 1))
            .collect();
        let mut values: Vec<SqlValue> = fields
            .iter()
            .map(|name| to_sql_value(&update.record.get(name)))
            .collect();
        values.push(to_sql_value(&update.key));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(&schema.table),
            assignments.join(", "),
            quote_ident(pk),
            values.len()
        );
        let affected = tx.execute(&sql, params_from_iter(values))?;
        Ok(affected)
    }

    fn insert_history_tx(
        tx: &Transaction,
        history_table: &str,
        entry: &HistoryEntry,
    ) -> RepositoryResult<()> {
        let changes_json = serde_json::to_string(&entry.changes)?;
        tx.execute(
            &format!(
                "INSERT INTO {} (record_key, changed_at, changes_json) VALUES (?1, ?2, ?3)",
                quote_ident(history_table)
            ),
            params![
                entry.record_key.to_string(),
                entry
                    .recorded_at
                    .map(|at| at.format(DATETIME_FORMAT).to_string()),
                changes_json,
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    type Record = DataRecord;

    async fn schema(&self) -> RepositoryResult<Schema> {
        let conn = self.get_conn()?;
        Self::read_schema(&conn, &self.table)
    }

    async fn load_all(&self) -> RepositoryResult<Vec<DataRecord>> {
        let conn = self.get_conn()?;
        let schema = Self::read_schema(&conn, &self.table)?;

        let columns: Vec<String> = schema.fields.iter().map(|f| quote_ident(&f.name)).collect();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote_ident(&self.table)
        ))?;

        let records = stmt
            .query_map([], |row| {
                let mut record = DataRecord::new();
                for (idx, field) in schema.fields.iter().enumerate() {
                    let value = decode_value(row.get_ref(idx)?, &field.field_type);
                    record.set(&field.name, value);
                }
                Ok(record)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(table = %self.table, count = records.len(), "加载现有记录");
        Ok(records)
    }

    async fn commit(&self, batch: CommitBatch<DataRecord>) -> RepositoryResult<CommitSummary> {
        let conn = self.get_conn()?;
        let schema = Self::read_schema(&conn, &self.table)?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut summary = CommitSummary::default();

        for record in &batch.inserts {
            Self::insert_tx(&tx, &schema, record)?;
            summary.inserted += 1;
        }

        if !batch.updates.is_empty() {
            let pk = schema.primary_key().ok_or_else(|| {
                RepositoryError::ValidationError(format!("表 {} 没有主键，无法更新", self.table))
            })?;
            for update in &batch.updates {
                summary.updated += Self::update_tx(&tx, &schema, pk, update)?;
            }
        }

        if let Some(history_table) = &self.history_table {
            for entry in &batch.history {
                Self::insert_history_tx(&tx, history_table, entry)?;
                summary.history += 1;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            table = %self.table,
            inserted = summary.inserted,
            updated = summary.updated,
            history = summary.history,
            "变更已提交"
        );
        Ok(summary)
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// SQL 标识符加引号
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// 字段值 → SQLite 值（日期类按固定格式存为文本）
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Date(d) => SqlValue::Text(d.format(DATE_FORMAT).to_string()),
        Value::DateTime(dt) => SqlValue::Text(dt.format(DATETIME_FORMAT).to_string()),
        Value::Time(t) => SqlValue::Text(t.format(TIME_FORMAT).to_string()),
    }
}

/// SQLite 值 → 字段值（按声明类型解码，无法识别时保留原文）
fn decode_value(raw: ValueRef<'_>, field_type: &FieldType) -> Value {
    let text = match raw {
        ValueRef::Null => return Value::Null,
        ValueRef::Integer(i) => {
            return match field_type {
                FieldType::Bool => Value::Bool(i != 0),
                FieldType::Numeric => Value::Float(i as f64),
                _ => Value::Int(i),
            };
        }
        ValueRef::Real(f) => return Value::Float(f),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Blob(bytes) => return Value::Text(String::from_utf8_lossy(bytes).into_owned()),
    };

    match field_type {
        FieldType::Date => NaiveDate::parse_from_str(&text, DATE_FORMAT)
            .map(Value::Date)
            .unwrap_or(Value::Text(text)),
        FieldType::DateTime => NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT)
            .map(Value::DateTime)
            .unwrap_or(Value::Text(text)),
        FieldType::Time => NaiveTime::parse_from_str(&text, TIME_FORMAT)
            .map(Value::Time)
            .unwrap_or(Value::Text(text)),
        FieldType::Int => text.trim().parse().map(Value::Int).unwrap_or(Value::Text(text)),
        FieldType::Numeric => text.trim().parse().map(Value::Float).unwrap_or(Value::Text(text)),
        _ => Value::Text(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteRecordStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE item (
                id INTEGER PRIMARY KEY,
                name VARCHAR(8) NOT NULL,
                price REAL,
                due DATE,
                active BOOLEAN DEFAULT 1
            );
            INSERT INTO item (id, name, price, due, active) VALUES (1, 'bolt', 2.5, '2024-03-01', 0);
            "#,
        )
        .unwrap();
        SqliteRecordStore::from_connection(Arc::new(Mutex::new(conn)), "item")
            .with_history_table("item_history")
    }

    #[tokio::test]
    async fn test_schema_introspection() {
        let store = store();
        let schema = store.schema().await.unwrap();
        assert_eq!(schema.primary_key(), Some("id"));
        assert_eq!(
            schema.field("name").unwrap().field_type,
            FieldType::Text { max_len: Some(8) }
        );
        assert_eq!(schema.required_fields(), vec!["name".to_string()]);
        assert!(schema.field("active").unwrap().has_default);
    }

    #[tokio::test]
    async fn test_missing_table_is_not_found() {
        let conn = Connection::open_in_memory().unwrap();
        let store = SqliteRecordStore::from_connection(Arc::new(Mutex::new(conn)), "nope");
        assert!(matches!(
            store.schema().await,
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_all_decodes_declared_types() {
        let store = store();
        let records = store.load_all().await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.get("id"), Value::Int(1));
        assert_eq!(record.get("price"), Value::Float(2.5));
        assert_eq!(
            record.get("due"),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert_eq!(record.get("active"), Value::Bool(false));
    }

    #[tokio::test]
    async fn test_commit_inserts_updates_and_history() {
        let store = store();
        store.ensure_history_table().unwrap();

        let mut updated = store.load_all().await.unwrap().remove(0);
        updated.set("name", Value::from("nut"));
        let mut entry = HistoryEntry::new(Value::Int(1));
        entry.record_change("name", Value::from("bolt"), Value::from("nut"));

        let batch = CommitBatch {
            inserts: vec![DataRecord::new().with("id", 2).with("name", "washer")],
            updates: vec![RecordUpdate {
                key: Value::Int(1),
                record: updated,
                fields: vec!["name".to_string()],
            }],
            history: vec![entry],
        };
        let summary = store.commit(batch).await.unwrap();
        assert_eq!(
            summary,
            CommitSummary {
                inserted: 1,
                updated: 1,
                history: 1
            }
        );

        let records = store.load_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("name"), Value::from("nut"));
        // 插入时空值列交给默认值
        assert_eq!(records[1].get("active"), Value::Bool(true));
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        let store = store();
        let batch = CommitBatch {
            inserts: vec![
                DataRecord::new().with("id", 3).with("name", "ok"),
                DataRecord::new().with("id", 1).with("name", "dup"),
            ],
            ..Default::default()
        };
        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }
}
