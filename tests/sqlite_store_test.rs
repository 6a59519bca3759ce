// ==========================================
// 记录导入引擎 - SQLite 仓储集成测试
// ==========================================
// 覆盖: 文件数据库上的完整导入、历史表写入、查询结果数据源
// ==========================================


use record_import::config::RunOptions;
use record_import::domain::report::HookOutput;
use record_import::domain::{DataRecord, Record, Value};
use record_import::engine::{boxed, ImportEngine, ImportTask, SourcePass};
use record_import::importer::{
    CsvSource, ImportMode, ImportResult, Mapping, QuerySource, StructuredRow, TextRow,
};
use record_import::repository::{RecordStore, SqliteRecordStore};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

struct SqliteTask {
    sources: Vec<Box<dyn SourcePass<DataRecord>>>,
}

impl ImportTask<DataRecord> for SqliteTask {
    fn name(&self) -> &str {
        "sqlite_item_import"
    }

    fn create_record(&self) -> DataRecord {
        DataRecord::new()
    }

    fn sources(&mut self) -> ImportResult<Vec<Box<dyn SourcePass<DataRecord>>>> {
        Ok(std::mem::take(&mut self.sources))
    }

    fn post_process(&mut self, records: &[DataRecord]) -> ImportResult<HookOutput> {
        Ok(HookOutput::from([("records".to_string(), records.len() as i64)]))
    }
}

fn seeded_db() -> (tempfile::NamedTempFile, String) {
    let (file, path) = test_helpers::create_test_db().unwrap();
    let conn = Connection::open(&path).unwrap();
    test_helpers::insert_nominal_items(&conn).unwrap();
    (file, path)
}

fn item_row(conn: &Connection, id: i64) -> (String, Option<String>, Option<i64>, Option<i64>) {
    conn.query_row(
        "SELECT col1, col2, col5, col6 FROM item WHERE id = ?1",
        params![id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )
    .unwrap()
}

// ==========================================
// 表结构自省
// ==========================================
#[tokio::test]
async fn test_schema_is_read_from_table() {
    let (_file, path) = seeded_db();
    let store = SqliteRecordStore::new(&path, "item").unwrap();

    let schema = store.schema().await.unwrap();
    assert_eq!(schema.primary_key(), Some("id"));
    assert_eq!(schema.required_fields(), vec!["col1".to_string()]);

    let records = store.load_all().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("col5"), Value::Null);
    assert_eq!(records[1].get("col5"), Value::Int(2));
}

// ==========================================
// 完整导入（非试运行）
// ==========================================
#[tokio::test]
async fn test_csv_import_is_persisted_with_history() {
    record_import::logging::init_test();
    let (_file, path) = seeded_db();

    let csv = test_helpers::write_csv(&[
        &["0", "0", "0", "0", "0", "0"],
        &["1", "ABCDEFG", "B", "C", "D", "1"],
        &["2", "E", "F", "G", "H", "2"],
        &["3", "I", "J", "K", "L", "a"],
        &["", "I", "J", "K", "L", "3"],
    ])
    .unwrap();

    let mut mapping: Mapping<TextRow> = Mapping::new();
    mapping.auto("id");
    mapping.auto("col1").keep_history(true);
    mapping.auto("col2").should_update(false);
    mapping.auto("col3");
    mapping.auto("col4");
    mapping.auto("col5").warn_on_error(false);

    let source = CsvSource::<DataRecord>::new(csv.path(), mapping).with_name("items_csv");
    let mut task = SqliteTask {
        sources: vec![boxed(source)],
    };

    let store = SqliteRecordStore::new(&path, "item")
        .unwrap()
        .with_history_table("item_history");
    let engine = ImportEngine::new(store, RunOptions::default().keep_history(true));
    let outcome = engine.run(&mut task).await.unwrap();

    assert_eq!(outcome.report.created, 1);
    assert_eq!(outcome.report.updated, 1);
    assert_eq!(outcome.report.history_created, 1);
    assert_eq!(outcome.report.postprocess.get("records"), Some(&3));
    assert!(!outcome.report.dry_run);

    let conn = Connection::open(&path).unwrap();
    assert_eq!(item_row(&conn, 1), ("A".to_string(), Some(String::new()), Some(1), Some(1)));
    assert_eq!(item_row(&conn, 2), ("E".to_string(), Some("F".to_string()), Some(2), Some(1)));
    assert_eq!(item_row(&conn, 3), ("I".to_string(), Some("J".to_string()), None, None));

    let (record_key, changed_at, changes_json): (String, Option<String>, String) = conn
        .query_row(
            "SELECT record_key, changed_at, changes_json FROM item_history",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(record_key, "1");
    assert!(changed_at.is_some());
    assert!(changes_json.contains("col1"));
    assert!(!changes_json.contains("col5"));
}

// ==========================================
// 试运行不写库
// ==========================================
#[tokio::test]
async fn test_dry_run_leaves_database_untouched() {
    let (_file, path) = seeded_db();
    let csv = test_helpers::write_csv(&[&["id", "col1"], &["1", "Z"], &["9", "N"]]).unwrap();

    let mut mapping: Mapping<TextRow> = Mapping::new();
    mapping.auto("id");
    mapping.auto("col1");
    let mut task = SqliteTask {
        sources: vec![boxed(CsvSource::<DataRecord>::new(csv.path(), mapping))],
    };

    let store = SqliteRecordStore::new(&path, "item").unwrap();
    let engine = ImportEngine::new(store, RunOptions::default().dry_run(true));
    let outcome = engine.run(&mut task).await.unwrap();

    assert_eq!(outcome.report.created, 1);
    assert_eq!(outcome.report.updated, 1);

    let conn = Connection::open(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM item", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(item_row(&conn, 1).0, "");
}

// ==========================================
// 查询结果数据源
// ==========================================
#[tokio::test]
async fn test_query_source_updates_and_creates() {
    let (_file, path) = seeded_db();
    let staging = Connection::open(&path).unwrap();
    staging
        .execute_batch(
            "CREATE TABLE staging (id INTEGER, col1 TEXT, col6 INTEGER);
             INSERT INTO staging VALUES (1, 'Q', 7);
             INSERT INTO staging VALUES (4, 'R', NULL);",
        )
        .unwrap();

    let mut mapping: Mapping<StructuredRow> = Mapping::new();
    mapping.set_header_line_number(-1);
    mapping.field("id");
    mapping.field("col1");
    mapping.field("col6").should_update_only_if_null(true);

    let source = QuerySource::<DataRecord>::new(
        Arc::new(Mutex::new(staging)),
        "SELECT id, col1, col6 FROM staging ORDER BY id",
        mapping,
    )
    .with_name("staging")
    .with_mode(ImportMode::CreateAndUpdate);
    let mut task = SqliteTask {
        sources: vec![boxed(source)],
    };

    let store = SqliteRecordStore::new(&path, "item").unwrap();
    let engine = ImportEngine::new(store, RunOptions::default());
    let outcome = engine.run(&mut task).await.unwrap();

    let stats = outcome.report.source("staging").unwrap();
    assert_eq!(stats.read, 2);
    assert_eq!(stats.not_found, 1);
    assert_eq!(outcome.report.created, 1);
    assert_eq!(outcome.report.updated, 1);

    let conn = Connection::open(&path).unwrap();
    // col6 已有值，不覆盖
    assert_eq!(item_row(&conn, 1), ("Q".to_string(), Some(String::new()), None, Some(1)));
    assert_eq!(item_row(&conn, 4), ("R".to_string(), None, None, None));
}
