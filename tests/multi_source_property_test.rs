// ==========================================
// 记录导入引擎 - 多数据源性质测试
// ==========================================
// 覆盖: 后序数据源优先、回到原值时撤销暂存、重复导入幂等
// 运行: 默认 64 例；PROPTEST_CASES=2000 cargo test 加大样本
// ==========================================

use proptest::prelude::*;
use record_import::config::RunOptions;
use record_import::domain::{DataRecord, FieldSpec, FieldType, Record, Schema, Value};
use record_import::engine::{boxed, ImportEngine, ImportTask, SourcePass};
use record_import::importer::{ImportResult, Mapping, QuerySource, StructuredRow};
use record_import::repository::MemoryStore;
use serde_json::json;

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(64),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

struct RowsTask {
    sources: Vec<Box<dyn SourcePass<DataRecord>>>,
}

impl ImportTask<DataRecord> for RowsTask {
    fn create_record(&self) -> DataRecord {
        DataRecord::new()
    }

    fn sources(&mut self) -> ImportResult<Vec<Box<dyn SourcePass<DataRecord>>>> {
        Ok(std::mem::take(&mut self.sources))
    }
}

fn schema() -> Schema {
    Schema::new(
        "item",
        vec![
            FieldSpec::new("id", FieldType::Int).primary_key(),
            FieldSpec::new("col1", FieldType::Text { max_len: None }),
        ],
    )
}

fn source(name: String, rows: Vec<StructuredRow>) -> Box<dyn SourcePass<DataRecord>> {
    let mut mapping: Mapping<StructuredRow> = Mapping::new();
    mapping.set_header_line_number(-1);
    mapping.field("id");
    mapping.field("col1");
    boxed(QuerySource::<DataRecord>::from_rows(rows, mapping).with_name(name))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

/// 短文本值（小字母表，便于产生相同值）
fn arb_text() -> impl Strategy<Value = String> {
    "[a-c]{1,2}"
}

proptest! {
    #![proptest_config(config())]

    /// 多个数据源更新同一字段：最终值取最后一个数据源
    #[test]
    fn last_source_wins(original in arb_text(), values in prop::collection::vec(arb_text(), 2..6)) {
        let sources = values
            .iter()
            .enumerate()
            .map(|(i, v)| source(format!("s{}", i), vec![json!({"id": 1, "col1": v})]))
            .collect();
        let mut task = RowsTask { sources };

        let store = MemoryStore::new(
            schema(),
            vec![DataRecord::new().with("id", 1).with("col1", original.as_str())],
        );
        let engine = ImportEngine::new(store, RunOptions::default());
        let outcome = runtime().block_on(engine.run(&mut task)).unwrap();

        let last = values.last().cloned().unwrap_or_default();
        prop_assert_eq!(outcome.records[0].get("col1"), Value::from(last.as_str()));

        // 回到原值时不产生更新
        let expected_updates = usize::from(last != original);
        prop_assert_eq!(outcome.report.updated, expected_updates);

        let committed = engine.store().last_commit().unwrap().unwrap();
        prop_assert_eq!(committed.updates.len(), expected_updates);
        prop_assert_eq!(engine.store().records().unwrap()[0].get("col1"), Value::from(last.as_str()));
    }

    /// 同一批数据重复导入：第二次无新建无更新
    #[test]
    fn reimport_is_idempotent(rows in prop::collection::btree_map(1i64..20, arb_text(), 1..10)) {
        let build = || -> Vec<StructuredRow> {
            rows.iter().map(|(id, v)| json!({"id": id, "col1": v})).collect()
        };

        let rt = runtime();
        let first = ImportEngine::new(MemoryStore::new(schema(), Vec::new()), RunOptions::default());
        let mut task = RowsTask { sources: vec![source("first".into(), build())] };
        let outcome = rt.block_on(first.run(&mut task)).unwrap();
        prop_assert_eq!(outcome.report.created, rows.len());

        let persisted = first.store().records().unwrap();
        let second = ImportEngine::new(MemoryStore::new(schema(), persisted), RunOptions::default());
        let mut task = RowsTask { sources: vec![source("second".into(), build())] };
        let outcome = rt.block_on(second.run(&mut task)).unwrap();

        prop_assert_eq!(outcome.report.created, 0);
        prop_assert_eq!(outcome.report.updated, 0);
        prop_assert_eq!(outcome.records.len(), rows.len());
    }
}
