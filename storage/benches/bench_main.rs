use criterion::{black_box, criterion_group, criterion_main, Criterion};

use guocedb_storage::catalog::schema::Column;
use guocedb_storage::catalog::TableSpec;
use guocedb_storage::engine::RelationalEngine;
use guocedb_storage::storage::memory::Memory;
use guocedb_storage::txn::IsolationLevel;
use guocedb_storage::value::{DataType, Value};

fn seeded_engine(rows: usize) -> (RelationalEngine<Memory>, u64) {
    let engine = RelationalEngine::new(Memory::new());
    let txn = engine.begin(false, IsolationLevel::RepeatableRead, None).unwrap();
    let db = engine.create_database(Some(&txn), "bench").unwrap();
    let spec = TableSpec {
        columns: vec![
            Column { name: "id".into(), data_type: DataType::Int64, nullable: false, default: None, auto_increment: false },
            Column { name: "name".into(), data_type: DataType::String, nullable: false, default: None, auto_increment: false },
        ],
        primary_key: vec!["id".into()],
        indexes: vec![],
        collation: "utf8mb4_general_ci".to_string(),
    };
    engine.create_table(Some(&txn), db.id, "items", spec).unwrap();
    txn.commit().unwrap();

    let txn = engine.begin(false, IsolationLevel::RepeatableRead, None).unwrap();
    let view = engine.table(&txn, db.id, "items").unwrap().unwrap();
    for i in 0..rows {
        view.insert(&txn, vec![Value::Int64(i as i64), Value::String(format!("row-{i}"))]).unwrap();
    }
    txn.commit().unwrap();
    (engine, db.id)
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert 1000 rows into an empty table", |b| {
        b.iter(|| black_box(seeded_engine(1000)));
    });
}

fn bench_full_scan(c: &mut Criterion) {
    let (engine, db_id) = seeded_engine(10_000);
    c.bench_function("full scan of 10000 rows", |b| {
        b.iter(|| {
            let txn = engine.begin(true, IsolationLevel::RepeatableRead, None).unwrap();
            let view = engine.table(&txn, db_id, "items").unwrap().unwrap();
            let count = view.scan(&txn, Default::default()).unwrap().count();
            black_box(count)
        });
    });
}

criterion_group!(benches, bench_insert, bench_full_scan);
criterion_main!(benches);
