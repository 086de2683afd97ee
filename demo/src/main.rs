//! A runnable walkthrough of `guocedb_storage::engine::RelationalEngine`
//! that exercises the catalog, row store, and transaction manager
//! together: create a database and table, insert rows inside an
//! explicit transaction, read them back, and roll one transaction
//! back to show its writes never became visible.

use guocedb_storage::catalog::schema::Column;
use guocedb_storage::catalog::TableSpec;
use guocedb_storage::engine::RelationalEngine;
use guocedb_storage::error::Error;
use guocedb_storage::storage::engine::Engine;
use guocedb_storage::storage::log_cask::LogCask;
use guocedb_storage::txn::IsolationLevel;
use guocedb_storage::value::{DataType, Value};

fn main() {
    println!("Hello, guocedb!");

    run().unwrap();

    println!("Bye~");
}

fn run() -> Result<(), Error> {
    let dir = tempdir::TempDir::new("guocedb-demo")?;
    let storage = LogCask::new(dir.path().join("data"))?;
    let engine = RelationalEngine::new(storage);

    let txn = engine.begin(false, IsolationLevel::RepeatableRead, None)?;
    engine.create_database(Some(&txn), "shop")?;
    txn.commit()?;

    let txn = engine.begin(false, IsolationLevel::RepeatableRead, None)?;
    let db = engine.get_database(&txn, "shop")?.expect("just created");
    let spec = TableSpec {
        columns: vec![
            Column { name: "id".into(), data_type: DataType::Int64, nullable: false, default: None, auto_increment: false },
            Column { name: "name".into(), data_type: DataType::String, nullable: false, default: None, auto_increment: false },
            Column { name: "balance".into(), data_type: DataType::Float64, nullable: true, default: Some(Value::Float64(0.0)), auto_increment: false },
        ],
        primary_key: vec!["id".into()],
        indexes: vec![],
        collation: "utf8mb4_general_ci".to_string(),
    };
    engine.create_table(Some(&txn), db.id, "accounts", spec)?;
    txn.commit()?;

    // Insert two rows inside an explicit transaction, then commit it.
    let txn = engine.begin(false, IsolationLevel::RepeatableRead, None)?;
    let view = engine.table(&txn, db.id, "accounts")?.expect("just created");
    view.insert(&txn, vec![Value::Int64(1), Value::String("Alice".into()), Value::Float64(100.0)])?;
    view.insert(&txn, vec![Value::Int64(2), Value::String("Bob".into()), Value::Float64(50.0)])?;
    txn.commit()?;

    // A second transaction writes a third row, but is rolled back; it
    // should never become visible to later readers.
    let txn = engine.begin(false, IsolationLevel::RepeatableRead, None)?;
    let view = engine.table(&txn, db.id, "accounts")?.expect("just created");
    view.insert(&txn, vec![Value::Int64(3), Value::String("Carol".into()), Value::Float64(25.0)])?;
    txn.rollback()?;

    let txn = engine.begin(true, IsolationLevel::RepeatableRead, None)?;
    let view = engine.table(&txn, db.id, "accounts")?.expect("just created");
    let rows: Vec<Vec<Value>> = view.scan(&txn, Default::default())?.collect::<Result<_, Error>>()?;
    txn.commit()?;

    assert_eq!(rows.len(), 2, "the rolled-back insert must not be visible");
    for row in &rows {
        println!("{:?}", row);
    }

    Ok(())
}
