//! End-to-end scenarios run directly against `Session`/`RelationalEngine`,
//! in-process rather than over any wire protocol (none exists here).
//! Each test below walks through one of the usage scenarios a
//! MySQL-wire-compatible engine with a pluggable KV backend is
//! expected to support: basic CRUD, ordered range scans, transaction
//! rollback and aggregation, snapshot isolation across two sessions,
//! unique-index duplicate-key rejection, and durability across a
//! simulated restart of a disk-backed engine.

use std::sync::Arc;

use guocedb_server::ast::parser;
use guocedb_server::command::{mysql_error_code, CommandResult};
use guocedb_server::session::{NoopAuthorizer, Session};
use guocedb_storage::engine::RelationalEngine;
use guocedb_storage::storage::engine::Engine;
use guocedb_storage::storage::log_cask::LogCask;
use guocedb_storage::storage::memory::Memory;
use guocedb_storage::txn::IsolationLevel;
use guocedb_storage::value::Value;

fn memory_session() -> Session<Memory> {
    let engine = Arc::new(RelationalEngine::new(Memory::new()));
    Session::new(
        engine,
        Arc::new(NoopAuthorizer),
        "root",
        IsolationLevel::RepeatableRead,
        true,
        None,
        "guocedb",
        true,
        false,
    )
}

fn exec<E: Engine>(session: &mut Session<E>, sql: &str) -> CommandResult {
    let stmt = parser::parse(sql).expect("parses");
    session.dispatch(stmt).expect("dispatches")
}

fn try_exec<E: Engine>(session: &mut Session<E>, sql: &str) -> Result<CommandResult, guocedb_storage::error::Error> {
    let stmt = parser::parse(sql).expect("parses");
    session.dispatch(stmt)
}

/// S1: create a database and table, insert a row, select it back.
#[test]
fn s1_create_insert_select() {
    let mut session = memory_session();
    exec(&mut session, "CREATE DATABASE shop");
    exec(&mut session, "USE shop");
    exec(&mut session, "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(100))");
    exec(&mut session, "INSERT INTO users VALUES (1, 'Alice')");

    match exec(&mut session, "SELECT * FROM users WHERE id = 1") {
        CommandResult::Rows { columns, rows } => {
            assert_eq!(columns, vec!["id".to_string(), "name".to_string()]);
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0][0], Value::Int64(1));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

/// S2: a range of rows, read back in descending order with a limit.
#[test]
fn s2_order_by_and_limit() {
    let mut session = memory_session();
    exec(&mut session, "CREATE DATABASE shop");
    exec(&mut session, "USE shop");
    exec(&mut session, "CREATE TABLE items (id INT PRIMARY KEY, price INT)");
    for (id, price) in [(1, 30), (2, 10), (3, 20)] {
        exec(&mut session, &format!("INSERT INTO items VALUES ({}, {})", id, price));
    }

    match exec(&mut session, "SELECT * FROM items ORDER BY price DESC LIMIT 2") {
        CommandResult::Rows { rows, .. } => {
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0][1], Value::Int64(30));
            assert_eq!(rows[1][1], Value::Int64(20));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

/// S3: an explicit transaction's writes vanish on rollback, and SUM
/// only ever sees committed rows.
#[test]
fn s3_rollback_and_sum_aggregate() {
    let mut session = memory_session();
    exec(&mut session, "CREATE DATABASE shop");
    exec(&mut session, "USE shop");
    exec(&mut session, "CREATE TABLE accounts (id INT PRIMARY KEY, balance INT)");
    exec(&mut session, "INSERT INTO accounts VALUES (1, 100)");
    exec(&mut session, "INSERT INTO accounts VALUES (2, 50)");

    exec(&mut session, "BEGIN");
    exec(&mut session, "INSERT INTO accounts VALUES (3, 9000)");
    exec(&mut session, "ROLLBACK");

    match exec(&mut session, "SELECT SUM(balance) FROM accounts") {
        CommandResult::Rows { rows, .. } => {
            assert_eq!(rows[0][0], Value::Float64(150.0));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

/// S4: two sessions against the same engine; one's uncommitted write
/// is invisible to the other under repeatable-read.
#[test]
fn s4_snapshot_isolation_across_sessions() {
    let engine = Arc::new(RelationalEngine::new(Memory::new()));
    let mut setup = Session::new(
        engine.clone(),
        Arc::new(NoopAuthorizer),
        "root",
        IsolationLevel::RepeatableRead,
        true,
        None,
        "guocedb",
        true,
        false,
    );
    exec(&mut setup, "CREATE DATABASE shop");
    exec(&mut setup, "USE shop");
    exec(&mut setup, "CREATE TABLE t (id INT PRIMARY KEY)");
    exec(&mut setup, "INSERT INTO t VALUES (1)");

    let mut writer = Session::new(
        engine.clone(),
        Arc::new(NoopAuthorizer),
        "root",
        IsolationLevel::RepeatableRead,
        false,
        None,
        "guocedb",
        true,
        false,
    );
    exec(&mut writer, "USE shop");
    exec(&mut writer, "BEGIN");
    exec(&mut writer, "INSERT INTO t VALUES (2)");
    // writer's transaction is still open, not yet committed.

    let mut reader = Session::new(
        engine,
        Arc::new(NoopAuthorizer),
        "root",
        IsolationLevel::RepeatableRead,
        true,
        None,
        "guocedb",
        true,
        false,
    );
    exec(&mut reader, "USE shop");
    match exec(&mut reader, "SELECT * FROM t") {
        CommandResult::Rows { rows, .. } => assert_eq!(rows.len(), 1, "uncommitted row must stay invisible"),
        other => panic!("unexpected result: {:?}", other),
    }

    exec(&mut writer, "COMMIT");
    match exec(&mut reader, "SELECT * FROM t") {
        CommandResult::Rows { rows, .. } => assert_eq!(rows.len(), 2, "a fresh read sees the committed row"),
        other => panic!("unexpected result: {:?}", other),
    }
}

/// S5: a unique index rejects a duplicate value with MySQL error 1062.
#[test]
fn s5_unique_index_rejects_duplicate() {
    let mut session = memory_session();
    exec(&mut session, "CREATE DATABASE shop");
    exec(&mut session, "USE shop");
    exec(&mut session, "CREATE TABLE users (id INT PRIMARY KEY, email VARCHAR(255))");
    exec(&mut session, "CREATE UNIQUE INDEX idx_email ON users (email)");
    exec(&mut session, "INSERT INTO users VALUES (1, 'a@example.com')");

    let err = try_exec(&mut session, "INSERT INTO users VALUES (2, 'a@example.com')").unwrap_err();
    assert_eq!(mysql_error_code(&err), 1062);
}

/// S6: durability across a simulated restart — a second `LogCask`
/// session opened against the same data directory sees the first
/// session's committed writes.
#[test]
fn s6_durability_across_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data_dir = dir.path().join("data");

    {
        let storage = LogCask::new(data_dir.clone()).expect("open log_cask");
        let engine = Arc::new(RelationalEngine::new(storage));
        let mut session = Session::new(
            engine,
            Arc::new(NoopAuthorizer),
            "root",
            IsolationLevel::RepeatableRead,
            true,
            None,
            "guocedb",
            true,
            false,
        );
        exec(&mut session, "CREATE DATABASE shop");
        exec(&mut session, "USE shop");
        exec(&mut session, "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(100))");
        exec(&mut session, "INSERT INTO users VALUES (1, 'Alice')");
        // session (and its LogCask handle) dropped here, simulating a restart.
    }

    let storage = LogCask::new(data_dir).expect("reopen log_cask");
    let engine = Arc::new(RelationalEngine::new(storage));
    let mut session = Session::new(
        engine,
        Arc::new(NoopAuthorizer),
        "root",
        IsolationLevel::RepeatableRead,
        true,
        None,
        "guocedb",
        true,
        false,
    );
    exec(&mut session, "USE shop");
    match exec(&mut session, "SELECT * FROM users WHERE id = 1") {
        CommandResult::Rows { rows, .. } => assert_eq!(rows.len(), 1),
        other => panic!("unexpected result: {:?}", other),
    }
}
