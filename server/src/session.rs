//! The session/dispatcher lifecycle: one `Session` per client
//! connection, bound to at most one transaction at a time and
//! carrying the session variables (isolation level, autocommit,
//! current database) a dispatcher consults before routing a statement
//! into [`guocedb_storage::engine::RelationalEngine`]. The REPL loop
//! (`handle_repl`, `handle_reader`, `append_query`, `prompt`) drives
//! `handle_query`'s real dispatch algorithm line by line.

use std::io::BufRead;
use std::ops::Bound;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result as AnyResult};
use rustyline::config::Builder;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor};

use guocedb_storage::catalog::schema::{Column, Database, Table};
use guocedb_storage::catalog::{IndexSpec as TableIndexSpec, TableSpec};
use guocedb_storage::engine::RelationalEngine;
use guocedb_storage::error::{CResult, Error as StorageError};
use guocedb_storage::index::IndexSpec;
use guocedb_storage::storage::engine::Engine;
use guocedb_storage::txn::{IsolationLevel, Txn};
use guocedb_storage::value::Value;

use crate::ast::parser;
use crate::ast::tokenizer::all_reserved_keywords;
use crate::command::{AggFn, CommandResult, Filter, OrderBy, RetryBudget, SelectColumns, Statement};
use crate::rusty::CliHelper;
use crate::show::Show;

/// Access-control hook the dispatcher consults before routing a
/// statement. The admin console has no user
/// accounts of its own, so the default implementation simply allows
/// everything; a wire front-end with real authentication would supply
/// its own.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, _user: &str, _statement: &Statement) -> CResult<()> {
        Ok(())
    }
}

/// The no-op default: allows every statement unconditionally.
pub struct NoopAuthorizer;
impl Authorizer for NoopAuthorizer {}

fn no_active_transaction() -> StorageError {
    StorageError::Internal("no transaction in progress".to_string())
}

fn transaction_already_open() -> StorageError {
    StorageError::Internal("transaction already in progress".to_string())
}

fn filter_matches(schema: &Table, row: &[Value], filter: &Filter) -> CResult<bool> {
    match filter {
        Filter::Eq { column, value } => {
            let idx = schema.column_index(column)?;
            Ok(row[idx].sql_eq(value).is_true())
        }
        Filter::Range { column, lo, hi } => {
            let idx = schema.column_index(column)?;
            let cell = &row[idx];
            let lo_ok = match lo {
                Bound::Included(v) => cell.sql_cmp(v).map(|o| o != std::cmp::Ordering::Less).unwrap_or(false),
                Bound::Excluded(v) => cell.sql_cmp(v).map(|o| o == std::cmp::Ordering::Greater).unwrap_or(false),
                Bound::Unbounded => true,
            };
            let hi_ok = match hi {
                Bound::Included(v) => cell.sql_cmp(v).map(|o| o != std::cmp::Ordering::Greater).unwrap_or(false),
                Bound::Excluded(v) => cell.sql_cmp(v).map(|o| o == std::cmp::Ordering::Less).unwrap_or(false),
                Bound::Unbounded => true,
            };
            Ok(lo_ok && hi_ok)
        }
    }
}

fn compute_aggregate(schema: &Table, rows: &[Vec<Value>], agg: AggFn, column: &str) -> CResult<Value> {
    if matches!(agg, AggFn::Count) && column == "*" {
        return Ok(Value::Int64(rows.len() as i64));
    }
    let idx = schema.column_index(column)?;
    let values: Vec<f64> = rows.iter().filter_map(|row| row[idx].as_f64()).collect();
    Ok(match agg {
        AggFn::Count => Value::Int64(values.len() as i64),
        AggFn::Sum => Value::Float64(values.iter().sum()),
        AggFn::Avg => {
            if values.is_empty() {
                Value::Null
            } else {
                Value::Float64(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        AggFn::Min => values.into_iter().fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v)))).map(Value::Float64).unwrap_or(Value::Null),
        AggFn::Max => values.into_iter().fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v)))).map(Value::Float64).unwrap_or(Value::Null),
    })
}

/// One client connection's state: current database,
/// current transaction (if one is open), and the session variables a
/// dispatched statement is evaluated against.
pub struct Session<E: Engine> {
    engine: Arc<RelationalEngine<E>>,
    authorizer: Arc<dyn Authorizer>,
    user: String,

    current_db: Option<Database>,
    txn: Option<Txn<E>>,
    autocommit: bool,
    isolation: IsolationLevel,
    statement_timeout: Option<Duration>,
    retry_budget: RetryBudget,

    prompt: String,
    show: Show,
    query: String,
}

impl<E: Engine> Session<E> {
    pub fn new(
        engine: Arc<RelationalEngine<E>>,
        authorizer: Arc<dyn Authorizer>,
        user: impl Into<String>,
        default_isolation: IsolationLevel,
        default_autocommit: bool,
        statement_timeout: Option<Duration>,
        prompt: impl Into<String>,
        show_affected: bool,
        is_repl: bool,
    ) -> Self {
        Session {
            engine,
            authorizer,
            user: user.into(),
            current_db: None,
            txn: None,
            autocommit: default_autocommit,
            isolation: default_isolation,
            statement_timeout,
            retry_budget: RetryBudget::default(),
            prompt: prompt.into(),
            show: Show::new(show_affected, is_repl),
            query: String::new(),
        }
    }

    fn require_db(&self) -> CResult<Database> {
        self.current_db.clone().ok_or_else(|| StorageError::NotFound("database: no database selected".to_string()))
    }

    /// Runs `op` against a transaction: the already-open one if this
    /// session has one, otherwise an implicit transaction of its own —
    /// retried a bounded number of times under autocommit if `op`
    /// fails with a retryable error.
    fn run<T>(&mut self, read_only: bool, op: impl Fn(&Txn<E>) -> CResult<T>) -> CResult<T> {
        if let Some(txn) = &self.txn {
            return op(txn);
        }

        if !self.autocommit {
            let txn = self.engine.begin(read_only, self.isolation, self.statement_timeout)?;
            let result = op(&txn);
            self.txn = Some(txn);
            return result;
        }

        let start = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let txn = self.engine.begin(read_only, self.isolation, self.statement_timeout)?;
            match op(&txn) {
                Ok(value) => {
                    txn.commit()?;
                    return Ok(value);
                }
                Err(err) => {
                    let _ = txn.rollback();
                    let budget_left = attempt < self.retry_budget.max_attempts() && start.elapsed() < self.retry_budget.max_wall_clock();
                    if err.retryable() && budget_left {
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Executes one decoded statement: access check, transaction
    /// acquisition, engine call, commit/rollback.
    pub fn dispatch(&mut self, statement: Statement) -> CResult<CommandResult> {
        self.authorizer.authorize(&self.user, &statement)?;

        match statement {
            Statement::Ping => Ok(CommandResult::Pong),
            Statement::Quit => Ok(CommandResult::Message("bye".to_string())),

            Statement::Begin { isolation } => self.begin_explicit(isolation),
            Statement::Commit => self.commit_explicit(),
            Statement::Rollback => self.rollback_explicit(),
            Statement::SetAutocommit(value) => {
                self.autocommit = value;
                Ok(CommandResult::Message(format!("autocommit={}", value)))
            }
            Statement::SetIsolationLevel(level) => {
                self.isolation = level;
                Ok(CommandResult::Message(format!("isolation level set to {:?}", level)))
            }

            Statement::ShowDatabases => {
                let engine = self.engine.clone();
                self.run(true, move |txn| engine.list_databases(txn)).map(|names| CommandResult::Rows {
                    columns: vec!["Database".to_string()],
                    rows: names.into_iter().map(|n| vec![Value::String(n)]).collect(),
                })
            }
            Statement::UseDatabase { name } => self.use_database(name),
            Statement::CreateDatabase { name, if_not_exists } => self.create_database(name, if_not_exists),
            Statement::DropDatabase { name, if_exists } => self.drop_database(name, if_exists),

            Statement::ShowTables => {
                let db = self.require_db()?;
                let engine = self.engine.clone();
                self.run(true, move |txn| engine.list_tables(txn, db.id)).map(|names| CommandResult::Rows {
                    columns: vec!["Table".to_string()],
                    rows: names.into_iter().map(|n| vec![Value::String(n)]).collect(),
                })
            }
            Statement::CreateTable { name, columns, primary_key, indexes, if_not_exists } => {
                self.create_table(name, columns, primary_key, indexes, if_not_exists)
            }
            Statement::DropTable { name, if_exists } => self.drop_table(name, if_exists),
            Statement::RenameTable { old, new } => self.rename_table(old, new),
            Statement::CreateIndex { table, index, if_not_exists } => self.create_index(table, index, if_not_exists),
            Statement::DropIndex { table, name, if_exists } => self.drop_index(table, name, if_exists),

            Statement::Insert { table, rows } => self.insert(table, rows),
            Statement::Update { table, assignments, filter } => self.update(table, assignments, filter),
            Statement::Delete { table, filter } => self.delete(table, filter),
            Statement::Select { table, columns, filter, aggregate, order_by, limit, offset } => {
                self.select(table, columns, filter, aggregate, order_by, limit, offset)
            }
        }
    }

    fn begin_explicit(&mut self, isolation: Option<IsolationLevel>) -> CResult<CommandResult> {
        if self.txn.is_some() {
            return Err(transaction_already_open());
        }
        let level = isolation.unwrap_or(self.isolation);
        let txn = self.engine.begin(false, level, self.statement_timeout)?;
        self.txn = Some(txn);
        Ok(CommandResult::TxnStarted)
    }

    fn commit_explicit(&mut self) -> CResult<CommandResult> {
        match self.txn.take() {
            Some(txn) => {
                txn.commit()?;
                Ok(CommandResult::TxnCommitted)
            }
            None => Err(no_active_transaction()),
        }
    }

    fn rollback_explicit(&mut self) -> CResult<CommandResult> {
        match self.txn.take() {
            Some(txn) => {
                txn.rollback()?;
                Ok(CommandResult::TxnRolledBack)
            }
            None => Err(no_active_transaction()),
        }
    }

    fn use_database(&mut self, name: String) -> CResult<CommandResult> {
        let engine = self.engine.clone();
        let db = self.run(true, move |txn| {
            engine.get_database(txn, &name)?.ok_or_else(|| StorageError::NotFound(format!("database '{}'", name)))
        })?;
        self.current_db = Some(db);
        Ok(CommandResult::Message("database changed".to_string()))
    }

    fn create_database(&mut self, name: String, if_not_exists: bool) -> CResult<CommandResult> {
        let engine = self.engine.clone();
        let result = self.run(false, move |txn| {
            if if_not_exists && engine.database_exists(txn, &name)? {
                return Ok(None);
            }
            Ok(Some(engine.create_database(Some(txn), &name)?))
        })?;
        match result {
            Some(_) => Ok(CommandResult::RowsAffected(1)),
            None => Ok(CommandResult::Message("database already exists, skipped".to_string())),
        }
    }

    fn drop_database(&mut self, name: String, if_exists: bool) -> CResult<CommandResult> {
        let engine = self.engine.clone();
        let target = name.clone();
        let dropped = self.run(false, move |txn| {
            if if_exists && !engine.database_exists(txn, &name)? {
                return Ok(false);
            }
            engine.drop_database(Some(txn), &name)?;
            Ok(true)
        })?;
        if dropped && self.current_db.as_ref().map(|d| d.name == target).unwrap_or(false) {
            self.current_db = None;
        }
        Ok(CommandResult::RowsAffected(dropped as u64))
    }

    fn create_table(
        &mut self,
        name: String,
        columns: Vec<Column>,
        primary_key: Vec<String>,
        indexes: Vec<crate::command::IndexDefStmt>,
        if_not_exists: bool,
    ) -> CResult<CommandResult> {
        let db = self.require_db()?;
        let engine = self.engine.clone();
        let spec = TableSpec {
            columns,
            primary_key,
            indexes: indexes.into_iter().map(|i| TableIndexSpec { name: i.name, columns: i.columns, unique: i.unique }).collect(),
            collation: "utf8mb4_general_ci".to_string(),
        };
        let created = self.run(false, move |txn| {
            if if_not_exists && engine.table_exists(txn, db.id, &name)? {
                return Ok(false);
            }
            engine.create_table(Some(txn), db.id, &name, spec.clone())?;
            Ok(true)
        })?;
        Ok(CommandResult::RowsAffected(created as u64))
    }

    fn drop_table(&mut self, name: String, if_exists: bool) -> CResult<CommandResult> {
        let db = self.require_db()?;
        let engine = self.engine.clone();
        let dropped = self.run(false, move |txn| {
            if if_exists && !engine.table_exists(txn, db.id, &name)? {
                return Ok(false);
            }
            engine.drop_table(Some(txn), db.id, &name)?;
            Ok(true)
        })?;
        Ok(CommandResult::RowsAffected(dropped as u64))
    }

    fn rename_table(&mut self, old: String, new: String) -> CResult<CommandResult> {
        let db = self.require_db()?;
        let engine = self.engine.clone();
        self.run(false, move |txn| engine.rename_table(Some(txn), db.id, &old, &new))?;
        Ok(CommandResult::RowsAffected(1))
    }

    fn create_index(&mut self, table: String, index: crate::command::IndexDefStmt, if_not_exists: bool) -> CResult<CommandResult> {
        let db = self.require_db()?;
        let engine = self.engine.clone();
        let spec = IndexSpec { name: index.name, columns: index.columns, unique: index.unique };
        let created = self.run(false, move |txn| {
            if if_not_exists {
                if let Some(view) = engine.table(txn, db.id, &table)? {
                    if view.schema().index(&spec.name).is_some() {
                        return Ok(false);
                    }
                }
            }
            engine.create_index(Some(txn), db.id, &table, spec.clone())?;
            Ok(true)
        })?;
        Ok(CommandResult::RowsAffected(created as u64))
    }

    fn drop_index(&mut self, table: String, name: String, if_exists: bool) -> CResult<CommandResult> {
        let db = self.require_db()?;
        let engine = self.engine.clone();
        let dropped = self.run(false, move |txn| {
            if if_exists {
                match engine.table(txn, db.id, &table)? {
                    Some(view) if view.schema().index(&name).is_some() => {}
                    _ => return Ok(false),
                }
            }
            engine.drop_index(Some(txn), db.id, &table, &name)?;
            Ok(true)
        })?;
        Ok(CommandResult::RowsAffected(dropped as u64))
    }

    fn insert(&mut self, table: String, rows: Vec<Vec<Value>>) -> CResult<CommandResult> {
        let db = self.require_db()?;
        let engine = self.engine.clone();
        let count = self.run(false, move |txn| {
            let view = engine.table(txn, db.id, &table)?.ok_or_else(|| StorageError::NotFound(format!("table '{}'", table)))?;
            for row in &rows {
                view.insert(txn, row.clone())?;
            }
            Ok(rows.len() as u64)
        })?;
        Ok(CommandResult::RowsAffected(count))
    }

    fn update(&mut self, table: String, assignments: Vec<(String, Value)>, filter: Option<Filter>) -> CResult<CommandResult> {
        let db = self.require_db()?;
        let engine = self.engine.clone();
        let count = self.run(false, move |txn| {
            let view = engine.table(txn, db.id, &table)?.ok_or_else(|| StorageError::NotFound(format!("table '{}'", table)))?;
            let schema = view.schema().clone();
            let rows: Vec<Vec<Value>> = view.scan(txn, Default::default())?.collect::<CResult<Vec<_>>>()?;
            let mut updated = 0u64;
            for row in rows {
                if let Some(f) = &filter {
                    if !filter_matches(&schema, &row, f)? {
                        continue;
                    }
                }
                let old_pk = schema.pk_tuple(&row)?;
                let mut new_row = row.clone();
                for (column, value) in &assignments {
                    let idx = schema.column_index(column)?;
                    new_row[idx] = value.clone();
                }
                view.update(txn, &old_pk, new_row)?;
                updated += 1;
            }
            Ok(updated)
        })?;
        Ok(CommandResult::RowsAffected(count))
    }

    fn delete(&mut self, table: String, filter: Option<Filter>) -> CResult<CommandResult> {
        let db = self.require_db()?;
        let engine = self.engine.clone();
        let count = self.run(false, move |txn| {
            let view = engine.table(txn, db.id, &table)?.ok_or_else(|| StorageError::NotFound(format!("table '{}'", table)))?;
            let schema = view.schema().clone();
            let rows: Vec<Vec<Value>> = view.scan(txn, Default::default())?.collect::<CResult<Vec<_>>>()?;
            let mut deleted = 0u64;
            for row in rows {
                if let Some(f) = &filter {
                    if !filter_matches(&schema, &row, f)? {
                        continue;
                    }
                }
                let pk = schema.pk_tuple(&row)?;
                view.delete(txn, &pk)?;
                deleted += 1;
            }
            Ok(deleted)
        })?;
        Ok(CommandResult::RowsAffected(count))
    }

    #[allow(clippy::too_many_arguments)]
    fn select(
        &mut self,
        table: String,
        columns: SelectColumns,
        filter: Option<Filter>,
        aggregate: Option<(AggFn, String)>,
        order_by: Option<OrderBy>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> CResult<CommandResult> {
        let db = self.require_db()?;
        let engine = self.engine.clone();
        self.run(true, move |txn| {
            let view = engine.table(txn, db.id, &table)?.ok_or_else(|| StorageError::NotFound(format!("table '{}'", table)))?;
            let schema = view.schema().clone();
            let mut rows: Vec<Vec<Value>> = view.scan(txn, Default::default())?.collect::<CResult<Vec<_>>>()?;

            if let Some(f) = &filter {
                let mut kept = Vec::with_capacity(rows.len());
                for row in rows {
                    if filter_matches(&schema, &row, f)? {
                        kept.push(row);
                    }
                }
                rows = kept;
            }

            if let Some((agg, column)) = &aggregate {
                let value = compute_aggregate(&schema, &rows, *agg, column)?;
                let label = format!("{:?}({})", agg, column);
                return Ok(CommandResult::Rows { columns: vec![label], rows: vec![vec![value]] });
            }

            if let Some(ord) = &order_by {
                let idx = schema.column_index(&ord.column)?;
                rows.sort_by(|a, b| {
                    let cmp = a[idx].cmp_for_sort(&b[idx]);
                    if ord.descending {
                        cmp.reverse()
                    } else {
                        cmp
                    }
                });
            }

            if let Some(offset) = offset {
                rows = rows.into_iter().skip(offset as usize).collect();
            }
            if let Some(limit) = limit {
                rows.truncate(limit as usize);
            }

            match &columns {
                SelectColumns::All => {
                    let names = schema.columns.iter().map(|c| c.name.clone()).collect();
                    Ok(CommandResult::Rows { columns: names, rows })
                }
                SelectColumns::Named(names) => {
                    let idxs = names.iter().map(|n| schema.column_index(n)).collect::<CResult<Vec<_>>>()?;
                    let projected = rows.into_iter().map(|row| idxs.iter().map(|&i| row[i].clone()).collect()).collect();
                    Ok(CommandResult::Rows { columns: names.clone(), rows: projected })
                }
            }
        })
    }

    // --- REPL plumbing ---

    fn prompt_string(&self) -> String {
        match &self.current_db {
            Some(db) => format!("{} [{}] > ", self.prompt, db.name),
            None => format!("{} > ", self.prompt),
        }
    }

    pub fn handle_repl(&mut self) {
        let config = Builder::new().completion_prompt_limit(5).completion_type(CompletionType::Circular).build();
        let mut rl = Editor::<CliHelper, DefaultHistory>::with_config(config).expect("failed to build line editor");
        rl.set_helper(Some(CliHelper::with_keywords(Arc::new(all_reserved_keywords()))));
        rl.load_history(&history_path()).ok();

        loop {
            match rl.readline(&self.prompt_string()) {
                Ok(line) => {
                    let query = self.append_query(&line);
                    if query.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(query.as_str());
                    if self.run_line(true, &query) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    self.query.clear();
                    println!("^C");
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("io err: {}", e);
                    break;
                }
            }
        }

        println!("Bye~");
        let _ = rl.save_history(&history_path());
    }

    pub fn handle_reader<R: BufRead>(&mut self, r: R) -> AnyResult<()> {
        let start = Instant::now();
        for line in r.lines() {
            let line = line.map_err(|e| anyhow!("read lines err: {}", e))?;
            let query = self.append_query(&line);
            if !query.is_empty() {
                self.run_line(false, &query);
            }
        }
        let remaining = self.query.trim().to_owned();
        if !remaining.is_empty() {
            self.query.clear();
            self.run_line(false, &remaining);
        }
        println!("{:.3}", start.elapsed().as_secs_f64());
        Ok(())
    }

    /// Buffers input lines until a statement terminator (`;`) is seen,
    /// Appends to any statement already buffered from a prior line.
    fn append_query(&mut self, line: &str) -> String {
        let line = line.trim();
        if line.is_empty() {
            return String::new();
        }
        if !self.query.is_empty() {
            self.query.push(' ');
        }
        self.query.push_str(line);

        if self.query.trim_end().ends_with(';') || line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            let finished = std::mem::take(&mut self.query);
            finished.trim().to_string()
        } else {
            String::new()
        }
    }

    /// Parses and dispatches one statement, printing its result.
    /// Returns true if the session should stop (a `QUIT`/`EXIT`).
    fn run_line(&mut self, _is_repl: bool, line: &str) -> bool {
        let trimmed = line.trim_end_matches(';').trim();
        if trimmed.is_empty() {
            return false;
        }
        let is_quit = trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit");

        let statement = match parser::parse(trimmed) {
            Ok(stmt) => stmt,
            Err(e) => {
                eprintln!("parse error: {}", e);
                return false;
            }
        };

        let affected = match self.dispatch(statement) {
            Ok(result) => {
                print_result(&result);
                if let CommandResult::RowsAffected(n) = result {
                    n as i64
                } else {
                    -1
                }
            }
            Err(e) => {
                eprintln!("error {}: {}", crate::command::mysql_error_code(&e), e);
                return false;
            }
        };

        if is_quit {
            return true;
        }
        self.show.output(affected);
        false
    }
}

fn print_result(result: &CommandResult) {
    match result {
        CommandResult::Rows { columns, rows } => {
            println!("{}", columns.join(" | "));
            for row in rows {
                println!("{}", row.iter().map(|v| v.display_string()).collect::<Vec<_>>().join(" | "));
            }
        }
        CommandResult::RowsAffected(n) => println!("{} row(s) affected", n),
        CommandResult::Message(m) => println!("{}", m),
        CommandResult::Pong => println!("PONG"),
        CommandResult::TxnStarted => println!("transaction started"),
        CommandResult::TxnCommitted => println!("transaction committed"),
        CommandResult::TxnRolledBack => println!("transaction rolled back"),
    }
}

fn history_path() -> String {
    format!("{}/.guocedb_history", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}
