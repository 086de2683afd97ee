//! The planner-neutral command tree forming the boundary between an
//! external SQL planner and the storage core: a `Statement` is what a
//! planner would hand [`guocedb_storage::engine::RelationalEngine`]
//! after parsing and planning SQL text. Since that planner is out of
//! scope here, [`crate::ast::parser`] builds these directly from the
//! admin console's own small statement language, and [`crate::session`]
//! is the dispatcher that executes them.
//!
//! A closed command enum plus a single entry point consuming it, with
//! a relational statement set covering the operations this engine
//! actually executes.

use std::ops::Bound;
use std::time::Duration;

use guocedb_storage::catalog::schema::Column;
use guocedb_storage::error::Error as StorageError;
use guocedb_storage::txn::IsolationLevel;
use guocedb_storage::value::Value;

/// A `CREATE TABLE`/`CREATE INDEX` index definition as parsed, before
/// the catalog assigns it an id.
#[derive(Debug, Clone)]
pub struct IndexDefStmt {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// A single comparison in a `WHERE` clause. The admin console's
/// grammar only ever builds one equality or range bound per statement,
/// which is all the row/index stores need to drive a point lookup or a
/// bounded scan.
#[derive(Debug, Clone)]
pub enum Filter {
    /// `column = value`, evaluated against the primary key or a named
    /// index depending on which column it names.
    Eq { column: String, value: Value },
    /// `column BETWEEN lo AND hi` style bound, used for range scans.
    Range { column: String, lo: Bound<Value>, hi: Bound<Value> },
}

#[derive(Debug, Clone)]
pub enum SelectColumns {
    All,
    Named(Vec<String>),
}

/// A minimal aggregate the console can compute client-side over a
/// scan's results. Real aggregation belongs to the (out-of-scope)
/// planner; this exists only so the bundled console can cover common
/// aggregate queries without one.
#[derive(Debug, Clone, Copy)]
pub enum AggFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// The planner-neutral statement tree the storage facade expects to receive.
#[derive(Debug, Clone)]
pub enum Statement {
    CreateDatabase { name: String, if_not_exists: bool },
    DropDatabase { name: String, if_exists: bool },
    ShowDatabases,
    UseDatabase { name: String },

    CreateTable {
        name: String,
        columns: Vec<Column>,
        primary_key: Vec<String>,
        indexes: Vec<IndexDefStmt>,
        if_not_exists: bool,
    },
    DropTable { name: String, if_exists: bool },
    RenameTable { old: String, new: String },
    ShowTables,
    CreateIndex { table: String, index: IndexDefStmt, if_not_exists: bool },
    DropIndex { table: String, name: String, if_exists: bool },

    Insert { table: String, rows: Vec<Vec<Value>> },
    Update { table: String, assignments: Vec<(String, Value)>, filter: Option<Filter> },
    Delete { table: String, filter: Option<Filter> },
    Select {
        table: String,
        columns: SelectColumns,
        filter: Option<Filter>,
        aggregate: Option<(AggFn, String)>,
        order_by: Option<OrderBy>,
        limit: Option<u64>,
        offset: Option<u64>,
    },

    Begin { isolation: Option<IsolationLevel> },
    Commit,
    Rollback,
    SetAutocommit(bool),
    SetIsolationLevel(IsolationLevel),

    Ping,
    Quit,
}

/// Outcome of running one [`Statement`], in the shape the console's
/// `Show` reporter and REPL loop print back to the user.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Rows { columns: Vec<String>, rows: Vec<Vec<Value>> },
    RowsAffected(u64),
    Message(String),
    Pong,
    TxnStarted,
    TxnCommitted,
    TxnRolledBack,
}

/// Maps a storage error onto a MySQL-style numeric error code, so it
/// can be reported to a client alongside a message. No
/// wire protocol here actually carries the code, but the mapping is
/// the contract a real one would apply, so it is tested here rather
/// than invented at the wire layer.
pub fn mysql_error_code(err: &StorageError) -> u32 {
    match err {
        StorageError::DuplicateKey(_) => 1062,
        StorageError::ConstraintViolation(_) => 1048,
        StorageError::NotFound(msg) if msg.starts_with("database") => 1049,
        StorageError::NotFound(_) => 1146,
        StorageError::AlreadyExists(msg) if msg.starts_with("database") => 1007,
        StorageError::AlreadyExists(_) => 1050,
        StorageError::Conflict(_) => 1213,
        StorageError::DeadlineExceeded(_) => 1205,
        StorageError::NotSupported(_) => 1235,
        StorageError::TypeMismatch(_) => 1366,
        StorageError::InvalidSchema(_) => 1064,
        StorageError::ReadOnly => 1792,
        _ => 1105,
    }
}

/// Bounded retry policy for autocommit statements that hit a
/// retryable error: the dispatcher may retry automatically
/// a bounded number of times under autocommit. Each `Session` owns
/// one and consults it after a failed implicit transaction.
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    max_attempts: u32,
    max_wall_clock: Duration,
}

impl Default for RetryBudget {
    fn default() -> Self {
        RetryBudget { max_attempts: 3, max_wall_clock: Duration::from_millis(500) }
    }
}

impl RetryBudget {
    pub fn new(max_attempts: u32, max_wall_clock: Duration) -> Self {
        RetryBudget { max_attempts, max_wall_clock }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn max_wall_clock(&self) -> Duration {
        self.max_wall_clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_maps_to_1062() {
        assert_eq!(mysql_error_code(&StorageError::DuplicateKey("pk".into())), 1062);
    }

    #[test]
    fn not_supported_maps_to_1235() {
        assert_eq!(mysql_error_code(&StorageError::NotSupported("serializable".into())), 1235);
    }

    #[test]
    fn default_retry_budget_is_bounded() {
        let budget = RetryBudget::default();
        assert_eq!(budget.max_attempts(), 3);
        assert!(budget.max_wall_clock() < Duration::from_secs(1));
    }
}
