//! Relational engine facade: the single entry point an
//! external planner would call during execution. It does not plan or
//! optimise anything — it exposes database listing/lookup, per-table
//! views (schema, partitions, row iteration, point DML, index
//! management), catalog DDL, and transaction acquisition, wiring
//! together [`crate::catalog::Catalog`], [`crate::row::RowStore`],
//! [`crate::index::IndexStore`] and [`crate::txn::TxnManager`] over one
//! underlying [`Engine`].

use std::ops::Bound;
use std::time::Duration;

use crate::catalog::schema::{Database, IndexDef, Table};
use crate::catalog::{Catalog, TableSpec};
use crate::error::{CResult, Error};
use crate::index::{IndexSpec, IndexStore};
use crate::mvcc;
use crate::row::{RowIter, RowStore, ScanOptions};
use crate::storage::engine::Engine;
use crate::txn::{IsolationLevel, Txn, TxnManager};
use crate::value::Value;

/// An opaque descriptor for a contiguous subrange of a table's key
/// space. This facade's minimal, faithful
/// implementation always returns exactly one partition per table,
/// covering its entire data prefix; a parallel-scan-capable engine
/// would subdivide by sampled split points instead, without changing
/// this type's shape.
#[derive(Debug, Clone, Copy)]
pub struct Partition {
    pub table_id: u64,
    ordinal: usize,
}

/// A transaction-scoped view over one table: schema plus every
/// per-row and per-index operation a planner issues against it.
pub struct TableView<E: Engine> {
    catalog: Catalog<E>,
    rows: RowStore,
    indexes: IndexStore,
    table: Table,
}

impl<E: Engine> TableView<E> {
    pub fn schema(&self) -> &Table {
        &self.table
    }

    pub fn collation(&self) -> &str {
        &self.table.collation
    }

    /// Always a single partition spanning the whole table (see
    /// [`Partition`]'s doc comment).
    pub fn partitions(&self) -> Vec<Partition> {
        vec![Partition { table_id: self.table.id, ordinal: 0 }]
    }

    pub fn scan_partition(&self, txn: &Txn<E>, partition: &Partition, options: ScanOptions) -> CResult<RowIter<E>> {
        debug_assert_eq!(partition.table_id, self.table.id);
        self.rows.scan(txn, &self.table, options)
    }

    pub fn scan(&self, txn: &Txn<E>, options: ScanOptions) -> CResult<RowIter<E>> {
        self.rows.scan(txn, &self.table, options)
    }

    pub fn read(&self, txn: &Txn<E>, pk: &[Value]) -> CResult<Option<Vec<Value>>> {
        self.rows.read(txn, &self.table, pk)
    }

    pub fn insert(&self, txn: &Txn<E>, values: Vec<Value>) -> CResult<Vec<Value>> {
        self.rows.insert(txn, &self.table, values)
    }

    pub fn update(&self, txn: &Txn<E>, pk: &[Value], values: Vec<Value>) -> CResult<()> {
        self.rows.update(txn, &self.table, pk, values)
    }

    pub fn delete(&self, txn: &Txn<E>, pk: &[Value]) -> CResult<()> {
        self.rows.delete(txn, &self.table, pk)
    }

    pub fn lookup_eq(&self, txn: &Txn<E>, index: &str, values: &[Value]) -> CResult<Vec<Vec<Value>>> {
        self.indexes.lookup_eq(txn, &self.table, index, values)
    }

    pub fn lookup_range(
        &self,
        txn: &Txn<E>,
        index: &str,
        lo: Bound<Vec<Value>>,
        hi: Bound<Vec<Value>>,
        reverse: bool,
    ) -> CResult<Vec<Vec<Value>>> {
        self.indexes.lookup_range(txn, &self.table, index, lo, hi, reverse)
    }

    pub fn create_index(&mut self, txn: &Txn<E>, spec: IndexSpec) -> CResult<IndexDef> {
        self.indexes.create_index(txn, &self.catalog, &mut self.table, spec)
    }

    pub fn drop_index(&mut self, txn: &Txn<E>, name: &str) -> CResult<()> {
        self.indexes.drop_index(txn, &self.catalog, &mut self.table, name)
    }
}

/// Ties the storage layers together behind a single facade. One
/// instance per running server, shared across sessions.
pub struct RelationalEngine<E: Engine> {
    txn_manager: TxnManager<E>,
    catalog: Catalog<E>,
    rows: RowStore,
    indexes: IndexStore,
}

impl<E: Engine> RelationalEngine<E> {
    pub fn new(storage: E) -> Self {
        RelationalEngine { txn_manager: TxnManager::new(storage), catalog: Catalog::new(), rows: RowStore::new(), indexes: IndexStore::new() }
    }

    // --- Transaction acquisition (delegates to the Transaction Manager) ---

    pub fn begin(&self, read_only: bool, isolation: IsolationLevel, deadline: Option<Duration>) -> CResult<Txn<E>> {
        self.txn_manager.begin(read_only, isolation, deadline)
    }

    pub fn resume(&self, state: mvcc::transaction::TransactionState, isolation: IsolationLevel, deadline: Option<Duration>) -> CResult<Txn<E>> {
        self.txn_manager.resume(state, isolation, deadline)
    }

    pub fn status(&self) -> CResult<mvcc::mvcc::Status> {
        self.txn_manager.status()
    }

    /// Runs `f` against `txn` if given, otherwise opens and commits a
    /// transaction of its own — the "each runs in its own implicit
    /// transaction if none is open" rule DDL statements get.
    fn with_txn<T>(&self, txn: Option<&Txn<E>>, f: impl FnOnce(&Txn<E>) -> CResult<T>) -> CResult<T> {
        match txn {
            Some(txn) => f(txn),
            None => {
                let txn = self.txn_manager.begin(false, IsolationLevel::default(), None)?;
                let result = f(&txn)?;
                txn.commit()?;
                Ok(result)
            }
        }
    }

    // --- Database listing and lookup (delegates to Catalog) ---

    pub fn list_databases(&self, txn: &Txn<E>) -> CResult<Vec<String>> {
        self.catalog.list_databases(txn)
    }

    pub fn get_database(&self, txn: &Txn<E>, name: &str) -> CResult<Option<Database>> {
        self.catalog.get_database(txn, name)
    }

    pub fn database_exists(&self, txn: &Txn<E>, name: &str) -> CResult<bool> {
        self.catalog.database_exists(txn, name)
    }

    // --- Table views ---

    pub fn table(&self, txn: &Txn<E>, db_id: u64, name: &str) -> CResult<Option<TableView<E>>> {
        Ok(self
            .catalog
            .get_table(txn, db_id, name)?
            .map(|table| TableView { catalog: self.catalog.clone(), rows: self.rows, indexes: self.indexes, table }))
    }

    pub fn list_tables(&self, txn: &Txn<E>, db_id: u64) -> CResult<Vec<String>> {
        self.catalog.list_tables(txn, db_id)
    }

    pub fn table_exists(&self, txn: &Txn<E>, db_id: u64, name: &str) -> CResult<bool> {
        self.catalog.table_exists(txn, db_id, name)
    }

    // --- Catalog mutations (DDL) ---

    pub fn create_database(&self, txn: Option<&Txn<E>>, name: &str) -> CResult<Database> {
        self.with_txn(txn, |txn| self.catalog.create_database(txn, name))
    }

    pub fn drop_database(&self, txn: Option<&Txn<E>>, name: &str) -> CResult<()> {
        self.with_txn(txn, |txn| self.catalog.drop_database(txn, name))
    }

    pub fn create_table(&self, txn: Option<&Txn<E>>, db_id: u64, name: &str, spec: TableSpec) -> CResult<Table> {
        self.with_txn(txn, |txn| self.catalog.create_table(txn, db_id, name, spec))
    }

    pub fn drop_table(&self, txn: Option<&Txn<E>>, db_id: u64, name: &str) -> CResult<()> {
        self.with_txn(txn, |txn| self.catalog.drop_table(txn, db_id, name))
    }

    pub fn rename_table(&self, txn: Option<&Txn<E>>, db_id: u64, old: &str, new: &str) -> CResult<()> {
        self.with_txn(txn, |txn| self.catalog.rename_table(txn, db_id, old, new))
    }

    pub fn create_index(&self, txn: Option<&Txn<E>>, db_id: u64, table_name: &str, spec: IndexSpec) -> CResult<IndexDef> {
        self.with_txn(txn, |txn| {
            let mut table = self
                .catalog
                .get_table(txn, db_id, table_name)?
                .ok_or_else(|| Error::NotFound(format!("table '{}'", table_name)))?;
            self.indexes.create_index(txn, &self.catalog, &mut table, spec)
        })
    }

    pub fn drop_index(&self, txn: Option<&Txn<E>>, db_id: u64, table_name: &str, index_name: &str) -> CResult<()> {
        self.with_txn(txn, |txn| {
            let mut table = self
                .catalog
                .get_table(txn, db_id, table_name)?
                .ok_or_else(|| Error::NotFound(format!("table '{}'", table_name)))?;
            self.indexes.drop_index(txn, &self.catalog, &mut table, index_name)
        })
    }
}
