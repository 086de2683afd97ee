//! Persistent directory of databases, tables, and indexes. Definitions
//! are written through the caller's transaction, so a DDL statement's
//! catalog change and the data/index ranges it touches commit or abort
//! together. An in-memory cache sits in front of reads; mutations
//! evict rather than write through it (commit-hook invalidation, not
//! write-through — see DESIGN.md for how eviction timing is resolved
//! against the single-mutable-ref `Engine` this sits on).

pub mod schema;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::catalog::schema::{Column, Database, IndexDef, Table};
use crate::codec::key;
use crate::error::{CResult, Error};
use crate::storage::engine::Engine;
use crate::txn::Txn;

/// A column/index definition as given to `create_table`, before the
/// catalog has assigned table and index ids.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
    pub indexes: Vec<IndexSpec>,
    pub collation: String,
}

#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Default)]
struct CatalogCache {
    databases: HashMap<String, Database>,
    tables: HashMap<(u64, String), Table>,
}

pub struct Catalog<E: Engine> {
    cache: Arc<Mutex<CatalogCache>>,
    _marker: std::marker::PhantomData<E>,
}

impl<E: Engine> Clone for Catalog<E> {
    fn clone(&self) -> Self {
        Catalog { cache: self.cache.clone(), _marker: std::marker::PhantomData }
    }
}

impl<E: Engine> Catalog<E> {
    pub fn new() -> Self {
        Catalog { cache: Arc::new(Mutex::new(CatalogCache::default())), _marker: std::marker::PhantomData }
    }

    pub(crate) fn next_id(&self, txn: &Txn<E>) -> CResult<u64> {
        let seq_key = key::catalog_id_sequence_key();
        let next = match txn.get(&seq_key)? {
            Some(v) => bincode::deserialize::<u64>(&v)?,
            None => 1,
        };
        txn.set(&seq_key, bincode::serialize(&(next + 1))?)?;
        Ok(next)
    }

    fn evict_database(&self, name: &str) {
        let mut cache = self.cache.lock().expect("catalog cache mutex poisoned");
        cache.databases.remove(name);
    }

    fn evict_table(&self, db_id: u64, name: &str) {
        let mut cache = self.cache.lock().expect("catalog cache mutex poisoned");
        cache.tables.remove(&(db_id, name.to_string()));
    }

    pub fn create_database(&self, txn: &Txn<E>, name: &str) -> CResult<Database> {
        let db_key = key::catalog_database_key(name);
        if txn.get(&db_key)?.is_some() {
            return Err(Error::AlreadyExists(format!("database '{}' already exists", name)));
        }
        let db = Database { id: self.next_id(txn)?, name: name.to_string() };
        txn.set(&db_key, bincode::serialize(&db)?)?;
        Ok(db)
    }

    pub fn database_exists(&self, txn: &Txn<E>, name: &str) -> CResult<bool> {
        Ok(self.get_database(txn, name)?.is_some())
    }

    pub fn get_database(&self, txn: &Txn<E>, name: &str) -> CResult<Option<Database>> {
        if let Some(db) = self.cache.lock().expect("catalog cache mutex poisoned").databases.get(name) {
            return Ok(Some(db.clone()));
        }
        let Some(bytes) = txn.get(&key::catalog_database_key(name))? else { return Ok(None) };
        let db: Database = bincode::deserialize(&bytes)?;
        self.cache.lock().expect("catalog cache mutex poisoned").databases.insert(name.to_string(), db.clone());
        Ok(Some(db))
    }

    /// Ordered by name: the catalog key encodes the name with the
    /// order-preserving byte codec, so the prefix scan already returns
    /// entries in sorted order.
    pub fn list_databases(&self, txn: &Txn<E>) -> CResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in txn.scan_prefix(&key::catalog_database_prefix())? {
            let (_, value) = entry?;
            let db: Database = bincode::deserialize(&value)?;
            names.push(db.name);
        }
        Ok(names)
    }

    /// Drops a database and cascades to every table it contains,
    /// deleting their data and index ranges in the same transaction.
    pub fn drop_database(&self, txn: &Txn<E>, name: &str) -> CResult<()> {
        let db = self.get_database(txn, name)?.ok_or_else(|| Error::NotFound(format!("database '{}'", name)))?;
        for table_name in self.list_tables(txn, db.id)? {
            self.drop_table(txn, db.id, &table_name)?;
        }
        txn.delete(&key::catalog_database_key(name))?;
        self.evict_database(name);
        Ok(())
    }

    pub fn create_table(&self, txn: &Txn<E>, db_id: u64, name: &str, spec: TableSpec) -> CResult<Table> {
        let table_key = key::catalog_table_key(db_id, name);
        if txn.get(&table_key)?.is_some() {
            return Err(Error::AlreadyExists(format!("table '{}' already exists", name)));
        }
        for pk_col in &spec.primary_key {
            if !spec.columns.iter().any(|c| &c.name == pk_col) {
                return Err(Error::InvalidSchema(format!("primary key column '{}' is not declared", pk_col)));
            }
        }
        let table_id = self.next_id(txn)?;
        let mut indexes = Vec::with_capacity(spec.indexes.len());
        for idx in &spec.indexes {
            for col in &idx.columns {
                if !spec.columns.iter().any(|c| &c.name == col) {
                    return Err(Error::InvalidSchema(format!(
                        "index '{}' references undeclared column '{}'",
                        idx.name, col
                    )));
                }
            }
            let index_id = self.next_id(txn)?;
            let def = IndexDef { id: index_id, name: idx.name.clone(), table_id, columns: idx.columns.clone(), unique: idx.unique };
            txn.set(&key::catalog_index_key(table_id, &def.name), bincode::serialize(&def)?)?;
            indexes.push(def);
        }
        let table = Table {
            id: table_id,
            db_id,
            name: name.to_string(),
            columns: spec.columns,
            primary_key: spec.primary_key,
            indexes,
            collation: spec.collation,
        };
        txn.set(&table_key, bincode::serialize(&table)?)?;
        Ok(table)
    }

    pub fn table_exists(&self, txn: &Txn<E>, db_id: u64, name: &str) -> CResult<bool> {
        Ok(self.get_table(txn, db_id, name)?.is_some())
    }

    pub fn get_table(&self, txn: &Txn<E>, db_id: u64, name: &str) -> CResult<Option<Table>> {
        if let Some(table) = self.cache.lock().expect("catalog cache mutex poisoned").tables.get(&(db_id, name.to_string())) {
            return Ok(Some(table.clone()));
        }
        let Some(bytes) = txn.get(&key::catalog_table_key(db_id, name))? else { return Ok(None) };
        let table: Table = bincode::deserialize(&bytes)?;
        self.cache
            .lock()
            .expect("catalog cache mutex poisoned")
            .tables
            .insert((db_id, name.to_string()), table.clone());
        Ok(Some(table))
    }

    pub fn list_tables(&self, txn: &Txn<E>, db_id: u64) -> CResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in txn.scan_prefix(&key::catalog_table_prefix(db_id))? {
            let (_, value) = entry?;
            let table: Table = bincode::deserialize(&value)?;
            names.push(table.name);
        }
        Ok(names)
    }

    pub fn rename_table(&self, txn: &Txn<E>, db_id: u64, old: &str, new: &str) -> CResult<()> {
        let mut table = self.get_table(txn, db_id, old)?.ok_or_else(|| Error::NotFound(format!("table '{}'", old)))?;
        if txn.get(&key::catalog_table_key(db_id, new))?.is_some() {
            return Err(Error::AlreadyExists(format!("table '{}' already exists", new)));
        }
        txn.delete(&key::catalog_table_key(db_id, old))?;
        table.name = new.to_string();
        txn.set(&key::catalog_table_key(db_id, new), bincode::serialize(&table)?)?;
        self.evict_table(db_id, old);
        Ok(())
    }

    /// Drops a table, deleting its catalog entry, its index
    /// definitions, and the data/index key ranges they own, all within
    /// `txn`.
    pub fn drop_table(&self, txn: &Txn<E>, db_id: u64, name: &str) -> CResult<()> {
        let table = self.get_table(txn, db_id, name)?.ok_or_else(|| Error::NotFound(format!("table '{}'", name)))?;

        let data_keys = txn.scan_prefix(&key::data_table_prefix(table.id))?.collect::<CResult<Vec<_>>>()?;
        for (k, _) in data_keys {
            txn.delete(&k)?;
        }
        for idx in &table.indexes {
            let index_keys = txn.scan_prefix(&key::index_prefix(idx.id))?.collect::<CResult<Vec<_>>>()?;
            for (k, _) in index_keys {
                txn.delete(&k)?;
            }
            txn.delete(&key::catalog_index_key(table.id, &idx.name))?;
        }
        txn.delete(&key::sequence_key(table.id))?;
        txn.delete(&key::catalog_table_key(db_id, name))?;
        self.evict_table(db_id, name);
        Ok(())
    }

    /// Persists a table definition that has already been mutated
    /// in-place (e.g. after `create_index`/`drop_index`), evicting the
    /// stale cache entry.
    pub(crate) fn put_table(&self, txn: &Txn<E>, table: &Table) -> CResult<()> {
        txn.set(&key::catalog_table_key(table.db_id, &table.name), bincode::serialize(table)?)?;
        self.evict_table(table.db_id, &table.name);
        Ok(())
    }
}

impl<E: Engine> Default for Catalog<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::Memory;
    use crate::txn::{IsolationLevel, TxnManager};
    use crate::value::DataType;

    fn harness() -> (TxnManager<Memory>, Catalog<Memory>) {
        (TxnManager::new(Memory::new()), Catalog::new())
    }

    fn id_col(name: &str) -> Column {
        Column { name: name.into(), data_type: DataType::Int32, nullable: false, default: None, auto_increment: false }
    }

    #[test]
    fn create_and_get_database() -> CResult<()> {
        let (mgr, cat) = harness();
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let db = cat.create_database(&txn, "testdb")?;
        assert_eq!(db.name, "testdb");
        assert!(cat.database_exists(&txn, "testdb")?);
        txn.commit()
    }

    #[test]
    fn create_database_twice_fails() -> CResult<()> {
        let (mgr, cat) = harness();
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        cat.create_database(&txn, "testdb")?;
        assert!(matches!(cat.create_database(&txn, "testdb"), Err(Error::AlreadyExists(_))));
        txn.commit()
    }

    #[test]
    fn list_databases_is_name_ordered() -> CResult<()> {
        let (mgr, cat) = harness();
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        cat.create_database(&txn, "zeta")?;
        cat.create_database(&txn, "alpha")?;
        cat.create_database(&txn, "mid")?;
        assert_eq!(cat.list_databases(&txn)?, vec!["alpha".to_string(), "mid".to_string(), "zeta".to_string()]);
        txn.commit()
    }

    #[test]
    fn create_table_and_round_trip() -> CResult<()> {
        let (mgr, cat) = harness();
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let db = cat.create_database(&txn, "testdb")?;
        let spec = TableSpec {
            columns: vec![id_col("id")],
            primary_key: vec!["id".into()],
            indexes: vec![],
            collation: "utf8mb4_general_ci".into(),
        };
        let table = cat.create_table(&txn, db.id, "users", spec)?;
        assert_eq!(table.name, "users");
        let fetched = cat.get_table(&txn, db.id, "users")?.unwrap();
        assert_eq!(fetched.id, table.id);
        txn.commit()
    }

    #[test]
    fn drop_database_cascades_tables() -> CResult<()> {
        let (mgr, cat) = harness();
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let db = cat.create_database(&txn, "testdb")?;
        let spec = TableSpec { columns: vec![id_col("id")], primary_key: vec!["id".into()], indexes: vec![], collation: "x".into() };
        cat.create_table(&txn, db.id, "users", spec)?;
        cat.drop_database(&txn, "testdb")?;
        assert!(!cat.table_exists(&txn, db.id, "users")?);
        assert!(!cat.database_exists(&txn, "testdb")?);
        txn.commit()
    }

    #[test]
    fn rename_table_preserves_id() -> CResult<()> {
        let (mgr, cat) = harness();
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let db = cat.create_database(&txn, "testdb")?;
        let spec = TableSpec { columns: vec![id_col("id")], primary_key: vec!["id".into()], indexes: vec![], collation: "x".into() };
        let table = cat.create_table(&txn, db.id, "users", spec)?;
        cat.rename_table(&txn, db.id, "users", "people")?;
        assert!(cat.get_table(&txn, db.id, "users")?.is_none());
        let renamed = cat.get_table(&txn, db.id, "people")?.unwrap();
        assert_eq!(renamed.id, table.id);
        txn.commit()
    }
}
