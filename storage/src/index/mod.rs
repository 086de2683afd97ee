//! Index store: secondary indexes over a table's rows,
//! keyed `index_id | indexed_columns | primary_key` so a lookup walks
//! straight from an index hit to the row key (`codec::key::index_entry_key`).
//! Row-level maintenance of these entries on insert/update/delete lives in
//! [`crate::row::RowStore`]; this module only owns index lifecycle
//! (`create_index`/`drop_index`, including backfill) and the two read
//! paths a planner would use (`lookup_eq`/`lookup_range`).

use std::collections::HashSet;
use std::ops::Bound;

use crate::catalog::schema::{IndexDef, Table};
use crate::catalog::Catalog;
use crate::codec::key::{self, take_value_for_key};
use crate::error::{CResult, Error};
use crate::row::{prefix_upper_bound, RowStore};
use crate::storage::engine::Engine;
use crate::txn::Txn;
use crate::value::Value;

fn values_eq(a: &[Value], b: &[Value]) -> bool {
    format!("{:?}", a) == format!("{:?}", b)
}

fn decode_pk_suffix(value_prefix_len: usize, entry_key: &[u8]) -> CResult<Vec<Value>> {
    let mut suffix = &entry_key[value_prefix_len..];
    let mut pk = Vec::new();
    while !suffix.is_empty() {
        pk.push(take_value_for_key(&mut suffix)?);
    }
    Ok(pk)
}

#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Default, Clone, Copy)]
pub struct IndexStore;

impl IndexStore {
    pub fn new() -> Self {
        IndexStore
    }

    /// Creates an index and backfills it from every row already in the
    /// table, all within `txn`. On a uniqueness violation during
    /// backfill the index is not added to `table` and nothing is
    /// persisted for it; the caller's transaction is left to roll back.
    pub fn create_index<E: Engine>(
        &self,
        txn: &Txn<E>,
        catalog: &Catalog<E>,
        table: &mut Table,
        spec: IndexSpec,
    ) -> CResult<IndexDef> {
        if table.index(&spec.name).is_some() {
            return Err(Error::AlreadyExists(format!("index '{}' already exists on table '{}'", spec.name, table.name)));
        }
        for col in &spec.columns {
            table.column_index(col)?;
        }

        let def = IndexDef { id: catalog.next_id(txn)?, name: spec.name, table_id: table.id, columns: spec.columns, unique: spec.unique };
        txn.set(&key::catalog_index_key(table.id, &def.name), bincode::serialize(&def)?)?;

        // Walk the raw data range rather than `RowStore::scan` so the
        // primary key comes straight from the row key: tables with no
        // declared primary key carry a synthetic row id that isn't part
        // of the decoded row value.
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for entry in txn.scan_prefix(&key::data_table_prefix(table.id))? {
            let (row_key, row_value) = entry?;
            let pk = key::decode_data_row_key(table.id, &row_key)?;
            let row = crate::codec::row_codec::decode_row(&row_value)?;
            let tuple = table.index_tuple(&def, &row)?;
            if def.unique {
                let marker = format!("{:?}", tuple);
                if !seen.insert(marker) {
                    return Err(Error::DuplicateKey(format!(
                        "cannot create unique index '{}': existing rows collide",
                        def.name
                    )));
                }
            }
            entries.push(key::index_entry_key(def.id, &tuple, &pk)?);
        }
        for entry_key in entries {
            txn.set(&entry_key, Vec::new())?;
        }

        table.indexes.push(def.clone());
        catalog.put_table(txn, table)?;
        Ok(def)
    }

    /// Drops an index, deleting every entry it owns.
    pub fn drop_index<E: Engine>(&self, txn: &Txn<E>, catalog: &Catalog<E>, table: &mut Table, name: &str) -> CResult<()> {
        let def = table.index(name).cloned().ok_or_else(|| Error::NotFound(format!("index '{}' on table '{}'", name, table.name)))?;
        let entry_keys = txn.scan_prefix(&key::index_prefix(def.id))?.collect::<CResult<Vec<_>>>()?;
        for (entry_key, _) in entry_keys {
            txn.delete(&entry_key)?;
        }
        txn.delete(&key::catalog_index_key(table.id, name))?;
        table.indexes.retain(|i| i.name != name);
        catalog.put_table(txn, table)?;
        Ok(())
    }

    /// Rows whose indexed columns equal `values` exactly.
    pub fn lookup_eq<E: Engine>(&self, txn: &Txn<E>, table: &Table, index_name: &str, values: &[Value]) -> CResult<Vec<Vec<Value>>> {
        let def = table.index(index_name).ok_or_else(|| Error::NotFound(format!("index '{}' on table '{}'", index_name, table.name)))?;
        let prefix = key::index_value_prefix(def.id, values)?;
        let rows = RowStore::new();
        let mut out = Vec::new();
        for entry in txn.scan_prefix(&prefix)? {
            let (entry_key, _) = entry?;
            let pk = decode_pk_suffix(prefix.len(), &entry_key)?;
            let row = rows
                .read(txn, table, &pk)?
                .ok_or_else(|| Error::Internal(format!("index '{}' points at a missing row", index_name)))?;
            out.push(row);
        }
        Ok(out)
    }

    /// Rows whose indexed columns fall within `(lo, hi)`, in index
    /// order (or its reverse, if `reverse`).
    pub fn lookup_range<E: Engine>(
        &self,
        txn: &Txn<E>,
        table: &Table,
        index_name: &str,
        lo: Bound<Vec<Value>>,
        hi: Bound<Vec<Value>>,
        reverse: bool,
    ) -> CResult<Vec<Vec<Value>>> {
        let def = table.index(index_name).ok_or_else(|| Error::NotFound(format!("index '{}' on table '{}'", index_name, table.name)))?;
        let base_prefix = key::index_prefix(def.id);

        let start = match lo {
            Bound::Unbounded => Bound::Included(base_prefix.clone()),
            Bound::Included(tuple) => Bound::Included(key::index_value_prefix(def.id, &tuple)?),
            Bound::Excluded(tuple) => match prefix_upper_bound(&key::index_value_prefix(def.id, &tuple)?) {
                Bound::Excluded(b) => Bound::Included(b),
                other => other,
            },
        };
        let end = match hi {
            Bound::Unbounded => prefix_upper_bound(&base_prefix),
            Bound::Included(tuple) => prefix_upper_bound(&key::index_value_prefix(def.id, &tuple)?),
            Bound::Excluded(tuple) => Bound::Excluded(key::index_value_prefix(def.id, &tuple)?),
        };

        let scan = txn.scan((start, end))?;
        let rows = RowStore::new();
        let mut results = Vec::new();
        if reverse {
            for entry in scan.rev() {
                let (entry_key, _) = entry?;
                let pk = decode_pk_suffix(base_prefix.len(), &entry_key)?;
                if let Some(row) = rows.read(txn, table, &pk)? {
                    results.push(row);
                }
            }
        } else {
            for entry in scan {
                let (entry_key, _) = entry?;
                let pk = decode_pk_suffix(base_prefix.len(), &entry_key)?;
                if let Some(row) = rows.read(txn, table, &pk)? {
                    results.push(row);
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::schema::Column;
    use crate::catalog::{Catalog, TableSpec};
    use crate::row::RowStore;
    use crate::storage::memory::Memory;
    use crate::txn::{IsolationLevel, TxnManager};
    use crate::value::DataType;

    fn setup() -> (TxnManager<Memory>, Catalog<Memory>, Table) {
        let mgr = TxnManager::new(Memory::new());
        let catalog = Catalog::new();
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None).unwrap();
        let db = catalog.create_database(&txn, "d").unwrap();
        let spec = TableSpec {
            columns: vec![
                Column { name: "id".into(), data_type: DataType::Int64, nullable: false, default: None, auto_increment: false },
                Column { name: "email".into(), data_type: DataType::String, nullable: false, default: None, auto_increment: false },
            ],
            primary_key: vec!["id".into()],
            indexes: vec![],
            collation: "x".into(),
        };
        let table = catalog.create_table(&txn, db.id, "users", spec).unwrap();
        let rows = RowStore::new();
        rows.insert(&txn, &table, vec![Value::Int64(1), Value::String("a@x".into())]).unwrap();
        rows.insert(&txn, &table, vec![Value::Int64(2), Value::String("b@x".into())]).unwrap();
        txn.commit().unwrap();
        (mgr, catalog, table)
    }

    #[test]
    fn create_index_backfills_existing_rows() -> CResult<()> {
        let (mgr, catalog, mut table) = setup();
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let indexes = IndexStore::new();
        indexes.create_index(&txn, &catalog, &mut table, IndexSpec { name: "idx_email".into(), columns: vec!["email".into()], unique: true })?;
        let hits = indexes.lookup_eq(&txn, &table, "idx_email", &[Value::String("b@x".into())])?;
        assert_eq!(hits.len(), 1);
        assert!(matches!(hits[0][0], Value::Int64(2)));
        txn.commit()
    }

    #[test]
    fn create_unique_index_rejects_colliding_existing_rows() -> CResult<()> {
        let (mgr, catalog, mut table) = setup();
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let rows = RowStore::new();
        rows.insert(&txn, &table, vec![Value::Int64(3), Value::String("a@x".into())])?;
        let indexes = IndexStore::new();
        match indexes.create_index(&txn, &catalog, &mut table, IndexSpec { name: "idx_email".into(), columns: vec!["email".into()], unique: true }) {
            Err(Error::DuplicateKey(_)) => {}
            other => panic!("expected DuplicateKey, got {:?}", other.map(|_| ())),
        }
        txn.rollback()
    }

    #[test]
    fn drop_index_removes_entries() -> CResult<()> {
        let (mgr, catalog, mut table) = setup();
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let indexes = IndexStore::new();
        indexes.create_index(&txn, &catalog, &mut table, IndexSpec { name: "idx_email".into(), columns: vec!["email".into()], unique: false })?;
        indexes.drop_index(&txn, &catalog, &mut table, "idx_email")?;
        assert!(table.index("idx_email").is_none());
        txn.commit()
    }

    #[test]
    fn lookup_range_respects_bounds() -> CResult<()> {
        let (mgr, catalog, mut table) = setup();
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let indexes = IndexStore::new();
        indexes.create_index(&txn, &catalog, &mut table, IndexSpec { name: "idx_email".into(), columns: vec!["email".into()], unique: false })?;
        let hits = indexes.lookup_range(&txn, &table, "idx_email", Bound::Included(vec![Value::String("a@x".into())]), Bound::Unbounded, false)?;
        assert_eq!(hits.len(), 2);
        let hits = indexes.lookup_range(&txn, &table, "idx_email", Bound::Unbounded, Bound::Excluded(vec![Value::String("b@x".into())]), false)?;
        assert_eq!(hits.len(), 1);
        txn.commit()
    }
}
