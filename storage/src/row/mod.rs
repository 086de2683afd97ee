//! Row store: maps a table's primary key to its full row, keeping
//! every secondary index in sync with the row in the same transaction
//! — the "N+1 writes" shape, one row write plus one entry per index.

use std::ops::Bound;

use crate::catalog::schema::{IndexDef, Table};
use crate::codec::key;
use crate::codec::row_codec::{decode_row, encode_row};
use crate::error::{CResult, Error};
use crate::mvcc::scan::Scan;
use crate::storage::engine::Engine;
use crate::txn::Txn;
use crate::value::Value;

fn values_eq(a: &[Value], b: &[Value]) -> bool {
    format!("{:?}", a) == format!("{:?}", b)
}

/// Smallest byte string strictly greater than every string with the
/// given prefix, mirroring `Engine`'s default `scan_prefix` bound so a
/// partially-bounded range scan can still close off a table's key
/// space exactly.
pub(crate) fn prefix_upper_bound(prefix: &[u8]) -> Bound<Vec<u8>> {
    match prefix.iter().rposition(|b| *b != 0xff) {
        Some(i) => Bound::Excluded(prefix.iter().take(i).copied().chain(std::iter::once(prefix[i] + 1)).collect()),
        None => Bound::Unbounded,
    }
}

/// A primary-key range to scan, in primary-key tuple order.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub start: Bound<Vec<Value>>,
    pub end: Bound<Vec<Value>>,
    pub reverse: bool,
    pub limit: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions { start: Bound::Unbounded, end: Bound::Unbounded, reverse: false, limit: None }
    }
}

enum RowIterInner<E: Engine> {
    Forward(Scan<E>),
    Reverse(std::iter::Rev<Scan<E>>),
}

/// Iterator over full rows in primary-key order (or its reverse).
pub struct RowIter<E: Engine> {
    inner: RowIterInner<E>,
    remaining: Option<usize>,
}

impl<E: Engine> Iterator for RowIter<E> {
    type Item = CResult<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        let entry = match &mut self.inner {
            RowIterInner::Forward(scan) => scan.next(),
            RowIterInner::Reverse(scan) => scan.next(),
        };
        let (_, value) = match entry? {
            Ok(kv) => kv,
            Err(err) => return Some(Err(err)),
        };
        if let Some(remaining) = &mut self.remaining {
            *remaining -= 1;
        }
        Some(decode_row(&value))
    }
}

/// Stateless: every operation takes the table definition and
/// transaction it runs under, the same shape `catalog::Catalog` and
/// `index` use.
#[derive(Default, Clone, Copy)]
pub struct RowStore;

impl RowStore {
    pub fn new() -> Self {
        RowStore
    }

    fn next_sequence<E: Engine>(&self, txn: &Txn<E>, table_id: u64) -> CResult<u64> {
        let seq_key = key::sequence_key(table_id);
        let next = match txn.get(&seq_key)? {
            Some(v) => bincode::deserialize::<u64>(&v)?,
            None => 1,
        };
        txn.set(&seq_key, bincode::serialize(&(next + 1))?)?;
        Ok(next)
    }

    /// Checks a unique index's target tuple for a collision, ignoring
    /// any existing entry that belongs to `ignore_pk` — the row being
    /// updated, whose own (stale) entry under this same tuple isn't a
    /// collision with itself.
    fn check_unique<E: Engine>(
        &self,
        txn: &Txn<E>,
        idx: &IndexDef,
        tuple: &[Value],
        pk: &[Value],
        ignore_pk: Option<&[Value]>,
    ) -> CResult<()> {
        if !idx.unique {
            return Ok(());
        }
        let value_prefix = key::index_value_prefix(idx.id, tuple)?;
        for entry in txn.scan_prefix(&value_prefix)? {
            let (entry_key, _) = entry?;
            // The index entry key is `index_id | tuple | pk`; any hit under
            // this prefix belonging to a different pk is a collision.
            let mut suffix = &entry_key[value_prefix.len()..];
            let mut other_pk = Vec::new();
            while !suffix.is_empty() {
                other_pk.push(key::take_value_for_key(&mut suffix)?);
            }
            if values_eq(&other_pk, pk) {
                continue;
            }
            if let Some(ignore) = ignore_pk {
                if values_eq(&other_pk, ignore) {
                    continue;
                }
            }
            return Err(Error::DuplicateKey(format!("duplicate entry for unique index '{}'", idx.name)));
        }
        Ok(())
    }

    /// Applies column defaults and auto-increment, inserts the row and
    /// every index entry, and returns the row as actually stored
    /// (auto-increment/default columns filled in).
    pub fn insert<E: Engine>(&self, txn: &Txn<E>, table: &Table, mut values: Vec<Value>) -> CResult<Vec<Value>> {
        if values.len() != table.columns.len() {
            return Err(Error::InvalidSchema(format!(
                "table '{}' has {} columns, got {} values",
                table.name,
                table.columns.len(),
                values.len()
            )));
        }
        for (i, column) in table.columns.iter().enumerate() {
            if values[i].is_null() && column.auto_increment {
                let id = self.next_sequence(txn, table.id)?;
                values[i] = Value::UInt64(id).cast(column.data_type)?;
            } else if values[i].is_null() {
                if let Some(default) = &column.default {
                    values[i] = default.clone();
                } else if !column.nullable {
                    return Err(Error::ConstraintViolation(format!(
                        "column '{}' on table '{}' cannot be null",
                        column.name, table.name
                    )));
                }
            }
        }

        let pk = if table.has_declared_primary_key() {
            let pk = table.pk_tuple(&values)?;
            if pk.iter().any(Value::is_null) {
                return Err(Error::ConstraintViolation(format!(
                    "primary key column cannot be null on table '{}'",
                    table.name
                )));
            }
            pk
        } else {
            vec![Value::UInt64(self.next_sequence(txn, table.id)?)]
        };

        let row_key = key::data_row_key(table.id, &pk)?;
        if txn.get(&row_key)?.is_some() {
            return Err(Error::DuplicateKey(format!("duplicate primary key on table '{}'", table.name)));
        }

        for idx in &table.indexes {
            let tuple = table.index_tuple(idx, &values)?;
            self.check_unique(txn, idx, &tuple, &pk, None)?;
        }

        txn.set(&row_key, encode_row(&values)?)?;
        for idx in &table.indexes {
            let tuple = table.index_tuple(idx, &values)?;
            txn.set(&key::index_entry_key(idx.id, &tuple, &pk)?, Vec::new())?;
        }
        Ok(values)
    }

    pub fn read<E: Engine>(&self, txn: &Txn<E>, table: &Table, pk: &[Value]) -> CResult<Option<Vec<Value>>> {
        let row_key = key::data_row_key(table.id, pk)?;
        match txn.get(&row_key)? {
            Some(bytes) => Ok(Some(decode_row(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Replaces the row at `pk` with `new_values`, relocating it (and
    /// its index entries) if the primary key itself changed.
    pub fn update<E: Engine>(&self, txn: &Txn<E>, table: &Table, pk: &[Value], new_values: Vec<Value>) -> CResult<()> {
        let old_values = self.read(txn, table, pk)?.ok_or_else(|| Error::NotFound(format!("row in table '{}'", table.name)))?;
        let new_pk = if table.has_declared_primary_key() { table.pk_tuple(&new_values)? } else { pk.to_vec() };

        if !values_eq(&new_pk, pk) {
            let new_row_key = key::data_row_key(table.id, &new_pk)?;
            if txn.get(&new_row_key)?.is_some() {
                return Err(Error::DuplicateKey(format!("duplicate primary key on table '{}'", table.name)));
            }
        }

        for idx in &table.indexes {
            let new_tuple = table.index_tuple(idx, &new_values)?;
            let old_tuple = table.index_tuple(idx, &old_values)?;
            if !values_eq(&new_tuple, &old_tuple) || !values_eq(&new_pk, pk) {
                self.check_unique(txn, idx, &new_tuple, &new_pk, Some(pk))?;
            }
        }

        if !values_eq(&new_pk, pk) {
            txn.delete(&key::data_row_key(table.id, pk)?)?;
        }
        txn.set(&key::data_row_key(table.id, &new_pk)?, encode_row(&new_values)?)?;

        for idx in &table.indexes {
            let old_tuple = table.index_tuple(idx, &old_values)?;
            let new_tuple = table.index_tuple(idx, &new_values)?;
            if !values_eq(&old_tuple, &new_tuple) || !values_eq(&new_pk, pk) {
                txn.delete(&key::index_entry_key(idx.id, &old_tuple, pk)?)?;
                txn.set(&key::index_entry_key(idx.id, &new_tuple, &new_pk)?, Vec::new())?;
            }
        }
        Ok(())
    }

    pub fn delete<E: Engine>(&self, txn: &Txn<E>, table: &Table, pk: &[Value]) -> CResult<()> {
        let old_values = self.read(txn, table, pk)?.ok_or_else(|| Error::NotFound(format!("row in table '{}'", table.name)))?;
        txn.delete(&key::data_row_key(table.id, pk)?)?;
        for idx in &table.indexes {
            let tuple = table.index_tuple(idx, &old_values)?;
            txn.delete(&key::index_entry_key(idx.id, &tuple, pk)?)?;
        }
        Ok(())
    }

    pub fn scan<E: Engine>(&self, txn: &Txn<E>, table: &Table, options: ScanOptions) -> CResult<RowIter<E>> {
        let table_prefix = key::data_table_prefix(table.id);
        let start = match options.start {
            Bound::Unbounded => Bound::Included(table_prefix.clone()),
            Bound::Included(pk) => Bound::Included(key::data_row_key(table.id, &pk)?),
            Bound::Excluded(pk) => Bound::Excluded(key::data_row_key(table.id, &pk)?),
        };
        let end = match options.end {
            Bound::Unbounded => prefix_upper_bound(&table_prefix),
            Bound::Included(pk) => Bound::Included(key::data_row_key(table.id, &pk)?),
            Bound::Excluded(pk) => Bound::Excluded(key::data_row_key(table.id, &pk)?),
        };
        let scan = txn.scan((start, end))?;
        let inner = if options.reverse { RowIterInner::Reverse(scan.rev()) } else { RowIterInner::Forward(scan) };
        Ok(RowIter { inner, remaining: options.limit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::schema::Column;
    use crate::storage::memory::Memory;
    use crate::txn::{IsolationLevel, TxnManager};
    use crate::value::DataType;

    fn table_with_pk() -> Table {
        Table {
            id: 1,
            db_id: 1,
            name: "users".into(),
            columns: vec![
                Column { name: "id".into(), data_type: DataType::Int64, nullable: false, default: None, auto_increment: false },
                Column { name: "name".into(), data_type: DataType::String, nullable: true, default: None, auto_increment: false },
            ],
            primary_key: vec!["id".into()],
            indexes: vec![IndexDef { id: 1, name: "idx_name".into(), table_id: 1, columns: vec!["name".into()], unique: true }],
            collation: "utf8mb4_general_ci".into(),
        }
    }

    #[test]
    fn insert_and_read_round_trip() -> CResult<()> {
        let mgr = TxnManager::new(Memory::new());
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let store = RowStore::new();
        let table = table_with_pk();
        store.insert(&txn, &table, vec![Value::Int64(1), Value::String("ada".into())])?;
        let row = store.read(&txn, &table, &[Value::Int64(1)])?.unwrap();
        assert_eq!(format!("{:?}", row), format!("{:?}", vec![Value::Int64(1), Value::String("ada".into())]));
        txn.commit()
    }

    #[test]
    fn duplicate_primary_key_is_rejected() -> CResult<()> {
        let mgr = TxnManager::new(Memory::new());
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let store = RowStore::new();
        let table = table_with_pk();
        store.insert(&txn, &table, vec![Value::Int64(1), Value::String("ada".into())])?;
        match store.insert(&txn, &table, vec![Value::Int64(1), Value::String("bea".into())]) {
            Err(Error::DuplicateKey(_)) => {}
            other => panic!("expected DuplicateKey, got {:?}", other.map(|_| ())),
        }
        txn.commit()
    }

    #[test]
    fn unique_index_rejects_duplicate_value() -> CResult<()> {
        let mgr = TxnManager::new(Memory::new());
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let store = RowStore::new();
        let table = table_with_pk();
        store.insert(&txn, &table, vec![Value::Int64(1), Value::String("ada".into())])?;
        match store.insert(&txn, &table, vec![Value::Int64(2), Value::String("ada".into())]) {
            Err(Error::DuplicateKey(_)) => {}
            other => panic!("expected DuplicateKey, got {:?}", other.map(|_| ())),
        }
        txn.commit()
    }

    #[test]
    fn update_moves_index_entry() -> CResult<()> {
        let mgr = TxnManager::new(Memory::new());
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let store = RowStore::new();
        let table = table_with_pk();
        store.insert(&txn, &table, vec![Value::Int64(1), Value::String("ada".into())])?;
        store.update(&txn, &table, &[Value::Int64(1)], vec![Value::Int64(1), Value::String("grace".into())])?;

        // the freed index value is usable again
        store.insert(&txn, &table, vec![Value::Int64(2), Value::String("ada".into())])?;
        txn.commit()
    }

    #[test]
    fn delete_removes_row_and_index_entry() -> CResult<()> {
        let mgr = TxnManager::new(Memory::new());
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let store = RowStore::new();
        let table = table_with_pk();
        store.insert(&txn, &table, vec![Value::Int64(1), Value::String("ada".into())])?;
        store.delete(&txn, &table, &[Value::Int64(1)])?;
        assert!(store.read(&txn, &table, &[Value::Int64(1)])?.is_none());
        store.insert(&txn, &table, vec![Value::Int64(2), Value::String("ada".into())])?;
        txn.commit()
    }

    #[test]
    fn scan_returns_rows_in_primary_key_order() -> CResult<()> {
        let mgr = TxnManager::new(Memory::new());
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        let store = RowStore::new();
        let table = table_with_pk();
        store.insert(&txn, &table, vec![Value::Int64(2), Value::String("bea".into())])?;
        store.insert(&txn, &table, vec![Value::Int64(1), Value::String("ada".into())])?;
        let rows = store.scan(&txn, &table, ScanOptions::default())?.collect::<CResult<Vec<_>>>()?;
        let ids: Vec<i64> = rows.iter().map(|r| match r[0] { Value::Int64(v) => v, _ => unreachable!() }).collect();
        assert_eq!(ids, vec![1, 2]);
        txn.commit()
    }
}
