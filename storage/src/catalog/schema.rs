//! Catalog entity types: Database, Table, Column, and Index.
//! Persisted as bincode-encoded catalog records, the same
//! way `mvcc::transaction` persists its own bookkeeping values —
//! catalog keys only need point lookup and name-prefix scan, never
//! order-preserving comparison of the record body itself.

use serde::{Deserialize, Serialize};

use crate::error::{CResult, Error};
use crate::value::{DataType, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub default: Option<Value>,
    pub auto_increment: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDef {
    pub id: u64,
    pub name: String,
    pub table_id: u64,
    /// Column names, in index-key order.
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub id: u64,
    pub db_id: u64,
    pub name: String,
    pub columns: Vec<Column>,
    /// Column names making up the primary key, in declared order. Empty
    /// means the table has no declared primary key and rows are keyed
    /// by a synthetic monotonic row id.
    pub primary_key: Vec<String>,
    pub indexes: Vec<IndexDef>,
    pub collation: String,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> CResult<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::InvalidSchema(format!("no such column '{}' on table '{}'", name, self.name)))
    }

    /// Column positions of the primary key, in declared order. Empty
    /// when the table has a synthetic row id instead.
    pub fn primary_key_indices(&self) -> CResult<Vec<usize>> {
        self.primary_key.iter().map(|name| self.column_index(name)).collect()
    }

    pub fn has_declared_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Extracts the primary-key tuple from a full row, in declared
    /// primary-key order.
    pub fn pk_tuple(&self, row: &[Value]) -> CResult<Vec<Value>> {
        self.primary_key_indices()?.into_iter().map(|i| Ok(row[i].clone())).collect()
    }

    /// Extracts an index's column-value tuple from a full row.
    pub fn index_tuple(&self, index: &IndexDef, row: &[Value]) -> CResult<Vec<Value>> {
        index.columns.iter().map(|name| Ok(row[self.column_index(name)?].clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table {
            id: 1,
            db_id: 1,
            name: "users".into(),
            columns: vec![
                Column { name: "id".into(), data_type: DataType::Int32, nullable: false, default: None, auto_increment: false },
                Column { name: "email".into(), data_type: DataType::String, nullable: false, default: None, auto_increment: false },
            ],
            primary_key: vec!["id".into()],
            indexes: vec![IndexDef { id: 1, name: "idx_email".into(), table_id: 1, columns: vec!["email".into()], unique: true }],
            collation: "utf8mb4_general_ci".into(),
        }
    }

    #[test]
    fn pk_tuple_extracts_declared_columns() {
        let table = sample_table();
        let row = vec![Value::Int32(7), Value::String("a@x".into())];
        let pk = table.pk_tuple(&row).unwrap();
        assert_eq!(format!("{:?}", pk), format!("{:?}", vec![Value::Int32(7)]));
    }

    #[test]
    fn index_tuple_extracts_indexed_columns() {
        let table = sample_table();
        let row = vec![Value::Int32(7), Value::String("a@x".into())];
        let idx = table.index("idx_email").unwrap();
        let tuple = table.index_tuple(idx, &row).unwrap();
        assert_eq!(format!("{:?}", tuple), format!("{:?}", vec![Value::String("a@x".into())]));
    }

    #[test]
    fn unknown_column_is_invalid_schema() {
        let table = sample_table();
        assert!(matches!(table.column_index("missing"), Err(Error::InvalidSchema(_))));
    }
}
