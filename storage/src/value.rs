//! The typed SQL value system.
//!
//! `Value` is what rows, keys, and catalog defaults are made of; `DataType`
//! is its schema-level shadow, used by `catalog::schema::Column` and by
//! `Value::cast`. Ordering follows SQL three-valued logic: comparisons
//! against `Null` are `Unknown`, never `true`/`false`.

use std::cmp::Ordering;
use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CResult, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Decimal { precision: u8, scale: i64 },
    String,
    Bytes,
    Date,
    Time,
    Datetime,
    Timestamp,
    Json,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bool => write!(f, "BOOL"),
            DataType::Int8 => write!(f, "TINYINT"),
            DataType::Int16 => write!(f, "SMALLINT"),
            DataType::Int32 => write!(f, "INT"),
            DataType::Int64 => write!(f, "BIGINT"),
            DataType::UInt8 => write!(f, "TINYINT UNSIGNED"),
            DataType::UInt16 => write!(f, "SMALLINT UNSIGNED"),
            DataType::UInt32 => write!(f, "INT UNSIGNED"),
            DataType::UInt64 => write!(f, "BIGINT UNSIGNED"),
            DataType::Float32 => write!(f, "FLOAT"),
            DataType::Float64 => write!(f, "DOUBLE"),
            DataType::Decimal { precision, scale } => write!(f, "DECIMAL({},{})", precision, scale),
            DataType::String => write!(f, "VARCHAR"),
            DataType::Bytes => write!(f, "VARBINARY"),
            DataType::Date => write!(f, "DATE"),
            DataType::Time => write!(f, "TIME"),
            DataType::Datetime => write!(f, "DATETIME"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Json => write!(f, "JSON"),
        }
    }
}

/// Three-valued logic result for SQL comparisons and boolean expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    pub fn from_bool(b: bool) -> Truth {
        if b { Truth::True } else { Truth::False }
    }

    pub fn is_true(self) -> bool {
        matches!(self, Truth::True)
    }

    pub fn and(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            (Truth::Unknown, _) | (_, Truth::Unknown) => Truth::Unknown,
            _ => Truth::True,
        }
    }

    pub fn or(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::True, _) | (_, Truth::True) => Truth::True,
            (Truth::Unknown, _) | (_, Truth::Unknown) => Truth::Unknown,
            _ => Truth::False,
        }
    }

    pub fn not(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Decimal(BigDecimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Datetime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn data_type(&self) -> Option<DataType> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => DataType::Bool,
            Value::Int8(_) => DataType::Int8,
            Value::Int16(_) => DataType::Int16,
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::UInt8(_) => DataType::UInt8,
            Value::UInt16(_) => DataType::UInt16,
            Value::UInt32(_) => DataType::UInt32,
            Value::UInt64(_) => DataType::UInt64,
            Value::Float32(_) => DataType::Float32,
            Value::Float64(_) => DataType::Float64,
            Value::Decimal(d) => DataType::Decimal {
                precision: 65,
                scale: d.fractional_digit_count().max(0),
            },
            Value::String(_) => DataType::String,
            Value::Bytes(_) => DataType::Bytes,
            Value::Date(_) => DataType::Date,
            Value::Time(_) => DataType::Time,
            Value::Datetime(_) => DataType::Datetime,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Json(_) => DataType::Json,
        })
    }

    /// SQL equality under three-valued logic: `NULL = x` is always `Unknown`.
    pub fn sql_eq(&self, other: &Value) -> Truth {
        if self.is_null() || other.is_null() {
            return Truth::Unknown;
        }
        match self.sql_cmp(other) {
            Some(ord) => Truth::from_bool(ord == Ordering::Equal),
            None => Truth::Unknown,
        }
    }

    /// Ordering for comparisons and index range scans. `None` when the
    /// two values have incomparable types or either side is `Null`;
    /// callers needing a total order for storage (sorted scans) should
    /// use [`Value::cmp_for_sort`] instead, which defines `Null` as the
    /// least value so index ranges have a deterministic placement.
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        if self.is_null() || other.is_null() {
            return None;
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.partial_cmp(b),
            (Int8(a), Int8(b)) => a.partial_cmp(b),
            (Int16(a), Int16(b)) => a.partial_cmp(b),
            (Int32(a), Int32(b)) => a.partial_cmp(b),
            (Int64(a), Int64(b)) => a.partial_cmp(b),
            (UInt8(a), UInt8(b)) => a.partial_cmp(b),
            (UInt16(a), UInt16(b)) => a.partial_cmp(b),
            (UInt32(a), UInt32(b)) => a.partial_cmp(b),
            (UInt64(a), UInt64(b)) => a.partial_cmp(b),
            (Float32(a), Float32(b)) => a.partial_cmp(b),
            (Float64(a), Float64(b)) => a.partial_cmp(b),
            (Decimal(a), Decimal(b)) => a.partial_cmp(b),
            (String(a), String(b)) => a.partial_cmp(b),
            (Bytes(a), Bytes(b)) => a.partial_cmp(b),
            (Date(a), Date(b)) => a.partial_cmp(b),
            (Time(a), Time(b)) => a.partial_cmp(b),
            (Datetime(a), Datetime(b)) => a.partial_cmp(b),
            (Timestamp(a), Timestamp(b)) => a.partial_cmp(b),
            // cross-numeric comparisons widen through f64; good enough for
            // literal/column comparisons where the planner hasn't unified types.
            _ => self.as_f64().and_then(|a| other.as_f64().and_then(|b| a.partial_cmp(&b))),
        }
    }

    /// Total order used by the row/index stores for ordered storage:
    /// `Null` sorts lowest, everything else falls back to `sql_cmp`.
    pub fn cmp_for_sort(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.sql_cmp(other).unwrap_or(Ordering::Equal),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        use Value::*;
        match self {
            Int8(v) => Some(*v as f64),
            Int16(v) => Some(*v as f64),
            Int32(v) => Some(*v as f64),
            Int64(v) => Some(*v as f64),
            UInt8(v) => Some(*v as f64),
            UInt16(v) => Some(*v as f64),
            UInt32(v) => Some(*v as f64),
            UInt64(v) => Some(*v as f64),
            Float32(v) => Some(*v as f64),
            Float64(v) => Some(*v),
            Decimal(v) => v.to_string().parse().ok(),
            _ => None,
        }
    }

    /// Casts to `target`, the way an implicit coercion or `CAST(...)`
    /// would. Narrowing that overflows is a [`Error::TypeMismatch`],
    /// not silent truncation.
    pub fn cast(&self, target: DataType) -> CResult<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        let f = || self.as_f64().ok_or_else(|| {
            Error::TypeMismatch(format!("cannot cast {:?} to {}", self, target))
        });
        Ok(match target {
            DataType::Bool => Value::Bool(f()? != 0.0),
            DataType::Int8 => Value::Int8(checked_cast(f()?, i8::MIN as f64, i8::MAX as f64)? as i8),
            DataType::Int16 => Value::Int16(checked_cast(f()?, i16::MIN as f64, i16::MAX as f64)? as i16),
            DataType::Int32 => Value::Int32(checked_cast(f()?, i32::MIN as f64, i32::MAX as f64)? as i32),
            DataType::Int64 => Value::Int64(checked_cast(f()?, i64::MIN as f64, i64::MAX as f64)? as i64),
            DataType::UInt8 => Value::UInt8(checked_cast(f()?, 0.0, u8::MAX as f64)? as u8),
            DataType::UInt16 => Value::UInt16(checked_cast(f()?, 0.0, u16::MAX as f64)? as u16),
            DataType::UInt32 => Value::UInt32(checked_cast(f()?, 0.0, u32::MAX as f64)? as u32),
            DataType::UInt64 => Value::UInt64(checked_cast(f()?, 0.0, u64::MAX as f64)? as u64),
            DataType::Float32 => Value::Float32(f()? as f32),
            DataType::Float64 => Value::Float64(f()?),
            DataType::Decimal { .. } => match self {
                Value::Decimal(d) => Value::Decimal(d.clone()),
                _ => Value::Decimal(
                    f()?.to_string()
                        .parse()
                        .map_err(|_| Error::TypeMismatch("invalid decimal literal".into()))?,
                ),
            },
            DataType::String => Value::String(self.display_string()),
            DataType::Bytes => match self {
                Value::Bytes(b) => Value::Bytes(b.clone()),
                _ => Value::Bytes(self.display_string().into_bytes()),
            },
            DataType::Date | DataType::Time | DataType::Datetime | DataType::Timestamp | DataType::Json => {
                return Err(Error::NotSupported(format!(
                    "cast to {} requires a literal of matching temporal/json shape",
                    target
                )));
            }
        })
    }

    pub fn display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int8(v) => v.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::UInt8(v) => v.to_string(),
            Value::UInt16(v) => v.to_string(),
            Value::UInt32(v) => v.to_string(),
            Value::UInt64(v) => v.to_string(),
            Value::Float32(v) => v.to_string(),
            Value::Float64(v) => v.to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::Bytes(v) => String::from_utf8_lossy(v).into_owned(),
            Value::Date(v) => v.to_string(),
            Value::Time(v) => v.to_string(),
            Value::Datetime(v) => v.to_string(),
            Value::Timestamp(v) => v.to_rfc3339(),
            Value::Json(v) => v.to_string(),
        }
    }
}

fn checked_cast(v: f64, lo: f64, hi: f64) -> CResult<f64> {
    if v < lo || v > hi || v.is_nan() {
        return Err(Error::TypeMismatch(format!("value {} out of range [{}, {}]", v, lo, hi)));
    }
    Ok(v.trunc())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_comparisons_are_unknown() {
        assert_eq!(Value::Null.sql_eq(&Value::Int32(1)), Truth::Unknown);
        assert_eq!(Value::Int32(1).sql_eq(&Value::Null), Truth::Unknown);
        assert_eq!(Value::Null.sql_cmp(&Value::Null), None);
    }

    #[test]
    fn equal_values_compare_equal() {
        assert_eq!(Value::Int32(5).sql_eq(&Value::Int32(5)), Truth::True);
        assert_eq!(Value::Int32(5).sql_eq(&Value::Int32(6)), Truth::False);
    }

    #[test]
    fn sort_order_places_null_first() {
        assert_eq!(Value::Null.cmp_for_sort(&Value::Int32(-100)), Ordering::Less);
        assert_eq!(Value::Int32(1).cmp_for_sort(&Value::Null), Ordering::Greater);
    }

    #[test]
    fn cast_narrowing_overflow_is_type_mismatch() {
        let v = Value::Int32(1000);
        assert!(v.cast(DataType::Int8).is_err());
        assert!(Value::Int32(10).cast(DataType::Int8).is_ok());
    }

    #[test]
    fn truth_table_and_or_not() {
        assert_eq!(Truth::True.and(Truth::Unknown), Truth::Unknown);
        assert_eq!(Truth::False.and(Truth::Unknown), Truth::False);
        assert_eq!(Truth::True.or(Truth::Unknown), Truth::True);
        assert_eq!(Truth::False.or(Truth::Unknown), Truth::Unknown);
        assert_eq!(Truth::Unknown.not(), Truth::Unknown);
    }
}
