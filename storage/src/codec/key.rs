//! Namespace-tagged key layouts.
//!
//! Every key the storage engine writes starts with a one-byte
//! [`Namespace`] tag, so the five kinds of state it keeps (catalog
//! metadata, row data, secondary index entries, auto-increment
//! sequences, and advisory locks) live in disjoint, independently
//! scannable key ranges of the same underlying `Engine`.
//!
//! DECIMAL columns participating in a primary key or index are
//! order-preserved by rescaling to a fixed implied scale
//! ([`DECIMAL_KEY_SCALE`]) and encoding the scaled value as a signed
//! 128-bit integer; values whose magnitude doesn't fit at that scale
//! are rejected rather than silently truncated.

use bigdecimal::BigDecimal;
use chrono::Timelike;

use crate::codec::keycode::*;
use crate::error::{CResult, Error};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Namespace {
    Catalog = 0x01,
    Data = 0x02,
    Index = 0x03,
    Sequence = 0x04,
    Lock = 0x05,
}

/// Implied decimal places used when a DECIMAL column is order-encoded
/// into a key. Chosen generously; values that don't fit a signed
/// 128-bit integer at this scale are rejected at encode time rather
/// than silently rounded.
pub const DECIMAL_KEY_SCALE: i64 = 12;

fn value_type_tag(v: &Value) -> u8 {
    match v {
        Value::Null => 0x00,
        Value::Bool(_) => 0x01,
        Value::Int8(_) => 0x02,
        Value::Int16(_) => 0x03,
        Value::Int32(_) => 0x04,
        Value::Int64(_) => 0x05,
        Value::UInt8(_) => 0x06,
        Value::UInt16(_) => 0x07,
        Value::UInt32(_) => 0x08,
        Value::UInt64(_) => 0x09,
        Value::Float32(_) => 0x0a,
        Value::Float64(_) => 0x0b,
        Value::Decimal(_) => 0x0c,
        Value::String(_) => 0x0d,
        Value::Bytes(_) => 0x0e,
        Value::Date(_) => 0x0f,
        Value::Time(_) => 0x10,
        Value::Datetime(_) => 0x11,
        Value::Timestamp(_) => 0x12,
        Value::Json(_) => 0x13,
    }
}

fn encode_decimal_for_key(d: &BigDecimal, out: &mut Vec<u8>) -> CResult<()> {
    let scaled = d.with_scale(DECIMAL_KEY_SCALE);
    let (bigint, _exponent) = scaled.as_bigint_and_exponent();
    let digits = bigint.to_string();
    let v: i128 = digits
        .parse()
        .map_err(|_| Error::TypeMismatch("decimal value too large for key encoding".into()))?;
    encode_i128(v, out);
    Ok(())
}

fn decode_decimal_for_key(input: &mut &[u8]) -> CResult<BigDecimal> {
    let v = take_i128(input)?;
    Ok(BigDecimal::new(v.into(), DECIMAL_KEY_SCALE))
}

/// Encodes one column value into a key, prefixed with a type tag so a
/// full key can be decoded back into typed [`Value`]s. `Null` always
/// encodes to the lowest tag, so NULLs in a nullable indexed column
/// sort first.
pub fn encode_value_for_key(v: &Value, out: &mut Vec<u8>) -> CResult<()> {
    out.push(value_type_tag(v));
    match v {
        Value::Null => {}
        Value::Bool(b) => encode_bool(*b, out),
        Value::Int8(x) => encode_i64(*x as i64, out),
        Value::Int16(x) => encode_i64(*x as i64, out),
        Value::Int32(x) => encode_i64(*x as i64, out),
        Value::Int64(x) => encode_i64(*x, out),
        Value::UInt8(x) => encode_u64(*x as u64, out),
        Value::UInt16(x) => encode_u64(*x as u64, out),
        Value::UInt32(x) => encode_u64(*x as u64, out),
        Value::UInt64(x) => encode_u64(*x, out),
        Value::Float32(x) => encode_f64(*x as f64, out),
        Value::Float64(x) => encode_f64(*x, out),
        Value::Decimal(d) => encode_decimal_for_key(d, out)?,
        Value::String(s) => encode_str(s, out),
        Value::Bytes(b) => encode_bytes(b, out),
        Value::Date(d) => encode_i64(d.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp(), out),
        Value::Time(t) => encode_i64(t.num_seconds_from_midnight() as i64, out),
        Value::Datetime(dt) => encode_i64(dt.and_utc().timestamp(), out),
        Value::Timestamp(ts) => encode_i64(ts.timestamp_micros(), out),
        Value::Json(j) => encode_str(&j.to_string(), out),
    }
    Ok(())
}

/// Decodes one column value previously written by [`encode_value_for_key`].
/// Temporal/JSON round-trips are lossy relative to the richer
/// `codec::row_codec` encoding (they decode to an opaque integer/string
/// reconstruction), since key space is only ever used for lookups and
/// range bounds, never returned to the client directly — the row store
/// always re-fetches the authoritative value-encoded row.
pub fn take_value_for_key(input: &mut &[u8]) -> CResult<Value> {
    let tag = take_u8(input)?;
    Ok(match tag {
        0x00 => Value::Null,
        0x01 => Value::Bool(take_bool(input)?),
        0x02 => Value::Int8(take_i64(input)? as i8),
        0x03 => Value::Int16(take_i64(input)? as i16),
        0x04 => Value::Int32(take_i64(input)? as i32),
        0x05 => Value::Int64(take_i64(input)?),
        0x06 => Value::UInt8(take_u64(input)? as u8),
        0x07 => Value::UInt16(take_u64(input)? as u16),
        0x08 => Value::UInt32(take_u64(input)? as u32),
        0x09 => Value::UInt64(take_u64(input)?),
        0x0a => Value::Float32(take_f64(input)? as f32),
        0x0b => Value::Float64(take_f64(input)?),
        0x0c => Value::Decimal(decode_decimal_for_key(input)?),
        0x0d => Value::String(take_str(input)?),
        0x0e => Value::Bytes(take_bytes(input)?),
        other => return Err(Error::InvalidData(format!("unknown key value tag {}", other))),
    })
}

fn encode_tuple(values: &[Value]) -> CResult<Vec<u8>> {
    let mut out = Vec::new();
    for v in values {
        encode_value_for_key(v, &mut out)?;
    }
    Ok(out)
}

pub fn catalog_database_key(name: &str) -> Vec<u8> {
    let mut out = vec![Namespace::Catalog as u8, 0x01];
    encode_str(name, &mut out);
    out
}

pub fn catalog_database_prefix() -> Vec<u8> {
    vec![Namespace::Catalog as u8, 0x01]
}

pub fn catalog_table_key(db_id: u64, name: &str) -> Vec<u8> {
    let mut out = vec![Namespace::Catalog as u8, 0x02];
    encode_u64(db_id, &mut out);
    encode_str(name, &mut out);
    out
}

pub fn catalog_table_prefix(db_id: u64) -> Vec<u8> {
    let mut out = vec![Namespace::Catalog as u8, 0x02];
    encode_u64(db_id, &mut out);
    out
}

pub fn catalog_index_key(table_id: u64, name: &str) -> Vec<u8> {
    let mut out = vec![Namespace::Catalog as u8, 0x03];
    encode_u64(table_id, &mut out);
    encode_str(name, &mut out);
    out
}

pub fn catalog_index_prefix(table_id: u64) -> Vec<u8> {
    let mut out = vec![Namespace::Catalog as u8, 0x03];
    encode_u64(table_id, &mut out);
    out
}

/// The next-id allocator for catalog object ids lives in its own
/// singleton slot so it is covered by the same MVCC transaction as the
/// DDL statement allocating from it.
pub fn catalog_id_sequence_key() -> Vec<u8> {
    vec![Namespace::Catalog as u8, 0x04]
}

pub fn data_table_prefix(table_id: u64) -> Vec<u8> {
    let mut out = vec![Namespace::Data as u8];
    encode_u64(table_id, &mut out);
    out
}

pub fn data_row_key(table_id: u64, pk: &[Value]) -> CResult<Vec<u8>> {
    let mut out = data_table_prefix(table_id);
    out.extend(encode_tuple(pk)?);
    Ok(out)
}

/// Decodes the primary-key tuple back out of a data row key, checking
/// the table id matches (a coding error elsewhere would otherwise
/// silently hand back rows from the wrong table).
pub fn decode_data_row_key(expected_table_id: u64, mut key: &[u8]) -> CResult<Vec<Value>> {
    let input = &mut key;
    if take_u8(input)? != Namespace::Data as u8 {
        return Err(Error::InvalidData("not a data key".into()));
    }
    let table_id = take_u64(input)?;
    if table_id != expected_table_id {
        return Err(Error::Internal(format!(
            "data key table id {} does not match expected {}",
            table_id, expected_table_id
        )));
    }
    let mut values = Vec::new();
    while !input.is_empty() {
        values.push(take_value_for_key(input)?);
    }
    Ok(values)
}

pub fn sequence_key(table_id: u64) -> Vec<u8> {
    let mut out = vec![Namespace::Sequence as u8];
    encode_u64(table_id, &mut out);
    out
}

pub fn index_prefix(index_id: u64) -> Vec<u8> {
    let mut out = vec![Namespace::Index as u8];
    encode_u64(index_id, &mut out);
    out
}

/// Full index entry key: `index_id | index_column_values | pk_values`.
/// The trailing primary key makes non-unique index entries distinct
/// keys even when the indexed columns collide, and lets a lookup walk
/// straight from an index hit to the row key without a second encode.
pub fn index_entry_key(index_id: u64, index_values: &[Value], pk: &[Value]) -> CResult<Vec<u8>> {
    let mut out = index_prefix(index_id);
    out.extend(encode_tuple(index_values)?);
    out.extend(encode_tuple(pk)?);
    Ok(out)
}

/// A prefix covering exactly the entries for one set of index column
/// values (any primary key suffix), used for unique-constraint probes
/// and `lookup_eq`.
pub fn index_value_prefix(index_id: u64, index_values: &[Value]) -> CResult<Vec<u8>> {
    let mut out = index_prefix(index_id);
    out.extend(encode_tuple(index_values)?);
    Ok(out)
}

pub fn lock_key(resource: &[u8]) -> Vec<u8> {
    let mut out = vec![Namespace::Lock as u8];
    encode_bytes(resource, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn value_tag_roundtrip() {
        for v in [
            Value::Null,
            Value::Bool(true),
            Value::Int64(-42),
            Value::UInt64(42),
            Value::Float64(3.5),
            Value::String("hello".into()),
            Value::Bytes(vec![1, 2, 3]),
        ] {
            let mut out = Vec::new();
            encode_value_for_key(&v, &mut out).unwrap();
            let mut slice = out.as_slice();
            let decoded = take_value_for_key(&mut slice).unwrap();
            assert!(slice.is_empty());
            assert_eq!(format!("{:?}", v), format!("{:?}", decoded));
        }
    }

    #[test]
    fn decimal_preserves_numeric_order() {
        let small: BigDecimal = "9.5".parse().unwrap();
        let big: BigDecimal = "10.25".parse().unwrap();
        let mut a = Vec::new();
        encode_value_for_key(&Value::Decimal(small), &mut a).unwrap();
        let mut b = Vec::new();
        encode_value_for_key(&Value::Decimal(big), &mut b).unwrap();
        assert!(a < b, "9.5 should sort before 10.25 under numeric key order");
    }

    #[test]
    fn row_key_roundtrips_pk_tuple() {
        let pk = vec![Value::Int64(7), Value::String("x".into())];
        let key = data_row_key(3, &pk).unwrap();
        let decoded = decode_data_row_key(3, &key).unwrap();
        assert_eq!(format!("{:?}", pk), format!("{:?}", decoded));
    }

    #[test]
    fn row_key_rejects_wrong_table_id() {
        let pk = vec![Value::Int64(1)];
        let key = data_row_key(3, &pk).unwrap();
        assert!(decode_data_row_key(4, &key).is_err());
    }

    #[test]
    fn date_keys_order_by_calendar_order() {
        let d1 = Value::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        let d2 = Value::Date(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        let mut a = Vec::new();
        encode_value_for_key(&d1, &mut a).unwrap();
        let mut b = Vec::new();
        encode_value_for_key(&d2, &mut b).unwrap();
        assert!(a < b);
    }

    #[test]
    fn index_entries_for_same_value_sort_by_trailing_pk() {
        let v = vec![Value::Int32(1)];
        let pk1 = vec![Value::Int64(1)];
        let pk2 = vec![Value::Int64(2)];
        let k1 = index_entry_key(9, &v, &pk1).unwrap();
        let k2 = index_entry_key(9, &v, &pk2).unwrap();
        assert!(k1 < k2);
        assert!(k1.starts_with(&index_value_prefix(9, &v).unwrap()));
    }
}
