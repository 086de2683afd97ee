//! Self-describing row value encoding.
//!
//! Unlike `codec::key`, this encoding does not need to preserve
//! ordering — it only has to round-trip a `Vec<Value>` stored as the
//! value half of a data-row KV pair. The layout is a one-byte schema
//! version, a null bitmap, then each non-null column's type tag and
//! body, so a row can be decoded without consulting the catalog (useful
//! for recovery and for `server` dumping raw rows during diagnostics).

use crate::error::{CResult, Error};
use crate::value::Value;

const SCHEMA_VERSION: u8 = 1;

fn write_len(len: usize, out: &mut Vec<u8>) {
    out.extend_from_slice(&(len as u32).to_be_bytes());
}

fn read_len(input: &mut &[u8]) -> CResult<usize> {
    if input.len() < 4 {
        return Err(Error::InvalidData("truncated length prefix".into()));
    }
    let (head, rest) = input.split_at(4);
    *input = rest;
    Ok(u32::from_be_bytes(head.try_into().unwrap()) as usize)
}

fn write_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    write_len(bytes.len(), out);
    out.extend_from_slice(bytes);
}

fn read_bytes<'a>(input: &mut &'a [u8]) -> CResult<&'a [u8]> {
    let len = read_len(input)?;
    if input.len() < len {
        return Err(Error::InvalidData("truncated value body".into()));
    }
    let (head, rest) = input.split_at(len);
    *input = rest;
    Ok(head)
}

fn null_bitmap(values: &[Value]) -> Vec<u8> {
    let mut bitmap = vec![0u8; (values.len() + 7) / 8];
    for (i, v) in values.iter().enumerate() {
        if v.is_null() {
            bitmap[i / 8] |= 1 << (i % 8);
        }
    }
    bitmap
}

fn bitmap_is_null(bitmap: &[u8], i: usize) -> bool {
    bitmap[i / 8] & (1 << (i % 8)) != 0
}

/// Encodes a full row tuple.
pub fn encode_row(values: &[Value]) -> CResult<Vec<u8>> {
    let mut out = vec![SCHEMA_VERSION];
    write_len(values.len(), &mut out);
    out.extend(null_bitmap(values));
    for v in values {
        if v.is_null() {
            continue;
        }
        encode_value(v, &mut out)?;
    }
    Ok(out)
}

/// Decodes a row previously written by [`encode_row`].
pub fn decode_row(mut input: &[u8]) -> CResult<Vec<Value>> {
    let data = &mut input;
    let version = data.first().copied().ok_or_else(|| Error::InvalidData("empty row".into()))?;
    *data = &data[1..];
    if version != SCHEMA_VERSION {
        return Err(Error::InvalidData(format!("unsupported row schema version {}", version)));
    }
    let count = read_len(data)?;
    let bitmap_len = (count + 7) / 8;
    if data.len() < bitmap_len {
        return Err(Error::InvalidData("truncated null bitmap".into()));
    }
    let (bitmap, rest) = data.split_at(bitmap_len);
    *data = rest;

    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        if bitmap_is_null(bitmap, i) {
            values.push(Value::Null);
        } else {
            values.push(decode_value(data)?);
        }
    }
    Ok(values)
}

fn encode_value(v: &Value, out: &mut Vec<u8>) -> CResult<()> {
    match v {
        Value::Null => unreachable!("null values are carried in the bitmap, not the body"),
        Value::Bool(b) => {
            out.push(0x01);
            out.push(if *b { 1 } else { 0 });
        }
        Value::Int8(x) => { out.push(0x02); out.push(*x as u8); }
        Value::Int16(x) => { out.push(0x03); out.extend_from_slice(&x.to_be_bytes()); }
        Value::Int32(x) => { out.push(0x04); out.extend_from_slice(&x.to_be_bytes()); }
        Value::Int64(x) => { out.push(0x05); out.extend_from_slice(&x.to_be_bytes()); }
        Value::UInt8(x) => { out.push(0x06); out.push(*x); }
        Value::UInt16(x) => { out.push(0x07); out.extend_from_slice(&x.to_be_bytes()); }
        Value::UInt32(x) => { out.push(0x08); out.extend_from_slice(&x.to_be_bytes()); }
        Value::UInt64(x) => { out.push(0x09); out.extend_from_slice(&x.to_be_bytes()); }
        Value::Float32(x) => { out.push(0x0a); out.extend_from_slice(&x.to_be_bytes()); }
        Value::Float64(x) => { out.push(0x0b); out.extend_from_slice(&x.to_be_bytes()); }
        Value::Decimal(d) => { out.push(0x0c); write_bytes(d.to_string().as_bytes(), out); }
        Value::String(s) => { out.push(0x0d); write_bytes(s.as_bytes(), out); }
        Value::Bytes(b) => { out.push(0x0e); write_bytes(b, out); }
        Value::Date(d) => { out.push(0x0f); write_bytes(d.to_string().as_bytes(), out); }
        Value::Time(t) => { out.push(0x10); write_bytes(t.to_string().as_bytes(), out); }
        Value::Datetime(dt) => { out.push(0x11); write_bytes(dt.to_string().as_bytes(), out); }
        Value::Timestamp(ts) => { out.push(0x12); out.extend_from_slice(&ts.timestamp_micros().to_be_bytes()); }
        Value::Json(j) => { out.push(0x13); write_bytes(j.to_string().as_bytes(), out); }
    }
    Ok(())
}

fn decode_value(input: &mut &[u8]) -> CResult<Value> {
    let tag = *input.first().ok_or_else(|| Error::InvalidData("truncated value tag".into()))?;
    *input = &input[1..];
    Ok(match tag {
        0x01 => Value::Bool(take_fixed::<1>(input)?[0] != 0),
        0x02 => Value::Int8(take_fixed::<1>(input)?[0] as i8),
        0x03 => Value::Int16(i16::from_be_bytes(take_fixed(input)?)),
        0x04 => Value::Int32(i32::from_be_bytes(take_fixed(input)?)),
        0x05 => Value::Int64(i64::from_be_bytes(take_fixed(input)?)),
        0x06 => Value::UInt8(take_fixed::<1>(input)?[0]),
        0x07 => Value::UInt16(u16::from_be_bytes(take_fixed(input)?)),
        0x08 => Value::UInt32(u32::from_be_bytes(take_fixed(input)?)),
        0x09 => Value::UInt64(u64::from_be_bytes(take_fixed(input)?)),
        0x0a => Value::Float32(f32::from_be_bytes(take_fixed(input)?)),
        0x0b => Value::Float64(f64::from_be_bytes(take_fixed(input)?)),
        0x0c => {
            let s = std::str::from_utf8(read_bytes(input)?).map_err(|e| Error::InvalidData(e.to_string()))?;
            Value::Decimal(s.parse().map_err(|_| Error::InvalidData("invalid decimal body".into()))?)
        }
        0x0d => Value::String(String::from_utf8(read_bytes(input)?.to_vec())?),
        0x0e => Value::Bytes(read_bytes(input)?.to_vec()),
        0x0f => {
            let s = std::str::from_utf8(read_bytes(input)?).map_err(|e| Error::InvalidData(e.to_string()))?;
            Value::Date(s.parse().map_err(|_| Error::InvalidData("invalid date body".into()))?)
        }
        0x10 => {
            let s = std::str::from_utf8(read_bytes(input)?).map_err(|e| Error::InvalidData(e.to_string()))?;
            Value::Time(s.parse().map_err(|_| Error::InvalidData("invalid time body".into()))?)
        }
        0x11 => {
            let s = std::str::from_utf8(read_bytes(input)?).map_err(|e| Error::InvalidData(e.to_string()))?;
            Value::Datetime(s.parse().map_err(|_| Error::InvalidData("invalid datetime body".into()))?)
        }
        0x12 => {
            let micros = i64::from_be_bytes(take_fixed(input)?);
            Value::Timestamp(
                chrono::DateTime::from_timestamp_micros(micros)
                    .ok_or_else(|| Error::InvalidData("timestamp out of range".into()))?,
            )
        }
        0x13 => {
            let s = std::str::from_utf8(read_bytes(input)?).map_err(|e| Error::InvalidData(e.to_string()))?;
            Value::Json(serde_json::from_str(s).map_err(|e| Error::InvalidData(e.to_string()))?)
        }
        other => return Err(Error::InvalidData(format!("unknown row value tag {}", other))),
    })
}

fn take_fixed<const N: usize>(input: &mut &[u8]) -> CResult<[u8; N]> {
    if input.len() < N {
        return Err(Error::InvalidData("truncated fixed-width value".into()));
    }
    let (head, rest) = input.split_at(N);
    *input = rest;
    Ok(head.try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_roundtrip_with_nulls() {
        let row = vec![
            Value::Int64(42),
            Value::Null,
            Value::String("hello".into()),
            Value::Bool(true),
            Value::Null,
        ];
        let encoded = encode_row(&row).unwrap();
        let decoded = decode_row(&encoded).unwrap();
        assert_eq!(format!("{:?}", row), format!("{:?}", decoded));
    }

    #[test]
    fn empty_row_roundtrips() {
        let row: Vec<Value> = vec![];
        let encoded = encode_row(&row).unwrap();
        let decoded = decode_row(&encoded).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn decimal_and_json_roundtrip() {
        let row = vec![
            Value::Decimal("123.456".parse().unwrap()),
            Value::Json(serde_json::json!({"a": 1})),
        ];
        let encoded = encode_row(&row).unwrap();
        let decoded = decode_row(&encoded).unwrap();
        assert_eq!(format!("{:?}", row), format!("{:?}", decoded));
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let mut encoded = encode_row(&[Value::Int64(1)]).unwrap();
        encoded[0] = 99;
        assert!(decode_row(&encoded).is_err());
    }
}
