//! JSON input encoding.
//!
//! Integers are written without a fractional part and reals always with one
//! (or an exponent), so the engine and `read_data_json` can tell them apart.
//! Non-finite reals use the string spellings `"NaN"`, `"Inf"` and `"-Inf"`.

use std::io::{self, Write};
use std::path::Path;

use drawbridge_core::data::{DataMap, DataValue};
use serde_json::{Number, Value};

use crate::error::{Error, Result};

pub(crate) fn write_json<W: Write>(map: &DataMap, w: &mut W) -> io::Result<()> {
    writeln!(w, "{{")?;
    let last = map.len().saturating_sub(1);
    for (i, (name, value)) in map.iter().enumerate() {
        let encoded = serde_json::to_string(&encode_value(value)).map_err(io::Error::other)?;
        let key = serde_json::to_string(name).map_err(io::Error::other)?;
        let sep = if i == last { "" } else { "," };
        writeln!(w, "  {key}: {encoded}{sep}")?;
    }
    writeln!(w, "}}")
}

/// Encode a whole map as a JSON object value.
pub fn to_json_value(map: &DataMap) -> Value {
    let obj = map
        .iter()
        .map(|(name, value)| (name.to_string(), encode_value(value)))
        .collect();
    Value::Object(obj)
}

fn encode_value(value: &DataValue) -> Value {
    match value {
        DataValue::Int(i) => Value::from(*i),
        DataValue::Bool(b) => Value::from(i64::from(*b)),
        DataValue::Real(x) => encode_real(*x),
        DataValue::Array(items) => Value::Array(items.iter().map(encode_value).collect()),
    }
}

fn encode_real(x: f64) -> Value {
    match Number::from_f64(x) {
        Some(n) => Value::Number(n),
        None if x.is_nan() => Value::String("NaN".into()),
        None if x > 0.0 => Value::String("Inf".into()),
        None => Value::String("-Inf".into()),
    }
}

/// Read a JSON input file back into a `DataMap` (keys in sorted order).
pub fn read_data_json(path: &Path) -> Result<DataMap> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let value: Value = serde_json::from_str(&text)?;
    from_json_value(value)
}

/// Convert a loosely-typed JSON object into a `DataMap`, rejecting anything
/// that is not a number, boolean, non-finite spelling, or array of those.
pub fn from_json_value(value: Value) -> Result<DataMap> {
    let Value::Object(obj) = value else {
        return Err(Error::malformed("<root>", "top-level value must be an object"));
    };
    let mut map = DataMap::new();
    for (name, v) in obj {
        let decoded = decode_value(&name, v)?;
        map.insert(name, decoded);
    }
    Ok(map)
}

fn decode_value(name: &str, value: Value) -> Result<DataValue> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(DataValue::Int(i))
            } else if n.is_u64() {
                Err(Error::malformed(name, format!("integer {n} out of range")))
            } else {
                n.as_f64()
                    .map(DataValue::Real)
                    .ok_or_else(|| Error::malformed(name, format!("unrepresentable number {n}")))
            }
        }
        Value::Bool(b) => Ok(DataValue::Bool(b)),
        Value::String(s) => match s.as_str() {
            "NaN" | "nan" => Ok(DataValue::Real(f64::NAN)),
            "Inf" | "inf" | "+Inf" | "Infinity" => Ok(DataValue::Real(f64::INFINITY)),
            "-Inf" | "-inf" | "-Infinity" => Ok(DataValue::Real(f64::NEG_INFINITY)),
            _ => Err(Error::malformed(
                name,
                format!("unsupported string value {s:?}"),
            )),
        },
        Value::Array(items) => items
            .into_iter()
            .map(|item| decode_value(name, item))
            .collect::<Result<Vec<_>>>()
            .map(DataValue::Array),
        Value::Null => Err(Error::malformed(name, "null is not a supported value")),
        Value::Object(_) => Err(Error::malformed(name, "nested objects are not supported")),
    }
}
