use crate::Result;
use crate::error::DbError;
use crate::udbc::params::Params;
use crate::udbc::value::Value;
use rusqlite::types::{Value as SqliteValue, ValueRef};

pub fn from_sqlite_value(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::I64(i),
        ValueRef::Real(f) => Value::F64(f),
        ValueRef::Text(b) => match std::str::from_utf8(b) {
            Ok(s) => Value::Str(s.to_string()),
            Err(_) => Value::Bytes(b.to_vec()),
        },
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

pub fn to_sqlite_value(v: &Value) -> Result<SqliteValue> {
    Ok(match v {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        Value::I8(i) => SqliteValue::Integer(*i as i64),
        Value::I16(i) => SqliteValue::Integer(*i as i64),
        Value::I32(i) => SqliteValue::Integer(*i as i64),
        Value::I64(i) => SqliteValue::Integer(*i),
        Value::U8(u) => SqliteValue::Integer(*u as i64),
        Value::U16(u) => SqliteValue::Integer(*u as i64),
        Value::U32(u) => SqliteValue::Integer(*u as i64),
        // SQLite integers are signed 64-bit
        Value::U64(u) => match i64::try_from(*u) {
            Ok(i) => SqliteValue::Integer(i),
            Err(_) => SqliteValue::Text(u.to_string()),
        },
        Value::F32(f) => SqliteValue::Real(*f as f64),
        Value::F64(f) => SqliteValue::Real(*f),
        Value::Str(s) => SqliteValue::Text(s.clone()),
        Value::Bytes(b) => SqliteValue::Blob(b.clone()),
        Value::Date(d) => SqliteValue::Text(d.to_string()),
        Value::Time(t) => SqliteValue::Text(t.to_string()),
        Value::DateTime(dt) => SqliteValue::Text(dt.to_string()),
        Value::DateTimeUtc(dt) => SqliteValue::Text(dt.to_rfc3339()),
        Value::Decimal(d) => SqliteValue::Text(d.to_string()),
        Value::List(_) | Value::Map(_) => {
            return Err(DbError::TypeMismatch(format!(
                "SQLite cannot bind {:?}",
                v
            )));
        }
    })
}

/// Positional bind array for a prepared statement.
pub fn to_sqlite_params(params: &Params) -> Result<Vec<SqliteValue>> {
    params.values().iter().map(to_sqlite_value).collect()
}
