use crate::error::DbError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;

/// A dynamically typed SQL value, used both for bind parameters and for
/// the cells of a result set.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Str(String),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
    /// Date without time zone
    Date(NaiveDate),
    /// Time without date
    Time(NaiveTime),
    /// Date and time without time zone
    DateTime(NaiveDateTime),
    /// Date and time in UTC
    DateTimeUtc(DateTime<Utc>),
    Decimal(Decimal),
    /// Array-like parameter; backends that lack arrays reject it.
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Widens any integer variant to `i64`, if it fits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(n) => Some(n as i64),
            Value::I16(n) => Some(n as i64),
            Value::I32(n) => Some(n as i64),
            Value::I64(n) => Some(n),
            Value::U8(n) => Some(n as i64),
            Value::U16(n) => Some(n as i64),
            Value::U32(n) => Some(n as i64),
            Value::U64(n) => i64::try_from(n).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "'{}'", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Date(d) => write!(f, "{}", d),
            Value::Time(t) => write!(f, "{}", t),
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::DateTimeUtc(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::List(l) => write!(f, "[{} values]", l.len()),
            Value::Map(m) => write!(f, "{{{} entries}}", m.len()),
            other => match other.as_i64() {
                Some(n) => write!(f, "{}", n),
                None => write!(f, "{:?}", other),
            },
        }
    }
}

/// Anything that can be bound as a statement parameter.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Anything that can be read back out of a result cell.
pub trait FromValue: Sized {
    fn from_value(v: Value) -> Result<Self, DbError>;
}

macro_rules! impl_to_value {
    ($($rust_type:ty => $variant:ident),* $(,)?) => {
        $(
            impl ToValue for $rust_type {
                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }
            }
        )*
    };
}

impl_to_value!(
    bool => Bool,
    String => Str,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<Utc> => DateTimeUtc,
    Decimal => Decimal,
);

fn out_of_range(n: impl fmt::Display, target: &str) -> DbError {
    DbError::TypeMismatch(format!("Value {} out of range for {}", n, target))
}

macro_rules! impl_from_value_int {
    ($($rust_type:ty),*) => {
        $(
            impl FromValue for $rust_type {
                fn from_value(v: Value) -> Result<Self, DbError> {
                    let target = stringify!($rust_type);
                    match v {
                        Value::I8(n) => <$rust_type>::try_from(n).map_err(|_| out_of_range(n, target)),
                        Value::I16(n) => <$rust_type>::try_from(n).map_err(|_| out_of_range(n, target)),
                        Value::I32(n) => <$rust_type>::try_from(n).map_err(|_| out_of_range(n, target)),
                        Value::I64(n) => <$rust_type>::try_from(n).map_err(|_| out_of_range(n, target)),
                        Value::U8(n) => <$rust_type>::try_from(n).map_err(|_| out_of_range(n, target)),
                        Value::U16(n) => <$rust_type>::try_from(n).map_err(|_| out_of_range(n, target)),
                        Value::U32(n) => <$rust_type>::try_from(n).map_err(|_| out_of_range(n, target)),
                        Value::U64(n) => <$rust_type>::try_from(n).map_err(|_| out_of_range(n, target)),
                        _ => Err(DbError::TypeMismatch(format!(
                            "Expected numeric value, got {:?}",
                            v
                        ))),
                    }
                }
            }
        )*
    };
}

impl_from_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromValue for bool {
    fn from_value(v: Value) -> Result<Self, DbError> {
        match v {
            Value::Bool(b) => Ok(b),
            // SQLite and MySQL both hand booleans back as 0/1 integers
            ref n if n.as_i64() == Some(1) => Ok(true),
            ref n if n.as_i64() == Some(0) => Ok(false),
            _ => Err(DbError::TypeMismatch(format!("Expected Bool, got {:?}", v))),
        }
    }
}

impl FromValue for String {
    fn from_value(v: Value) -> Result<Self, DbError> {
        match v {
            Value::Str(s) => Ok(s),
            Value::Bytes(b) => String::from_utf8(b)
                .map_err(|e| DbError::TypeMismatch(format!("Invalid UTF-8 bytes: {}", e))),
            _ => Err(DbError::TypeMismatch(format!(
                "Expected Str or Bytes, got {:?}",
                v
            ))),
        }
    }
}

impl FromValue for f64 {
    fn from_value(v: Value) -> Result<Self, DbError> {
        match v {
            Value::F64(f) => Ok(f),
            Value::F32(f) => Ok(f as f64),
            ref n => n
                .as_i64()
                .map(|i| i as f64)
                .ok_or_else(|| DbError::TypeMismatch(format!("Expected F64, got {:?}", v))),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(v: Value) -> Result<Self, DbError> {
        match v {
            Value::Bytes(b) => Ok(b),
            Value::Str(s) => Ok(s.into_bytes()),
            _ => Err(DbError::TypeMismatch(format!("Expected Bytes, got {:?}", v))),
        }
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(v: Value) -> Result<Self, DbError> {
        Ok(v)
    }
}

impl<T> ToValue for &T
where
    T: ToValue + ?Sized,
{
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(v: Value) -> Result<Self, DbError> {
        match v {
            Value::Null => Ok(None),
            _ => Ok(Some(T::from_value(v)?)),
        }
    }
}
