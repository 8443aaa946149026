use crate::Result;
use crate::error::DbError;
use crate::udbc::params::Params;
use crate::udbc::value::Value;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use mysql_async::{Params as MyParams, Value as MyValue};

/// Positional bind array; an unparameterized statement binds `Params::Empty`.
pub fn to_mysql_params(params: &Params) -> Result<MyParams> {
    Ok(match params {
        Params::None => MyParams::Empty,
        Params::Positional(values) => {
            MyParams::Positional(values.iter().map(to_mysql_value).collect::<Result<_>>()?)
        }
    })
}

pub fn from_mysql_value(v: MyValue) -> Value {
    match v {
        MyValue::NULL => Value::Null,
        MyValue::Int(i) => Value::I64(i),
        MyValue::UInt(u) => Value::U64(u),
        MyValue::Float(f) => Value::F64(f as f64),
        MyValue::Double(d) => Value::F64(d),
        MyValue::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => Value::Str(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        MyValue::Date(y, m, d, h, min, s, micro) => {
            let midnight = h == 0 && min == 0 && s == 0 && micro == 0;
            let date = NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32);
            match date {
                Some(date) if midnight => Value::Date(date),
                Some(date) => match date.and_hms_micro_opt(h as u32, min as u32, s as u32, micro) {
                    Some(dt) => Value::DateTime(dt),
                    None => Value::Str(mysql_datetime_text(y, m, d, h, min, s, micro)),
                },
                // Zero dates such as 0000-00-00 have no calendar value.
                None if midnight => Value::Str(format!("{:04}-{:02}-{:02}", y, m, d)),
                None => Value::Str(mysql_datetime_text(y, m, d, h, min, s, micro)),
            }
        }
        MyValue::Time(is_neg, days, h, min, s, micro) => {
            let total_h = days * 24 + (h as u32);
            match NaiveTime::from_hms_micro_opt(total_h, min as u32, s as u32, micro) {
                Some(t) if !is_neg => Value::Time(t),
                // Negative and 24h+ durations are not a time of day.
                _ => Value::Str(mysql_time_text(is_neg, total_h, min, s, micro)),
            }
        }
    }
}

fn mysql_datetime_text(y: u16, m: u8, d: u8, h: u8, min: u8, s: u8, micro: u32) -> String {
    let mut text = format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, min, s);
    if micro > 0 {
        text.push_str(&format!(".{:06}", micro));
    }
    text
}

fn mysql_time_text(is_neg: bool, hours: u32, min: u8, s: u8, micro: u32) -> String {
    let sign = if is_neg { "-" } else { "" };
    let mut text = format!("{}{:02}:{:02}:{:02}", sign, hours, min, s);
    if micro > 0 {
        text.push_str(&format!(".{:06}", micro));
    }
    text
}

pub fn to_mysql_value(v: &Value) -> Result<MyValue> {
    Ok(match v {
        Value::Null => MyValue::NULL,
        Value::Bool(b) => MyValue::Int(i64::from(*b)),
        Value::I8(i) => MyValue::Int(*i as i64),
        Value::I16(i) => MyValue::Int(*i as i64),
        Value::I32(i) => MyValue::Int(*i as i64),
        Value::I64(i) => MyValue::Int(*i),
        Value::U8(u) => MyValue::UInt(*u as u64),
        Value::U16(u) => MyValue::UInt(*u as u64),
        Value::U32(u) => MyValue::UInt(*u as u64),
        Value::U64(u) => MyValue::UInt(*u),
        Value::F32(f) => MyValue::Float(*f),
        Value::F64(f) => MyValue::Double(*f),
        Value::Str(s) => MyValue::Bytes(s.as_bytes().to_vec()),
        Value::Bytes(b) => MyValue::Bytes(b.clone()),
        Value::Date(d) => to_mysql_date_value(*d, NaiveTime::default()),
        Value::Time(t) => MyValue::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1000,
        ),
        Value::DateTime(dt) => to_mysql_date_value(dt.date(), dt.time()),
        Value::DateTimeUtc(dt) => {
            let ndt = dt.naive_utc();
            to_mysql_date_value(ndt.date(), ndt.time())
        }
        Value::Decimal(d) => MyValue::Bytes(d.to_string().into_bytes()),
        Value::List(_) | Value::Map(_) => {
            return Err(DbError::TypeMismatch(format!("MySQL cannot bind {:?}", v)));
        }
    })
}

fn to_mysql_date_value(d: NaiveDate, t: NaiveTime) -> MyValue {
    MyValue::Date(
        d.year() as u16,
        d.month() as u8,
        d.day() as u8,
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
        t.nanosecond() / 1000,
    )
}
