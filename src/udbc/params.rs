use crate::Result;
use crate::error::DbError;
use crate::udbc::serializer::ValueSerializer;
use crate::udbc::value::{ToValue, Value};
use serde::Serialize;
use std::fmt;

/// Bind parameters of one statement, in the positional form every backend
/// consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    /// Run the statement unparameterized.
    #[default]
    None,
    /// Values bound to the `?` placeholders, first to last.
    Positional(Vec<Value>),
}

impl Params {
    /// Encodes an optional ordered sequence of values.
    ///
    /// An absent sequence and an empty one both mean unparameterized
    /// execution: neither SQLite nor MySQL distinguishes the two.
    pub fn encode<I>(params: Option<I>) -> Self
    where
        I: IntoIterator,
        I::Item: ToValue,
    {
        match params {
            None => Params::None,
            Some(seq) => {
                let values: Vec<Value> = seq.into_iter().map(|v| v.to_value()).collect();
                if values.is_empty() {
                    Params::None
                } else {
                    Params::Positional(values)
                }
            }
        }
    }

    /// Encodes a serializable value: `()` and `None` give no parameters,
    /// tuples and sequences give one parameter per element, and a scalar
    /// gives a single parameter. Named (map or struct) arguments are
    /// rejected since binding is positional only.
    pub fn from_serialize<T: Serialize + ?Sized>(args: &T) -> Result<Self> {
        match args.serialize(ValueSerializer)? {
            Value::Null => Ok(Params::None),
            Value::List(values) => Ok(Params::encode(Some(values))),
            Value::Map(_) => Err(DbError::Serialization(
                "Named parameters are not supported, bind positionally".to_string(),
            )),
            scalar => Ok(Params::Positional(vec![scalar])),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::Positional(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(&self) -> &[Value] {
        match self {
            Params::None => &[],
            Params::Positional(values) => values,
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::encode(Some(values))
    }
}

impl From<Option<Vec<Value>>> for Params {
    fn from(values: Option<Vec<Value>>) -> Self {
        Params::encode(values)
    }
}

impl From<&[Value]> for Params {
    fn from(values: &[Value]) -> Self {
        Params::encode(Some(values))
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.values().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", v)?;
        }
        f.write_str("]")
    }
}

/// Builds [`Params`] from a list of expressions implementing `ToValue`.
///
/// ```
/// let p = usql::params![1i64, "a"];
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::udbc::params::Params::None
    };
    ($($arg:expr),+ $(,)?) => {
        $crate::udbc::params::Params::Positional(vec![
            $($crate::udbc::value::ToValue::to_value(&$arg)),+
        ])
    };
}
