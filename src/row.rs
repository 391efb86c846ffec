//! Column values and rows
//!
//! [`Value`] is the owned representation of one column value, used both for
//! rows read from a result stream and for values bound by the application.
//! [`Row`] is what the cursor hands back for a positioned row; rows of one
//! result share a single column-name list.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// One column value
///
/// # Example
///
/// ```rust
/// use rowset_cursor::Value;
///
/// assert_eq!(Value::from(42), Value::Integer(42));
/// assert_eq!(Value::from(None::<i64>), Value::Null);
/// assert_eq!(Value::from(vec![0xca, 0xfe]).to_string(), "0xcafe");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value
    Null,
    /// Character data
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Exact integer
    Integer(i64),
    /// Approximate numeric
    Float(f64),
    /// Exact decimal kept as text (`.` separator)
    Decimal(String),
    /// Boolean / BIT(1)
    Boolean(bool),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Date and time without time zone
    Timestamp(NaiveDateTime),
    /// JSON document
    Json(serde_json::Value),
}

impl Value {
    /// Whether this is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text of a character or decimal value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Exact integer view; decimals with a fractional part have none
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Boolean(b) => Some(i64::from(*b)),
            Value::Decimal(d) => {
                let whole = d.strip_suffix(".0").unwrap_or(d);
                whole.parse().ok()
            }
            _ => None,
        }
    }

    /// Short name of the variant, for messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Bytes(_) => "binary",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::Json(_) => "json",
        }
    }

    /// Append a chunk to this value (chunked `put_data`)
    ///
    /// Only character and binary values can be extended; returns false when
    /// the chunk cannot be appended.
    pub(crate) fn append(&mut self, chunk: Value) -> bool {
        match (self, chunk) {
            (Value::String(s), Value::String(more)) => {
                s.push_str(&more);
                true
            }
            (Value::Bytes(b), Value::Bytes(more)) => {
                b.extend_from_slice(&more);
                true
            }
            (Value::Bytes(b), Value::String(more)) => {
                b.extend_from_slice(more.as_bytes());
                true
            }
            _ => false,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    i64 => Integer,
    i32 => Integer,
    f64 => Float,
    bool => Boolean,
    &str => String,
    String => String,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    serde_json::Value => Json,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::String(s) | Value::Decimal(s) => f.write_str(s),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Json(json) => write!(f, "{}", json),
        }
    }
}

/// A positioned row
///
/// Values are addressed by 0-based result ordinal or, case-insensitively,
/// by result column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    names: Arc<[String]>,
}

impl Row {
    /// Create a row over a result's column names
    pub fn new(values: Vec<Value>, names: Arc<[String]>) -> Self {
        Self { values, names }
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a 0-based ordinal
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of a named column
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let index = self.names.iter().position(|n| n.eq_ignore_ascii_case(name))?;
        self.values.get(index)
    }

    /// All values in result order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Result column names
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Character value at an ordinal
    pub fn get_string(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(Value::as_str)
    }

    /// Integer value at an ordinal
    pub fn get_i64(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(Value::as_i64)
    }

    /// NULL or missing
    pub fn is_null(&self, index: usize) -> bool {
        self.get(index).map_or(true, Value::is_null)
    }
}

impl std::ops::Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: Vec<Value>, names: &[&str]) -> Row {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        Row::new(values, names.into())
    }

    #[test]
    fn test_integer_views() {
        assert_eq!(Value::Integer(42).as_i64(), Some(42));
        assert_eq!(Value::Boolean(true).as_i64(), Some(1));
        assert_eq!(Value::Decimal("17".into()).as_i64(), Some(17));
        assert_eq!(Value::Decimal("17.0".into()).as_i64(), Some(17));
        assert_eq!(Value::Decimal("17.5".into()).as_i64(), None);
        assert_eq!(Value::Float(2.0).as_i64(), None);
        assert_eq!(Value::Null.as_i64(), None);
    }

    #[test]
    fn test_display() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let ts = date.and_hms_opt(13, 5, 9).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2024-02-29");
        assert_eq!(Value::Timestamp(ts).to_string(), "2024-02-29 13:05:09");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Bytes(vec![1, 0xab]).to_string(), "0x01ab");
        assert_eq!(Value::Decimal("12.50".into()).to_string(), "12.50");
    }

    #[test]
    fn test_append() {
        let mut v = Value::from("abc");
        assert!(v.append(Value::from("def")));
        assert_eq!(v, Value::from("abcdef"));

        let mut b = Value::Bytes(vec![1]);
        assert!(b.append(Value::from("A")));
        assert_eq!(b, Value::Bytes(vec![1, b'A']));

        let mut i = Value::Integer(1);
        assert!(!i.append(Value::Integer(2)));
        assert_eq!(i.kind(), "integer");
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(Some(5i64)), Value::Integer(5));
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(3i32), Value::Integer(3));
    }

    #[test]
    fn test_row_access() {
        let r = row(
            vec![Value::Integer(1), Value::from("hello"), Value::Null],
            &["ID", "name", "note"],
        );
        assert_eq!(r.len(), 3);
        assert_eq!(r.get_i64(0), Some(1));
        assert_eq!(r.get_by_name("NAME").and_then(Value::as_str), Some("hello"));
        assert!(r.get_by_name("missing").is_none());
        assert!(r.is_null(2));
        assert!(r.is_null(9));
        assert_eq!(r[1], Value::from("hello"));
        assert_eq!(r.names().len(), 3);
    }
}
