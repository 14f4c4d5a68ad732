//! SQL values and result rows.
//!
//! Values are driver-independent so that the connection wrapper can be
//! exercised without a server. Conversion to and from `mysql_async` values
//! lives in the MySQL session module.

use std::fmt;
use std::sync::Arc;

/// Rich text that is stored in the database as its plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Markup(String);

impl Markup {
    /// Wrap already-rendered markup.
    pub fn new(html: impl Into<String>) -> Self {
        Self(html.into())
    }

    /// The markup as a plain string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the plain string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single SQL value, used for query parameters and result cells.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,

    /// Signed integer.
    Int(i64),

    /// Unsigned integer (auto-increment ids, counters).
    UInt(u64),

    /// Floating point.
    Float(f64),

    /// Text.
    Text(String),

    /// Binary data that is not valid UTF-8.
    Bytes(Vec<u8>),

    /// Rich text; bound as [`Value::Text`].
    Markup(Markup),
}

impl Value {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the value as text, if it is textual.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Markup(m) => Some(m.as_str()),
            _ => None,
        }
    }

    /// Interpret the value as an integer.
    ///
    /// Text that parses as an integer is accepted, since information_schema
    /// results may come back as strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Truthiness in the SQL sense: non-zero integers and non-empty text.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(v) => *v != 0,
            Value::UInt(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Text(s) => s.trim().parse::<i64>().map(|v| v != 0).unwrap_or(!s.is_empty()),
            Value::Bytes(b) => !b.is_empty(),
            Value::Markup(m) => !m.as_str().is_empty(),
        }
    }

    /// Replace rich text with its plain string.
    #[must_use]
    pub fn into_plain(self) -> Value {
        match self {
            Value::Markup(m) => Value::Text(m.into_string()),
            other => other,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Markup> for Value {
    fn from(v: Markup) -> Self {
        Value::Markup(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A result row. Column names are shared by all rows of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row from shared column names and its values.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Column names of the result set.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Value at a position.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Value of a named column (case-insensitive, like MySQL column labels).
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    /// Text of the value at a position, if textual.
    pub fn text(&self, idx: usize) -> Option<&str> {
        self.get(idx).and_then(Value::as_str)
    }

    /// All values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume into the values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}
