//! Parameter and result values.

use crate::error::{StoreError, StoreResult};

/// A single SQL parameter or result value.
///
/// Mirrors the storage classes of the underlying relational store. Engine
/// code builds parameter slices from these and reads them back out of
/// [`Row`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Self::Null,
        }
    }
}

/// One result row, addressed by column name.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row from parallel column-name and value vectors.
    #[must_use]
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Returns the raw value of a column, if the column exists.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    fn require(&self, column: &str) -> StoreResult<&Value> {
        self.value(column).ok_or_else(|| StoreError::MissingColumn {
            column: column.to_owned(),
        })
    }

    /// Reads a column as an integer.
    pub fn integer(&self, column: &str) -> StoreResult<i64> {
        match self.require(column)? {
            Value::Integer(v) => Ok(*v),
            _ => Err(StoreError::ColumnType {
                column: column.to_owned(),
                expected: "an integer",
            }),
        }
    }

    /// Reads a column as a float. Integer values are widened.
    pub fn real(&self, column: &str) -> StoreResult<f64> {
        match self.require(column)? {
            Value::Real(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            _ => Err(StoreError::ColumnType {
                column: column.to_owned(),
                expected: "a float",
            }),
        }
    }

    /// Reads a column as text.
    pub fn text(&self, column: &str) -> StoreResult<&str> {
        match self.require(column)? {
            Value::Text(v) => Ok(v.as_str()),
            _ => Err(StoreError::ColumnType {
                column: column.to_owned(),
                expected: "text",
            }),
        }
    }

    /// Reads a nullable text column. NULL maps to `None`.
    pub fn opt_text(&self, column: &str) -> StoreResult<Option<&str>> {
        match self.require(column)? {
            Value::Text(v) => Ok(Some(v.as_str())),
            Value::Null => Ok(None),
            _ => Err(StoreError::ColumnType {
                column: column.to_owned(),
                expected: "text or null",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(
            vec!["n".into(), "s".into(), "f".into(), "maybe".into()],
            vec![
                Value::Integer(7),
                Value::Text("hello".into()),
                Value::Real(0.5),
                Value::Null,
            ],
        )
    }

    #[test]
    fn typed_accessors() {
        let row = sample();
        assert_eq!(row.integer("n").unwrap(), 7);
        assert_eq!(row.text("s").unwrap(), "hello");
        assert_eq!(row.real("f").unwrap(), 0.5);
        assert_eq!(row.opt_text("maybe").unwrap(), None);
    }

    #[test]
    fn integer_widens_to_real() {
        let row = sample();
        assert_eq!(row.real("n").unwrap(), 7.0);
    }

    #[test]
    fn missing_column_is_an_error() {
        let row = sample();
        assert!(matches!(
            row.integer("nope"),
            Err(StoreError::MissingColumn { .. })
        ));
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let row = sample();
        assert!(matches!(
            row.integer("s"),
            Err(StoreError::ColumnType { .. })
        ));
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }
}
