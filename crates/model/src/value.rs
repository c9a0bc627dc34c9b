use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A resolved, typed database value.
///
/// This is the narrow set of types an inserted measurement row actually
/// needs, trimmed down from a general-purpose data migration value type to
/// what the submission pipeline's tables (`systems`, `rtevalruns`,
/// `cyclic_statistics`, ...) call for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) | Value::Float(_)
        )
    }

    /// The raw textual form of the value, used as the input to SHA-1 hashing
    /// and array-literal rendering.
    pub fn as_text(&self) -> String {
        match self {
            Value::SmallInt(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::BigInt(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Text(v) => v.clone(),
            Value::Boolean(v) => v.to_string(),
            Value::Date(v) => v.to_string(),
            Value::Timestamp(v) => v.to_rfc3339(),
            Value::Null => String::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_are_flagged_numeric() {
        assert!(Value::Int(1).is_numeric());
        assert!(Value::Float(1.5).is_numeric());
        assert!(!Value::Text("1".into()).is_numeric());
        assert!(!Value::Null.is_numeric());
    }

    #[test]
    fn null_as_text_is_empty() {
        assert_eq!(Value::Null.as_text(), "");
    }
}
