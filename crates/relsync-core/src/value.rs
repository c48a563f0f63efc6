//! Dynamic SQL values.

use serde::{Deserialize, Serialize};

/// A dynamically-typed SQL value.
///
/// Used for parameter binding, result fetching, related keys and the
/// values carried by relation attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 64-bit floating point
    Double(f64),

    /// Text string
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// JSON value
    Json(serde_json::Value),

    /// Array of values
    Array(Vec<Value>),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Double(_) => "DOUBLE",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Json(_) => "JSON",
            Value::Array(_) => "ARRAY",
        }
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1 } else { 0 }),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a slice of values.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Integer view used for loose comparison.
    ///
    /// Text qualifies only when it is the canonical decimal form of an
    /// `i64` (`"7"` but not `"07"` or `"7.0"`).
    pub fn as_canonical_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Text(s) => parse_canonical_i64(s),
            _ => None,
        }
    }

    /// Compare two values the way a database column comparison would.
    ///
    /// Integers of different widths compare by value, canonical integer
    /// text equals the integer it spells, integers and doubles compare
    /// numerically, booleans compare as `0`/`1`. Everything else falls
    /// back to structural equality.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => return true,
            (Value::Null, _) | (_, Value::Null) => return false,
            _ => {}
        }

        if let (Some(a), Some(b)) = (self.as_canonical_i64(), other.as_canonical_i64()) {
            return a == b;
        }

        let numeric = |v: &Value| match v {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(_) => None,
            other => other.as_f64(),
        };
        if let (Some(a), Some(b)) = (numeric(self), numeric(other)) {
            return a == b;
        }

        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            _ => self == other,
        }
    }

    /// Convert a JSON document into the closest SQL value.
    ///
    /// Numbers become `BigInt` or `Double`, arrays become `Array`, objects
    /// stay `Json`.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::BigInt)
                .or_else(|| n.as_f64().map(Value::Double))
                .unwrap_or_else(|| Value::Text(n.to_string())),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(_) => Value::Json(json.clone()),
        }
    }

    /// Convert this value into a JSON document.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::BigInt(v) => serde_json::Value::from(*v),
            Value::Double(v) => serde_json::Value::from(*v),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => {
                serde_json::Value::Array(b.iter().map(|x| serde_json::Value::from(*x)).collect())
            }
            Value::Json(j) => j.clone(),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

fn parse_canonical_i64(s: &str) -> Option<i64> {
    let parsed: i64 = s.parse().ok()?;
    (parsed.to_string() == s).then_some(parsed)
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
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

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::BigInt(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
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

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Array(v.into_iter().map(Value::BigInt).collect())
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::Array(v.into_iter().map(Value::Int).collect())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Array(v.into_iter().map(Value::Text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_integers() {
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from(42i64), Value::BigInt(42));
        assert_eq!(Value::from(42u32), Value::BigInt(42));
    }

    #[test]
    fn test_from_option() {
        let some: Value = Some(42i64).into();
        assert_eq!(some, Value::BigInt(42));

        let none: Value = Option::<i64>::None.into();
        assert_eq!(none, Value::Null);
    }

    #[test]
    fn test_canonical_integer_text() {
        assert_eq!(Value::from("7").as_canonical_i64(), Some(7));
        assert_eq!(Value::from("-12").as_canonical_i64(), Some(-12));
        assert_eq!(Value::from("07").as_canonical_i64(), None);
        assert_eq!(Value::from("7.0").as_canonical_i64(), None);
        assert_eq!(Value::from(" 7").as_canonical_i64(), None);
    }

    #[test]
    fn test_loosely_equals_across_widths() {
        assert!(Value::Int(5).loosely_equals(&Value::BigInt(5)));
        assert!(Value::BigInt(5).loosely_equals(&Value::from("5")));
        assert!(Value::Double(5.0).loosely_equals(&Value::Int(5)));
        assert!(Value::Bool(true).loosely_equals(&Value::BigInt(1)));
        assert!(!Value::BigInt(5).loosely_equals(&Value::BigInt(6)));
        assert!(!Value::from("05").loosely_equals(&Value::BigInt(5)));
    }

    #[test]
    fn test_loosely_equals_null_handling() {
        assert!(Value::Null.loosely_equals(&Value::Null));
        assert!(!Value::Null.loosely_equals(&Value::BigInt(0)));
        assert!(!Value::from("").loosely_equals(&Value::Null));
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!([1, "two", null, 2.5]);
        let value = Value::from_json(&json);
        assert_eq!(
            value,
            Value::Array(vec![
                Value::BigInt(1),
                Value::Text("two".into()),
                Value::Null,
                Value::Double(2.5),
            ])
        );
        assert_eq!(value.to_json(), json);
    }
}
