//! Primitive cell values.
//!
//! Host data arrives as JSON-ish primitives: text, numbers, or null. Numbers are
//! wrapped in `OrderedFloat` so values are `Eq + Hash` and NaN compares equal to
//! itself, which keeps snapshot comparison deterministic.

use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A single cell value as delivered by the host view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Number(OrderedFloat<f64>),
    Text(String),
}

impl Value {
    pub fn number(n: f64) -> Self {
        Value::Number(OrderedFloat(n))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value.
    ///
    /// Text counts as numeric when it parses as a float after trimming, so a
    /// threshold of `"90"` typed into a text field still compares as 90.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(n.0),
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    trimmed.parse::<f64>().ok()
                }
            }
            Value::Null => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) => write!(f, "{}", n.0),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_primitives() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, 95, 1.5, "ok"]"#).unwrap();
        assert_eq!(
            values,
            vec![Value::Null, Value::number(95.0), Value::number(1.5), Value::text("ok")]
        );
    }

    #[test]
    fn test_as_number() {
        assert_eq!(Value::number(3.0).as_number(), Some(3.0));
        assert_eq!(Value::text(" 90 ").as_number(), Some(90.0));
        assert_eq!(Value::text("hot").as_number(), None);
        assert_eq!(Value::text("").as_number(), None);
        assert_eq!(Value::Null.as_number(), None);
    }

    #[test]
    fn test_nan_equals_itself() {
        assert_eq!(Value::number(f64::NAN), Value::number(f64::NAN));
    }

    #[test]
    fn test_type_change_is_inequality() {
        assert_ne!(Value::number(1.0), Value::text("1"));
        assert_ne!(Value::Null, Value::text(""));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::number(95.0).to_string(), "95");
        assert_eq!(Value::number(2.5).to_string(), "2.5");
        assert_eq!(Value::text("ok").to_string(), "ok");
        assert_eq!(Value::Null.to_string(), "");
    }
}
