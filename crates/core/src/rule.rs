//! Blink rules: per-column highlight configuration.
//!
//! The host stores rules as a JSON option payload:
//!
//! ```json
//! [ { "Status": { "compareWithPrevious": true },
//!     "Temp":   { "value": 90, "operator": ">", "time": 5 } } ]
//! ```
//!
//! Only the first array element is used. Entries that are neither a complete
//! diff rule nor a complete threshold rule are dropped.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// Comparison applied as `point.value <op> reference`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Greater,
    Less,
    Equal,
    NotEqual,
    GreaterOrEqual,
    LessOrEqual,
    /// Anything else the host sent. Never matches.
    Unsupported(String),
}

impl Operator {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            ">" => Operator::Greater,
            "<" => Operator::Less,
            "=" | "==" => Operator::Equal,
            "!=" => Operator::NotEqual,
            ">=" => Operator::GreaterOrEqual,
            "<=" => Operator::LessOrEqual,
            other => Operator::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
            Operator::Unsupported(s) => s,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Operator::Unsupported(_))
    }
}

impl From<String> for Operator {
    fn from(s: String) -> Self {
        Operator::parse(&s)
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Threshold-mode configuration for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub value: Value,
    pub operator: Operator,
    /// Look-back window in minutes. Always positive.
    pub window_minutes: f64,
}

impl ThresholdRule {
    pub fn new(value: impl Into<Value>, operator: Operator, window_minutes: f64) -> Self {
        Self { value: value.into(), operator, window_minutes }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlinkRule {
    /// Highlight cells whose value differs from the previous snapshot.
    CompareWithPrevious,
    /// Highlight the column while recent values satisfy a comparison.
    Threshold(ThresholdRule),
}

impl BlinkRule {
    pub fn is_compare(&self) -> bool {
        matches!(self, BlinkRule::CompareWithPrevious)
    }
}

/// Longest threshold window accepted from the host (one year).
const MAX_WINDOW_MINUTES: f64 = 525_600.0;

/// Wire shape of a rule entry before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRule {
    compare_with_previous: Option<bool>,
    value: Option<Value>,
    operator: Option<Operator>,
    time: Option<Value>,
}

impl RawRule {
    fn into_rule(self) -> Option<BlinkRule> {
        if self.compare_with_previous == Some(true) {
            return Some(BlinkRule::CompareWithPrevious);
        }
        let value = self.value?;
        let operator = self.operator?;
        let window_minutes = self.time.as_ref().and_then(Value::as_number)?;
        if !(window_minutes > 0.0 && window_minutes <= MAX_WINDOW_MINUTES) {
            return None;
        }
        Some(BlinkRule::Threshold(ThresholdRule { value, operator, window_minutes }))
    }
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// Column name -> rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: BTreeMap<String, BlinkRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, rule: BlinkRule) -> Self {
        self.insert(column, rule);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, rule: BlinkRule) {
        self.rules.insert(column.into(), rule);
    }

    pub fn get(&self, column: &str) -> Option<&BlinkRule> {
        self.rules.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BlinkRule)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Columns configured with compare-with-previous.
    pub fn compare_columns(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, rule)| rule.is_compare()).map(|(column, _)| column)
    }

    /// Parse the host's option payload text. Malformed payloads yield an empty set.
    pub fn from_options_json(input: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(input) {
            Ok(value) => Self::from_options(&value),
            Err(e) => {
                log::warn!("blink options are not valid JSON: {}", e);
                Self::default()
            }
        }
    }

    /// Build from the host's option payload: an array whose first element maps
    /// column names to rules. A bare object is accepted as well.
    pub fn from_options(options: &serde_json::Value) -> Self {
        let map = match options {
            serde_json::Value::Array(items) => match items.first() {
                Some(serde_json::Value::Object(map)) => map,
                _ => return Self::default(),
            },
            serde_json::Value::Object(map) => map,
            _ => return Self::default(),
        };

        let mut set = Self::default();
        for (column, entry) in map {
            let rule = serde_json::from_value::<RawRule>(entry.clone())
                .ok()
                .and_then(RawRule::into_rule);
            match rule {
                Some(rule) => set.insert(column.clone(), rule),
                None => log::debug!("skipping incomplete blink rule for column {:?}", column),
            }
        }
        set
    }
}
