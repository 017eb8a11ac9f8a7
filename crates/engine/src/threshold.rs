//! Threshold evaluation over a time window.
//!
//! A threshold rule asks: did any value in the last `window` minutes satisfy
//! `value <op> reference`? If so, the highlight lasts until that value ages
//! out of the window, so highlights shrink as the qualifying event gets older.

use std::time::Duration;

use chrono::{DateTime, Utc};

use cellblink_config::minutes;
use cellblink_core::{DataPoint, FieldSeries, Operator, ThresholdRule, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOutcome {
    /// A point in the window satisfied the condition. `remaining` is the time
    /// until the most recent such point leaves the window.
    Met { remaining: Duration },
    NotMet,
}

impl ThresholdOutcome {
    pub fn is_met(&self) -> bool {
        matches!(self, ThresholdOutcome::Met { .. })
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self {
            ThresholdOutcome::Met { remaining } => Some(*remaining),
            ThresholdOutcome::NotMet => None,
        }
    }

    pub fn remaining_minutes(&self) -> Option<f64> {
        self.remaining().map(|d| d.as_secs_f64() / 60.0)
    }
}

/// `value <op> reference`.
///
/// Ordering operators need both sides numeric. Equality compares numerically
/// when both sides are numeric and falls back to exact value equality
/// otherwise. Unsupported operators never match.
pub fn compare(value: &Value, op: &Operator, reference: &Value) -> bool {
    let numeric = value.as_number().zip(reference.as_number());
    match (op, numeric) {
        (Operator::Greater, Some((a, b))) => a > b,
        (Operator::Less, Some((a, b))) => a < b,
        (Operator::GreaterOrEqual, Some((a, b))) => a >= b,
        (Operator::LessOrEqual, Some((a, b))) => a <= b,
        (Operator::Equal, Some((a, b))) => a == b,
        (Operator::NotEqual, Some((a, b))) => a != b,
        (Operator::Equal, None) => value == reference,
        (Operator::NotEqual, None) => value != reference,
        _ => false,
    }
}

/// Evaluate `points` against `op`/`reference` inside `window` ending at `now`.
///
/// A point is inside the window when its age is below `window`; points stamped
/// in the future count as age zero.
pub fn evaluate(
    points: &[DataPoint],
    op: &Operator,
    reference: &Value,
    window: Duration,
    now: DateTime<Utc>,
) -> ThresholdOutcome {
    if !op.is_supported() {
        log::debug!("unsupported threshold operator {:?}", op.as_str());
        return ThresholdOutcome::NotMet;
    }
    if window.is_zero() {
        return ThresholdOutcome::NotMet;
    }

    points
        .iter()
        .filter_map(|point| {
            let age = now
                .signed_duration_since(point.timestamp)
                .to_std()
                .unwrap_or(Duration::ZERO);
            (age < window && compare(&point.value, op, reference)).then(|| window - age)
        })
        .max()
        .map_or(ThresholdOutcome::NotMet, |remaining| ThresholdOutcome::Met { remaining })
}

/// Evaluate a configured rule against the column's series, if any.
pub fn evaluate_rule(
    rule: &ThresholdRule,
    series: Option<&FieldSeries>,
    now: DateTime<Utc>,
) -> ThresholdOutcome {
    match series {
        Some(series) => evaluate(
            &series.points,
            &rule.operator,
            &rule.value,
            minutes(rule.window_minutes),
            now,
        ),
        None => ThresholdOutcome::NotMet,
    }
}
