//! Tabular snapshots and time-stamped series.
//!
//! A `Snapshot` is the table as the host rendered it at one point in time.
//! Snapshots are compared positionally: row N of one snapshot is row N of the
//! other. There is no join key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Column headers plus row-major cell values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Snapshot {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// True when there is nothing to compare (no rows).
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Position of a column by header name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(col))
    }
}

/// Position of one cell in a snapshot grid.
///
/// Serialized as a `[row, col]` pair, which is also the persisted layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct CellCoord {
    pub row: usize,
    pub col: usize,
}

impl CellCoord {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for CellCoord {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

impl From<CellCoord> for (usize, usize) {
    fn from(coord: CellCoord) -> Self {
        (coord.row, coord.col)
    }
}

/// One observation of a column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Value,
}

impl DataPoint {
    pub fn new(timestamp: DateTime<Utc>, value: impl Into<Value>) -> Self {
        Self { timestamp, value: value.into() }
    }
}

/// Time-stamped values for a single column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSeries {
    pub name: String,
    pub points: Vec<DataPoint>,
}

impl FieldSeries {
    pub fn new(name: impl Into<String>, points: Vec<DataPoint>) -> Self {
        Self { name: name.into(), points }
    }
}

/// Find the series for a column by name.
pub fn series_for<'a>(series: &'a [FieldSeries], column: &str) -> Option<&'a FieldSeries> {
    series.iter().find(|s| s.name == column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_serializes_as_pair() {
        let coords = vec![CellCoord::new(2, 1), CellCoord::new(0, 3)];
        let json = serde_json::to_string(&coords).unwrap();
        assert_eq!(json, "[[2,1],[0,3]]");

        let back: Vec<CellCoord> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, coords);
    }

    #[test]
    fn test_cell_lookup() {
        let snap = Snapshot::new(
            vec!["Name".into(), "Status".into()],
            vec![vec![Value::text("a"), Value::text("up")]],
        );
        assert_eq!(snap.column_index("Status"), Some(1));
        assert_eq!(snap.column_index("Temp"), None);
        assert_eq!(snap.cell(0, 1), Some(&Value::text("up")));
        assert_eq!(snap.cell(1, 0), None);
        assert_eq!(snap.cell(0, 2), None);
    }

    #[test]
    fn test_series_for() {
        let series = vec![FieldSeries::new("Temp", vec![]), FieldSeries::new("Load", vec![])];
        assert_eq!(series_for(&series, "Load").map(|s| s.name.as_str()), Some("Load"));
        assert!(series_for(&series, "Status").is_none());
    }
}
