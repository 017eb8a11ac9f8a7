//! Cell and view identity.
//!
//! A `CellKey` identifies one highlight: a coordinate paired with the rule
//! that produced it. A `RecoveryKey` scopes persisted highlight state to one
//! hosting view and one rule column.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// Identity of a single highlight timer and its entry in the highlight map.
///
/// Diff-mode and threshold-mode highlights on the same cell get distinct keys,
/// so they run on independent timers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellKey {
    /// Produced by a compare-with-previous rule. Renders as `compare-<column>-<row>`.
    Compare { column: String, row: usize },
    /// Produced by a threshold rule. Renders as `<column>-<row>`.
    Threshold { column: String, row: usize },
}

impl CellKey {
    pub fn compare(column: impl Into<String>, row: usize) -> Self {
        CellKey::Compare { column: column.into(), row }
    }

    pub fn threshold(column: impl Into<String>, row: usize) -> Self {
        CellKey::Threshold { column: column.into(), row }
    }

    /// Rule (column) name this key belongs to.
    pub fn column(&self) -> &str {
        match self {
            CellKey::Compare { column, .. } | CellKey::Threshold { column, .. } => column,
        }
    }

    pub fn row(&self) -> usize {
        match self {
            CellKey::Compare { row, .. } | CellKey::Threshold { row, .. } => *row,
        }
    }

    pub fn is_compare(&self) -> bool {
        matches!(self, CellKey::Compare { .. })
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKey::Compare { column, row } => write!(f, "compare-{}-{}", column, row),
            CellKey::Threshold { column, row } => write!(f, "{}-{}", column, row),
        }
    }
}

impl Serialize for CellKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The hosting view: last path segment of its location, numeric id, title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewIdentity {
    pub path: String,
    pub id: u64,
    pub title: String,
}

impl ViewIdentity {
    pub fn new(path: impl Into<String>, id: u64, title: impl Into<String>) -> Self {
        Self { path: path.into(), id, title: title.into() }
    }

    /// Build from a full location path such as `/d/abc123/plant-overview`.
    ///
    /// Only the last segment is kept; a trailing slash yields an empty segment.
    pub fn from_location(location: &str, id: u64, title: impl Into<String>) -> Self {
        let path = location.rsplit('/').next().unwrap_or_default();
        Self::new(path, id, title)
    }

    /// Recovery scope for one rule column of this view.
    pub fn recovery_key(&self, column: impl Into<String>) -> RecoveryKey {
        RecoveryKey {
            view_path: self.path.clone(),
            view_id: self.id,
            view_title: self.title.clone(),
            column: column.into(),
        }
    }
}

/// Composite scope for a persisted highlight entry.
///
/// Renders as `<path>-<id>-<title>-<column>`, the text form used as the
/// storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecoveryKey {
    pub view_path: String,
    pub view_id: u64,
    pub view_title: String,
    pub column: String,
}

impl fmt::Display for RecoveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.view_path, self.view_id, self.view_title, self.column)
    }
}
