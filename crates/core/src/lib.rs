//! `cellblink-core`: shared types for cell highlighting.
//!
//! Values, snapshots, cell/view identity, blink rules and visibility filters.
//! No timers and no IO.

pub mod key;
pub mod rule;
pub mod snapshot;
pub mod value;
pub mod view;

pub use key::{CellKey, RecoveryKey, ViewIdentity};
pub use rule::{BlinkRule, Operator, RuleSet, ThresholdRule};
pub use snapshot::{series_for, CellCoord, DataPoint, FieldSeries, Snapshot};
pub use value::Value;
