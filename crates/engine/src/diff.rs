// Change detection between two table snapshots.
// Pure functions: two snapshots in, differing coordinates out.
//
// Comparison is positional. Row N is compared with row N; inserting, deleting
// or re-sorting rows shows up as changes on every shifted row.

use cellblink_core::{CellCoord, Snapshot};

/// Coordinates whose value differs between `previous` and `current`.
///
/// Only positions present in both snapshots are compared; extra rows or cells
/// on either side are skipped. A change of type (number -> text, value ->
/// null) counts as a difference. Results are in row-major order.
pub fn differing_cells(previous: Option<&Snapshot>, current: Option<&Snapshot>) -> Vec<CellCoord> {
    let (Some(previous), Some(current)) = (previous, current) else {
        return Vec::new();
    };
    if previous.is_empty() || current.is_empty() {
        return Vec::new();
    }

    let mut changed = Vec::new();
    for (row, (before, after)) in previous.rows.iter().zip(&current.rows).enumerate() {
        for (col, (a, b)) in before.iter().zip(after).enumerate() {
            if a != b {
                changed.push(CellCoord::new(row, col));
            }
        }
    }
    changed
}

/// Keep only the coordinates in column `col`.
pub fn cells_in_column(coords: &[CellCoord], col: usize) -> Vec<CellCoord> {
    coords.iter().copied().filter(|c| c.col == col).collect()
}
