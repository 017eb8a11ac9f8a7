//! Column and row visibility filters.
//!
//! The host lets users pick which columns and rows to show. Threshold rules
//! highlight one cell per visible row, so the orchestrator needs the same
//! notion of "visible" the table renders with.
//!
//! - An empty filter shows everything.
//! - A column filter keeps a leading blank header (the row-label column)
//!   followed by the selected columns in data order.
//! - A row filter matches on the row label, the first cell of each row.

use crate::value::Value;

/// Columns to render, given all columns and the user's column filter.
pub fn visible_columns(columns: &[String], filter: &[String]) -> Vec<String> {
    if filter.is_empty() {
        return columns.to_vec();
    }
    std::iter::once(String::new())
        .chain(columns.iter().filter(|c| filter.contains(c)).cloned())
        .collect()
}

/// Rows to render, given all rows and the user's row-label filter.
///
/// Empty rows never match a non-empty filter.
pub fn visible_rows<'a>(rows: &'a [Vec<Value>], filter: &[String]) -> Vec<&'a [Value]> {
    if filter.is_empty() {
        return rows.iter().map(Vec::as_slice).collect();
    }
    rows.iter()
        .filter(|row| match row.first() {
            Some(label) => filter.iter().any(|f| *f == label.to_string()),
            None => false,
        })
        .map(Vec::as_slice)
        .collect()
}
