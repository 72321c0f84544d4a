//! Two-set result merge
//!
//! Thai columns and ASCII-safe columns are fetched by separate statements
//! because mixing them corrupts the transcript. The primary set fixes the
//! output order and row count; matching secondary rows are overlaid.

use std::collections::HashMap;

use crate::row::ResultRow;

/// Overlay `secondary` rows onto `primary` rows sharing the same `join_key` value.
///
/// Secondary fields win on collision and keep the primary's column
/// position. The last secondary row wins when keys repeat. Rows whose key
/// is missing or null are never matched; unmatched secondary rows are
/// dropped.
pub fn merge_rows(primary: Vec<ResultRow>, secondary: Vec<ResultRow>, join_key: &str) -> Vec<ResultRow> {
    let mut by_key: HashMap<String, ResultRow> = HashMap::with_capacity(secondary.len());
    for row in secondary {
        if let Some(key) = row.get(join_key).and_then(|v| v.join_key()) {
            by_key.insert(key, row);
        }
    }

    primary
        .into_iter()
        .map(|mut row| {
            let matched = row
                .get(join_key)
                .and_then(|v| v.join_key())
                .and_then(|key| by_key.get(&key));
            if let Some(other) = matched {
                for (column, value) in other {
                    row.insert(column.clone(), value.clone());
                }
            }
            row
        })
        .collect()
}
