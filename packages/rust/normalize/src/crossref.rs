//! Cross-reference discovery between normalized tables.
//!
//! Two tables are linked through a field when both carry a header from the
//! same synonym group and at least one row value appears in both columns.
//! Cost is O(tables² · rows); this runs once per pipeline, never per query.

use std::collections::HashSet;

use riskbase_shared::{CrossReference, TableRecord};
use tracing::debug;

/// Fixed synonym groups: `(linking field, header terms)`.
const SYNONYM_GROUPS: &[(&str, &[&str])] = &[
    ("occupation", &["occupation", "job", "role"]),
    ("soc_code", &["soc", "code", "classification"]),
    ("exposure", &["exposure", "risk", "score"]),
    ("industry", &["industry", "sector", "naics"]),
];

/// Discover cross-references for every ordered table pair `(i, j)` with `i < j`.
pub fn discover(tables: &[TableRecord]) -> Vec<CrossReference> {
    let mut references = Vec::new();

    for (i, source) in tables.iter().enumerate() {
        for target in &tables[i + 1..] {
            for (field, terms) in SYNONYM_GROUPS {
                let (Some(source_col), Some(target_col)) =
                    (source.column_matching(terms), target.column_matching(terms))
                else {
                    continue;
                };

                let match_count = count_shared_values(source, source_col, target, target_col);
                if match_count > 0 {
                    debug!(
                        source = %source.id,
                        target = %target.id,
                        field,
                        match_count,
                        "cross-reference found"
                    );
                    references.push(CrossReference {
                        source_table_id: source.id.clone(),
                        target_table_id: target.id.clone(),
                        linking_field: (*field).to_string(),
                        match_count,
                    });
                }
            }
        }
    }

    references
}

/// Number of distinct values in `target[col]` that also appear in `source[col]`,
/// compared case-insensitively.
fn count_shared_values(
    source: &TableRecord,
    source_col: usize,
    target: &TableRecord,
    target_col: usize,
) -> usize {
    let source_values = column_values(source, source_col);
    column_values(target, target_col)
        .intersection(&source_values)
        .count()
}

fn column_values(table: &TableRecord, col: usize) -> HashSet<String> {
    table
        .rows
        .iter()
        .filter_map(|row| row.get(col))
        .map(|cell| cell.trim().to_lowercase())
        .filter(|cell| !cell.is_empty())
        .collect()
}
