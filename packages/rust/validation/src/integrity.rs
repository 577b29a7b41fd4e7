//! Statistical data-integrity checks.

use std::collections::{BTreeMap, HashSet};

use riskbase_normalize::parse_score;
use riskbase_shared::{KnowledgeBase, Result, RiskbaseError, TableRecord};
use tracing::debug;

use crate::stats::{count_outliers, iqr_fences};
use crate::{Severity, ValidationIssue};

/// Confidence below this counts as low.
const LOW_CONFIDENCE: f64 = 0.7;
/// Maximum share of low-confidence occupations.
const LOW_CONFIDENCE_SHARE: f64 = 0.2;
/// Maximum share of occupations without key tasks.
const MISSING_TASKS_SHARE: f64 = 0.1;
/// Share of unparseable cells at which a numeric column is flagged.
const NUMERIC_FAILURE_SHARE: f64 = 0.2;
/// Maximum share of empty cells in a table.
const EMPTY_CELL_SHARE: f64 = 0.1;

/// Headers that mark a column as numeric regardless of content.
const NUMERIC_HEADER_TERMS: &[&str] = &[
    "score", "exposure", "risk", "share", "percent", "%", "rate", "count", "employment", "wage",
];

/// Run every integrity check.
///
/// Fails with `InvalidData` when a numeric field holds a non-finite value;
/// quartiles are undefined for such a sample.
pub fn check_integrity(kb: &KnowledgeBase) -> Result<Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    let scores: Vec<f64> = kb.occupations.iter().map(|o| o.risk_score).collect();
    let confidences: Vec<f64> = kb.occupations.iter().map(|o| o.confidence).collect();
    for (field, values) in [("riskScore", &scores), ("confidence", &confidences)] {
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(RiskbaseError::invalid_data(
                format!("{field} contains a non-finite value"),
                vec![format!("occupations[{i}].{field} = {}", values[i])],
            ));
        }
        check_outliers(field, values, &mut issues);
    }

    check_low_confidence(kb, &mut issues);
    check_missing_tasks(kb, &mut issues);
    check_duplicate_codes(kb, &mut issues);
    for table in &kb.tables {
        check_numeric_columns(table, &mut issues);
        check_empty_cells(table, &mut issues);
    }
    check_exposure_coverage(kb, &mut issues);

    debug!(issues = issues.len(), "integrity checks complete");
    Ok(issues)
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { count as f64 / total as f64 }
}

fn check_outliers(field: &str, values: &[f64], issues: &mut Vec<ValidationIssue>) {
    let outliers = count_outliers(values);
    if outliers == 0 {
        return;
    }
    let (lo, hi) = iqr_fences(values).unwrap_or_default();
    issues.push(ValidationIssue::new(
        Severity::Medium,
        format!("occupations.{field}"),
        format!("{outliers} {field} outlier(s) outside [{lo:.3}, {hi:.3}]"),
    ));
}

fn check_low_confidence(kb: &KnowledgeBase, issues: &mut Vec<ValidationIssue>) {
    let low = kb
        .occupations
        .iter()
        .filter(|o| o.confidence < LOW_CONFIDENCE)
        .count();
    let ratio = share(low, kb.occupations.len());
    if ratio > LOW_CONFIDENCE_SHARE {
        issues.push(ValidationIssue::new(
            Severity::Medium,
            "occupations.confidence",
            format!(
                "{:.0}% of occupations have confidence below {LOW_CONFIDENCE}",
                ratio * 100.0
            ),
        ));
    }
}

fn check_missing_tasks(kb: &KnowledgeBase, issues: &mut Vec<ValidationIssue>) {
    let missing = kb
        .occupations
        .iter()
        .filter(|o| o.key_tasks.is_empty())
        .count();
    let ratio = share(missing, kb.occupations.len());
    if ratio > MISSING_TASKS_SHARE {
        issues.push(ValidationIssue::new(
            Severity::Medium,
            "occupations.keyTasks",
            format!("{missing} occupations ({:.0}%) have no key tasks", ratio * 100.0),
        ));
    }
}

fn check_duplicate_codes(kb: &KnowledgeBase, issues: &mut Vec<ValidationIssue>) {
    let mut codes: BTreeMap<&str, usize> = BTreeMap::new();
    for occ in kb.occupations.iter().filter(|o| !o.code.is_empty()) {
        *codes.entry(occ.code.as_str()).or_default() += 1;
    }
    let duplicates: Vec<&str> = codes
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(code, _)| code)
        .collect();
    if !duplicates.is_empty() {
        issues.push(ValidationIssue::new(
            Severity::High,
            "occupations.code",
            format!("duplicate SOC codes: {}", duplicates.join(", ")),
        ));
    }
}

/// A column is numeric when its header says so or most of its values parse.
fn is_numeric_column(header: &str, values: &[&str]) -> bool {
    let lower = header.to_lowercase();
    if NUMERIC_HEADER_TERMS.iter().any(|t| lower.contains(t)) {
        return true;
    }
    let parsed = values.iter().filter(|v| parse_score(v).is_some()).count();
    !values.is_empty() && parsed * 2 > values.len()
}

fn check_numeric_columns(table: &TableRecord, issues: &mut Vec<ValidationIssue>) {
    for (col, header) in table.headers.iter().enumerate() {
        let values: Vec<&str> = table
            .rows
            .iter()
            .filter_map(|row| row.get(col))
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
            .collect();
        if values.is_empty() || !is_numeric_column(header, &values) {
            continue;
        }
        let failed = values.iter().filter(|v| parse_score(v).is_none()).count();
        let ratio = share(failed, values.len());
        if ratio >= NUMERIC_FAILURE_SHARE {
            issues.push(ValidationIssue::new(
                Severity::Medium,
                format!("{}.{header}", table.id),
                format!(
                    "{} column '{header}': {:.0}% of values are not numeric",
                    table.id,
                    ratio * 100.0
                ),
            ));
        }
    }
}

fn check_empty_cells(table: &TableRecord, issues: &mut Vec<ValidationIssue>) {
    let total: usize = table.rows.iter().map(Vec::len).sum();
    let empty = table
        .rows
        .iter()
        .flatten()
        .filter(|cell| cell.trim().is_empty())
        .count();
    let ratio = share(empty, total);
    if ratio > EMPTY_CELL_SHARE {
        issues.push(ValidationIssue::new(
            Severity::Medium,
            table.id.clone(),
            format!("{} has {:.0}% empty cells", table.id, ratio * 100.0),
        ));
    }
}

fn check_exposure_coverage(kb: &KnowledgeBase, issues: &mut Vec<ValidationIssue>) {
    let exposure_tables: HashSet<&str> = kb
        .tables
        .iter()
        .filter(|t| t.kind.is_exposure_table())
        .map(|t| t.id.as_str())
        .collect();
    let uncovered: Vec<&str> = kb
        .occupations
        .iter()
        .filter(|o| {
            !o.table_references
                .iter()
                .any(|r| exposure_tables.contains(r.as_str()))
        })
        .map(|o| o.name.as_str())
        .collect();
    if !uncovered.is_empty() {
        issues.push(ValidationIssue::new(
            Severity::Medium,
            "occupations.tableReferences",
            format!(
                "{} occupation(s) not found in any exposure table: {}",
                uncovered.len(),
                uncovered.join(", ")
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_kb;

    #[test]
    fn clean_kb_has_no_issues() {
        assert_eq!(check_integrity(&sample_kb()).unwrap(), vec![]);
    }

    #[test]
    fn flags_score_outlier() {
        let mut kb = sample_kb();
        kb.occupations[9].risk_score = 0.01;

        let issues = check_integrity(&kb).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "occupations.riskScore");
        assert!(issues[0].message.starts_with("1 riskScore outlier"));
    }

    #[test]
    fn flags_low_confidence_share() {
        let mut kb = sample_kb();
        for occ in kb.occupations.iter_mut().take(3) {
            occ.confidence = 0.5;
        }
        let issues = check_integrity(&kb).unwrap();
        assert!(issues.iter().any(|i| i.message.contains("30% of occupations")));
    }

    #[test]
    fn missing_tasks_threshold_is_strict() {
        let mut kb = sample_kb();
        kb.occupations[0].key_tasks.clear();
        // 1 of 10 is exactly the limit.
        assert!(check_integrity(&kb).unwrap().is_empty());

        kb.occupations[1].key_tasks.clear();
        let issues = check_integrity(&kb).unwrap();
        assert_eq!(issues[0].field, "occupations.keyTasks");
    }

    #[test]
    fn flags_duplicate_codes_as_high() {
        let mut kb = sample_kb();
        kb.occupations[4].code = "15-1252".into();
        let issues = check_integrity(&kb).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::High);
        assert!(issues[0].message.ends_with("15-1252"));
    }

    #[test]
    fn flags_unparseable_numeric_column() {
        let mut kb = sample_kb();
        kb.tables[2].rows[0][1] = "n/a".into();
        let issues = check_integrity(&kb).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("table_3 column 'Exposure': 33%"));
    }

    #[test]
    fn flags_empty_cell_density() {
        let mut kb = sample_kb();
        kb.tables[1].rows[0][0] = String::new();
        let issues = check_integrity(&kb).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "table_2");
    }

    #[test]
    fn flags_occupations_outside_exposure_tables() {
        let mut kb = sample_kb();
        kb.occupations[0].table_references = ["table_3".to_string()].into();
        let issues = check_integrity(&kb).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("Software Developers"));
    }

    #[test]
    fn non_finite_values_fail_the_pass() {
        let mut kb = sample_kb();
        kb.occupations[0].confidence = f64::NAN;
        match check_integrity(&kb).unwrap_err() {
            RiskbaseError::InvalidData { message, errors } => {
                assert!(message.contains("confidence"));
                assert_eq!(errors, vec!["occupations[0].confidence = NaN"]);
            }
            other => panic!("expected InvalidData, got {other:?}"),
        }
    }

    #[test]
    fn numeric_detection_by_content() {
        assert!(is_numeric_column("Jobs", &["1,200", "$40", "n/a"]));
        assert!(!is_numeric_column("Occupation", &["Editors", "15-1252"]));
    }
}
