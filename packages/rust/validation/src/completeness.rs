//! Completeness checks.

use riskbase_shared::KnowledgeBase;
use serde::{Deserialize, Serialize};

use crate::schema::{MIN_OCCUPATIONS, MIN_TABLES};

/// Outcome of the completeness pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessReport {
    pub total_checks: usize,
    /// Descriptions of the checks that failed.
    pub failed_checks: Vec<String>,
    /// `(total − failed) / total × 100`.
    pub completeness_score: f64,
    pub is_complete: bool,
}

pub fn check_completeness(kb: &KnowledgeBase) -> CompletenessReport {
    let checks: [(bool, String); 5] = [
        (
            kb.occupations.len() >= MIN_OCCUPATIONS,
            format!("at least {MIN_OCCUPATIONS} occupations"),
        ),
        (kb.tables.len() >= MIN_TABLES, format!("at least {MIN_TABLES} tables")),
        (
            !kb.methodology.data_sources.is_empty(),
            "methodology lists data sources".to_string(),
        ),
        (
            !kb.methodology.description.trim().is_empty(),
            "methodology has a description".to_string(),
        ),
        (
            !kb.visualizations.is_empty(),
            "at least one visualization config".to_string(),
        ),
    ];

    let total_checks = checks.len();
    let failed_checks: Vec<String> = checks
        .into_iter()
        .filter(|(passed, _)| !passed)
        .map(|(_, description)| description)
        .collect();
    let completeness_score =
        (total_checks - failed_checks.len()) as f64 * 100.0 / total_checks as f64;

    CompletenessReport {
        total_checks,
        is_complete: failed_checks.is_empty(),
        failed_checks,
        completeness_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_kb;

    #[test]
    fn complete_kb() {
        let report = check_completeness(&sample_kb());
        assert!(report.is_complete);
        assert_eq!(report.completeness_score, 100.0);
        assert_eq!(report.total_checks, 5);
    }

    #[test]
    fn each_failed_check_costs_a_fifth() {
        let mut kb = sample_kb();
        kb.tables.truncate(2);
        kb.visualizations.clear();

        let report = check_completeness(&kb);
        assert!(!report.is_complete);
        assert_eq!(report.completeness_score, 60.0);
        assert_eq!(
            report.failed_checks,
            vec!["at least 3 tables", "at least one visualization config"]
        );
    }
}
