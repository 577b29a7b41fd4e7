//! Aggregate views computed over the whole knowledge base.

use std::collections::BTreeMap;

use riskbase_normalize::parse_score;
use riskbase_shared::{IndustryExposure, KnowledgeBase, OccupationRecord, TableRecord, TaskAutomation};

const INDUSTRY_TERMS: &[&str] = &["industry", "sector", "naics"];
const SCORE_TERMS: &[&str] = &["exposure", "risk", "score"];

fn column(table: &TableRecord, terms: &[&str], exclude: Option<usize>) -> Option<usize> {
    table.headers.iter().enumerate().position(|(i, h)| {
        let lower = h.to_lowercase();
        Some(i) != exclude && terms.iter().any(|t| lower.contains(t))
    })
}

/// Exposure rows from every table with an industry column and a numeric
/// score column, highest score first.
pub(crate) fn industry_exposure(kb: &KnowledgeBase) -> Vec<IndustryExposure> {
    let mut rows = Vec::new();
    for table in &kb.tables {
        let Some(industry_col) = column(table, INDUSTRY_TERMS, None) else {
            continue;
        };
        let Some(score_col) = column(table, SCORE_TERMS, Some(industry_col)) else {
            continue;
        };
        for row in &table.rows {
            let industry = row.get(industry_col).map(|c| c.trim()).unwrap_or_default();
            let score = row.get(score_col).and_then(|c| parse_score(c));
            let Some(score) = score.filter(|_| !industry.is_empty()) else {
                continue;
            };
            rows.push(IndustryExposure {
                industry: industry.to_string(),
                score,
                table_id: table.id.clone(),
            });
        }
    }
    rows.sort_by(|a, b| b.score.total_cmp(&a.score));
    rows
}

/// Key tasks across occupations (case-insensitive), with how many
/// occupations list each and their mean score, highest mean first.
pub(crate) fn task_automation(occupations: &[OccupationRecord]) -> Vec<TaskAutomation> {
    // lowercased task -> (first spelling seen, count, score sum)
    let mut tasks: BTreeMap<String, (String, usize, f64)> = BTreeMap::new();
    for occ in occupations {
        for task in &occ.key_tasks {
            let entry = tasks
                .entry(task.to_lowercase())
                .or_insert_with(|| (task.clone(), 0, 0.0));
            entry.1 += 1;
            entry.2 += occ.risk_score;
        }
    }

    let mut out: Vec<TaskAutomation> = tasks
        .into_values()
        .map(|(task, count, sum)| TaskAutomation {
            task,
            occupation_count: count,
            average_risk_score: sum / count as f64,
        })
        .collect();
    out.sort_by(|a, b| b.average_risk_score.total_cmp(&a.average_risk_score));
    out
}
