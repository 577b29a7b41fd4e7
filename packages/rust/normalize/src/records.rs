//! Table normalization and occupation extraction.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use riskbase_shared::{OccupationRecord, RawTable, TableRecord};
use tracing::debug;

use crate::NormalizerConfig;
use crate::names;

/// Header terms identifying each column role in an exposure table.
const NAME_TERMS: &[&str] = &["occupation", "job", "role", "title", "group"];
const CODE_TERMS: &[&str] = &["soc", "code", "classification"];
const SCORE_TERMS: &[&str] = &["exposure", "risk", "score", "applicability"];
const TASK_TERMS: &[&str] = &["task", "activit"];

/// Default `source` for tables whose adapter did not name itself.
const DEFAULT_SOURCE: &str = "extraction";

/// Whether `code` is a well-formed SOC code (`XX-XXXX`).
pub fn is_soc_code(code: &str) -> bool {
    static SOC_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\d{2}-\d{4}$").expect("valid regex"));
    SOC_RE.is_match(code)
}

/// Parse a numeric score cell, stripping `$`, `,` and `%`.
///
/// A trailing `%` means the value is a percentage and is divided by 100.
pub fn parse_score(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    let is_percent = trimmed.ends_with('%');
    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%') && !c.is_whitespace())
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if is_percent { value / 100.0 } else { value })
}

/// Convert one raw table into a [`TableRecord`], enforcing the row-length invariant.
pub(crate) fn normalize_table(
    id: &str,
    index: usize,
    raw: &RawTable,
    issues: &mut Vec<String>,
) -> TableRecord {
    let headers: Vec<String> = raw.headers.iter().map(|h| names::collapse_whitespace(h)).collect();

    let title = raw
        .title
        .as_deref()
        .map(names::collapse_whitespace)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("Table {}", index + 1));

    let page = if raw.page == 0 {
        issues.push(format!("{id}: invalid page 0, using page 1"));
        1
    } else {
        raw.page
    };

    let mut rows = Vec::with_capacity(raw.rows.len());
    for (row_index, raw_row) in raw.rows.iter().enumerate() {
        let mut row: Vec<String> = raw_row.iter().map(|c| names::collapse_whitespace(c)).collect();
        if row.iter().all(String::is_empty) {
            debug!(table = id, row_index, "dropping empty row");
            continue;
        }
        if row.len() != headers.len() {
            issues.push(format!(
                "{id}: row {row_index} has {} cells, expected {}",
                row.len(),
                headers.len()
            ));
            row.resize(headers.len(), String::new());
        }
        rows.push(row);
    }

    TableRecord {
        id: id.to_string(),
        title,
        page,
        headers,
        rows,
        footnotes: raw.footnotes.iter().map(|f| f.trim().to_string()).collect(),
        source: raw.source.clone().unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
        kind: raw.shape(),
    }
}

// ---------------------------------------------------------------------------
// Occupation extraction
// ---------------------------------------------------------------------------

/// One occupation row as read from a table, before merging.
#[derive(Debug)]
struct Observation {
    name: String,
    code: Option<String>,
    score: Option<f64>,
    tasks: Vec<String>,
}

/// Accumulates occupations across tables, keyed by canonical name.
///
/// Scalars are last-table-wins; table references and key tasks are unioned.
#[derive(Debug, Default)]
pub(crate) struct OccupationMerger {
    records: Vec<OccupationRecord>,
    by_name: HashMap<String, usize>,
}

impl OccupationMerger {
    /// Read occupation rows out of an exposure table.
    pub(crate) fn extract(
        &mut self,
        table: &TableRecord,
        confidence: f64,
        config: &NormalizerConfig,
        issues: &mut Vec<String>,
    ) {
        let Some(name_col) = table.column_matching(NAME_TERMS) else {
            issues.push(format!("{}: no occupation name column", table.id));
            return;
        };
        // A header like "SOC Code" must not double as the name column.
        let code_col = find_column(table, CODE_TERMS, &[name_col]);
        let score_col = find_column(table, SCORE_TERMS, &[name_col]);
        let task_col = find_column(table, TASK_TERMS, &[name_col]);

        for (row_index, row) in table.rows.iter().enumerate() {
            let raw_name = row.get(name_col).map(String::as_str).unwrap_or_default();
            let name = if config.standardize_occupation_names {
                names::standardize(raw_name)
            } else {
                raw_name.trim().to_string()
            };
            if name.is_empty() {
                issues.push(format!("{}: row {row_index} has no occupation name", table.id));
                continue;
            }

            let observation = Observation {
                code: read_code(table, row, code_col, &name, config, issues),
                score: read_score(table, row, score_col, &name, config, issues),
                tasks: task_col
                    .and_then(|c| row.get(c))
                    .map(|cell| split_tasks(cell))
                    .unwrap_or_default(),
                name,
            };
            self.merge(observation, &table.id, confidence, issues);
        }
    }

    fn merge(&mut self, obs: Observation, table_id: &str, confidence: f64, issues: &mut Vec<String>) {
        if let Some(&idx) = self.by_name.get(&obs.name) {
            let record = &mut self.records[idx];
            if let Some(code) = obs.code {
                if !record.code.is_empty() && record.code != code {
                    issues.push(format!(
                        "occupation '{}': code {} from {table_id} replaces {}",
                        record.name, code, record.code
                    ));
                }
                record.code = code;
            }
            if let Some(score) = obs.score {
                record.risk_score = score;
            }
            record.confidence = confidence;
            for task in obs.tasks {
                if !record.key_tasks.contains(&task) {
                    record.key_tasks.push(task);
                }
            }
            record.table_references.insert(table_id.to_string());
            return;
        }

        self.by_name.insert(obs.name.clone(), self.records.len());
        self.records.push(OccupationRecord {
            code: obs.code.unwrap_or_default(),
            name: obs.name,
            risk_score: obs.score.unwrap_or(0.0),
            key_tasks: obs.tasks,
            table_references: BTreeSet::from([table_id.to_string()]),
            confidence,
        });
    }

    /// Finish merging; records occupations left without key tasks.
    pub(crate) fn finish(self, issues: &mut Vec<String>) -> Vec<OccupationRecord> {
        for record in &self.records {
            if record.key_tasks.is_empty() {
                issues.push(format!("occupation '{}': empty keyTasks", record.name));
            }
        }
        self.records
    }
}

fn find_column(table: &TableRecord, terms: &[&str], exclude: &[usize]) -> Option<usize> {
    table.headers.iter().enumerate().position(|(i, h)| {
        let lower = h.to_lowercase();
        !exclude.contains(&i) && terms.iter().any(|t| lower.contains(t))
    })
}

fn read_code(
    table: &TableRecord,
    row: &[String],
    col: Option<usize>,
    name: &str,
    config: &NormalizerConfig,
    issues: &mut Vec<String>,
) -> Option<String> {
    let code = col.and_then(|c| row.get(c)).map(|c| c.trim()).unwrap_or_default();
    if code.is_empty() {
        issues.push(format!("{}: occupation '{name}' is missing a code", table.id));
        return None;
    }
    if config.validate_data_types && !is_soc_code(code) {
        issues.push(format!("{}: occupation '{name}' has invalid SOC code '{code}'", table.id));
    }
    Some(code.to_string())
}

fn read_score(
    table: &TableRecord,
    row: &[String],
    col: Option<usize>,
    name: &str,
    config: &NormalizerConfig,
    issues: &mut Vec<String>,
) -> Option<f64> {
    let cell = col.and_then(|c| row.get(c)).map(String::as_str).unwrap_or_default();
    let Some(score) = parse_score(cell) else {
        issues.push(format!("{}: occupation '{name}' has no parseable score '{cell}'", table.id));
        return None;
    };
    if config.validate_data_types && !(0.0..=1.0).contains(&score) {
        issues.push(format!(
            "{}: occupation '{name}' has invalid score range {score}",
            table.id
        ));
        return Some(score.clamp(0.0, 1.0));
    }
    Some(score)
}

fn split_tasks(cell: &str) -> Vec<String> {
    let mut tasks: Vec<String> = Vec::new();
    for task in cell.split([';', '|']).map(names::collapse_whitespace) {
        if !task.is_empty() && !tasks.contains(&task) {
            tasks.push(task);
        }
    }
    tasks
}
