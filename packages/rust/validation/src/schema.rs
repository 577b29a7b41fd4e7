//! Structural validation of a [`KnowledgeBase`].
//!
//! Required fields are checked on the JSON form of the document, driven by
//! [`REQUIRED_FIELDS`]. Everything else works on the typed records.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use riskbase_normalize::is_soc_code;
use riskbase_shared::{AppConfig, KnowledgeBase};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{Severity, ValidationIssue, Warning, count_severity};

/// Occupation and table counts below which a KB is considered incomplete.
pub const MIN_OCCUPATIONS: usize = 10;
pub const MIN_TABLES: usize = 3;

static ARXIV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(arXiv:)?(\d{4}\.\d{4,5}|\d{7})$").expect("valid regex")
});

/// Entity kinds that carry required fields.
#[derive(Debug, Clone, Copy)]
enum Entity {
    Metadata,
    Methodology,
    ExtractionInfo,
    Occupation,
    Table,
}

impl Entity {
    fn key(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Methodology => "methodology",
            Self::ExtractionInfo => "extractionInfo",
            Self::Occupation => "occupations",
            Self::Table => "tables",
        }
    }

    fn is_collection(self) -> bool {
        matches!(self, Self::Occupation | Self::Table)
    }
}

/// `(entity, field, severity when missing)`.
const REQUIRED_FIELDS: &[(Entity, &str, Severity)] = &[
    (Entity::Metadata, "title", Severity::Critical),
    (Entity::Metadata, "version", Severity::Critical),
    (Entity::Metadata, "extractionDate", Severity::High),
    (Entity::Metadata, "sourceUrl", Severity::High),
    (Entity::Methodology, "description", Severity::High),
    (Entity::Methodology, "riskScoreDefinition", Severity::Medium),
    (Entity::ExtractionInfo, "extractionDate", Severity::High),
    (Entity::ExtractionInfo, "runId", Severity::High),
    (Entity::Occupation, "code", Severity::High),
    (Entity::Occupation, "name", Severity::High),
    (Entity::Occupation, "keyTasks", Severity::Medium),
    (Entity::Occupation, "tableReferences", Severity::High),
    (Entity::Table, "id", Severity::Critical),
    (Entity::Table, "title", Severity::Medium),
    (Entity::Table, "headers", Severity::High),
    (Entity::Table, "source", Severity::Medium),
];

/// Schema validator switches.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaOptions {
    /// Promote soft-threshold warnings to medium errors.
    pub strict_mode: bool,
    /// Check that every `tableReferences` entry resolves.
    pub validate_references: bool,
    /// Check SOC, arXiv, URL and date formats.
    pub check_data_types: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SchemaOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            strict_mode: config.schema.strict_mode,
            validate_references: config.schema.validate_references,
            check_data_types: config.schema.check_data_types,
        }
    }
}

/// Result of one schema validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaReport {
    /// `true` when there is no critical error.
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<Warning>,
    /// 0–100.
    pub score: f64,
}

impl SchemaReport {
    pub fn has_critical(&self) -> bool {
        !self.is_valid
    }

    /// Errors of a given severity.
    pub fn count(&self, severity: Severity) -> usize {
        count_severity(&self.errors, severity)
    }
}

/// Validates knowledge bases against the schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    options: SchemaOptions,
}

impl SchemaValidator {
    pub fn new(options: SchemaOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    /// Validate `kb`. Deterministic: the same input always yields the same report.
    #[instrument(skip_all, fields(occupations = kb.occupations.len(), tables = kb.tables.len()))]
    pub fn validate(&self, kb: &KnowledgeBase) -> SchemaReport {
        let mut findings = Findings::new(self.options.strict_mode);

        match serde_json::to_value(kb) {
            Ok(doc) => check_required_fields(&doc, &mut findings),
            Err(e) => findings.error(
                Severity::Critical,
                "",
                format!("knowledge base is not serializable: {e}"),
            ),
        }

        check_collections(kb, &mut findings);
        if self.options.check_data_types {
            check_formats(kb, &mut findings);
        }
        check_ranges(kb, &mut findings);
        check_uniqueness(kb, &mut findings);
        if self.options.validate_references {
            check_references(kb, &mut findings);
        }
        check_row_lengths(kb, &mut findings);
        check_soft_thresholds(kb, &mut findings);

        let report = findings.into_report();
        debug!(
            valid = report.is_valid,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            score = report.score,
            "schema validation complete"
        );
        report
    }
}

/// Score from error and warning counts: −20/−10/−5 per critical/high/medium
/// error, −2 per warning, floored at 0.
pub fn schema_score(errors: &[ValidationIssue], warnings: usize) -> f64 {
    let penalty: f64 = errors
        .iter()
        .map(|e| match e.severity {
            Severity::Critical => 20.0,
            Severity::High => 10.0,
            Severity::Medium => 5.0,
            Severity::Low => 0.0,
        })
        .sum::<f64>()
        + 2.0 * warnings as f64;
    (100.0 - penalty).max(0.0)
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

struct Findings {
    strict: bool,
    errors: Vec<ValidationIssue>,
    warnings: Vec<Warning>,
}

impl Findings {
    fn new(strict: bool) -> Self {
        Self {
            strict,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(&mut self, severity: Severity, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue::new(severity, field, message));
    }

    fn warn(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(Warning {
            field: field.into(),
            message: message.into(),
        });
    }

    /// A warning, or a medium error in strict mode.
    fn soft(&mut self, field: &str, message: String) {
        if self.strict {
            self.error(Severity::Medium, field, message);
        } else {
            self.warn(field, message);
        }
    }

    fn into_report(self) -> SchemaReport {
        let score = schema_score(&self.errors, self.warnings.len());
        SchemaReport {
            is_valid: count_severity(&self.errors, Severity::Critical) == 0,
            errors: self.errors,
            warnings: self.warnings,
            score,
        }
    }
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

fn check_required_fields(doc: &Value, findings: &mut Findings) {
    for (entity, field, severity) in REQUIRED_FIELDS {
        let key = entity.key();
        if entity.is_collection() {
            let items = doc.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
            for (i, item) in items.iter().enumerate() {
                if is_missing(item.get(field)) {
                    findings.error(*severity, format!("{key}[{i}].{field}"), format!("{field} is required"));
                }
            }
        } else {
            let object = doc.get(key);
            if is_missing(object.and_then(|o| o.get(field))) {
                findings.error(*severity, format!("{key}.{field}"), format!("{field} is required"));
            }
        }
    }
}

fn check_collections(kb: &KnowledgeBase, findings: &mut Findings) {
    if kb.occupations.is_empty() {
        findings.error(Severity::Critical, "occupations", "knowledge base has no occupations");
    }
    if kb.tables.is_empty() {
        findings.error(Severity::Critical, "tables", "knowledge base has no tables");
    }
}

fn is_valid_date(value: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(value).is_ok()
        || chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

fn check_formats(kb: &KnowledgeBase, findings: &mut Findings) {
    for (i, occ) in kb.occupations.iter().enumerate() {
        if !occ.code.is_empty() && !is_soc_code(&occ.code) {
            findings.error(
                Severity::High,
                format!("occupations[{i}].code"),
                format!("'{}' is not a SOC code (XX-XXXX)", occ.code),
            );
        }
    }

    let meta = &kb.metadata;
    if let Some(arxiv) = &meta.arxiv_id {
        if !ARXIV_RE.is_match(arxiv) {
            findings.error(
                Severity::Medium,
                "metadata.arxivId",
                format!("'{arxiv}' is not an arXiv identifier"),
            );
        }
    }
    if !meta.source_url.is_empty() && url::Url::parse(&meta.source_url).is_err() {
        findings.error(
            Severity::Medium,
            "metadata.sourceUrl",
            format!("'{}' is not a valid URL", meta.source_url),
        );
    }
    if let Some(date) = &meta.publication_date {
        if !is_valid_date(date) {
            findings.error(
                Severity::Medium,
                "metadata.publicationDate",
                format!("'{date}' is not a valid date"),
            );
        }
    }
}

fn check_ranges(kb: &KnowledgeBase, findings: &mut Findings) {
    let unit = 0.0..=1.0;
    for (i, occ) in kb.occupations.iter().enumerate() {
        let mut problems = Vec::new();
        if !unit.contains(&occ.risk_score) {
            problems.push(format!("riskScore {}", occ.risk_score));
        }
        if !unit.contains(&occ.confidence) {
            problems.push(format!("confidence {}", occ.confidence));
        }
        if !problems.is_empty() {
            findings.error(
                Severity::High,
                format!("occupations[{i}]"),
                format!("'{}': {} outside [0, 1]", occ.name, problems.join(" and ")),
            );
        }
    }
}

fn check_uniqueness(kb: &KnowledgeBase, findings: &mut Findings) {
    let mut codes: BTreeMap<&str, usize> = BTreeMap::new();
    let mut names: BTreeMap<String, usize> = BTreeMap::new();
    for occ in &kb.occupations {
        if !occ.code.is_empty() {
            *codes.entry(occ.code.as_str()).or_default() += 1;
        }
        *names.entry(occ.name.to_lowercase()).or_default() += 1;
    }
    for (code, count) in codes.into_iter().filter(|(_, n)| *n > 1) {
        findings.error(
            Severity::High,
            "occupations",
            format!("SOC code {code} appears {count} times"),
        );
    }
    for (name, count) in names.into_iter().filter(|(_, n)| *n > 1) {
        findings.warn("occupations", format!("occupation name '{name}' appears {count} times"));
    }

    let mut table_ids: BTreeMap<&str, usize> = BTreeMap::new();
    for table in &kb.tables {
        *table_ids.entry(table.id.as_str()).or_default() += 1;
    }
    for (id, count) in table_ids.into_iter().filter(|(_, n)| *n > 1) {
        findings.error(Severity::High, "tables", format!("table id {id} appears {count} times"));
    }
}

fn check_references(kb: &KnowledgeBase, findings: &mut Findings) {
    let ids: HashSet<&str> = kb.tables.iter().map(|t| t.id.as_str()).collect();
    for (i, occ) in kb.occupations.iter().enumerate() {
        for reference in &occ.table_references {
            if !ids.contains(reference.as_str()) {
                findings.error(
                    Severity::High,
                    format!("occupations[{i}].tableReferences"),
                    format!("'{}' references unknown table {reference}", occ.name),
                );
            }
        }
    }
}

fn check_row_lengths(kb: &KnowledgeBase, findings: &mut Findings) {
    for (t, table) in kb.tables.iter().enumerate() {
        for (r, row) in table.rows.iter().enumerate() {
            if row.len() != table.headers.len() {
                findings.error(
                    Severity::High,
                    format!("tables[{t}].rows[{r}]"),
                    format!(
                        "table {} row {r} has {} cells, expected {}",
                        table.id,
                        row.len(),
                        table.headers.len()
                    ),
                );
            }
        }
    }
}

fn check_soft_thresholds(kb: &KnowledgeBase, findings: &mut Findings) {
    if kb.occupations.len() < MIN_OCCUPATIONS {
        findings.soft(
            "occupations",
            format!("only {} occupations, expected at least {MIN_OCCUPATIONS}", kb.occupations.len()),
        );
    }
    if kb.tables.len() < MIN_TABLES {
        findings.soft(
            "tables",
            format!("only {} tables, expected at least {MIN_TABLES}", kb.tables.len()),
        );
    }
    if kb.methodology.data_sources.is_empty() {
        findings.soft("methodology.dataSources", "no data sources listed".into());
    }
    if kb.visualizations.is_empty() {
        findings.soft("visualizations", "no visualization configs".into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_kb;

    fn validate(kb: &KnowledgeBase) -> SchemaReport {
        SchemaValidator::default().validate(kb)
    }

    #[test]
    fn clean_kb_scores_full_marks() {
        let report = validate(&sample_kb());
        assert!(report.is_valid);
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(report.score, 100.0);
    }

    #[test]
    fn validation_is_idempotent() {
        let kb = sample_kb();
        let validator = SchemaValidator::default();
        assert_eq!(validator.validate(&kb), validator.validate(&kb));
    }

    #[test]
    fn out_of_range_occupation_yields_one_high_error() {
        let mut kb = sample_kb();
        kb.occupations[2].risk_score = 1.3;
        kb.occupations[2].confidence = -0.1;

        let report = validate(&kb);
        assert_eq!(report.count(Severity::High), 1);
        assert_eq!(report.errors[0].field, "occupations[2]");
        assert!(report.is_valid);
        assert_eq!(report.score, 90.0);
    }

    #[test]
    fn ragged_row_yields_one_high_error_naming_table_and_row() {
        let mut kb = sample_kb();
        kb.tables[1].rows[1].pop();

        let report = validate(&kb);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].severity, Severity::High);
        assert!(report.errors[0].message.contains("table_2 row 1"));
    }

    #[test]
    fn empty_collections_are_critical() {
        let mut kb = sample_kb();
        kb.occupations.clear();
        kb.tables.clear();

        let report = validate(&kb);
        assert!(!report.is_valid);
        assert_eq!(report.count(Severity::Critical), 2);
    }

    #[test]
    fn missing_required_fields_use_table_severity() {
        let mut kb = sample_kb();
        kb.metadata.title = "  ".into();
        kb.occupations[0].key_tasks.clear();
        kb.tables[0].source.clear();

        let report = validate(&kb);
        let fields: Vec<_> = report.errors.iter().map(|e| (e.field.as_str(), e.severity)).collect();
        assert!(fields.contains(&("metadata.title", Severity::Critical)));
        assert!(fields.contains(&("occupations[0].keyTasks", Severity::Medium)));
        assert!(fields.contains(&("tables[0].source", Severity::Medium)));
        assert!(!report.is_valid);
    }

    #[test]
    fn format_checks() {
        let mut kb = sample_kb();
        kb.occupations[0].code = "151252".into();
        kb.metadata.arxiv_id = Some("arXiv:25.1".into());
        kb.metadata.source_url = "not a url".into();
        kb.metadata.publication_date = Some("July 2025".into());

        let report = validate(&kb);
        assert_eq!(report.count(Severity::High), 1);
        assert_eq!(report.count(Severity::Medium), 3);

        let relaxed = SchemaValidator::new(SchemaOptions {
            check_data_types: false,
            ..SchemaOptions::default()
        });
        assert!(relaxed.validate(&kb).errors.is_empty());
    }

    #[test]
    fn accepts_arxiv_and_date_variants() {
        assert!(ARXIV_RE.is_match("arXiv:2507.07935"));
        assert!(ARXIV_RE.is_match("1234567"));
        assert!(is_valid_date("2025-07-10T00:00:00Z"));
        assert!(!is_valid_date("2025-13-01"));
    }

    #[test]
    fn duplicate_codes_are_errors_and_duplicate_names_warnings() {
        let mut kb = sample_kb();
        kb.occupations[1].code = kb.occupations[0].code.clone();
        kb.occupations[3].name = kb.occupations[2].name.to_uppercase();

        let report = validate(&kb);
        assert_eq!(report.count(Severity::High), 1);
        assert!(report.errors[0].message.contains("15-1252 appears 2 times"));
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.score, 88.0);
    }

    #[test]
    fn unresolved_references_and_duplicate_table_ids() {
        let mut kb = sample_kb();
        kb.occupations[0].table_references.insert("table_9".into());
        kb.occupations[1].table_references.insert("table_8".into());
        kb.tables[2].id = "table_1".into();

        let report = validate(&kb);
        // table_3 disappears, but nothing referenced it.
        assert_eq!(report.count(Severity::High), 3);

        let lenient = SchemaValidator::new(SchemaOptions {
            validate_references: false,
            ..SchemaOptions::default()
        });
        assert_eq!(lenient.validate(&kb).count(Severity::High), 1);
    }

    #[test]
    fn soft_thresholds_are_warnings_unless_strict() {
        let mut kb = sample_kb();
        kb.occupations.truncate(4);
        kb.tables.truncate(1);
        kb.methodology.data_sources.clear();
        kb.visualizations.clear();

        let report = validate(&kb);
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.warnings.len(), 4);
        assert_eq!(report.score, 92.0);

        let strict = SchemaValidator::new(SchemaOptions {
            strict_mode: true,
            ..SchemaOptions::default()
        });
        let report = strict.validate(&kb);
        assert!(report.warnings.is_empty());
        assert_eq!(report.count(Severity::Medium), 4);
        assert_eq!(report.score, 80.0);
    }

    #[test]
    fn score_floors_at_zero() {
        let errors: Vec<_> = (0..6)
            .map(|_| ValidationIssue::new(Severity::Critical, "x", "y"))
            .collect();
        assert_eq!(schema_score(&errors, 3), 0.0);
    }
}
