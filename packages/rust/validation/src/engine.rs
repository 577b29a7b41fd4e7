//! Comprehensive validation: schema, integrity, source cross-check, completeness.

use std::path::PathBuf;

use riskbase_shared::{AppConfig, KnowledgeBase, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::completeness::{CompletenessReport, check_completeness};
use crate::crosscheck::cross_check;
use crate::integrity::check_integrity;
use crate::schema::{SchemaOptions, SchemaReport, SchemaValidator};
use crate::{Severity, ValidationIssue, count_severity};

/// Overall score below which a KB needs a human look.
const MANUAL_REVIEW_THRESHOLD: f64 = 85.0;

/// Engine switches.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub schema: SchemaOptions,
    pub cross_check_with_source: bool,
    pub validate_data_integrity: bool,
    pub check_completeness: bool,
    /// Extracted text of the source document, used by the cross-check pass.
    pub source_pdf_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            schema: SchemaOptions::from(config),
            cross_check_with_source: config.validation.cross_check_with_source,
            validate_data_integrity: config.validation.validate_data_integrity,
            check_completeness: config.validation.check_completeness,
            source_pdf_path: config.validation.source_pdf_path.as_ref().map(PathBuf::from),
        }
    }
}

/// The passes the engine runs besides schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPass {
    Integrity,
    SourceCrossCheck,
    Completeness,
}

/// A pass that could not run to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassFailure {
    pub pass: ValidationPass,
    pub message: String,
}

/// Derived quality scores, each 0–100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub data_accuracy: f64,
    pub completeness_score: f64,
    pub consistency: f64,
    pub reliability: f64,
    pub overall_score: f64,
    pub requires_manual_review: bool,
}

/// Everything the engine found. Persisted as `validation_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveReport {
    pub schema: SchemaReport,
    pub integrity_issues: Vec<ValidationIssue>,
    pub source_issues: Vec<ValidationIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completeness: Option<CompletenessReport>,
    pub quality: QualityReport,
    #[serde(default)]
    pub pass_failures: Vec<PassFailure>,
}

impl ComprehensiveReport {
    pub fn requires_manual_review(&self) -> bool {
        self.quality.requires_manual_review
    }
}

/// Runs the schema validator plus the configured passes.
#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    config: EngineConfig,
    schema: SchemaValidator,
}

impl ValidationEngine {
    pub fn new(config: EngineConfig) -> Self {
        let schema = SchemaValidator::new(config.schema.clone());
        Self { config, schema }
    }

    /// Run every configured pass. A failing pass is recorded in
    /// [`ComprehensiveReport::pass_failures`] and never stops the others.
    #[instrument(skip_all, fields(occupations = kb.occupations.len()))]
    pub fn validate(&self, kb: &KnowledgeBase) -> ComprehensiveReport {
        let schema = self.schema.validate(kb);
        let mut pass_failures = Vec::new();

        let integrity_issues = if self.config.validate_data_integrity {
            record(ValidationPass::Integrity, check_integrity(kb), &mut pass_failures)
        } else {
            Vec::new()
        };

        let source_issues = if self.config.cross_check_with_source {
            record(
                ValidationPass::SourceCrossCheck,
                cross_check(kb, self.config.source_pdf_path.as_deref()),
                &mut pass_failures,
            )
        } else {
            Vec::new()
        };

        let completeness = self
            .config
            .check_completeness
            .then(|| check_completeness(kb));

        let quality = quality_report(&schema, &integrity_issues, &source_issues, completeness.as_ref());

        info!(
            schema_score = schema.score,
            integrity_issues = integrity_issues.len(),
            source_issues = source_issues.len(),
            overall = quality.overall_score,
            manual_review = quality.requires_manual_review,
            failed_passes = pass_failures.len(),
            "comprehensive validation complete"
        );

        ComprehensiveReport {
            schema,
            integrity_issues,
            source_issues,
            completeness,
            quality,
            pass_failures,
        }
    }
}

fn record(
    pass: ValidationPass,
    result: Result<Vec<ValidationIssue>>,
    failures: &mut Vec<PassFailure>,
) -> Vec<ValidationIssue> {
    match result {
        Ok(issues) => issues,
        Err(e) => {
            warn!(?pass, code = e.code(), error = %e, "validation pass failed");
            failures.push(PassFailure {
                pass,
                message: e.to_string(),
            });
            Vec::new()
        }
    }
}

/// `100 − (high×15 + medium×8 + low×3)`, floored at 0.
fn data_accuracy(issues: &[&ValidationIssue]) -> f64 {
    let penalty: f64 = issues
        .iter()
        .map(|i| match i.severity {
            Severity::Critical | Severity::High => 15.0,
            Severity::Medium => 8.0,
            Severity::Low => 3.0,
        })
        .sum();
    (100.0 - penalty).max(0.0)
}

fn quality_report(
    schema: &SchemaReport,
    integrity: &[ValidationIssue],
    source: &[ValidationIssue],
    completeness: Option<&CompletenessReport>,
) -> QualityReport {
    let combined: Vec<&ValidationIssue> = integrity.iter().chain(source).collect();
    let data_accuracy = data_accuracy(&combined);
    // A skipped completeness pass counts as complete.
    let completeness_score = completeness.map_or(100.0, |c| c.completeness_score);
    let consistency = schema.score;
    let reliability = data_accuracy.min(consistency);
    let overall_score = (data_accuracy + completeness_score + consistency + reliability) / 4.0;

    let requires_manual_review = overall_score < MANUAL_REVIEW_THRESHOLD
        || schema.has_critical()
        || count_severity(integrity, Severity::High) > 0;

    QualityReport {
        data_accuracy,
        completeness_score,
        consistency,
        reliability,
        overall_score,
        requires_manual_review,
    }
}
