//! Validation of assembled knowledge bases.
//!
//! - [`SchemaValidator`]: structural, type, range, uniqueness and referential checks
//!   producing a 0–100 score.
//! - [`ValidationEngine`]: composes the schema validator with statistical
//!   integrity checks, an optional source cross-check and a completeness pass,
//!   and derives a [`QualityReport`].

pub mod completeness;
pub mod crosscheck;
pub mod engine;
pub mod integrity;
pub mod schema;
pub mod stats;

#[cfg(test)]
pub(crate) mod fixtures;

use serde::{Deserialize, Serialize};

pub use completeness::CompletenessReport;
pub use engine::{
    ComprehensiveReport, EngineConfig, PassFailure, QualityReport, ValidationEngine,
    ValidationPass,
};
pub use schema::{SchemaOptions, SchemaReport, SchemaValidator};

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: Severity,
    /// JSON-style path of the offending value, e.g. `occupations[3].riskScore`.
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(severity: Severity, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}: {}", self.severity, self.field, self.message)
    }
}

/// A finding that lowers the score but is never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub field: String,
    pub message: String,
}

/// Count issues of a given severity.
pub fn count_severity(issues: &[ValidationIssue], severity: Severity) -> usize {
    issues.iter().filter(|i| i.severity == severity).count()
}
