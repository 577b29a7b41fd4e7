//! Core domain types for Riskbase knowledge bases.
//!
//! Persisted types serialize with camelCase field names; those names are the
//! compatibility surface of `knowledge_base.json` and must not drift.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current version string written into every knowledge base.
pub const CURRENT_KB_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// Raw extraction units
// ---------------------------------------------------------------------------

/// The recognized shape of an extracted table.
///
/// Assigned once by the extraction adapter; downstream stages match on it
/// instead of inspecting titles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableShape {
    /// Aggregate rows, one per occupation group.
    OccupationGroup,
    /// Individual occupation rows.
    TopOccupations,
    /// Anything else, carried through untouched.
    #[default]
    Opaque,
}

impl TableShape {
    /// Classify a table from its title.
    pub fn classify(title: Option<&str>) -> Self {
        let Some(title) = title else {
            return Self::Opaque;
        };
        let lower = title.to_lowercase();
        if lower.contains("occupation group") {
            Self::OccupationGroup
        } else if lower.contains("top occupations") {
            Self::TopOccupations
        } else {
            Self::Opaque
        }
    }

    /// Whether rows in this shape describe occupations.
    pub fn is_exposure_table(self) -> bool {
        matches!(self, Self::OccupationGroup | Self::TopOccupations)
    }
}

/// A table as produced by an extraction stage, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTable {
    /// 1-based page the table was found on.
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Extraction confidence in `[0, 1]`.
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub footnotes: Vec<String>,
    /// Which extraction stage produced the table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<TableShape>,
}

impl RawTable {
    /// The adapter-assigned shape, `Opaque` if none was assigned.
    pub fn shape(&self) -> TableShape {
        self.shape.unwrap_or_default()
    }
}

/// A unit of extracted running text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawText {
    pub page: u32,
    pub text: String,
    #[serde(default = "full_confidence")]
    pub confidence: f64,
}

/// Everything one extraction run produced for a source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionBundle {
    /// Source document URL, if the extraction recorded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub tables: Vec<RawTable>,
    #[serde(default)]
    pub texts: Vec<RawText>,
}

fn full_confidence() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// Normalized records
// ---------------------------------------------------------------------------

/// A single occupation with its automation exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupationRecord {
    /// SOC code, `XX-XXXX`.
    pub code: String,
    pub name: String,
    /// Normalized exposure in `[0, 1]`.
    pub risk_score: f64,
    pub key_tasks: Vec<String>,
    /// Ids of the tables this occupation was extracted from.
    pub table_references: BTreeSet<String>,
    pub confidence: f64,
}

/// A normalized table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRecord {
    pub id: String,
    pub title: String,
    pub page: u32,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub footnotes: Vec<String>,
    pub source: String,
    #[serde(default)]
    pub kind: TableShape,
}

impl TableRecord {
    /// Index of the first header matching any of `terms` (case-insensitive substring).
    pub fn column_matching(&self, terms: &[&str]) -> Option<usize> {
        self.headers.iter().position(|h| {
            let lower = h.to_lowercase();
            terms.iter().any(|t| lower.contains(t))
        })
    }
}

/// A discovered link between two tables sharing values in a common field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossReference {
    pub source_table_id: String,
    pub target_table_id: String,
    pub linking_field: String,
    pub match_count: usize,
}

// ---------------------------------------------------------------------------
// Visualization configs
// ---------------------------------------------------------------------------

/// One bucket of the risk distribution chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskBin {
    pub label: String,
    pub min: f64,
    pub max: f64,
}

/// Configuration for a chart consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VisualizationConfig {
    #[serde(rename_all = "camelCase")]
    RiskDistribution { title: String, bins: Vec<RiskBin> },
    #[serde(rename_all = "camelCase")]
    TopOccupations { title: String, limit: usize },
    #[serde(rename_all = "camelCase")]
    OccupationGroups {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TaskAutomation { title: String, max_tasks: usize },
}

impl VisualizationConfig {
    pub fn kind(&self) -> VisualizationKind {
        match self {
            Self::RiskDistribution { .. } => VisualizationKind::RiskDistribution,
            Self::TopOccupations { .. } => VisualizationKind::TopOccupations,
            Self::OccupationGroups { .. } => VisualizationKind::OccupationGroups,
            Self::TaskAutomation { .. } => VisualizationKind::TaskAutomation,
        }
    }
}

/// Discriminant of [`VisualizationConfig`], used as a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualizationKind {
    RiskDistribution,
    TopOccupations,
    OccupationGroups,
    TaskAutomation,
}

impl VisualizationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RiskDistribution => "riskDistribution",
            Self::TopOccupations => "topOccupations",
            Self::OccupationGroups => "occupationGroups",
            Self::TaskAutomation => "taskAutomation",
        }
    }
}

impl std::fmt::Display for VisualizationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VisualizationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "riskDistribution" | "risk_distribution" => Ok(Self::RiskDistribution),
            "topOccupations" | "top_occupations" => Ok(Self::TopOccupations),
            "occupationGroups" | "occupation_groups" => Ok(Self::OccupationGroups),
            "taskAutomation" | "task_automation" => Ok(Self::TaskAutomation),
            other => Err(format!("unknown visualization type '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// KnowledgeBase
// ---------------------------------------------------------------------------

/// Descriptive metadata about the source publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KbMetadata {
    pub title: String,
    pub version: String,
    pub extraction_date: DateTime<Utc>,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,
    /// Publication date as printed by the source (`YYYY-MM-DD` or RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
}

/// How the risk scores were derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Methodology {
    pub description: String,
    #[serde(default)]
    pub data_sources: Vec<String>,
    pub risk_score_definition: String,
    #[serde(default)]
    pub limitations: Vec<String>,
}

/// Provenance and quality of the extraction run that built the KB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionInfo {
    pub extraction_date: DateTime<Utc>,
    pub run_id: Uuid,
    pub quality_score: f64,
    pub source_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_sha256: Option<String>,
    #[serde(default)]
    pub normalization_issues: Vec<String>,
    pub manual_review_required: bool,
}

/// The persisted aggregate document (`knowledge_base.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBase {
    pub metadata: KbMetadata,
    pub methodology: Methodology,
    pub occupations: Vec<OccupationRecord>,
    pub tables: Vec<TableRecord>,
    #[serde(default)]
    pub cross_references: Vec<CrossReference>,
    #[serde(default)]
    pub visualizations: Vec<VisualizationConfig>,
    pub extraction_info: ExtractionInfo,
}

impl KnowledgeBase {
    /// Look up a table by id.
    pub fn table(&self, id: &str) -> Option<&TableRecord> {
        self.tables.iter().find(|t| t.id == id)
    }
}

/// The sidecar `extraction_metadata.json`, cheap to inspect without loading the KB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    pub extraction_date: DateTime<Utc>,
    pub version: String,
    pub quality_score: f64,
    pub occupation_count: usize,
    pub table_count: usize,
    pub manual_review_required: bool,
}

impl From<&KnowledgeBase> for ExtractionMetadata {
    fn from(kb: &KnowledgeBase) -> Self {
        Self {
            extraction_date: kb.extraction_info.extraction_date,
            version: kb.metadata.version.clone(),
            quality_score: kb.extraction_info.quality_score,
            occupation_count: kb.occupations.len(),
            table_count: kb.tables.len(),
            manual_review_required: kb.extraction_info.manual_review_required,
        }
    }
}

// ---------------------------------------------------------------------------
// Query-time views
// ---------------------------------------------------------------------------

/// Automation risk bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    /// Bucket a score. Boundaries resolve to the higher bucket.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::VeryHigh
        } else if score >= 0.6 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk view of one occupation relative to the whole knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupationRisk {
    pub occupation: OccupationRecord,
    pub risk_level: RiskLevel,
    /// Rank among all occupations, `0..=100`.
    pub percentile: f64,
    pub similar_occupations: Vec<OccupationRecord>,
    /// Set when the record came from the fallback path and `percentile` is a placeholder.
    #[serde(default)]
    pub degraded: bool,
}

/// Why a search result matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    ExactCode,
    ExactName,
    NameContains,
    TaskContains,
}

impl MatchReason {
    /// Contribution of this reason to the match score.
    pub fn weight(self) -> f64 {
        match self {
            Self::ExactCode => 100.0,
            Self::ExactName => 80.0,
            Self::NameContains => 50.0,
            Self::TaskContains => 20.0,
        }
    }
}

/// A scored search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub occupation: OccupationRecord,
    pub match_score: f64,
    pub match_reasons: Vec<MatchReason>,
}

/// Optional constraints applied after scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Exposure of one industry, read from an industry table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryExposure {
    pub industry: String,
    pub score: f64,
    pub table_id: String,
}

/// A key task aggregated across all occupations that list it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAutomation {
    pub task: String,
    pub occupation_count: usize,
    pub average_risk_score: f64,
}
