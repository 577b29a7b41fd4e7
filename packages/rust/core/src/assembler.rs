//! Knowledge base assembler.
//!
//! Turns normalizer output plus run metadata into a [`KnowledgeBase`], and
//! writes/reads the persisted layout:
//!
//! ```text
//! <output_dir>/
//! ├── knowledge_base.json
//! ├── extraction_metadata.json
//! └── validation_report.json   (comprehensive validation only)
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use riskbase_normalize::NormalizationOutput;
use riskbase_shared::{
    ExtractionInfo, ExtractionMetadata, KbMetadata, KnowledgeBase, Methodology, Result, RiskBin,
    RiskbaseError, TableShape, VisualizationConfig,
};
use riskbase_validation::ComprehensiveReport;
use riskbase_validation::schema::{MIN_OCCUPATIONS, MIN_TABLES};

pub const KB_FILE: &str = "knowledge_base.json";
pub const METADATA_FILE: &str = "extraction_metadata.json";
pub const REPORT_FILE: &str = "validation_report.json";

/// Normalization issue count above which a run is flagged for review.
const MAX_ISSUES_WITHOUT_REVIEW: usize = 5;

/// Run-level inputs to assembly.
#[derive(Debug, Clone)]
pub struct AssembleConfig {
    pub title: String,
    pub version: String,
    pub source_url: String,
    pub arxiv_id: Option<String>,
    pub publication_date: Option<String>,
    pub extraction_date: DateTime<Utc>,
    pub run_id: Uuid,
    /// Mean confidence of the raw extraction, 0–1.
    pub source_confidence: f64,
    pub source_sha256: Option<String>,
}

/// Extraction quality, 0–100.
///
/// `(100 − 2·issues) · source_confidence`, minus 20 below the occupation
/// minimum and 15 below the table minimum (the schema soft thresholds), clamped.
pub fn quality_score(issues: usize, source_confidence: f64, occupations: usize, tables: usize) -> f64 {
    let mut score = (100.0 - 2.0 * issues as f64) * source_confidence;
    if occupations < MIN_OCCUPATIONS {
        score -= 20.0;
    }
    if tables < MIN_TABLES {
        score -= 15.0;
    }
    score.clamp(0.0, 100.0)
}

/// Build the knowledge base document.
#[instrument(skip_all, fields(occupations = output.occupations.len(), tables = output.tables.len()))]
pub fn assemble(config: &AssembleConfig, output: NormalizationOutput) -> KnowledgeBase {
    let quality = quality_score(
        output.issues.len(),
        config.source_confidence,
        output.occupations.len(),
        output.tables.len(),
    );
    let manual_review_required = output.issues.len() > MAX_ISSUES_WITHOUT_REVIEW;

    let group_table = output
        .tables
        .iter()
        .find(|t| t.kind == TableShape::OccupationGroup)
        .map(|t| t.id.clone());

    let kb = KnowledgeBase {
        metadata: KbMetadata {
            title: config.title.clone(),
            version: config.version.clone(),
            extraction_date: config.extraction_date,
            source_url: config.source_url.clone(),
            arxiv_id: config.arxiv_id.clone(),
            publication_date: config.publication_date.clone(),
        },
        methodology: default_methodology(),
        occupations: output.occupations,
        tables: output.tables,
        cross_references: output.cross_references,
        visualizations: default_visualizations(group_table),
        extraction_info: ExtractionInfo {
            extraction_date: config.extraction_date,
            run_id: config.run_id,
            quality_score: quality,
            source_confidence: config.source_confidence,
            source_sha256: config.source_sha256.clone(),
            normalization_issues: output.issues,
            manual_review_required,
        },
    };

    debug!(quality, manual_review_required, "knowledge base assembled");
    kb
}

fn default_methodology() -> Methodology {
    Methodology {
        description: "Occupational AI applicability derived from published exposure tables: \
                      each occupation's score measures how much of its work activity \
                      generative AI can assist with or perform."
            .into(),
        data_sources: vec![
            "Published occupation exposure tables".into(),
            "O*NET occupational task statements".into(),
            "Standard Occupational Classification (SOC) codes".into(),
        ],
        risk_score_definition: "Normalized score in [0, 1]; higher means a larger share of \
                                the occupation's work activities overlaps with AI capability."
            .into(),
        limitations: vec![
            "Scores measure task overlap, not realized automation or job loss.".into(),
            "Occupations are matched by standardized name; distinct SOC codes under one name are merged.".into(),
        ],
    }
}

fn default_visualizations(group_table: Option<String>) -> Vec<VisualizationConfig> {
    let bin = |label: &str, min: f64, max: f64| RiskBin {
        label: label.into(),
        min,
        max,
    };
    vec![
        VisualizationConfig::RiskDistribution {
            title: "Distribution of AI exposure scores".into(),
            bins: vec![
                bin("low", 0.0, 0.4),
                bin("medium", 0.4, 0.6),
                bin("high", 0.6, 0.8),
                bin("very_high", 0.8, 1.0),
            ],
        },
        VisualizationConfig::TopOccupations {
            title: "Most exposed occupations".into(),
            limit: 20,
        },
        VisualizationConfig::OccupationGroups {
            title: "Exposure by occupation group".into(),
            table_id: group_table,
        },
        VisualizationConfig::TaskAutomation {
            title: "Key tasks by mean exposure".into(),
            max_tasks: 15,
        },
    ]
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Write the knowledge base, its sidecar and (if given) the validation report.
/// Returns the written paths.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn persist(
    dir: &Path,
    kb: &KnowledgeBase,
    report: Option<&ComprehensiveReport>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| RiskbaseError::io(dir, e))?;

    let mut written = Vec::with_capacity(3);

    let kb_path = dir.join(KB_FILE);
    write_json(&kb_path, kb)?;
    written.push(kb_path);

    let sidecar_path = dir.join(METADATA_FILE);
    write_json(&sidecar_path, &ExtractionMetadata::from(kb))?;
    written.push(sidecar_path);

    let report_path = dir.join(REPORT_FILE);
    match report {
        Some(report) => {
            write_json(&report_path, report)?;
            written.push(report_path);
        }
        None => remove_stale(&report_path)?,
    }

    info!(files = written.len(), "knowledge base persisted");
    Ok(written)
}

/// Remove a file left by an earlier run; a missing file is fine.
fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RiskbaseError::io(path, e)),
    }
}

/// Load a knowledge base from a `knowledge_base.json` file or a directory
/// containing one.
pub fn load_knowledge_base(path: &Path) -> Result<KnowledgeBase> {
    read_json(&resolve(path, KB_FILE))
}

/// Load the `extraction_metadata.json` sidecar from a file or directory.
pub fn load_sidecar(path: &Path) -> Result<ExtractionMetadata> {
    read_json(&resolve(path, METADATA_FILE))
}

fn resolve(path: &Path, file_name: &str) -> PathBuf {
    if path.is_dir() {
        path.join(file_name)
    } else {
        path.to_path_buf()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).map_err(|e| RiskbaseError::io(path, e))?;
    serde_json::from_str(&raw)
        .map_err(|e| RiskbaseError::parse(format!("{}: {e}", path.display())))
}

/// Pretty-print `data` to `path` atomically (temp file, then rename).
fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| RiskbaseError::parse(format!("JSON serialization failed: {e}")))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, &json).map_err(|e| RiskbaseError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| RiskbaseError::io(path, e))?;

    debug!(path = %path.display(), size = json.len(), "wrote JSON file");
    Ok(())
}
