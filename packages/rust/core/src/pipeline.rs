//! End-to-end `build` pipeline: fetch → normalize → assemble → validate → persist.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};
use url::Url;
use uuid::Uuid;

use riskbase_extract::{FetchOptions, FetchedBundle, SourceLocation, fetch_bundle, source_confidence};
use riskbase_normalize::{NormalizerConfig, normalize};
use riskbase_shared::{AppConfig, ErrorHandler, KnowledgeBase, Result, RiskbaseError};
use riskbase_validation::{
    ComprehensiveReport, EngineConfig, SchemaReport, SchemaValidator, ValidationEngine,
};

use crate::assembler::{self, AssembleConfig};

/// Title used when none is configured.
pub const DEFAULT_TITLE: &str = "Occupational AI Exposure Knowledge Base";

/// Which validators run before persistence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Schema validator only.
    Schema,
    /// Validation engine only (includes its own schema pass).
    Comprehensive,
    /// Both, reported separately.
    #[default]
    Both,
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "schema" => Ok(Self::Schema),
            "comprehensive" => Ok(Self::Comprehensive),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown validation mode '{other}' (expected schema, comprehensive or both)"
            )),
        }
    }
}

impl std::fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Schema => "schema",
            Self::Comprehensive => "comprehensive",
            Self::Both => "both",
        })
    }
}

impl ValidationMode {
    fn runs_schema(self) -> bool {
        matches!(self, Self::Schema | Self::Both)
    }

    fn runs_engine(self) -> bool {
        matches!(self, Self::Comprehensive | Self::Both)
    }
}

/// Configuration for the `build` pipeline.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Where the extraction bundle lives.
    pub source: SourceLocation,
    /// Directory receiving the persisted files.
    pub output_dir: PathBuf,
    pub validation: ValidationMode,
    /// Version stamped into the knowledge base metadata.
    pub kb_version: String,
    pub title: String,
    pub arxiv_id: Option<String>,
    pub publication_date: Option<String>,
    pub fetch: FetchOptions,
    pub normalizer: NormalizerConfig,
    pub engine: EngineConfig,
    pub retry: ErrorHandler,
}

impl BuildConfig {
    /// Pipeline config for `source`, taking everything else from `config`.
    pub fn from_app_config(source: SourceLocation, config: &AppConfig) -> Self {
        Self {
            source,
            output_dir: PathBuf::from(&config.defaults.output_dir),
            validation: ValidationMode::default(),
            kb_version: config.defaults.kb_version.clone(),
            title: DEFAULT_TITLE.to_string(),
            arxiv_id: None,
            publication_date: None,
            fetch: FetchOptions::default(),
            normalizer: NormalizerConfig::from(config),
            engine: EngineConfig::from(config),
            retry: ErrorHandler::from(&config.retry),
        }
    }
}

/// Result of the `build` pipeline.
#[derive(Debug)]
pub struct BuildResult {
    pub kb: KnowledgeBase,
    pub schema_report: Option<SchemaReport>,
    pub validation_report: Option<ComprehensiveReport>,
    /// Files written, in write order.
    pub files: Vec<PathBuf>,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Run the full `build` pipeline.
///
/// 1. Fetch the extraction bundle (retried)
/// 2. Normalize tables into records
/// 3. Assemble the knowledge base
/// 4. Validate (schema, comprehensive, or both)
/// 5. Persist, unless a critical schema error was found
#[instrument(skip_all, fields(source = %config.source, out = %config.output_dir.display()))]
pub async fn run_pipeline(config: &BuildConfig, progress: &dyn ProgressReporter) -> Result<BuildResult> {
    let start = Instant::now();
    info!(source = %config.source, "starting build pipeline");

    // --- Phase 1: Fetch ---
    progress.phase("Fetching extraction bundle");
    let fetched = config
        .retry
        .with_retry(|| fetch_bundle(&config.source, &config.fetch))
        .await?;

    // --- Phases 2-4: Normalize, assemble, validate ---
    let built = build_knowledge_base(config, fetched, progress)?;

    // --- Phase 5: Persist ---
    progress.phase("Writing knowledge base");
    let files = assembler::persist(&config.output_dir, &built.kb, built.validation_report.as_ref())?;

    let result = BuildResult {
        kb: built.kb,
        schema_report: built.schema_report,
        validation_report: built.validation_report,
        files,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        occupations = result.kb.occupations.len(),
        tables = result.kb.tables.len(),
        quality = result.kb.extraction_info.quality_score,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "build pipeline complete"
    );

    Ok(result)
}

/// A validated, not yet persisted knowledge base.
#[derive(Debug)]
pub struct BuiltKnowledgeBase {
    pub kb: KnowledgeBase,
    pub schema_report: Option<SchemaReport>,
    pub validation_report: Option<ComprehensiveReport>,
}

/// Normalize, assemble and validate a fetched bundle.
///
/// Fails with `InvalidData` when there is nothing to normalize or when
/// validation finds a critical schema error.
pub fn build_knowledge_base(
    config: &BuildConfig,
    fetched: FetchedBundle,
    progress: &dyn ProgressReporter,
) -> Result<BuiltKnowledgeBase> {
    let FetchedBundle { bundle, sha256 } = fetched;

    // --- Phase 2: Normalize ---
    progress.phase("Normalizing tables");
    let output = normalize(&bundle.tables, &config.normalizer)?;
    for issue in &output.issues {
        warn!(%issue, "normalization issue");
    }

    // --- Phase 3: Assemble ---
    progress.phase("Assembling knowledge base");
    let now = chrono::Utc::now();
    let assemble_config = AssembleConfig {
        title: config.title.clone(),
        version: config.kb_version.clone(),
        source_url: bundle
            .source
            .clone()
            .unwrap_or_else(|| source_url(&config.source)),
        arxiv_id: config.arxiv_id.clone(),
        publication_date: config.publication_date.clone(),
        extraction_date: now,
        run_id: Uuid::now_v7(),
        source_confidence: source_confidence(&bundle),
        source_sha256: Some(sha256),
    };
    let kb = assembler::assemble(&assemble_config, output);

    // --- Phase 4: Validate ---
    progress.phase("Validating knowledge base");
    let schema_report = config
        .validation
        .runs_schema()
        .then(|| SchemaValidator::new(config.engine.schema.clone()).validate(&kb));
    let validation_report = config
        .validation
        .runs_engine()
        .then(|| ValidationEngine::new(config.engine.clone()).validate(&kb));

    let critical_report = schema_report
        .as_ref()
        .or(validation_report.as_ref().map(|r| &r.schema))
        .filter(|r| r.has_critical());
    if let Some(report) = critical_report {
        return Err(RiskbaseError::invalid_data(
            "knowledge base failed schema validation",
            report.errors.iter().map(ToString::to_string).collect(),
        ));
    }

    Ok(BuiltKnowledgeBase {
        kb,
        schema_report,
        validation_report,
    })
}

/// `source` as a URL string; local paths become `file://` URLs when possible.
fn source_url(source: &SourceLocation) -> String {
    match source {
        SourceLocation::Http(url) => url.to_string(),
        SourceLocation::File(path) => std::path::absolute(path)
            .ok()
            .and_then(|abs| Url::from_file_path(abs).ok())
            .map(String::from)
            .unwrap_or_else(|| path.display().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use riskbase_validation::Severity;

    use super::*;
    use crate::assembler::{KB_FILE, METADATA_FILE, REPORT_FILE, load_knowledge_base};

    const BUNDLE: &str = r#"{
        "source": "https://arxiv.org/abs/2507.07935",
        "tables": [
            {
                "page": 4,
                "title": "Top occupations by AI applicability score",
                "headers": ["Occupation", "SOC Code", "Score", "Key Tasks"],
                "rows": [
                    ["Interpreters and Translators", "27-3091", "0.49", "Translate documents"],
                    ["Historians", "19-3093", "0.48", "Research archives; Write reports"],
                    ["Passenger Attendants", "53-2031", "0.47", "Answer questions"]
                ],
                "confidence": 0.95
            },
            {
                "page": 6,
                "title": "Exposure by industry",
                "headers": ["Industry", "Exposure"],
                "rows": [["Information", "0.45"], ["Retail", "0.30"]],
                "confidence": 0.9
            }
        ],
        "texts": [{ "page": 1, "text": "Working with AI", "confidence": 0.9 }]
    }"#;

    const OPAQUE_ONLY: &str = r#"{
        "tables": [
            { "page": 1, "title": "Wages", "headers": ["Year", "Wage"], "rows": [["2024", "50"]] }
        ]
    }"#;

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn done(&self, _result: &BuildResult) {
            self.phases.lock().unwrap().push("done".into());
        }
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("rb-pipeline-{}", Uuid::now_v7()))
    }

    fn write_bundle(dir: &Path, body: &str) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join("bundle.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn config(source: PathBuf, out: PathBuf) -> BuildConfig {
        let mut config = BuildConfig::from_app_config(SourceLocation::File(source), &AppConfig::default());
        config.output_dir = out;
        config.retry.base_delay = Duration::from_millis(1);
        config
    }

    #[test]
    fn validation_mode_parses() {
        assert_eq!("schema".parse::<ValidationMode>().unwrap(), ValidationMode::Schema);
        assert_eq!("both".parse::<ValidationMode>().unwrap(), ValidationMode::Both);
        assert!("all".parse::<ValidationMode>().is_err());
        assert_eq!(ValidationMode::Comprehensive.to_string(), "comprehensive");
    }

    #[tokio::test]
    async fn builds_and_persists_knowledge_base() {
        let dir = temp_dir();
        let source = write_bundle(&dir, BUNDLE);
        let out = dir.join("kb");
        let progress = RecordingProgress::default();

        let result = run_pipeline(&config(source, out.clone()), &progress).await.unwrap();

        assert_eq!(result.kb.occupations.len(), 3);
        assert_eq!(result.kb.tables.len(), 2);
        assert_eq!(result.kb.metadata.source_url, "https://arxiv.org/abs/2507.07935");
        assert!(result.kb.extraction_info.source_sha256.is_some());
        // (100 − 0) × 0.9 − 20 − 15
        assert!((result.kb.extraction_info.quality_score - 55.0).abs() < 1e-9);
        assert!(!result.kb.extraction_info.manual_review_required);

        let schema = result.schema_report.as_ref().unwrap();
        assert!(schema.is_valid);
        assert_eq!(schema.warnings.len(), 2);
        assert_eq!(schema.count(Severity::High), 0);
        assert!(result.validation_report.is_some());

        assert_eq!(result.files, vec![out.join(KB_FILE), out.join(METADATA_FILE), out.join(REPORT_FILE)]);
        let reloaded = load_knowledge_base(&out).unwrap();
        assert_eq!(reloaded, result.kb);

        let phases = progress.phases.lock().unwrap();
        assert_eq!(phases.first().map(String::as_str), Some("Fetching extraction bundle"));
        assert_eq!(phases.last().map(String::as_str), Some("done"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn schema_only_mode_writes_no_report() {
        let dir = temp_dir();
        let source = write_bundle(&dir, BUNDLE);
        let out = dir.join("kb");
        let mut config = config(source, out.clone());
        config.validation = ValidationMode::Schema;

        let result = run_pipeline(&config, &SilentProgress).await.unwrap();
        assert!(result.validation_report.is_none());
        assert_eq!(result.files.len(), 2);
        assert!(!out.join(REPORT_FILE).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn schema_only_rebuild_removes_earlier_report() {
        let dir = temp_dir();
        let source = write_bundle(&dir, BUNDLE);
        let out = dir.join("kb");

        let first = run_pipeline(&config(source.clone(), out.clone()), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(first.files.len(), 3);
        assert!(out.join(REPORT_FILE).exists());

        let mut config = config(source, out.clone());
        config.validation = ValidationMode::Schema;
        let second = run_pipeline(&config, &SilentProgress).await.unwrap();
        assert_eq!(second.files.len(), 2);
        assert!(!out.join(REPORT_FILE).exists());
        assert_eq!(load_knowledge_base(&out).unwrap(), second.kb);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn critical_schema_error_aborts_persistence() {
        let dir = temp_dir();
        let source = write_bundle(&dir, OPAQUE_ONLY);
        let out = dir.join("kb");

        let err = run_pipeline(&config(source, out.clone()), &SilentProgress)
            .await
            .unwrap_err();
        match err {
            RiskbaseError::InvalidData { errors, .. } => {
                assert!(errors.iter().any(|e| e.contains("no occupations")));
            }
            other => panic!("expected InvalidData, got {other:?}"),
        }
        assert!(!out.join(KB_FILE).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_source_is_retried_then_reported() {
        let dir = temp_dir();
        let config = config(dir.join("missing.json"), dir.join("kb"));

        let err = run_pipeline(&config, &SilentProgress).await.unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
    }

    #[tokio::test]
    async fn malformed_bundle_is_a_parse_error() {
        let dir = temp_dir();
        let source = write_bundle(&dir, "{ \"tables\": [ ");

        let err = run_pipeline(&config(source, dir.join("kb")), &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_sources_become_file_urls() {
        let url = source_url(&SourceLocation::File(PathBuf::from("/tmp/bundle.json")));
        assert_eq!(url, "file:///tmp/bundle.json");
    }
}
