//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use riskbase_core::pipeline::{BuildConfig, BuildResult, ProgressReporter, ValidationMode};
use riskbase_core::{load_knowledge_base, run_pipeline};
use riskbase_extract::SourceLocation;
use riskbase_query::QueryService;
use riskbase_shared::{
    AppConfig, KnowledgeBase, OccupationRecord, OccupationRisk, SearchFilters, init_config,
    load_config,
};
use riskbase_validation::{
    CompletenessReport, ComprehensiveReport, EngineConfig, SchemaReport, Severity, ValidationEngine, count_severity,
};
use serde::Serialize;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Riskbase: occupational AI-exposure knowledge bases.
#[derive(Parser)]
#[command(
    name = "riskbase",
    version,
    about = "Build and query knowledge bases of occupational AI exposure.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build a knowledge base from an extraction bundle.
    Build {
        /// Bundle path or http(s)/file URL.
        source: String,

        /// Output directory (defaults to `defaults.output_dir`).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Validators to run: schema, comprehensive, or both.
        #[arg(long, default_value = "both")]
        validation: ValidationMode,

        /// Knowledge base title.
        #[arg(long)]
        title: Option<String>,

        /// arXiv identifier of the source paper.
        #[arg(long)]
        arxiv_id: Option<String>,

        /// Publication date of the source paper (YYYY-MM-DD).
        #[arg(long)]
        published: Option<String>,
    },

    /// Re-validate a persisted knowledge base.
    Validate {
        /// Knowledge base file or directory.
        #[arg(long)]
        kb: PathBuf,

        /// Promote soft-threshold warnings to errors.
        #[arg(long)]
        strict: bool,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the risk profile of one occupation.
    Risk {
        /// Knowledge base file or directory.
        #[arg(long)]
        kb: PathBuf,

        /// SOC code or occupation name.
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Compare several occupations side by side.
    Compare {
        /// Knowledge base file or directory.
        #[arg(long)]
        kb: PathBuf,

        /// SOC codes or occupation names.
        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Search occupations by code, name, or key task.
    Search {
        /// Knowledge base file or directory.
        #[arg(long)]
        kb: PathBuf,

        query: String,

        /// Minimum risk score.
        #[arg(long)]
        min: Option<f64>,

        /// Maximum risk score.
        #[arg(long)]
        max: Option<f64>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// List the most exposed occupations.
    Top {
        /// Knowledge base file or directory.
        #[arg(long)]
        kb: PathBuf,

        /// Number of occupations.
        #[arg(short, default_value = "10")]
        n: usize,

        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "riskbase=info",
        1 => "riskbase=debug",
        _ => "riskbase=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            source,
            out,
            validation,
            title,
            arxiv_id,
            published,
        } => {
            let overrides = BuildOverrides {
                out,
                validation,
                title,
                arxiv_id,
                publication_date: published,
            };
            cmd_build(&source, overrides).await
        }
        Command::Validate { kb, strict, json } => cmd_validate(&kb, strict, json),
        Command::Risk { kb, id, json } => cmd_risk(&kb, &id, json),
        Command::Compare { kb, ids, json } => cmd_compare(&kb, &ids, json),
        Command::Search {
            kb,
            query,
            min,
            max,
            limit,
            json,
        } => {
            let filters = SearchFilters {
                min_risk_score: min,
                max_risk_score: max,
                limit,
            };
            cmd_search(&kb, &query, &filters, json)
        }
        Command::Top { kb, n, json } => cmd_top(&kb, n, json),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

/// Flags that override values from the config file.
struct BuildOverrides {
    out: Option<PathBuf>,
    validation: ValidationMode,
    title: Option<String>,
    arxiv_id: Option<String>,
    publication_date: Option<String>,
}

async fn cmd_build(source: &str, overrides: BuildOverrides) -> Result<()> {
    let config = load_config()?;
    let location = SourceLocation::parse(source)?;

    let mut build_config = BuildConfig::from_app_config(location, &config);
    build_config.validation = overrides.validation;
    if let Some(out) = overrides.out {
        build_config.output_dir = out;
    }
    if let Some(title) = overrides.title {
        build_config.title = title;
    }
    build_config.arxiv_id = overrides.arxiv_id;
    build_config.publication_date = overrides.publication_date;

    info!(
        source,
        out = %build_config.output_dir.display(),
        validation = %build_config.validation,
        "building knowledge base"
    );

    let reporter = CliProgress::new();
    let result = match run_pipeline(&build_config, &reporter).await {
        Ok(result) => result,
        Err(e) => {
            reporter.spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    let info = &result.kb.extraction_info;
    println!();
    println!("  Knowledge base built successfully!");
    println!("  Occupations: {}", result.kb.occupations.len());
    println!("  Tables:      {}", result.kb.tables.len());
    println!("  Quality:     {:.1}", info.quality_score);
    println!("  Issues:      {}", info.normalization_issues.len());
    if let Some(report) = &result.schema_report {
        println!(
            "  Schema:      {:.1} ({} errors, {} warnings)",
            report.score,
            report.errors.len(),
            report.warnings.len()
        );
    }
    if let Some(report) = &result.validation_report {
        println!("  Overall:     {:.1}", report.quality.overall_score);
    }
    if info.manual_review_required
        || result
            .validation_report
            .as_ref()
            .is_some_and(ComprehensiveReport::requires_manual_review)
    {
        println!("  Review:      manual review recommended");
    }
    for file in &result.files {
        println!("  Wrote:       {}", file.display());
    }
    println!("  Time:        {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn cmd_validate(kb_path: &Path, strict: bool, json: bool) -> Result<()> {
    let config = load_config()?;
    let kb = load_knowledge_base(kb_path)?;

    let mut engine_config = EngineConfig::from(&config);
    engine_config.schema.strict_mode |= strict;
    let report = ValidationEngine::new(engine_config).validate(&kb);

    if json {
        return print_json(&report);
    }

    print_schema(&report.schema);
    println!("  Integrity issues: {}", report.integrity_issues.len());
    for issue in &report.integrity_issues {
        println!("    {issue}");
    }
    println!("  Source issues:    {}", report.source_issues.len());
    if let Some(completeness) = &report.completeness {
        for line in completeness_lines(completeness) {
            println!("{line}");
        }
    }
    for failure in &report.pass_failures {
        println!("  Skipped {:?}: {}", failure.pass, failure.message);
    }

    let quality = &report.quality;
    println!();
    println!("  Accuracy:    {:.1}", quality.data_accuracy);
    println!("  Consistency: {:.1}", quality.consistency);
    println!("  Reliability: {:.1}", quality.reliability);
    println!("  Overall:     {:.1}", quality.overall_score);
    if report.requires_manual_review() {
        println!("  Review:      manual review recommended");
    }
    println!();

    if !report.schema.is_valid {
        return Err(eyre!(
            "knowledge base is invalid ({} schema errors)",
            report.schema.errors.len()
        ));
    }
    Ok(())
}

/// Summary line plus one line per failed check.
fn completeness_lines(report: &CompletenessReport) -> Vec<String> {
    let mut lines = vec![format!(
        "  Completeness:     {:.1} ({}/{} checks failed)",
        report.completeness_score,
        report.failed_checks.len(),
        report.total_checks
    )];
    lines.extend(report.failed_checks.iter().map(|check| format!("    missing: {check}")));
    lines
}

fn print_schema(report: &SchemaReport) {
    println!();
    println!(
        "  Schema: {} (score {:.1})",
        if report.is_valid { "valid" } else { "INVALID" },
        report.score
    );
    for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low] {
        let count = count_severity(&report.errors, severity);
        if count > 0 {
            println!("    {severity:?}: {count}");
        }
    }
    for error in &report.errors {
        println!("    {error}");
    }
    for warning in &report.warnings {
        println!("    warning {}: {}", warning.field, warning.message);
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Load a persisted knowledge base into a ready query service.
fn open_service(kb_path: &Path) -> Result<QueryService> {
    let config = load_config()?;
    let kb: KnowledgeBase = load_knowledge_base(kb_path)?;
    let mut service = QueryService::from_config(&config);
    service.initialize(kb)?;
    Ok(service)
}

fn cmd_risk(kb_path: &Path, id: &str, json: bool) -> Result<()> {
    let service = open_service(kb_path)?;
    let risk = service.get_occupation_risk(id)?;
    if json {
        return print_json(&risk);
    }
    print_risk(&risk);
    Ok(())
}

fn cmd_compare(kb_path: &Path, ids: &[String], json: bool) -> Result<()> {
    let service = open_service(kb_path)?;
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    let risks = service.compare_occupations(&ids)?;
    if json {
        return print_json(&risks);
    }
    for risk in &risks {
        print_risk(risk);
    }
    Ok(())
}

fn print_risk(risk: &OccupationRisk) {
    let occ = &risk.occupation;
    println!();
    println!("  {} ({})", occ.name, occ.code);
    println!("  Score:      {:.2} ({})", occ.risk_score, risk.risk_level);
    println!("  Percentile: {:.0}", risk.percentile);
    if !occ.key_tasks.is_empty() {
        println!("  Key tasks:  {}", occ.key_tasks.join("; "));
    }
    if !risk.similar_occupations.is_empty() {
        println!("  Similar:");
        for similar in &risk.similar_occupations {
            println!("    {:.2}  {}", similar.risk_score, similar.name);
        }
    }
    println!();
}

fn cmd_search(kb_path: &Path, query: &str, filters: &SearchFilters, json: bool) -> Result<()> {
    let service = open_service(kb_path)?;
    let results = service.search_occupations(query, filters)?;
    if json {
        return print_json(&results);
    }
    if results.is_empty() {
        println!("No occupations match '{query}'.");
        return Ok(());
    }
    for result in &results {
        let reasons: Vec<String> = result
            .match_reasons
            .iter()
            .map(|r| format!("{r:?}"))
            .collect();
        println!(
            "  {:>6.1}  {:.2}  {:<8} {}  [{}]",
            result.match_score,
            result.occupation.risk_score,
            result.occupation.code,
            result.occupation.name,
            reasons.join(", ")
        );
    }
    Ok(())
}

fn cmd_top(kb_path: &Path, n: usize, json: bool) -> Result<()> {
    let service = open_service(kb_path)?;
    let top = service.get_top_risk_occupations(n)?;
    if json {
        return print_json(&top);
    }
    print_occupations(&top);
    Ok(())
}

fn print_occupations(occupations: &[OccupationRecord]) {
    for (rank, occ) in occupations.iter().enumerate() {
        println!("  {:>3}. {:.2}  {:<8} {}", rank + 1, occ.risk_score, occ.code, occ.name);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
