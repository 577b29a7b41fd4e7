//! Application configuration for Riskbase.
//!
//! User config lives at `~/.riskbase/riskbase.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskbaseError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "riskbase.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".riskbase";

// ---------------------------------------------------------------------------
// Config structs (matching riskbase.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Normalizer switches.
    #[serde(default)]
    pub normalizer: NormalizerSection,

    /// Schema validator switches.
    #[serde(default)]
    pub schema: SchemaSection,

    /// Validation engine switches.
    #[serde(default)]
    pub validation: ValidationSection,

    /// Query service tuning.
    #[serde(default)]
    pub query: QuerySection,

    /// Retry policy for fallible I/O.
    #[serde(default)]
    pub retry: RetrySection,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default knowledge base output directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Version string stamped into built knowledge bases.
    #[serde(default = "default_kb_version")]
    pub kb_version: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            kb_version: default_kb_version(),
        }
    }
}

fn default_output_dir() -> String {
    "var/kb".into()
}
fn default_kb_version() -> String {
    crate::types::CURRENT_KB_VERSION.into()
}

/// `[normalizer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerSection {
    #[serde(default = "default_true")]
    pub standardize_occupation_names: bool,
    #[serde(default = "default_true")]
    pub create_cross_references: bool,
    #[serde(default = "default_true")]
    pub validate_data_types: bool,
}

impl Default for NormalizerSection {
    fn default() -> Self {
        Self {
            standardize_occupation_names: true,
            create_cross_references: true,
            validate_data_types: true,
        }
    }
}

/// `[schema]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSection {
    #[serde(default)]
    pub strict_mode: bool,
    #[serde(default = "default_true")]
    pub validate_references: bool,
    #[serde(default = "default_true")]
    pub check_data_types: bool,
}

impl Default for SchemaSection {
    fn default() -> Self {
        Self {
            strict_mode: false,
            validate_references: true,
            check_data_types: true,
        }
    }
}

/// `[validation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSection {
    #[serde(default)]
    pub cross_check_with_source: bool,
    #[serde(default = "default_true")]
    pub validate_data_integrity: bool,
    #[serde(default = "default_true")]
    pub check_completeness: bool,
    /// Path to the extracted source text used by the cross-check pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_pdf_path: Option<String>,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            cross_check_with_source: false,
            validate_data_integrity: true,
            check_completeness: true,
            source_pdf_path: None,
        }
    }
}

/// `[query]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySection {
    /// Maximum number of cached query results.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Risk-score distance within which occupations count as similar.
    #[serde(default = "default_similarity_band")]
    pub similarity_band: f64,
    /// Maximum number of similar occupations returned.
    #[serde(default = "default_similar_limit")]
    pub similar_limit: usize,
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            similarity_band: default_similarity_band(),
            similar_limit: default_similar_limit(),
        }
    }
}

fn default_cache_capacity() -> usize {
    1000
}
fn default_similarity_band() -> f64 {
    0.05
}
fn default_similar_limit() -> usize {
    5
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    5_000
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.riskbase/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RiskbaseError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.riskbase/riskbase.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RiskbaseError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RiskbaseError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RiskbaseError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RiskbaseError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RiskbaseError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
