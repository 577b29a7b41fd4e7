//! Normalization of raw extraction output into canonical records.
//!
//! Raw tables become [`TableRecord`]s with synthetic `table_<n>` ids. Tables
//! the adapter tagged as exposure tables ([`TableShape::OccupationGroup`],
//! [`TableShape::TopOccupations`]) additionally yield [`OccupationRecord`]s,
//! merged by canonical name. Problems are collected as issue strings so a
//! run can finish with partial results.
//!
//! [`TableShape::OccupationGroup`]: riskbase_shared::TableShape::OccupationGroup
//! [`TableShape::TopOccupations`]: riskbase_shared::TableShape::TopOccupations

pub mod crossref;
pub mod names;
mod records;

use riskbase_shared::{
    AppConfig, CrossReference, OccupationRecord, RawTable, Result, RiskbaseError, TableRecord,
};
use tracing::{info, instrument};

pub use records::{is_soc_code, parse_score};

/// Normalizer switches.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Run names through [`names::standardize`].
    pub standardize_occupation_names: bool,
    /// Discover [`CrossReference`]s between tables.
    pub create_cross_references: bool,
    /// Check score ranges and SOC code formats while extracting.
    pub validate_data_types: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for NormalizerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            standardize_occupation_names: config.normalizer.standardize_occupation_names,
            create_cross_references: config.normalizer.create_cross_references,
            validate_data_types: config.normalizer.validate_data_types,
        }
    }
}

/// Everything the normalizer produced for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct NormalizationOutput {
    pub occupations: Vec<OccupationRecord>,
    pub tables: Vec<TableRecord>,
    pub cross_references: Vec<CrossReference>,
    pub issues: Vec<String>,
}

/// Normalize raw tables.
///
/// Fails only when there is nothing to normalize; every other problem is
/// reported through [`NormalizationOutput::issues`].
#[instrument(skip_all, fields(tables = raw_tables.len()))]
pub fn normalize(raw_tables: &[RawTable], config: &NormalizerConfig) -> Result<NormalizationOutput> {
    if raw_tables.is_empty() {
        return Err(RiskbaseError::invalid_data(
            "no tables to normalize",
            vec!["extraction produced zero tables".into()],
        ));
    }

    let mut issues = Vec::new();
    let mut merger = records::OccupationMerger::default();
    let mut tables = Vec::with_capacity(raw_tables.len());

    for (i, raw) in raw_tables.iter().enumerate() {
        let id = format!("table_{}", i + 1);
        let table = records::normalize_table(&id, i, raw, &mut issues);
        if table.kind.is_exposure_table() {
            merger.extract(&table, raw.confidence, config, &mut issues);
        }
        tables.push(table);
    }

    let occupations = merger.finish(&mut issues);

    let cross_references = if config.create_cross_references {
        crossref::discover(&tables)
    } else {
        Vec::new()
    };

    info!(
        occupations = occupations.len(),
        tables = tables.len(),
        cross_references = cross_references.len(),
        issues = issues.len(),
        "normalization complete"
    );

    Ok(NormalizationOutput {
        occupations,
        tables,
        cross_references,
        issues,
    })
}
