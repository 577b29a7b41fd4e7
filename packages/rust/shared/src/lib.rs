//! Shared types, error model, and configuration for Riskbase.
//!
//! This crate is the foundation depended on by all other Riskbase crates.
//! It provides:
//! - [`RiskbaseError`]: the unified error type
//! - Domain types ([`KnowledgeBase`], [`OccupationRecord`], [`TableRecord`], [`RawTable`])
//! - Configuration ([`AppConfig`], config loading)
//! - The retry/fallback policy ([`ErrorHandler`])

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, NormalizerSection, QuerySection, RetrySection, SchemaSection,
    ValidationSection, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, RiskbaseError};
pub use retry::ErrorHandler;
pub use types::{
    CURRENT_KB_VERSION, CrossReference, ExtractionBundle, ExtractionInfo, ExtractionMetadata,
    IndustryExposure, KbMetadata, KnowledgeBase, MatchReason, Methodology, OccupationRecord,
    OccupationRisk, RawTable, RawText, RiskBin, RiskLevel, SearchFilters, SearchResult,
    TableRecord, TableShape, TaskAutomation, VisualizationConfig, VisualizationKind,
};
