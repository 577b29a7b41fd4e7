//! Build orchestration for Riskbase.
//!
//! This crate ties extraction, normalization, validation, and knowledge base
//! assembly into the end-to-end `build` workflow.

pub mod assembler;
pub mod pipeline;

pub use assembler::{KB_FILE, METADATA_FILE, REPORT_FILE, load_knowledge_base, load_sidecar};
pub use pipeline::{
    BuildConfig, BuildResult, BuiltKnowledgeBase, ProgressReporter, SilentProgress, ValidationMode,
    build_knowledge_base, run_pipeline,
};
