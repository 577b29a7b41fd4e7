//! Cross-check of occupation names against the extracted source text.

use std::path::Path;

use riskbase_normalize::names::{aliases_of, clean_text};
use riskbase_shared::{KnowledgeBase, Result, RiskbaseError};
use tracing::debug;

use crate::{Severity, ValidationIssue};

/// Report each occupation whose name does not occur in the source text.
///
/// The text goes through the same whitespace and punctuation passes as
/// occupation names. A name also counts as found when any spelling that
/// standardizes to it occurs, since aliases were resolved during
/// normalization.
///
/// Fails when no path is configured or the file cannot be read.
pub fn cross_check(kb: &KnowledgeBase, source: Option<&Path>) -> Result<Vec<ValidationIssue>> {
    let path = source.ok_or_else(|| RiskbaseError::config("no source text path configured"))?;
    let raw = std::fs::read_to_string(path).map_err(|e| RiskbaseError::io(path, e))?;
    let text = clean_text(&raw).to_lowercase();

    let issues: Vec<ValidationIssue> = kb
        .occupations
        .iter()
        .enumerate()
        .filter(|(_, occ)| !mentions(&text, &occ.name))
        .map(|(i, occ)| {
            ValidationIssue::new(
                Severity::Low,
                format!("occupations[{i}].name"),
                format!("'{}' not found in source text", occ.name),
            )
        })
        .collect();

    debug!(path = %path.display(), missing = issues.len(), "source cross-check complete");
    Ok(issues)
}

/// `text` is cleaned and lowercased.
fn mentions(text: &str, name: &str) -> bool {
    text.contains(&clean_text(name).to_lowercase())
        || aliases_of(name).any(|alias| text.contains(&clean_text(alias)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_kb;

    fn write_source(body: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("rb-crosscheck-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("source.txt");
        std::fs::write(&path, body).unwrap();
        (dir, path)
    }

    #[test]
    fn reports_names_missing_from_source() {
        let (dir, path) = write_source("Table 2: SOFTWARE DEVELOPERS and data\n scientists lead.");
        let mut kb = sample_kb();
        kb.occupations.truncate(3);

        let issues = cross_check(&kb, Some(&path)).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Low);
        assert!(issues[0].message.contains("Technical Writers"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn source_text_is_cleaned_like_names() {
        let (dir, path) = write_source(
            "Top: Customer Service Reps† and Technical\nWriters* and Data Scientists¹ lead.",
        );
        let mut kb = sample_kb();
        kb.occupations.truncate(5);
        kb.occupations.remove(3);
        kb.occupations.remove(0);

        let issues = cross_check(&kb, Some(&path)).unwrap();
        assert!(issues.is_empty(), "{issues:?}");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_source_fails() {
        let kb = sample_kb();
        assert_eq!(cross_check(&kb, None).unwrap_err().code(), "CONFIG_ERROR");
        let missing = std::env::temp_dir().join(format!("rb-missing-{}.txt", uuid::Uuid::now_v7()));
        assert_eq!(cross_check(&kb, Some(&missing)).unwrap_err().code(), "IO_ERROR");
    }
}
