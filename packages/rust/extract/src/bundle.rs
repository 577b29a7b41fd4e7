//! Bundle parsing, shape tagging, and confidence helpers.

use riskbase_shared::{ExtractionBundle, Result, RiskbaseError, TableShape};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Parse a bundle document and tag each table with its shape.
///
/// Tables that already carry an explicit `shape` keep it. Confidence values
/// outside `[0, 1]` are clamped.
pub fn parse_bundle(body: &str) -> Result<ExtractionBundle> {
    let mut bundle: ExtractionBundle = serde_json::from_str(body)
        .map_err(|e| RiskbaseError::parse(format!("invalid extraction bundle: {e}")))?;

    for (i, table) in bundle.tables.iter_mut().enumerate() {
        if table.shape.is_none() {
            table.shape = Some(TableShape::classify(table.title.as_deref()));
        }
        table.confidence = clamp_confidence(table.confidence, "table", i);
        debug!(index = i, shape = ?table.shape, title = ?table.title, "tagged raw table");
    }

    for (i, text) in bundle.texts.iter_mut().enumerate() {
        text.confidence = clamp_confidence(text.confidence, "text", i);
    }

    Ok(bundle)
}

fn clamp_confidence(value: f64, unit: &str, index: usize) -> f64 {
    if value.is_nan() {
        warn!(unit, index, "confidence is NaN, treating as 0");
        return 0.0;
    }
    if !(0.0..=1.0).contains(&value) {
        warn!(unit, index, value, "confidence outside [0, 1], clamping");
    }
    value.clamp(0.0, 1.0)
}

/// Overall confidence of the extracted source text.
///
/// Mean of the raw text confidences; falls back to the table confidences, and
/// to 1.0 when the bundle is empty.
pub fn source_confidence(bundle: &ExtractionBundle) -> f64 {
    let values: Vec<f64> = if bundle.texts.is_empty() {
        bundle.tables.iter().map(|t| t.confidence).collect()
    } else {
        bundle.texts.iter().map(|t| t.confidence).collect()
    };

    if values.is_empty() {
        return 1.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Hex SHA-256 of the raw bundle bytes.
pub fn content_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_shape_is_kept() {
        let body = r#"{"tables": [
            {"page": 1, "title": "Top occupations", "headers": [], "rows": [], "shape": "opaque"}
        ]}"#;
        let bundle = parse_bundle(body).unwrap();
        assert_eq!(bundle.tables[0].shape, Some(TableShape::Opaque));
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let body = r#"{"tables": [
            {"page": 1, "headers": [], "rows": [], "confidence": 1.7}
        ], "texts": [{"page": 1, "text": "x", "confidence": -0.2}]}"#;
        let bundle = parse_bundle(body).unwrap();
        assert_eq!(bundle.tables[0].confidence, 1.0);
        assert_eq!(bundle.texts[0].confidence, 0.0);
    }

    #[test]
    fn confidence_prefers_text_units() {
        let body = r#"{
            "tables": [{"page": 1, "headers": [], "rows": [], "confidence": 0.2}],
            "texts": [
                {"page": 1, "text": "a", "confidence": 0.8},
                {"page": 2, "text": "b", "confidence": 0.6}
            ]
        }"#;
        let bundle = parse_bundle(body).unwrap();
        assert!((source_confidence(&bundle) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn confidence_falls_back_to_tables_then_one() {
        let body = r#"{"tables": [{"page": 1, "headers": [], "rows": [], "confidence": 0.5}]}"#;
        assert_eq!(source_confidence(&parse_bundle(body).unwrap()), 0.5);
        assert_eq!(source_confidence(&ExtractionBundle::default()), 1.0);
    }

    #[test]
    fn sha256_is_hex() {
        let digest = content_sha256(b"abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
