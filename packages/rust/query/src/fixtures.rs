//! Knowledge bases for the query tests.

use std::collections::BTreeSet;

use chrono::Utc;
use riskbase_shared::{
    ExtractionInfo, KbMetadata, KnowledgeBase, Methodology, OccupationRecord, TableRecord,
    TableShape, VisualizationConfig,
};

pub(crate) type Row<'a> = (&'a str, &'a str, f64, &'a [&'a str]);

pub(crate) fn occupation(name: &str, code: &str, score: f64, tasks: &[&str]) -> OccupationRecord {
    OccupationRecord {
        code: code.into(),
        name: name.into(),
        risk_score: score,
        key_tasks: tasks.iter().map(|t| t.to_string()).collect(),
        table_references: BTreeSet::from(["table_1".to_string()]),
        confidence: 0.9,
    }
}

pub(crate) fn table(id: &str, headers: &[&str], rows: &[&[&str]]) -> TableRecord {
    TableRecord {
        id: id.into(),
        title: format!("{id} title"),
        page: 1,
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows: rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
        footnotes: vec![],
        source: "test".into(),
        kind: TableShape::TopOccupations,
    }
}

pub(crate) fn kb(rows: &[Row<'_>]) -> KnowledgeBase {
    let now = Utc::now();
    KnowledgeBase {
        metadata: KbMetadata {
            title: "Test".into(),
            version: "1.0.0".into(),
            extraction_date: now,
            source_url: "https://example.org/paper".into(),
            arxiv_id: None,
            publication_date: None,
        },
        methodology: Methodology {
            description: "test".into(),
            data_sources: vec![],
            risk_score_definition: "test".into(),
            limitations: vec![],
        },
        occupations: rows
            .iter()
            .map(|(name, code, score, tasks)| occupation(name, code, *score, tasks))
            .collect(),
        tables: vec![table("table_1", &["Occupation", "Score"], &[])],
        cross_references: vec![],
        visualizations: vec![VisualizationConfig::TopOccupations {
            title: "Top".into(),
            limit: 10,
        }],
        extraction_info: ExtractionInfo {
            extraction_date: now,
            run_id: uuid::Uuid::now_v7(),
            quality_score: 100.0,
            source_confidence: 1.0,
            source_sha256: None,
            normalization_issues: vec![],
            manual_review_required: false,
        },
    }
}

/// The two-occupation fixture plus one lower scorer.
pub(crate) fn three_occupations() -> KnowledgeBase {
    kb(&[
        ("Software Developers", "15-1252", 0.96, &["Write code", "Review pull requests"]),
        ("Data Scientists", "15-2051", 0.94, &["Build models", "Write code"]),
        ("Historians", "19-3093", 0.90, &["Research archives"]),
    ])
}
