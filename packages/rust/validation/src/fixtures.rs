//! A clean knowledge base shared by the validation tests.

use std::collections::BTreeSet;

use chrono::{TimeZone, Utc};
use riskbase_shared::{
    ExtractionInfo, KbMetadata, KnowledgeBase, Methodology, OccupationRecord, TableRecord,
    TableShape, VisualizationConfig,
};

const OCCUPATIONS: &[(&str, &str, f64, &str)] = &[
    ("Software Developers", "15-1252", 0.96, "Write code"),
    ("Data Scientists", "15-2051", 0.94, "Build models"),
    ("Technical Writers", "27-3042", 0.90, "Write documentation"),
    ("Translators", "27-3091", 0.85, "Translate text"),
    ("Customer Service Representatives", "43-4051", 0.80, "Answer inquiries"),
    ("Editors", "27-3041", 0.75, "Edit copy"),
    ("Market Research Analysts", "13-1161", 0.70, "Analyze survey data"),
    ("Historians", "19-3093", 0.65, "Research archives"),
    ("Proofreaders", "43-9081", 0.60, "Check spelling"),
    ("Sales Representatives", "41-4012", 0.55, "Present products"),
];

fn table(id: &str, title: &str, kind: TableShape, headers: &[&str], rows: Vec<Vec<String>>) -> TableRecord {
    TableRecord {
        id: id.into(),
        title: title.into(),
        page: 3,
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows,
        footnotes: vec![],
        source: "pdf_tables".into(),
        kind,
    }
}

fn cells(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Ten occupations, three tables, no findings in any pass.
pub(crate) fn sample_kb() -> KnowledgeBase {
    let date = Utc.with_ymd_and_hms(2025, 7, 20, 12, 0, 0).unwrap();

    let occupations = OCCUPATIONS
        .iter()
        .map(|(name, code, score, task)| OccupationRecord {
            code: code.to_string(),
            name: name.to_string(),
            risk_score: *score,
            key_tasks: vec![task.to_string()],
            table_references: BTreeSet::from(["table_1".to_string()]),
            confidence: 0.9,
        })
        .collect();

    let top_rows = OCCUPATIONS
        .iter()
        .map(|(name, code, score, _)| vec![name.to_string(), code.to_string(), score.to_string()])
        .collect();

    KnowledgeBase {
        metadata: KbMetadata {
            title: "Working with AI".into(),
            version: "1.0.0".into(),
            extraction_date: date,
            source_url: "https://arxiv.org/abs/2507.07935".into(),
            arxiv_id: Some("2507.07935".into()),
            publication_date: Some("2025-07-10".into()),
        },
        methodology: Methodology {
            description: "Applicability scores from assistant conversations".into(),
            data_sources: vec!["Copilot conversations".into(), "O*NET".into()],
            risk_score_definition: "Share of work activities an assistant can perform".into(),
            limitations: vec![],
        },
        occupations,
        tables: vec![
            table(
                "table_1",
                "Top occupations by AI applicability",
                TableShape::TopOccupations,
                &["Occupation", "SOC Code", "Score"],
                top_rows,
            ),
            table(
                "table_2",
                "Occupation group summary",
                TableShape::OccupationGroup,
                &["Occupation group", "Exposure"],
                vec![
                    cells(&["Computer and Mathematical", "0.82"]),
                    cells(&["Office and Administrative Support", "0.70"]),
                ],
            ),
            table(
                "table_3",
                "Industry exposure",
                TableShape::Opaque,
                &["Industry", "Exposure"],
                vec![
                    cells(&["Information", "0.45"]),
                    cells(&["Finance", "0.41"]),
                    cells(&["Retail", "0.30"]),
                ],
            ),
        ],
        cross_references: vec![],
        visualizations: vec![VisualizationConfig::TopOccupations {
            title: "Most exposed occupations".into(),
            limit: 10,
        }],
        extraction_info: ExtractionInfo {
            extraction_date: date,
            run_id: uuid::Uuid::nil(),
            quality_score: 90.0,
            source_confidence: 0.95,
            source_sha256: None,
            normalization_issues: vec![],
            manual_review_required: false,
        },
    }
}
