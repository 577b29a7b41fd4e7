//! Risk views: level, percentile and similar occupations.

use riskbase_shared::{OccupationRecord, OccupationRisk, RiskLevel};

/// Percentile used when the real one cannot be computed.
pub(crate) const DEGRADED_PERCENTILE: f64 = 50.0;

/// Tolerance for the similarity band comparison.
const EPSILON: f64 = 1e-9;

/// Share of the other occupations with a strictly lower score, × 100.
/// A lone occupation sits at the 100th percentile.
pub(crate) fn percentile(occupations: &[OccupationRecord], target: usize) -> f64 {
    let others = occupations.len().saturating_sub(1);
    if others == 0 {
        return 100.0;
    }
    let score = occupations[target].risk_score;
    let lower = occupations
        .iter()
        .enumerate()
        .filter(|(i, o)| *i != target && o.risk_score < score)
        .count();
    lower as f64 / others as f64 * 100.0
}

/// Other occupations within `band` of the target's score, closest first,
/// ties by name, at most `limit`.
pub(crate) fn similar(
    occupations: &[OccupationRecord],
    target: usize,
    band: f64,
    limit: usize,
) -> Vec<OccupationRecord> {
    let score = occupations[target].risk_score;
    let mut candidates: Vec<(f64, &OccupationRecord)> = occupations
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != target)
        .map(|(_, o)| ((o.risk_score - score).abs(), o))
        .filter(|(distance, _)| *distance <= band + EPSILON)
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));
    candidates
        .into_iter()
        .take(limit)
        .map(|(_, o)| o.clone())
        .collect()
}

/// Full risk view of `occupations[target]`.
pub(crate) fn risk_view(
    occupations: &[OccupationRecord],
    target: usize,
    band: f64,
    limit: usize,
) -> OccupationRisk {
    let occupation = occupations[target].clone();
    OccupationRisk {
        risk_level: RiskLevel::from_score(occupation.risk_score),
        percentile: percentile(occupations, target),
        similar_occupations: similar(occupations, target, band, limit),
        occupation,
        degraded: false,
    }
}

/// Placeholder view returned when the real computation failed.
pub(crate) fn degraded_view(occupation: OccupationRecord) -> OccupationRisk {
    OccupationRisk {
        risk_level: RiskLevel::from_score(occupation.risk_score),
        percentile: DEGRADED_PERCENTILE,
        similar_occupations: Vec::new(),
        occupation,
        degraded: true,
    }
}
