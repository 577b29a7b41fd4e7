//! Weighted occupation search.

use riskbase_shared::{MatchReason, OccupationRecord, SearchFilters, SearchResult};

/// Match reasons for one occupation against a lowercased, trimmed query.
fn match_reasons(occ: &OccupationRecord, query: &str) -> Vec<MatchReason> {
    let mut reasons = Vec::new();
    if occ.code.to_lowercase() == query {
        reasons.push(MatchReason::ExactCode);
    }
    let name = occ.name.to_lowercase();
    if name == query {
        reasons.push(MatchReason::ExactName);
    } else if name.contains(query) {
        reasons.push(MatchReason::NameContains);
    }
    if occ.key_tasks.iter().any(|t| t.to_lowercase().contains(query)) {
        reasons.push(MatchReason::TaskContains);
    }
    reasons
}

fn passes(occ: &OccupationRecord, filters: &SearchFilters) -> bool {
    filters.min_risk_score.is_none_or(|min| occ.risk_score >= min)
        && filters.max_risk_score.is_none_or(|max| occ.risk_score <= max)
}

/// Search `occupations`, best matches first. Equal scores keep input order.
pub(crate) fn search(
    occupations: &[OccupationRecord],
    query: &str,
    filters: &SearchFilters,
) -> Vec<SearchResult> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<SearchResult> = occupations
        .iter()
        .filter(|occ| passes(occ, filters))
        .filter_map(|occ| {
            let match_reasons = match_reasons(occ, &query);
            if match_reasons.is_empty() {
                return None;
            }
            Some(SearchResult {
                occupation: occ.clone(),
                match_score: match_reasons.iter().map(|r| r.weight()).sum(),
                match_reasons,
            })
        })
        .collect();

    results.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    if let Some(limit) = filters.limit {
        results.truncate(limit);
    }
    results
}
