//! Lookup structures built once per loaded knowledge base.

use std::collections::HashMap;

use riskbase_shared::{KnowledgeBase, OccupationRecord, Result, RiskbaseError};

/// A knowledge base plus its code and name maps.
#[derive(Debug)]
pub(crate) struct KnowledgeIndex {
    kb: KnowledgeBase,
    by_code: HashMap<String, usize>,
    /// Keyed by lowercased name.
    by_name: HashMap<String, usize>,
}

impl KnowledgeIndex {
    pub(crate) fn build(kb: KnowledgeBase) -> Self {
        let mut by_code = HashMap::with_capacity(kb.occupations.len());
        let mut by_name = HashMap::with_capacity(kb.occupations.len());
        for (i, occ) in kb.occupations.iter().enumerate() {
            if !occ.code.is_empty() {
                by_code.entry(occ.code.clone()).or_insert(i);
            }
            by_name.entry(occ.name.to_lowercase()).or_insert(i);
        }
        Self { kb, by_code, by_name }
    }

    pub(crate) fn kb(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub(crate) fn occupations(&self) -> &[OccupationRecord] {
        &self.kb.occupations
    }

    /// Resolve an identifier to an occupation index.
    ///
    /// Tries, in order: exact SOC code, exact name (case-insensitive), name
    /// substring (case-insensitive, highest riskScore wins).
    pub(crate) fn resolve(&self, id: &str) -> Result<usize> {
        let id = id.trim();
        if id.is_empty() {
            return Err(RiskbaseError::not_found("empty occupation identifier"));
        }
        if let Some(&i) = self.by_code.get(id) {
            return Ok(i);
        }
        let lower = id.to_lowercase();
        if let Some(&i) = self.by_name.get(&lower) {
            return Ok(i);
        }

        let mut best: Option<usize> = None;
        for (i, occ) in self.kb.occupations.iter().enumerate() {
            if !occ.name.to_lowercase().contains(&lower) {
                continue;
            }
            let better = match best {
                Some(b) => occ.risk_score > self.kb.occupations[b].risk_score,
                None => true,
            };
            if better {
                best = Some(i);
            }
        }
        best.ok_or_else(|| RiskbaseError::not_found(format!("occupation '{id}'")))
    }
}
