//! Read-side API over a loaded knowledge base.
//!
//! [`QueryService`] starts uninitialized; [`QueryService::initialize`] builds
//! the lookup index and swaps it in. Every read goes through a
//! [`QueryCache`] and none performs I/O.

mod aggregates;
mod index;
mod risk;
mod search;

#[cfg(test)]
pub(crate) mod fixtures;

use riskbase_cache::{CacheStats, QueryCache, QueryKind};
use riskbase_shared::{
    AppConfig, ErrorHandler, IndustryExposure, KnowledgeBase, OccupationRecord, OccupationRisk,
    Result, RiskbaseError, SearchFilters, SearchResult, TableRecord, TaskAutomation,
    VisualizationConfig, VisualizationKind,
};
use tracing::{debug, info, instrument};

use crate::index::KnowledgeIndex;

/// Query tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySettings {
    pub cache_capacity: usize,
    /// Maximum score distance for similar occupations.
    pub similarity_band: f64,
    /// Maximum number of similar occupations returned.
    pub similar_limit: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for QuerySettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            cache_capacity: config.query.cache_capacity,
            similarity_band: config.query.similarity_band,
            similar_limit: config.query.similar_limit,
        }
    }
}

/// Query API over one knowledge base.
pub struct QueryService {
    index: Option<KnowledgeIndex>,
    cache: QueryCache,
    settings: QuerySettings,
    handler: ErrorHandler,
}

impl Default for QueryService {
    fn default() -> Self {
        Self::new(QuerySettings::default())
    }
}

impl QueryService {
    pub fn new(settings: QuerySettings) -> Self {
        Self {
            index: None,
            cache: QueryCache::new(settings.cache_capacity),
            settings,
            handler: ErrorHandler::default(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            handler: ErrorHandler::from(&config.retry),
            ..Self::new(QuerySettings::from(config))
        }
    }

    /// Load `kb`, replacing any previously loaded knowledge base and
    /// invalidating every cached result.
    #[instrument(skip_all, fields(occupations = kb.occupations.len(), tables = kb.tables.len()))]
    pub fn initialize(&mut self, kb: KnowledgeBase) -> Result<()> {
        let index = KnowledgeIndex::build(kb);
        self.index = Some(index);
        let invalidated = self.cache.invalidate_all()?;
        info!(invalidated, "query service initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.index.is_some()
    }

    fn index(&self) -> Result<&KnowledgeIndex> {
        self.index.as_ref().ok_or(RiskbaseError::ServiceNotInitialized)
    }

    /// The loaded knowledge base.
    pub fn knowledge_base(&self) -> Result<&KnowledgeBase> {
        Ok(self.index()?.kb())
    }

    /// Risk view for an occupation given by SOC code, exact name or name fragment.
    pub fn get_occupation_risk(&self, id: &str) -> Result<OccupationRisk> {
        let index = self.index()?;
        let key = id.trim().to_lowercase();
        self.cache.get_or_try_compute(QueryKind::Risk, &key, || {
            let target = index.resolve(id)?;
            Ok(risk::risk_view(
                index.occupations(),
                target,
                self.settings.similarity_band,
                self.settings.similar_limit,
            ))
        })
    }

    /// Like [`get_occupation_risk`](Self::get_occupation_risk) but never fails:
    /// on error a view flagged `degraded` is returned instead.
    pub fn get_occupation_risk_with_fallback(&self, id: &str) -> OccupationRisk {
        self.risk_with_fallback(id, || self.get_occupation_risk(id))
    }

    fn risk_with_fallback(
        &self,
        id: &str,
        primary: impl FnOnce() -> Result<OccupationRisk>,
    ) -> OccupationRisk {
        self.handler.with_fallback(primary, |_| {
            let occupation = self
                .index
                .as_ref()
                .and_then(|index| {
                    let target = index.resolve(id).ok()?;
                    index.occupations().get(target).cloned()
                })
                .unwrap_or_else(|| placeholder(id));
            risk::degraded_view(occupation)
        })
    }

    /// Occupations matching `query`, best first.
    pub fn search_occupations(&self, query: &str, filters: &SearchFilters) -> Result<Vec<SearchResult>> {
        let index = self.index()?;
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let key = format!(
            "{}|{:?}|{:?}|{:?}",
            query.trim().to_lowercase(),
            filters.min_risk_score,
            filters.max_risk_score,
            filters.limit
        );
        self.cache.get_or_try_compute(QueryKind::Search, &key, || {
            let results = search::search(index.occupations(), query, filters);
            debug!(query, results = results.len(), "search");
            Ok(results)
        })
    }

    /// Risk views for several occupations; fails on the first unknown id.
    pub fn compare_occupations(&self, ids: &[&str]) -> Result<Vec<OccupationRisk>> {
        ids.iter().map(|id| self.get_occupation_risk(id)).collect()
    }

    /// The `n` highest-scoring occupations, descending.
    pub fn get_top_risk_occupations(&self, n: usize) -> Result<Vec<OccupationRecord>> {
        let index = self.index()?;
        self.cache.get_or_try_compute(QueryKind::Aggregate, &format!("top:{n}"), || {
            let mut occupations = index.occupations().to_vec();
            occupations.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
            occupations.truncate(n);
            Ok(occupations)
        })
    }

    /// Exposure by industry, highest first.
    pub fn get_industry_data(&self) -> Result<Vec<IndustryExposure>> {
        let index = self.index()?;
        self.cache
            .get_or_try_compute(QueryKind::Aggregate, "industry", || {
                Ok(aggregates::industry_exposure(index.kb()))
            })
    }

    /// Key tasks with their mean occupation score, highest first.
    pub fn get_task_automation_data(&self) -> Result<Vec<TaskAutomation>> {
        let index = self.index()?;
        self.cache.get_or_try_compute(QueryKind::Aggregate, "tasks", || {
            Ok(aggregates::task_automation(index.occupations()))
        })
    }

    pub fn get_table_data(&self, id: &str) -> Result<TableRecord> {
        let index = self.index()?;
        self.cache.get_or_try_compute(QueryKind::Table, id, || {
            index
                .kb()
                .table(id)
                .cloned()
                .ok_or_else(|| RiskbaseError::not_found(format!("table '{id}'")))
        })
    }

    pub fn get_visualization_config(&self, kind: VisualizationKind) -> Result<VisualizationConfig> {
        let index = self.index()?;
        self.cache
            .get_or_try_compute(QueryKind::Visualization, kind.as_str(), || {
                index
                    .kb()
                    .visualizations
                    .iter()
                    .find(|v| v.kind() == kind)
                    .cloned()
                    .ok_or_else(|| RiskbaseError::not_found(format!("visualization '{kind}'")))
            })
    }

    pub fn get_cache_stats(&self) -> Result<CacheStats> {
        self.cache.stats()
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear()
    }
}

/// Record standing in for an occupation that could not be resolved.
fn placeholder(id: &str) -> OccupationRecord {
    let id = id.trim();
    OccupationRecord {
        code: if riskbase_normalize::is_soc_code(id) {
            id.to_string()
        } else {
            String::new()
        },
        name: id.to_string(),
        risk_score: 0.0,
        key_tasks: Vec::new(),
        table_references: Default::default(),
        confidence: 0.0,
    }
}
