//! Domain cache for the query service.

use std::time::Duration;

use riskbase_shared::{
    IndustryExposure, OccupationRecord, OccupationRisk, Result, RiskbaseError, SearchResult,
    TableRecord, TaskAutomation, VisualizationConfig,
};

use crate::{CacheManager, CacheStats, DEFAULT_CAPACITY, DEFAULT_TTL};

const MINUTE: Duration = Duration::from_secs(60);

/// Query families, each with its own key prefix and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Risk,
    Search,
    Visualization,
    Table,
    Aggregate,
}

impl QueryKind {
    pub const ALL: [QueryKind; 5] = [
        Self::Risk,
        Self::Search,
        Self::Visualization,
        Self::Table,
        Self::Aggregate,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Risk => "risk:",
            Self::Search => "search:",
            Self::Visualization => "viz:",
            Self::Table => "table:",
            Self::Aggregate => "agg:",
        }
    }

    pub fn ttl(self) -> Duration {
        match self {
            Self::Risk => 10 * MINUTE,
            Self::Search => 5 * MINUTE,
            Self::Visualization => 15 * MINUTE,
            Self::Table | Self::Aggregate => 30 * MINUTE,
        }
    }

    pub fn key(self, suffix: &str) -> String {
        format!("{}{suffix}", self.prefix())
    }
}

/// Every value type the query service caches.
#[derive(Debug, Clone)]
pub enum CachedQuery {
    Risk(OccupationRisk),
    Search(Vec<SearchResult>),
    Occupations(Vec<OccupationRecord>),
    Visualization(VisualizationConfig),
    Table(TableRecord),
    Industry(Vec<IndustryExposure>),
    Tasks(Vec<TaskAutomation>),
}

/// Conversion between a query result and its cached form.
pub trait CacheValue: Clone + Sized {
    fn into_cached(self) -> CachedQuery;
    fn from_cached(cached: CachedQuery) -> Option<Self>;
}

macro_rules! cache_value {
    ($ty:ty, $variant:ident) => {
        impl CacheValue for $ty {
            fn into_cached(self) -> CachedQuery {
                CachedQuery::$variant(self)
            }

            fn from_cached(cached: CachedQuery) -> Option<Self> {
                match cached {
                    CachedQuery::$variant(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}

cache_value!(OccupationRisk, Risk);
cache_value!(Vec<SearchResult>, Search);
cache_value!(Vec<OccupationRecord>, Occupations);
cache_value!(VisualizationConfig, Visualization);
cache_value!(TableRecord, Table);
cache_value!(Vec<IndustryExposure>, Industry);
cache_value!(Vec<TaskAutomation>, Tasks);

/// Prefixed, per-kind-TTL view over a [`CacheManager`].
pub struct QueryCache {
    inner: CacheManager<CachedQuery>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: CacheManager::new(capacity, DEFAULT_TTL),
        }
    }

    /// Cached result for `kind` + `suffix`, computing it on a miss.
    pub fn get_or_try_compute<V: CacheValue>(
        &self,
        kind: QueryKind,
        suffix: &str,
        compute: impl FnOnce() -> Result<V>,
    ) -> Result<V> {
        let key = kind.key(suffix);
        let cached = self
            .inner
            .get_or_try_compute(&key, Some(kind.ttl()), || compute().map(V::into_cached))?;
        V::from_cached(cached)
            .ok_or_else(|| RiskbaseError::Cache(format!("unexpected value type under {key}")))
    }

    /// Drop every entry of every kind, keeping the counters.
    pub fn invalidate_all(&self) -> Result<usize> {
        let mut removed = 0;
        for kind in QueryKind::ALL {
            removed += self.inner.invalidate_prefix(kind.prefix())?;
        }
        Ok(removed)
    }

    pub fn invalidate(&self, kind: QueryKind) -> Result<usize> {
        self.inner.invalidate_prefix(kind.prefix())
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    pub fn stats(&self) -> Result<CacheStats> {
        self.inner.stats()
    }
}
