//! Query facade: provider, normalizer, cache and the live catalog.

use crate::cache::{CacheKey, ResultCache};
use crate::chart::{normalize, ChartConfig, DashaFacts, FactSet};
use crate::ephemeris::{
    fetch_with_retry, GeoLocation, PositionProvider, PositionRequest, RawPosition, RetryPolicy,
};
use crate::error::{EngineError, InputError};
use crate::rules::{
    overall_band, score_bands, score_life_areas, LifeArea, MatchResult, RuleCatalog, RuleEngine,
    ScoreBand, DEFAULT_SCORE_SCALE,
};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Holder of the live catalog; replaced wholesale on hot-swap.
pub struct CatalogHandle {
    current: RwLock<Arc<RuleCatalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: Arc<RuleCatalog>) -> Self {
        Self {
            current: RwLock::new(catalog),
        }
    }

    pub fn current(&self) -> Arc<RuleCatalog> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Install `next` and return the catalog it replaced.
    pub fn swap(&self, next: Arc<RuleCatalog>) -> Arc<RuleCatalog> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, next)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartQuery {
    pub timestamp: DateTime<Utc>,
    pub location: GeoLocation,
    /// Overrides the provider's ascendant when set.
    #[serde(default)]
    pub ascendant: Option<f64>,
    /// Pin the answer to a catalog version; rejected if it is not the live one.
    #[serde(default)]
    pub catalog_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub timestamp: DateTime<Utc>,
    pub fact_digest: String,
    pub catalog_version: String,
    pub results: Arc<Vec<MatchResult>>,
    pub life_areas: BTreeMap<LifeArea, f64>,
    pub bands: BTreeMap<LifeArea, ScoreBand>,
    pub overall: ScoreBand,
    pub dasha: Option<DashaFacts>,
}

pub struct HoroscopeService {
    chart: ChartConfig,
    provider: Arc<dyn PositionProvider>,
    retry: RetryPolicy,
    catalog: CatalogHandle,
    cache: ResultCache,
    score_scale: f64,
}

impl HoroscopeService {
    pub fn new(
        provider: Arc<dyn PositionProvider>,
        catalog: Arc<RuleCatalog>,
        chart: ChartConfig,
    ) -> Self {
        Self {
            chart,
            provider,
            retry: RetryPolicy::default(),
            catalog: CatalogHandle::new(catalog),
            cache: ResultCache::new(),
            score_scale: DEFAULT_SCORE_SCALE,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_score_scale(mut self, scale: f64) -> Self {
        self.score_scale = scale;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn chart_config(&self) -> &ChartConfig {
        &self.chart
    }

    pub fn catalog(&self) -> Arc<RuleCatalog> {
        self.catalog.current()
    }

    /// Replace the live catalog and drop cache entries of the old version.
    pub fn swap_catalog(&self, next: Arc<RuleCatalog>) -> Arc<RuleCatalog> {
        let next_version = next.version().to_string();
        let previous = self.catalog.swap(next);
        let dropped = self.cache.invalidate_catalog_version(previous.version());
        info!(
            "Swapped rule catalog {} -> {} ({} cache entries dropped)",
            previous.version(),
            next_version,
            dropped
        );
        previous
    }

    /// Answer a chart query, reading through the cache.
    pub async fn query(&self, query: &ChartQuery) -> Result<QueryResponse, EngineError> {
        let catalog = self.catalog_for(query)?;
        let facts = self.chart_facts(query).await?;
        let results = self
            .cache
            .get_or_compute(Arc::clone(&facts), Arc::clone(&catalog))
            .await?;
        self.forget_if_swapped(&ResultCache::key_for(&facts, &catalog));
        Ok(self.respond(&facts, &catalog, results))
    }

    /// Recompute a chart query and overwrite its cache entry.
    pub async fn refresh_query(&self, query: &ChartQuery) -> Result<QueryResponse, EngineError> {
        let catalog = self.catalog_for(query)?;
        let facts = self.chart_facts(query).await?;
        let results = Arc::new(RuleEngine::new().evaluate(&facts, &catalog)?);
        let key = CacheKey::new(facts.digest(), catalog.version());
        self.cache.put(key.clone(), Arc::clone(&results)).await;
        self.forget_if_swapped(&key);
        Ok(self.respond(&facts, &catalog, results))
    }

    /// Evaluate positions already in hand, reading through the cache.
    pub async fn evaluate_positions(
        &self,
        positions: &[RawPosition],
        ascendant: f64,
        location: Option<GeoLocation>,
    ) -> Result<QueryResponse, EngineError> {
        let catalog = self.catalog.current();
        let facts = Arc::new(normalize(positions, ascendant, location, &self.chart)?);
        let results = self
            .cache
            .get_or_compute(Arc::clone(&facts), Arc::clone(&catalog))
            .await?;
        self.forget_if_swapped(&ResultCache::key_for(&facts, &catalog));
        Ok(self.respond(&facts, &catalog, results))
    }

    /// Drop `key` if its catalog was swapped out while it was being answered.
    ///
    /// `swap_catalog` installs the new catalog before invalidating the old
    /// version, so an entry stored after that invalidation is caught here.
    fn forget_if_swapped(&self, key: &CacheKey) {
        if self.catalog.current().version() != key.catalog_version {
            self.cache.invalidate(key);
        }
    }

    fn catalog_for(&self, query: &ChartQuery) -> Result<Arc<RuleCatalog>, InputError> {
        let catalog = self.catalog.current();
        match &query.catalog_version {
            Some(requested) if requested != catalog.version() => {
                Err(InputError::UnknownCatalogVersion {
                    requested: requested.clone(),
                    loaded: catalog.version().to_string(),
                })
            }
            _ => Ok(catalog),
        }
    }

    async fn chart_facts(&self, query: &ChartQuery) -> Result<Arc<FactSet>, EngineError> {
        if !query.location.is_valid() {
            return Err(InputError::InvalidLocation {
                lat: query.location.lat,
                lon: query.location.lon,
            }
            .into());
        }

        let request = PositionRequest {
            timestamp: query.timestamp,
            location: query.location,
            bodies: self.chart.bodies.clone(),
        };
        let chart = fetch_with_retry(self.provider.as_ref(), &request, &self.retry).await?;
        let ascendant = query
            .ascendant
            .or(chart.ascendant)
            .ok_or(InputError::MissingAscendant)?;

        let facts = normalize(&chart.positions, ascendant, Some(query.location), &self.chart)?;
        debug!("Normalized chart at {} into {}", query.timestamp, facts.digest());
        Ok(Arc::new(facts))
    }

    fn respond(
        &self,
        facts: &FactSet,
        catalog: &RuleCatalog,
        results: Arc<Vec<MatchResult>>,
    ) -> QueryResponse {
        let life_areas = score_life_areas(&results, catalog, self.score_scale);
        QueryResponse {
            timestamp: facts.timestamp(),
            fact_digest: facts.digest(),
            catalog_version: catalog.version().to_string(),
            bands: score_bands(&life_areas),
            overall: overall_band(&life_areas),
            dasha: facts.dasha(),
            life_areas,
            results,
        }
    }
}
