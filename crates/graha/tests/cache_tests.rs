mod common;

use async_trait::async_trait;
use common::*;
use graha_core::cache::{CacheKey, CacheStoreError, MemoryStore, RemoteCache, ResultCache};
use graha_core::chart::{normalize, ChartConfig, FactSet};
use graha_core::ephemeris::CelestialBody;
use graha_core::rules::{MatchResult, RuleEngine};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct BrokenStore {
    reads: AtomicU32,
    writes: AtomicU32,
}

#[async_trait]
impl RemoteCache for BrokenStore {
    async fn get(&self, _key: &CacheKey) -> Result<Option<Vec<MatchResult>>, CacheStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(CacheStoreError::Unavailable { message: "connection refused".to_string() })
    }

    async fn put(&self, _key: &CacheKey, _results: &[MatchResult]) -> Result<(), CacheStoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(CacheStoreError::Unavailable { message: "connection refused".to_string() })
    }
}

/// Shared store whose reads stall, keeping an evaluation in flight.
struct SlowStore {
    delay: Duration,
}

#[async_trait]
impl RemoteCache for SlowStore {
    async fn get(&self, _key: &CacheKey) -> Result<Option<Vec<MatchResult>>, CacheStoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn put(&self, _key: &CacheKey, _results: &[MatchResult]) -> Result<(), CacheStoreError> {
        Ok(())
    }
}

/// The sample chart with the Moon moved, giving a distinct digest.
fn facts_with_moon(longitude: f64) -> Arc<FactSet> {
    let positions: Vec<_> = sample_positions()
        .into_iter()
        .map(|mut position| {
            if position.body == CelestialBody::Moon {
                position.longitude = longitude;
            }
            position
        })
        .collect();
    Arc::new(normalize(&positions, LIBRA_ASCENDANT, None, &ChartConfig::default()).unwrap())
}

#[tokio::test]
async fn test_cold_then_warm() {
    let cache = ResultCache::new();
    let facts = Arc::new(sample_facts());
    let catalog = Arc::new(load_catalog(SAMPLE_CATALOG));

    let cold = cache.get_or_compute(facts.clone(), catalog.clone()).await.unwrap();
    let direct = RuleEngine::new().evaluate(&facts, &catalog).unwrap();
    assert_eq!(*cold, direct);
    assert_eq!(cache.evaluation_count(), 1);

    let warm = cache.get_or_compute(facts.clone(), catalog.clone()).await.unwrap();
    assert!(Arc::ptr_eq(&cold, &warm));
    assert_eq!(cache.evaluation_count(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_evaluation() {
    let cache = ResultCache::new();
    let facts = Arc::new(sample_facts());
    let catalog = Arc::new(load_catalog(SAMPLE_CATALOG));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let cache = cache.clone();
        let facts = facts.clone();
        let catalog = catalog.clone();
        handles.push(tokio::spawn(async move { cache.get_or_compute(facts, catalog).await }));
    }

    let mut outputs = Vec::new();
    for handle in handles {
        outputs.push(handle.await.unwrap().unwrap());
    }
    assert_eq!(cache.evaluation_count(), 1);
    for output in &outputs {
        assert_eq!(**output, *outputs[0]);
    }
}

#[tokio::test]
async fn test_catalog_version_invalidation() {
    let cache = ResultCache::new();
    let facts = Arc::new(sample_facts());
    let catalog = Arc::new(load_catalog(SAMPLE_CATALOG));
    cache.get_or_compute(facts.clone(), catalog.clone()).await.unwrap();

    assert_eq!(cache.invalidate_catalog_version("other-version"), 0);
    assert_eq!(cache.invalidate_catalog_version(catalog.version()), 1);
    assert!(cache.is_empty());

    cache.get_or_compute(facts, catalog).await.unwrap();
    assert_eq!(cache.evaluation_count(), 2);
}

#[tokio::test]
async fn test_put_overwrites_entry() {
    let cache = ResultCache::new();
    let facts = Arc::new(sample_facts());
    let catalog = Arc::new(load_catalog(SAMPLE_CATALOG));
    let key = ResultCache::key_for(&facts, &catalog);

    cache.get_or_compute(facts.clone(), catalog.clone()).await.unwrap();
    cache.put(key.clone(), Arc::new(Vec::new())).await;

    let served = cache.get_or_compute(facts, catalog).await.unwrap();
    assert!(served.is_empty());
    assert!(cache.invalidate(&key));
    assert!(!cache.invalidate(&key));
}

#[tokio::test]
async fn test_remote_errors_degrade_to_local() {
    let store = Arc::new(BrokenStore {
        reads: AtomicU32::new(0),
        writes: AtomicU32::new(0),
    });
    let cache = ResultCache::with_remote(store.clone());
    let facts = Arc::new(sample_facts());
    let catalog = Arc::new(load_catalog(SAMPLE_CATALOG));

    let results = cache.get_or_compute(facts, catalog).await.unwrap();
    assert_eq!(results.len(), 9);
    assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    assert_eq!(cache.evaluation_count(), 1);
}

#[tokio::test]
async fn test_shared_store_serves_second_process() {
    let store = Arc::new(MemoryStore::new());
    let facts = Arc::new(sample_facts());
    let catalog = Arc::new(load_catalog(SAMPLE_CATALOG));

    let first = ResultCache::with_remote(store.clone());
    let computed = first.get_or_compute(facts.clone(), catalog.clone()).await.unwrap();
    assert_eq!(store.len(), 1);

    let second = ResultCache::with_remote(store.clone());
    let served = second.get_or_compute(facts, catalog).await.unwrap();
    assert_eq!(*served, *computed);
    assert_eq!(second.evaluation_count(), 0);
}

#[tokio::test]
async fn test_failed_evaluation_is_not_stored() {
    let config = ChartConfig {
        bodies: vec![CelestialBody::Sun, CelestialBody::Moon],
        ..ChartConfig::default()
    };
    let facts = Arc::new(normalize(&sample_positions(), LIBRA_ASCENDANT, None, &config).unwrap());
    let catalog = Arc::new(load_catalog(SAMPLE_CATALOG));
    let cache = ResultCache::new();

    assert!(cache.get_or_compute(facts.clone(), catalog.clone()).await.is_err());
    assert!(cache.is_empty());
    assert!(cache.get_or_compute(facts, catalog).await.is_err());
    assert_eq!(cache.evaluation_count(), 2);
}

#[tokio::test]
async fn test_invalidation_during_evaluation_discards_result() {
    let cache = ResultCache::with_remote(Arc::new(SlowStore {
        delay: Duration::from_millis(100),
    }));
    let facts = Arc::new(sample_facts());
    let catalog = Arc::new(load_catalog(SAMPLE_CATALOG));

    let pending = {
        let cache = cache.clone();
        let facts = facts.clone();
        let catalog = catalog.clone();
        tokio::spawn(async move { cache.get_or_compute(facts, catalog).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(cache.invalidate_catalog_version(catalog.version()), 0);

    // the caller is still answered, but the retired version is not stored
    let results = pending.await.unwrap().unwrap();
    assert_eq!(results.len(), 9);
    assert!(cache.is_empty());

    cache.get_or_compute(facts, catalog).await.unwrap();
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_clear_during_evaluation_discards_result() {
    let cache = ResultCache::with_remote(Arc::new(SlowStore {
        delay: Duration::from_millis(100),
    }));
    let pending = {
        let cache = cache.clone();
        tokio::spawn(async move {
            let catalog = Arc::new(load_catalog(SAMPLE_CATALOG));
            cache.get_or_compute(Arc::new(sample_facts()), catalog).await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    cache.clear();

    assert!(pending.await.unwrap().is_ok());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_capacity_evicts_oldest_entries() {
    let cache = ResultCache::with_capacity(3);
    let catalog = Arc::new(load_catalog(SAMPLE_CATALOG));
    let charts: Vec<Arc<FactSet>> = (0..5).map(|i| facts_with_moon(40.0 + i as f64)).collect();
    let keys: Vec<CacheKey> = charts
        .iter()
        .map(|facts| ResultCache::key_for(facts, &catalog))
        .collect();

    for facts in &charts {
        cache.get_or_compute(facts.clone(), catalog.clone()).await.unwrap();
    }
    assert_eq!(cache.capacity(), 3);
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.eviction_count(), 2);
    assert!(cache.get(&keys[0]).is_none());
    assert!(cache.get(&keys[1]).is_none());
    assert!(cache.get(&keys[4]).is_some());

    // rewriting an entry makes it the newest
    cache.put(keys[2].clone(), Arc::new(Vec::new())).await;
    cache.get_or_compute(charts[0].clone(), catalog.clone()).await.unwrap();
    assert_eq!(cache.len(), 3);
    assert!(cache.get(&keys[2]).is_some());
    assert!(cache.get(&keys[3]).is_none());
}

#[tokio::test]
async fn test_many_instants_stay_within_capacity() {
    let cache = ResultCache::with_capacity(16);
    let catalog = Arc::new(load_catalog(SAMPLE_CATALOG));
    for minute in 0..100 {
        // the Moon moves about half a degree an hour
        let facts = facts_with_moon(40.0 + minute as f64 * 0.009);
        cache.get_or_compute(facts, catalog.clone()).await.unwrap();
    }
    assert_eq!(cache.len(), 16);
    assert_eq!(cache.evaluation_count(), 100);
    assert_eq!(cache.eviction_count(), 84);
}
