use crate::cache::store::{CacheEntry, CacheKey, RemoteCache};
use crate::chart::FactSet;
use crate::error::EngineError;
use crate::rules::{MatchResult, RuleCatalog, RuleEngine};
use chrono::Utc;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::watch;

type Outcome = Result<Arc<Vec<MatchResult>>, EngineError>;

/// Entries kept when no capacity is configured.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Read-through memo of (fact digest, catalog version) to ordered results.
///
/// At most one evaluation per key runs at a time; concurrent callers for the
/// same key wait on it and receive the same value. Evaluations run on a
/// detached task and finish even when every caller has gone away.
///
/// The cache holds at most `capacity` entries. Storing past the bound evicts
/// the entries stored longest ago.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<Inner>,
}

struct Inner {
    entries: RwLock<Entries>,
    inflight: Mutex<HashMap<CacheKey, watch::Receiver<Option<Outcome>>>>,
    remote: Option<Arc<dyn RemoteCache>>,
    capacity: usize,
    evaluations: AtomicU64,
    evictions: AtomicU64,
    engine: RuleEngine,
}

struct Slot {
    seq: u64,
    entry: CacheEntry,
}

/// Invalidation state an evaluation started under. A result is only stored
/// if nothing invalidated its catalog version in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Generation {
    cleared: u64,
    version: u64,
}

#[derive(Default)]
struct Entries {
    map: HashMap<CacheKey, Slot>,
    /// Store sequence to key, oldest first.
    order: BTreeMap<u64, CacheKey>,
    next_seq: u64,
    /// Bumped each time a catalog version is invalidated.
    epochs: HashMap<String, u64>,
    /// Bumped by `clear`, which invalidates every version.
    cleared: u64,
}

impl Entries {
    fn generation(&self, version: &str) -> Generation {
        Generation {
            cleared: self.cleared,
            version: self.epochs.get(version).copied().unwrap_or(0),
        }
    }

    /// Insert or replace, then evict oldest entries down to `capacity`.
    /// Returns the number evicted.
    fn insert(&mut self, key: CacheKey, entry: CacheEntry, capacity: usize) -> usize {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(previous) = self.map.insert(key.clone(), Slot { seq, entry }) {
            self.order.remove(&previous.seq);
        }
        self.order.insert(seq, key);

        let mut evicted = 0;
        while self.map.len() > capacity {
            match self.order.pop_first() {
                Some((_, oldest)) => {
                    self.map.remove(&oldest);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }

    fn remove(&mut self, key: &CacheKey) -> bool {
        match self.map.remove(key) {
            Some(slot) => {
                self.order.remove(&slot.seq);
                true
            }
            None => false,
        }
    }
}

impl ResultCache {
    pub fn new() -> Self {
        Self::build(None, DEFAULT_CACHE_CAPACITY)
    }

    /// Cache holding at most `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(None, capacity)
    }

    /// Cache backed by a shared store in addition to local memory.
    pub fn with_remote(remote: Arc<dyn RemoteCache>) -> Self {
        Self::build(Some(remote), DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_remote_and_capacity(remote: Arc<dyn RemoteCache>, capacity: usize) -> Self {
        Self::build(Some(remote), capacity)
    }

    fn build(remote: Option<Arc<dyn RemoteCache>>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(Entries::default()),
                inflight: Mutex::new(HashMap::new()),
                remote,
                capacity: capacity.max(1),
                evaluations: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
                engine: RuleEngine::new(),
            }),
        }
    }

    pub fn key_for(facts: &FactSet, catalog: &RuleCatalog) -> CacheKey {
        CacheKey::new(facts.digest(), catalog.version())
    }

    /// Stored results for the key, evaluating them on a miss.
    pub async fn get_or_compute(
        &self,
        facts: Arc<FactSet>,
        catalog: Arc<RuleCatalog>,
    ) -> Result<Arc<Vec<MatchResult>>, EngineError> {
        let key = Self::key_for(&facts, &catalog);
        if let Some(entry) = self.get(&key) {
            return Ok(entry.results);
        }

        let mut receiver = {
            let mut inflight = self.inner.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            // an evaluation may have landed between the first check and the lock
            if let Some(entry) = self.get(&key) {
                return Ok(entry.results);
            }
            match inflight.get(&key) {
                Some(receiver) => {
                    debug!("Joining in-flight evaluation for {}", key);
                    receiver.clone()
                }
                None => {
                    let (sender, receiver) = watch::channel(None);
                    inflight.insert(key.clone(), receiver.clone());
                    let generation = self.inner.generation(&key.catalog_version);
                    let inner = Arc::clone(&self.inner);
                    let task_facts = Arc::clone(&facts);
                    let task_catalog = Arc::clone(&catalog);
                    let task_key = key.clone();
                    tokio::spawn(async move {
                        inner
                            .compute(task_key, task_facts, task_catalog, generation, sender)
                            .await;
                    });
                    receiver
                }
            }
        };

        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        match outcome {
            Some(outcome) => outcome,
            None => {
                // the evaluation task died without reporting; answer uncached
                warn!("Evaluation task for {} ended without a result", key);
                self.inner.forget_inflight(&key);
                self.inner.count_evaluation();
                self.inner
                    .engine
                    .evaluate(&facts, &catalog)
                    .map(Arc::new)
                    .map_err(EngineError::from)
            }
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .get(key)
            .map(|slot| slot.entry.clone())
    }

    /// Store `results` under `key`, replacing any previous entry, and write it
    /// through to the shared store.
    pub async fn put(&self, key: CacheKey, results: Arc<Vec<MatchResult>>) -> CacheEntry {
        let entry = self.inner.store(&key, Arc::clone(&results));
        self.inner.write_remote(&key, &results).await;
        entry
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Drop every entry computed under `version`. Returns how many were dropped.
    ///
    /// Evaluations of `version` already in flight still answer their callers
    /// but no longer store their result.
    pub fn invalidate_catalog_version(&self, version: &str) -> usize {
        let mut entries = self.inner.entries.write().unwrap_or_else(PoisonError::into_inner);
        *entries.epochs.entry(version.to_string()).or_insert(0) += 1;
        let before = entries.map.len();
        entries.map.retain(|key, _| key.catalog_version != version);
        entries.order.retain(|_, key| key.catalog_version != version);
        before - entries.map.len()
    }

    pub fn clear(&self) {
        let mut entries = self.inner.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.cleared += 1;
        entries.map.clear();
        entries.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of rule-engine evaluations this cache has run.
    pub fn evaluation_count(&self) -> u64 {
        self.inner.evaluations.load(Ordering::SeqCst)
    }

    /// Number of entries dropped to stay within capacity.
    pub fn eviction_count(&self) -> u64 {
        self.inner.evictions.load(Ordering::SeqCst)
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    async fn compute(
        &self,
        key: CacheKey,
        facts: Arc<FactSet>,
        catalog: Arc<RuleCatalog>,
        generation: Generation,
        sender: watch::Sender<Option<Outcome>>,
    ) {
        let outcome = match self.read_remote(&key).await {
            Some(results) => {
                let results = Arc::new(results);
                self.store_if_current(&key, Arc::clone(&results), generation);
                Ok(results)
            }
            None => {
                self.count_evaluation();
                match self.engine.evaluate(&facts, &catalog) {
                    Ok(results) => {
                        let results = Arc::new(results);
                        if self
                            .store_if_current(&key, Arc::clone(&results), generation)
                            .is_some()
                        {
                            self.write_remote(&key, &results).await;
                        }
                        Ok(results)
                    }
                    Err(err) => Err(EngineError::from(err)),
                }
            }
        };

        // waiters already holding a receiver still see the value after removal
        let _ = sender.send(Some(outcome));
        self.forget_inflight(&key);
    }

    fn count_evaluation(&self) {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
    }

    fn generation(&self, version: &str) -> Generation {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation(version)
    }

    fn store(&self, key: &CacheKey, results: Arc<Vec<MatchResult>>) -> CacheEntry {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        self.insert(&mut entries, key, results)
    }

    /// Store unless the key's catalog version was invalidated after `started`.
    fn store_if_current(
        &self,
        key: &CacheKey,
        results: Arc<Vec<MatchResult>>,
        started: Generation,
    ) -> Option<CacheEntry> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.generation(&key.catalog_version) != started {
            debug!("Discarding result for {}: invalidated while evaluating", key);
            return None;
        }
        Some(self.insert(&mut entries, key, results))
    }

    fn insert(
        &self,
        entries: &mut Entries,
        key: &CacheKey,
        results: Arc<Vec<MatchResult>>,
    ) -> CacheEntry {
        let entry = CacheEntry {
            results,
            computed_at: Utc::now(),
            catalog_version: key.catalog_version.clone(),
        };
        let evicted = entries.insert(key.clone(), entry.clone(), self.capacity);
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::SeqCst);
            debug!("Evicted {} cache entries to stay within {}", evicted, self.capacity);
        }
        entry
    }

    fn forget_inflight(&self, key: &CacheKey) {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    async fn read_remote(&self, key: &CacheKey) -> Option<Vec<MatchResult>> {
        let remote = self.remote.as_ref()?;
        match remote.get(key).await {
            Ok(found) => found,
            Err(err) => {
                warn!("Shared cache read failed for {}, evaluating locally: {}", key, err);
                None
            }
        }
    }

    async fn write_remote(&self, key: &CacheKey, results: &[MatchResult]) {
        if let Some(remote) = &self.remote {
            if let Err(err) = remote.put(key, results).await {
                warn!("Shared cache write failed for {}: {}", key, err);
            }
        }
    }
}
