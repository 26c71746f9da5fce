use crate::rules::MatchResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Identity of a cached evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub fact_digest: String,
    pub catalog_version: String,
}

impl CacheKey {
    pub fn new(fact_digest: impl Into<String>, catalog_version: impl Into<String>) -> Self {
        Self {
            fact_digest: fact_digest.into(),
            catalog_version: catalog_version.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graha:{}:{}", self.catalog_version, self.fact_digest)
    }
}

/// A stored, ordered match list.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub results: Arc<Vec<MatchResult>>,
    pub computed_at: DateTime<Utc>,
    pub catalog_version: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheStoreError {
    #[error("Cache store unavailable: {message}")]
    Unavailable { message: String },
    #[error("Cache entry {key} is unreadable: {message}")]
    Corrupt { key: String, message: String },
}

/// Shared store consulted before evaluating and written after.
///
/// Failures never fail a query; the cache falls back to local evaluation.
#[async_trait]
pub trait RemoteCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<MatchResult>>, CacheStoreError>;
    async fn put(&self, key: &CacheKey, results: &[MatchResult]) -> Result<(), CacheStoreError>;
}

/// Process-local [`RemoteCache`] holding serialized entries.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RemoteCache for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<MatchResult>>, CacheStoreError> {
        let key = key.to_string();
        let raw = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|err| CacheStoreError::Corrupt {
                    key,
                    message: err.to_string(),
                }),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &CacheKey, results: &[MatchResult]) -> Result<(), CacheStoreError> {
        let raw = serde_json::to_string(results).map_err(|err| CacheStoreError::Corrupt {
            key: key.to_string(),
            message: err.to_string(),
        })?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), raw);
        Ok(())
    }
}
