pub mod result_cache;
pub mod store;

pub use result_cache::{ResultCache, DEFAULT_CACHE_CAPACITY};
pub use store::{CacheEntry, CacheKey, CacheStoreError, MemoryStore, RemoteCache};
