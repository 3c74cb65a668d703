//! Routing cache
//!
//! Read-through cache of interchange snapshots keyed by interchange id.
//! Entries expire after a fixed TTL; any configuration write clears the whole
//! cache since a replace can move the default channel of every interchange in
//! the submitted set.

use clover_core::{ConfigStore, Interchange, InterchangeConfig, InterchangeId, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default entry lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedInterchange {
    interchange: Arc<Interchange>,
    loaded_at: Instant,
}

/// TTL read-through cache in front of a [`ConfigStore`]
pub struct RoutingCache {
    store: Arc<dyn ConfigStore>,
    ttl: Duration,
    entries: RwLock<HashMap<InterchangeId, CachedInterchange>>,
    /// Bumped on every invalidation so that loads started earlier are discarded
    generation: AtomicU64,
}

impl RoutingCache {
    pub fn new(store: Arc<dyn ConfigStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn with_default_ttl(store: Arc<dyn ConfigStore>) -> Self {
        Self::new(store, DEFAULT_TTL)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The backing config store
    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// Look up an interchange, loading it from the store on a miss
    ///
    /// Unknown interchanges return `Ok(None)` and are not cached.
    pub async fn get(&self, id: InterchangeId) -> Result<Option<Arc<Interchange>>> {
        if let Some(hit) = self.lookup(id) {
            return Ok(Some(hit));
        }

        let generation = self.generation.load(Ordering::Acquire);
        let Some(loaded) = self.store.get(id).await? else {
            return Ok(None);
        };
        let interchange = Arc::new(loaded);

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.generation.load(Ordering::Acquire) == generation {
            entries.insert(
                id,
                CachedInterchange {
                    interchange: Arc::clone(&interchange),
                    loaded_at: Instant::now(),
                },
            );
        } else {
            debug!(
                interchange_id = %id,
                "Configuration changed during load, not caching snapshot"
            );
        }

        Ok(Some(interchange))
    }

    fn lookup(&self, id: InterchangeId) -> Option<Arc<Interchange>> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .get(&id)
            .filter(|entry| entry.loaded_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.interchange))
    }

    /// Replace the whole configuration, then clear the cache
    ///
    /// Returns the configuration as it was stored. A failed replace leaves
    /// both the store and the cache untouched.
    pub async fn replace_config(&self, configs: &[InterchangeConfig]) -> Result<Vec<Interchange>> {
        self.store.replace_all(configs).await?;
        self.invalidate();
        self.store.get_all().await
    }

    /// Every stored interchange, read straight from the store
    pub async fn get_all(&self) -> Result<Vec<Interchange>> {
        self.store.get_all().await
    }

    /// Drop every entry
    pub fn invalidate(&self) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *entries = HashMap::new();
        self.generation.fetch_add(1, Ordering::AcqRel);
        debug!("Routing cache invalidated");
    }

    /// Number of live or expired entries currently held
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
