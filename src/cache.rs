//! Response cache with address-keyed invalidation
//!
//! Responses are stored by normalized request path and never expire on
//! their own. Paths served for an address-scoped request are also indexed
//! under that address, so a transfer touching the address drops them.
//!
//! Both maps sit behind one mutex. The lock is never held across the origin
//! request, so a fetch that is in flight while its address is invalidated
//! can still store a stale entry; the next transfer for that address clears
//! it again.

use crate::error::OriginError;
use crate::node::{Origin, OriginResponse};
use crate::observer::TransactionObserver;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub body: Bytes,
    pub status: u16,
    pub content_type: Option<String>,
}

impl From<OriginResponse> for CacheEntry {
    fn from(response: OriginResponse) -> Self {
        Self {
            body: response.body,
            status: response.status,
            content_type: response.content_type,
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// address -> cache keys populated for that address
    address_index: HashMap<String, HashSet<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub addresses: usize,
    pub hits: u64,
    pub misses: u64,
    pub invalidated: u64,
}

pub struct CacheStore {
    origin: Arc<dyn Origin>,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidated: AtomicU64,
}

impl CacheStore {
    pub fn new(origin: Arc<dyn Origin>) -> Self {
        Self {
            origin,
            state: Mutex::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidated: AtomicU64::new(0),
        }
    }

    /// Return the cached response for `path`, or fetch it from the origin.
    ///
    /// Only success responses are stored. When `scoped_address` is given the
    /// stored path is indexed under it for [`CacheStore::invalidate`].
    pub async fn fetch_or_populate(
        &self,
        path: &str,
        scoped_address: Option<&str>,
    ) -> Result<CacheEntry, OriginError> {
        if let Some(entry) = self.get(path) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(path, "using cache");
            return Ok(entry);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(path, "proxying path");
        let response = self.origin.get(path).await?;
        let cacheable = response.is_success();
        let entry = CacheEntry::from(response);

        if cacheable {
            let mut state = self.state.lock();
            state.entries.insert(path.to_string(), entry.clone());
            if let Some(address) = scoped_address {
                tracing::debug!(address, path, "indexing cache");
                state
                    .address_index
                    .entry(address.to_string())
                    .or_default()
                    .insert(path.to_string());
            }
        }

        Ok(entry)
    }

    pub fn get(&self, path: &str) -> Option<CacheEntry> {
        self.state.lock().entries.get(path).cloned()
    }

    /// Drop every path indexed under `address`. Returns how many entries were removed.
    pub fn invalidate(&self, address: &str) -> usize {
        let mut state = self.state.lock();
        let Some(keys) = state.address_index.remove(address) else {
            return 0;
        };

        let mut removed = 0;
        for key in &keys {
            if state.entries.remove(key).is_some() {
                removed += 1;
                tracing::debug!(address, key = key.as_str(), "evicted");
            }
        }
        drop(state);

        self.invalidated.fetch_add(removed as u64, Ordering::Relaxed);
        tracing::info!(address, removed, "🧹 cleared cache for address");
        removed
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            addresses: state.address_index.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
        }
    }
}

/// Invalidates both parties of every observed transfer
pub struct CacheInvalidator {
    cache: Arc<CacheStore>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }
}

impl TransactionObserver for CacheInvalidator {
    fn on_transfer(&self, sender: &str, recipient: &str) {
        tracing::info!("💸 tx from {} to {}", sender, recipient);
        self.cache.invalidate(sender);
        self.cache.invalidate(recipient);
    }
}
