//! TTL response cache with prefix invalidation.
//!
//! Reads are cached under their exact request target. Mutations invalidate by
//! prefix because one list view is usually cached under several query
//! variants. Each read takes a [`CacheTicket`] before it goes to the network;
//! a response whose key was invalidated after the ticket was issued is never
//! stored, so a late response cannot resurrect pre-mutation data.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::response::ApiResponse;

/// Number of invalidations remembered for ticket checks.
const INVALIDATION_LOG_LEN: usize = 256;

/// Proof of the cache generation observed before a read was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTicket(u64);

impl CacheTicket {
    /// Number of invalidations the cache had seen when the ticket was taken.
    pub fn generation(&self) -> u64 {
        self.0
    }
}

struct CacheEntry {
    response: ApiResponse,
    stored_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,

    /// Bumped on every invalidation.
    generation: u64,

    /// Recent invalidations as `(generation, prefix)`.
    log: VecDeque<(u64, String)>,

    /// Highest generation dropped from `log`.
    forgotten_through: u64,
}

impl CacheState {
    fn invalidated_since(&self, ticket: CacheTicket, key: &str) -> bool {
        if ticket.0 < self.forgotten_through {
            return true;
        }
        self.log
            .iter()
            .any(|(generation, prefix)| *generation > ticket.0 && prefix_matches(key, prefix))
    }

    fn record(&mut self, prefix: String) {
        self.log.push_back((self.generation, prefix));
        while self.log.len() > INVALIDATION_LOG_LEN {
            if let Some((generation, _)) = self.log.pop_front() {
                self.forgotten_through = generation;
            }
        }
    }
}

/// Cache of successful read responses.
pub struct ResponseCache {
    state: RwLock<CacheState>,
    ttl: Duration,
    max_entries: usize,
}

impl ResponseCache {
    /// Create an empty cache.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            ttl,
            max_entries,
        }
    }

    /// Get a fresh cached response.
    pub async fn get(&self, key: &str) -> Option<ApiResponse> {
        let state = self.state.read().await;
        state
            .entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.response.clone())
    }

    /// Take a ticket before dispatching a read.
    pub async fn ticket(&self) -> CacheTicket {
        CacheTicket(self.state.read().await.generation)
    }

    /// Store a response unless its key was invalidated after `ticket`.
    ///
    /// Returns whether the response was stored.
    pub async fn put(&self, key: &str, response: ApiResponse, ticket: CacheTicket) -> bool {
        if self.max_entries == 0 || self.ttl.is_zero() {
            return false;
        }

        let mut state = self.state.write().await;
        if state.invalidated_since(ticket, key) {
            debug!("Dropping stale response for {key}");
            return false;
        }

        if state.entries.len() >= self.max_entries && !state.entries.contains_key(key) {
            let ttl = self.ttl;
            state.entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        }
        if state.entries.len() >= self.max_entries && !state.entries.contains_key(key) {
            if let Some(oldest) = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone())
            {
                state.entries.remove(&oldest);
            }
        }

        state.entries.insert(
            key.to_string(),
            CacheEntry {
                response,
                stored_at: Instant::now(),
            },
        );
        true
    }

    /// Remove every entry under any of `prefixes`. Returns the number removed.
    pub async fn invalidate<S: AsRef<str>>(&self, prefixes: &[S]) -> usize {
        if prefixes.is_empty() {
            return 0;
        }

        let mut state = self.state.write().await;
        state.generation += 1;
        for prefix in prefixes {
            state.record(prefix.as_ref().to_string());
        }

        let before = state.entries.len();
        state.entries.retain(|key, _| {
            !prefixes
                .iter()
                .any(|prefix| prefix_matches(key, prefix.as_ref()))
        });
        let removed = before - state.entries.len();
        debug!("Invalidated {removed} cached responses");
        removed
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.invalidate(&[""]).await;
        info!("Cleared response cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            entries: state.entries.len(),
            max_entries: self.max_entries,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Statistics about the response cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub max_entries: usize,

    /// Entry lifetime in seconds.
    pub ttl_secs: u64,
}

/// Whether cache `key` lies under `prefix`.
///
/// Matching stops at path boundaries: `/folders/1` covers `/folders/1` and
/// `/folders/1?x=y` but not `/folders/12`.
pub fn prefix_matches(key: &str, prefix: &str) -> bool {
    match key.strip_prefix(prefix) {
        Some(rest) => {
            rest.is_empty()
                || prefix.is_empty()
                || prefix.ends_with('/')
                || rest.starts_with('/')
                || rest.starts_with('?')
        }
        None => false,
    }
}

/// Prefixes a successful mutation of `path` invalidates: the path itself and
/// its parent collection.
pub fn derived_prefixes(path: &str) -> Vec<String> {
    let path = path.split('?').next().unwrap_or_default();
    let mut prefixes = vec![path.to_string()];
    if let Some((parent, _)) = path.rsplit_once('/') {
        if !parent.is_empty() {
            prefixes.push(parent.to_string());
        }
    }
    prefixes
}
