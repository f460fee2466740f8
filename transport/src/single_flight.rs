//! Coalescing of identical concurrent work.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;

type SharedResult<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Runs at most one future per key; concurrent callers with the same key all
/// receive a clone of its outcome.
///
/// The entry is removed when the work settles, so a later call starts fresh.
pub struct SingleFlight<T: Clone + Send + Sync + 'static> {
    inflight: Arc<Mutex<HashMap<String, SharedResult<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the in-flight work for `key`, or start it with `make`.
    pub async fn run<F, Fut>(&self, key: &str, make: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(key) {
                Some(existing) => {
                    debug!("Joining in-flight call");
                    existing.clone()
                }
                None => {
                    let work = make();
                    let registry = Arc::clone(&self.inflight);
                    let owned_key = key.to_string();
                    let shared = async move {
                        let result = work.await;
                        registry.lock().await.remove(&owned_key);
                        result
                    }
                    .boxed()
                    .shared();
                    inflight.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };
        shared.await
    }

    /// Number of keys with work in flight.
    pub async fn in_flight(&self) -> usize {
        self.inflight.lock().await.len()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}
