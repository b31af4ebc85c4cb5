//! Per-battery resource cache with single-flight loading.
//!
//! Concurrent requests for one battery share a single in-flight load.
//! A load either publishes the complete resource bundle or nothing, and
//! its in-flight marker is cleared either way so a failed load is retried
//! by the next request.

use super::loader::{BatteryResources, ResourceLoader};
use crate::error::{BatteryError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task;
use tracing::{debug, info, warn};

type LoadOutcome = std::result::Result<Arc<BatteryResources>, Arc<BatteryError>>;
type InFlightLoad = Shared<BoxFuture<'static, LoadOutcome>>;

#[derive(Default)]
struct RegistryState {
    ready: HashMap<String, Arc<BatteryResources>>,
    loading: HashMap<String, InFlightLoad>,
}

/// Cache of loaded battery resources keyed by battery id
pub struct ResourceRegistry {
    loader: Arc<dyn ResourceLoader>,
    state: Mutex<RegistryState>,
}

impl ResourceRegistry {
    pub fn new(loader: Arc<dyn ResourceLoader>) -> Self {
        Self {
            loader,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Resources for `battery_id`, loading them at most once across callers
    pub async fn get(&self, battery_id: &str) -> Result<Arc<BatteryResources>> {
        let load = {
            let mut state = self.lock_state();
            if let Some(resources) = state.ready.get(battery_id) {
                return Ok(resources.clone());
            }
            match state.loading.get(battery_id) {
                Some(load) => {
                    debug!("Waiting for in-flight load of {}", battery_id);
                    load.clone()
                }
                None => {
                    info!("Loading resources for {}", battery_id);
                    let load = self.start_load(battery_id);
                    state.loading.insert(battery_id.to_string(), load.clone());
                    load
                }
            }
        };

        let outcome = load.clone().await;

        {
            let mut state = self.lock_state();
            let current = state
                .loading
                .get(battery_id)
                .is_some_and(|marker| Shared::ptr_eq(marker, &load));
            if current {
                state.loading.remove(battery_id);
                if let Ok(resources) = &outcome {
                    state
                        .ready
                        .insert(battery_id.to_string(), resources.clone());
                }
            }
        }

        outcome.map_err(|e| {
            warn!("Resource loading failed for {}: {}", battery_id, e);
            BatteryError::ResourceLoad {
                battery_id: battery_id.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Drop the cached bundle for `battery_id`; true if one was cached
    pub fn evict(&self, battery_id: &str) -> bool {
        self.lock_state().ready.remove(battery_id).is_some()
    }

    pub fn is_cached(&self, battery_id: &str) -> bool {
        self.lock_state().ready.contains_key(battery_id)
    }

    pub fn is_loading(&self, battery_id: &str) -> bool {
        self.lock_state().loading.contains_key(battery_id)
    }

    fn start_load(&self, battery_id: &str) -> InFlightLoad {
        let loader = self.loader.clone();
        let id = battery_id.to_string();
        async move {
            let join_id = id.clone();
            match task::spawn_blocking(move || loader.load(&id)).await {
                Ok(Ok(resources)) => Ok(Arc::new(resources)),
                Ok(Err(e)) => Err(Arc::new(e)),
                Err(e) => Err(Arc::new(BatteryError::ResourceLoad {
                    battery_id: join_id,
                    reason: format!("loader task failed: {}", e),
                })),
            }
        }
        .boxed()
        .shared()
    }

    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
