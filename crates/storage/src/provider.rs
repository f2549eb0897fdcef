//! Per-application storage provider
//!
//! Hands out one [`MemStorage`] per application name. Repeated requests for
//! the same application return the same store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use appstruct_core::{AppQName, AppStorage, AppStorageProvider, Result};

use crate::mem::MemStorage;

/// Provider of in-memory application stores
#[derive(Debug, Default)]
pub struct MemStorageProvider {
    stores: Mutex<HashMap<AppQName, Arc<MemStorage>>>,
}

impl MemStorageProvider {
    /// Create a provider with no stores
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the concrete store of `app`, creating it if needed
    pub fn mem_storage(&self, app: &AppQName) -> Arc<MemStorage> {
        let mut stores = self.stores.lock();
        stores
            .entry(app.clone())
            .or_insert_with(|| {
                debug!(target: "appstruct::storage", app = %app, "created in-memory storage");
                Arc::new(MemStorage::new())
            })
            .clone()
    }
}

impl AppStorageProvider for MemStorageProvider {
    fn app_storage(&self, app: &AppQName) -> Result<Arc<dyn AppStorage>> {
        Ok(self.mem_storage(app))
    }
}

/// Provider that always returns one fixed store
///
/// Useful to put a wrapped store (for example [`TestStorage`](crate::testing::TestStorage))
/// under a composition root.
pub struct FixedStorageProvider {
    storage: Arc<dyn AppStorage>,
}

impl FixedStorageProvider {
    /// Wraps `storage`
    pub fn new(storage: Arc<dyn AppStorage>) -> Self {
        Self { storage }
    }
}

impl AppStorageProvider for FixedStorageProvider {
    fn app_storage(&self, _app: &AppQName) -> Result<Arc<dyn AppStorage>> {
        Ok(self.storage.clone())
    }
}
