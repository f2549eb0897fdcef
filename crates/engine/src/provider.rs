//! Composition root
//!
//! [`AppStructsProvider`] prepares each configured application on first
//! use and hands out the shared prepared instance afterwards.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{info, warn};

use appstruct_core::{AppQName, AppStorageProvider, Result};

use crate::app::{config_of, AppConfigs, AppStructs};
use crate::rates::BucketsFactory;
use crate::tokens::AppTokensFactory;

/// Lazily prepared applications
pub struct AppStructsProvider {
    configs: AppConfigs,
    storage: Arc<dyn AppStorageProvider>,
    buckets: Arc<dyn BucketsFactory>,
    tokens: Arc<dyn AppTokensFactory>,
    structs: RwLock<FxHashMap<AppQName, Arc<AppStructs>>>,
}

impl AppStructsProvider {
    /// Provider of the applications in `configs`.
    pub fn new(
        configs: AppConfigs,
        storage: Arc<dyn AppStorageProvider>,
        buckets: Arc<dyn BucketsFactory>,
        tokens: Arc<dyn AppTokensFactory>,
    ) -> Self {
        Self {
            configs,
            storage,
            buckets,
            tokens,
            structs: RwLock::new(FxHashMap::default()),
        }
    }

    /// Prepared structures of `app`, preparing them on first call.
    ///
    /// Concurrent first calls prepare once; all callers get the same
    /// instance.
    ///
    /// # Errors
    ///
    /// - `AppNotFound` if `app` is not configured
    /// - storage, corruption and definition errors of the prepare step
    pub fn get(&self, app: &AppQName) -> Result<Arc<AppStructs>> {
        if let Some(s) = self.structs.read().get(app) {
            return Ok(Arc::clone(s));
        }

        let mut structs = self.structs.write();
        if let Some(s) = structs.get(app) {
            return Ok(Arc::clone(s));
        }

        let prepared = self.prepare(app).map_err(|e| {
            warn!(target: "appstruct::provider", app = %app, error = %e, "prepare failed");
            e
        })?;
        let prepared = Arc::new(prepared);
        structs.insert(app.clone(), Arc::clone(&prepared));
        Ok(prepared)
    }

    /// Number of applications prepared so far.
    pub fn prepared_count(&self) -> usize {
        self.structs.read().len()
    }

    fn prepare(&self, app: &AppQName) -> Result<AppStructs> {
        let config = config_of(&self.configs, app)?;
        let storage = self.storage.app_storage(app)?;
        let ttl = Duration::from_secs(config.params().verified_token_ttl_secs);
        let tokens = self.tokens.app_tokens(app, ttl);
        let buckets = self.buckets.buckets();

        let structs = AppStructs::prepare(config, storage, buckets, tokens)?;
        info!(
            target: "appstruct::provider",
            app = %app,
            types = structs.app_def().types().count(),
            resources = structs.resources().len(),
            "application prepared"
        );
        Ok(structs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::MemBucketsFactory;
    use crate::test_app;
    use crate::tokens::SignedTokensFactory;
    use appstruct_core::Error;
    use appstruct_storage::testing::TestStorage;
    use appstruct_storage::{FixedStorageProvider, MemStorageProvider};

    fn provider(storage: Arc<dyn AppStorageProvider>) -> AppStructsProvider {
        let mut configs = AppConfigs::new();
        configs.add(test_app::config());
        AppStructsProvider::new(
            configs,
            storage,
            Arc::new(MemBucketsFactory::new()),
            Arc::new(SignedTokensFactory::new("secret")),
        )
    }

    #[test]
    fn test_get_prepares_once() {
        let p = provider(Arc::new(MemStorageProvider::new()));
        let a = p.get(&test_app::app_name()).unwrap();
        let b = p.get(&test_app::app_name()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(p.prepared_count(), 1);
        assert_eq!(a.app_name(), &test_app::app_name());
    }

    #[test]
    fn test_unknown_app() {
        let p = provider(Arc::new(MemStorageProvider::new()));
        let err = p.get(&AppQName::new("test", "none")).unwrap_err();
        assert!(matches!(err, Error::AppNotFound(_)));
        assert_eq!(p.prepared_count(), 0);
    }

    #[test]
    fn test_failed_prepare_is_retried() {
        let storage = Arc::new(TestStorage::new());
        storage.schedule_put_error("disk full", None, None);
        let p = provider(Arc::new(FixedStorageProvider::new(storage.clone())));
        assert!(matches!(p.get(&test_app::app_name()), Err(Error::Storage { .. })));
        assert_eq!(p.prepared_count(), 0);
        assert!(p.get(&test_app::app_name()).is_ok());
    }

    #[test]
    fn test_concurrent_get() {
        let p = Arc::new(provider(Arc::new(MemStorageProvider::new())));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let p = Arc::clone(&p);
                std::thread::spawn(move || p.get(&test_app::app_name()).unwrap())
            })
            .collect();
        let all: Vec<Arc<AppStructs>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for s in &all[1..] {
            assert!(Arc::ptr_eq(&all[0], s));
        }
    }
}
