//! Application configuration and prepared application structures
//!
//! An [`AppConfig`] is assembled in code. Preparing it against storage
//! loads the persisted name views, allocates IDs for new names and checks
//! the definition, yielding [`AppStructs`]: the records and event log
//! facades of one application.

use std::collections::BTreeMap;
use std::sync::Arc;

use appstruct_core::{
    AppQName, AppStorage, ClusterAppId, ContainerId, Error, QName, QNameId, RecordId, Result,
    WsId,
};

use crate::appdef::AppDef;
use crate::codec::Codec;
use crate::config::StructsConfig;
use crate::containers::Containers;
use crate::events::Events;
use crate::qnames::QNames;
use crate::rates::{function_rate_limit_name, BucketKey, Buckets, RateLimit, RateLimitKind};
use crate::records::Records;
use crate::resources::{Resource, Resources};
use crate::row::RowCtx;
use crate::singletons::Singletons;
use crate::tokens::AppTokens;
use crate::versions::Versions;
use crate::views::ViewRecords;

/// Configuration of one application
#[derive(Debug, Clone)]
pub struct AppConfig {
    name: AppQName,
    cluster_app_id: ClusterAppId,
    app_def: Arc<AppDef>,
    resources: Resources,
    rate_limits: BTreeMap<QName, BTreeMap<RateLimitKind, RateLimit>>,
    num_app_workspaces: usize,
    params: StructsConfig,
}

impl AppConfig {
    /// Configuration with default params, one application workspace and
    /// no resources.
    pub fn new(name: AppQName, cluster_app_id: ClusterAppId, app_def: AppDef) -> Self {
        Self {
            name,
            cluster_app_id,
            app_def: Arc::new(app_def),
            resources: Resources::new(),
            rate_limits: BTreeMap::new(),
            num_app_workspaces: 1,
            params: StructsConfig::default(),
        }
    }

    /// Replaces the engine params.
    pub fn with_params(mut self, params: StructsConfig) -> Self {
        self.params = params;
        self
    }

    /// Sets the number of application workspaces.
    pub fn with_num_app_workspaces(mut self, n: usize) -> Self {
        self.num_app_workspaces = n;
        self
    }

    /// Registers a function resource.
    pub fn add_resource(&mut self, r: impl Into<Resource>) -> &mut Self {
        self.resources.add(r);
        self
    }

    /// Limits calls of `func`, replacing an earlier limit of the same kind.
    pub fn add_rate_limit(&mut self, func: QName, kind: RateLimitKind, limit: RateLimit) -> &mut Self {
        self.rate_limits.entry(func).or_default().insert(kind, limit);
        self
    }

    /// Application name.
    pub fn name(&self) -> &AppQName {
        &self.name
    }

    /// Cluster application ID.
    pub fn cluster_app_id(&self) -> ClusterAppId {
        self.cluster_app_id
    }

    /// Application definition.
    pub fn app_def(&self) -> &AppDef {
        &self.app_def
    }

    /// Function resources.
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Engine params.
    pub fn params(&self) -> &StructsConfig {
        &self.params
    }

    /// Number of application workspaces.
    pub fn num_app_workspaces(&self) -> usize {
        self.num_app_workspaces
    }

    fn rate_limits(&self, func: &QName) -> Option<&BTreeMap<RateLimitKind, RateLimit>> {
        self.rate_limits.get(func)
    }
}

/// Configurations of all applications, by name
#[derive(Debug, Clone, Default)]
pub struct AppConfigs {
    configs: BTreeMap<AppQName, Arc<AppConfig>>,
}

impl AppConfigs {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a configuration, replacing one with the same name.
    pub fn add(&mut self, config: AppConfig) -> &mut Self {
        self.configs.insert(config.name.clone(), Arc::new(config));
        self
    }

    /// Configuration by name.
    pub fn get(&self, app: &AppQName) -> Option<&Arc<AppConfig>> {
        self.configs.get(app)
    }

    /// Application names in order.
    pub fn names(&self) -> impl Iterator<Item = &AppQName> {
        self.configs.keys()
    }
}

/// Everything one prepared application shares between its facades
pub(crate) struct AppContext {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) storage: Arc<dyn AppStorage>,
    pub(crate) versions: Versions,
    pub(crate) qnames: QNames,
    pub(crate) containers: Containers,
    pub(crate) singletons: Singletons,
    pub(crate) tokens: Arc<dyn AppTokens>,
    pub(crate) buckets: Arc<dyn Buckets>,
}

impl AppContext {
    fn prepare(
        config: Arc<AppConfig>,
        storage: Arc<dyn AppStorage>,
        buckets: Arc<dyn Buckets>,
        tokens: Arc<dyn AppTokens>,
    ) -> Result<Self> {
        let mut versions = Versions::load(storage.as_ref())?;

        let app_def = config.app_def();
        let qnames = QNames::prepare(
            storage.as_ref(),
            &mut versions,
            app_def.qnames().chain(config.resources().names()),
        )?;
        let containers = Containers::prepare(storage.as_ref(), &mut versions, app_def.container_names())?;
        let singletons = Singletons::prepare(
            storage.as_ref(),
            &mut versions,
            app_def.singletons().map(|t| t.qname()),
        )?;

        app_def.validate_uniques()?;
        config.resources().validate(app_def)?;

        for (func, limits) in &config.rate_limits {
            for (kind, limit) in limits {
                buckets.set_default_bucket_state(&function_rate_limit_name(func, *kind), (*limit).into());
            }
        }

        Ok(Self {
            config,
            storage,
            versions,
            qnames,
            containers,
            singletons,
            tokens,
            buckets,
        })
    }

    pub(crate) fn codec(&self) -> Codec<'_> {
        Codec {
            app_def: self.config.app_def(),
            qnames: &self.qnames,
            containers: &self.containers,
        }
    }

    pub(crate) fn row_ctx(&self) -> RowCtx {
        RowCtx {
            app_def: Arc::clone(&self.config.app_def),
            tokens: Arc::clone(&self.tokens),
        }
    }
}

/// Prepared structures of one application
pub struct AppStructs {
    ctx: Arc<AppContext>,
    records: Records,
    events: Events,
    views: ViewRecords,
}

impl AppStructs {
    /// Prepares `config` against `storage`.
    ///
    /// # Errors
    ///
    /// Storage and corruption errors of the name views propagate; an
    /// inconsistent definition or resource set is `InvalidArgument`.
    pub(crate) fn prepare(
        config: Arc<AppConfig>,
        storage: Arc<dyn AppStorage>,
        buckets: Arc<dyn Buckets>,
        tokens: Arc<dyn AppTokens>,
    ) -> Result<Self> {
        let ctx = Arc::new(AppContext::prepare(config, storage, buckets, tokens)?);
        Ok(Self {
            records: Records::new(Arc::clone(&ctx)),
            events: Events::new(Arc::clone(&ctx)),
            views: ViewRecords::new(Arc::clone(&ctx)),
            ctx,
        })
    }

    /// Application name.
    pub fn app_name(&self) -> &AppQName {
        self.ctx.config.name()
    }

    /// Cluster application ID.
    pub fn cluster_app_id(&self) -> ClusterAppId {
        self.ctx.config.cluster_app_id()
    }

    /// Number of application workspaces.
    pub fn num_app_workspaces(&self) -> usize {
        self.ctx.config.num_app_workspaces()
    }

    /// Record store.
    pub fn records(&self) -> &Records {
        &self.records
    }

    /// Event logs.
    pub fn events(&self) -> &Events {
        &self.events
    }

    /// View records.
    pub fn views(&self) -> &ViewRecords {
        &self.views
    }

    /// Application definition.
    pub fn app_def(&self) -> &AppDef {
        self.ctx.config.app_def()
    }

    /// Function resources.
    pub fn resources(&self) -> &Resources {
        self.ctx.config.resources()
    }

    /// Record ID of a singleton type.
    pub fn singleton_id(&self, qname: &QName) -> Result<RecordId> {
        self.ctx.singletons.id(qname)
    }

    /// Storage ID of a qualified name.
    pub fn qname_id(&self, qname: &QName) -> Result<QNameId> {
        self.ctx.qnames.id(qname)
    }

    /// Qualified name of a storage ID.
    pub fn qname(&self, id: QNameId) -> Result<QName> {
        self.ctx.qnames.qname(id)
    }

    /// Storage ID of a container name.
    pub fn container_id(&self, name: &str) -> Result<ContainerId> {
        self.ctx.containers.id(name)
    }

    /// Container name of a storage ID.
    pub fn container(&self, id: ContainerId) -> Result<&str> {
        self.ctx.containers.name(id)
    }

    /// Verified value token collaborator.
    pub fn app_tokens(&self) -> &Arc<dyn AppTokens> {
        &self.ctx.tokens
    }

    /// Version of a system view as loaded or written at prepare.
    pub fn view_version(&self, key: appstruct_core::VersionKey) -> u16 {
        self.ctx.versions.get(key)
    }

    /// Takes one token from the per-application and per-workspace buckets
    /// of `func`; returns true if any of them is exhausted.
    ///
    /// Functions without limits are never exceeded. Per-ID limits are
    /// left to the caller.
    pub fn is_function_rate_limits_exceeded(&self, func: &QName, ws: WsId) -> bool {
        let Some(limits) = self.ctx.config.rate_limits(func) else {
            return false;
        };
        let keys: Vec<BucketKey> = limits
            .keys()
            .filter_map(|kind| match kind {
                RateLimitKind::ByApp => Some(BucketKey {
                    rate_limit_name: function_rate_limit_name(func, *kind),
                    qname: func.clone(),
                    app: Some(self.app_name().clone()),
                    workspace: 0,
                }),
                RateLimitKind::ByWorkspace => Some(BucketKey {
                    rate_limit_name: function_rate_limit_name(func, *kind),
                    qname: func.clone(),
                    app: Some(self.app_name().clone()),
                    workspace: ws,
                }),
                RateLimitKind::ById => None,
            })
            .collect();
        if keys.is_empty() {
            return false;
        }
        !self.ctx.buckets.take_tokens(&keys, 1)
    }
}

impl std::fmt::Debug for AppStructs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppStructs")
            .field("app", self.app_name())
            .field("qnames", &self.ctx.qnames.len())
            .finish_non_exhaustive()
    }
}

/// Checks that `app` exists in `configs`.
pub(crate) fn config_of(configs: &AppConfigs, app: &AppQName) -> Result<Arc<AppConfig>> {
    configs
        .get(app)
        .cloned()
        .ok_or_else(|| Error::AppNotFound(app.to_string()))
}
