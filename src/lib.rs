//! appstruct - persistence core for event-sourced application state
//!
//! appstruct maps application definitions onto an ordered key-value store.
//! Qualified names, container names and singletons get compact persistent
//! IDs; records and event logs are laid out in sharded partitions.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use appstruct::*;
//!
//! let mut configs = AppConfigs::new();
//! configs.add(AppConfig::new(AppQName::new("my", "app"), 1, app_def));
//! let provider = AppStructsProvider::new(
//!     configs,
//!     Arc::new(MemStorageProvider::new()),
//!     Arc::new(MemBucketsFactory::new()),
//!     Arc::new(SignedTokensFactory::new("secret")),
//! );
//! let app = provider.get(&AppQName::new("my", "app"))?;
//! let rec = app.records().get(ws, id)?;
//! ```
//!
//! The engine crate carries the API; core types and the in-memory store
//! are re-exported here for convenience.

pub use appstruct_core::{
    AppQName, AppStorage, AppStorageProvider, BatchItem, CancelToken, ClusterAppId, ContainerId,
    Error, ErrorKind, GetBatchItem, Offset, PartitionId, QName, QNameId, ReadCount, RecordId,
    Result, UnixMilli, ValidationCode, ValidationError, ValidationErrors, WsId, NULL_QNAME,
    QNAME_COMMAND_CUD, QNAME_FOR_CORRUPTED_DATA, QNAME_FOR_ERROR,
};
pub use appstruct_engine::*;
pub use appstruct_storage::{FixedStorageProvider, MemStorage, MemStorageProvider};
