//! Application structures engine
//!
//! This crate maps application definitions onto an ordered key-value store:
//! - Name views: persistent IDs of qualified names, containers and singletons
//! - Records: storable rows addressed by workspace and record ID
//! - View records: projections keyed by partition fields and clustering columns
//! - Event logs: partition log (PLog) and workspace log (WLog) events
//! - Event build pipeline: builders, validators, ID regeneration, masking
//! - Composition root: lazily prepared applications per name
//!
//! The store itself, tokens and rate limit buckets are collaborators
//! consumed through traits.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod appdef;
pub(crate) mod codec;
pub mod config;
pub mod containers;
pub mod cud;
pub mod element;
pub mod event;
pub mod events;
pub mod ids;
pub(crate) mod names;
pub mod provider;
pub mod qnames;
pub mod rates;
pub mod records;
pub mod rename;
pub mod resources;
pub mod row;
pub mod singletons;
pub mod tokens;
pub(crate) mod validate;
pub mod value;
pub mod versions;
pub mod views;

#[cfg(test)]
pub(crate) mod test_app;

pub use app::{AppConfig, AppConfigs, AppStructs};
pub use appdef::{
    AppDef, AppDefBuilder, ContainerDef, DataKind, FieldDef, TypeDef, TypeKind, UniqueDef,
    VerificationKind,
};
pub use config::StructsConfig;
pub use cud::{CudBuilder, CudRow, Cuds, UpdateRec};
pub use element::{Element, ObjectBuilder};
pub use event::{Event, EventError, RawEventBuilder, RawEventParams, SyncInfo, SyncRawEventParams};
pub use events::{Events, LogReader};
pub use ids::{IdGenerator, SequentialIdGenerator, FIRST_STORAGE_ID};
pub use provider::AppStructsProvider;
pub use rates::{
    function_rate_limit_name, BucketKey, BucketState, Buckets, BucketsFactory, MemBuckets,
    MemBucketsFactory, RateLimit, RateLimitKind,
};
pub use records::Records;
pub use rename::rename_qname;
pub use resources::{CommandFunction, QueryArgs, QueryFunction, Resource, Resources};
pub use row::{Record, Row, RowBuilder};
pub use tokens::{AppTokens, AppTokensFactory, SignedTokens, SignedTokensFactory, VerifiedValuePayload};
pub use value::Value;
pub use versions::Versions;
pub use views::{KeyBuilder, ValueBuilder, ViewRecords};
