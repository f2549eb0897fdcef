//! Core types and traits for appstruct
//!
//! This crate defines the foundational types used throughout the system:
//! - QName / AppQName: qualified type and application names
//! - RecordId, WsId, Offset, PartitionId: storage addressing
//! - Reserved constants: system name IDs, system views, ID ranges
//! - Layout: splitting IDs and offsets into partition key and clustering columns
//! - Error: error taxonomy with stable validation codes
//! - Traits: storage collaborator seam (AppStorage, AppStorageProvider)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod consts;
pub mod error;
pub mod ident;
pub mod layout;
pub mod traits;
pub mod types;

pub use cancel::CancelToken;
pub use consts::{SysView, VersionKey};
pub use error::{Error, ErrorKind, Result, ValidationCode, ValidationError, ValidationErrors};
pub use ident::{is_valid_ident, validate_ident};
pub use layout::{crack, glue, ShardRange, ShardRanges, StorageKey};
pub use traits::{AppStorage, AppStorageProvider, BatchItem, GetBatchItem, ReadCallback};
pub use types::{
    AppQName, ClusterAppId, ContainerId, Offset, PartitionId, QName, QNameId, ReadCount, RecordId,
    UnixMilli, WsId, NULL_OFFSET, NULL_QNAME, QNAME_COMMAND_CUD, QNAME_FOR_CORRUPTED_DATA,
    QNAME_FOR_ERROR,
};
