//! Reserved constants
//!
//! These values are part of the persisted layout. Changing any of them
//! makes existing stores unreadable.

use crate::types::{ContainerId, QNameId, RecordId};

// ============================================================================
// Qualified name IDs
// ============================================================================

/// ID of the null qualified name
pub const NULL_QNAME_ID: QNameId = 0;
/// ID of `sys.Error`
pub const QNAME_ID_FOR_ERROR: QNameId = 1;
/// ID of `sys.CUD`
pub const QNAME_ID_COMMAND_CUD: QNameId = 2;
/// ID of `sys.Corrupted`
pub const QNAME_ID_FOR_CORRUPTED_DATA: QNameId = 3;
/// Last reserved system qualified name ID
pub const QNAME_ID_SYS_LAST: QNameId = 0xFF;
/// Ceiling of qualified name IDs
pub const MAX_QNAME_ID: QNameId = 0xFFFF;

// ============================================================================
// Container name IDs
// ============================================================================

/// ID of the empty container name
pub const NULL_CONTAINER_ID: ContainerId = 0;
/// Last reserved system container name ID
pub const CONTAINER_ID_SYS_LAST: ContainerId = 63;
/// Ceiling of container name IDs
pub const MAX_CONTAINER_ID: ContainerId = 0xFFFF;

// ============================================================================
// Record IDs
// ============================================================================

/// Smallest raw (placeholder) record ID
pub const MIN_RAW_RECORD_ID: RecordId = RecordId(1);
/// Largest raw (placeholder) record ID
pub const MAX_RAW_RECORD_ID: RecordId = RecordId(0xFFFF);
/// First ID reserved for singletons
pub const FIRST_SINGLETON_ID: RecordId = RecordId(0x1_0000);
/// Last ID reserved for singletons
pub const MAX_SINGLETON_ID: RecordId = RecordId(0x1_0000 + 0x1FF);

// ============================================================================
// Key layout
// ============================================================================

/// Bit width of the in-shard part of a record ID or log offset
pub const PARTITION_BITS: u32 = 12;
/// Mask of the in-shard part
pub const LOW_MASK: u16 = (1 << PARTITION_BITS) - 1;
/// Maximum number of records per `get_batch` call
pub const MAX_GET_BATCH_RECORD_COUNT: usize = 256;

// ============================================================================
// Identifiers
// ============================================================================

/// Maximum identifier length in bytes
pub const MAX_IDENT_LEN: usize = 255;
/// Package of system qualified names
pub const SYS_PACKAGE: &str = "sys";

/// `sys.QName` system field
pub const SYS_FIELD_QNAME: &str = "sys.QName";
/// `sys.ID` system field
pub const SYS_FIELD_ID: &str = "sys.ID";
/// `sys.ParentID` system field
pub const SYS_FIELD_PARENT_ID: &str = "sys.ParentID";
/// `sys.Container` system field
pub const SYS_FIELD_CONTAINER: &str = "sys.Container";
/// `sys.IsActive` system field
pub const SYS_FIELD_IS_ACTIVE: &str = "sys.IsActive";

// ============================================================================
// Versions
// ============================================================================

/// Version value of a view that was never written
pub const UNKNOWN_VERSION: u16 = 0;
/// First codec version of every system view
pub const VERSION_01: u16 = 1;

/// Reserved partition key prefixes of system views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SysView {
    /// Codec version markers
    Versions = 16,
    /// Qualified name IDs
    QNames = 17,
    /// Container name IDs
    Containers = 18,
    /// Records
    Records = 19,
    /// Partition ordered event log
    PLog = 20,
    /// Workspace ordered event log
    WLog = 21,
    /// Singleton record IDs
    SingletonIds = 22,
    /// Application view records
    ViewRecords = 23,
}

impl SysView {
    /// Partition key prefix.
    pub fn prefix(self) -> u16 {
        self as u16
    }
}

/// Keys of codec version markers in the versions view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum VersionKey {
    /// Qualified names view
    SysQNames = 1,
    /// Container names view
    SysContainers = 2,
    /// Singleton IDs view
    SysSingletons = 3,
}

impl VersionKey {
    /// Clustering column value.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Human readable view name.
    pub fn view_name(self) -> &'static str {
        match self {
            VersionKey::SysQNames => "sys.QNames",
            VersionKey::SysContainers => "sys.Containers",
            VersionKey::SysSingletons => "sys.SingletonIDs",
        }
    }
}
