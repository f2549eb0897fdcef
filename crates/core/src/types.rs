//! Core identifier types
//!
//! This module defines:
//! - QName: two-part qualified name (`pkg.entity`) of a type or function
//! - AppQName: qualified application name (`owner/name`)
//! - RecordId: 64-bit record identifier with raw (placeholder) detection
//! - Numeric aliases for workspaces, offsets, partitions and name IDs
//! - ReadCount: how many log entries a read request asks for

use crate::consts::{MAX_RAW_RECORD_ID, MIN_RAW_RECORD_ID, SYS_PACKAGE};
use crate::error::{Error, Result};
use crate::ident::validate_ident;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Qualified name ID
pub type QNameId = u16;
/// Container name ID
pub type ContainerId = u16;
/// Workspace ID
pub type WsId = u64;
/// Log offset
pub type Offset = u64;
/// Handling partition ID
pub type PartitionId = u16;
/// Milliseconds since Unix epoch
pub type UnixMilli = i64;
/// Cluster application ID
pub type ClusterAppId = u32;

/// Offset that was never assigned
pub const NULL_OFFSET: Offset = 0;

/// Qualified name: package and entity identifiers
///
/// The null name has both parts empty and displays as `.`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pkg: Cow<'static, str>,
    entity: Cow<'static, str>,
}

/// Null qualified name
pub const NULL_QNAME: QName = QName::from_static("", "");
/// Name of error events
pub const QNAME_FOR_ERROR: QName = QName::from_static(SYS_PACKAGE, "Error");
/// Name of the raw CUD command
pub const QNAME_COMMAND_CUD: QName = QName::from_static(SYS_PACKAGE, "CUD");
/// Name of events rebuilt from corrupted data
pub const QNAME_FOR_CORRUPTED_DATA: QName = QName::from_static(SYS_PACKAGE, "Corrupted");

impl QName {
    /// Creates a qualified name without syntax checks.
    pub fn new(pkg: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            pkg: Cow::Owned(pkg.into()),
            entity: Cow::Owned(entity.into()),
        }
    }

    /// Creates a qualified name from static parts.
    pub const fn from_static(pkg: &'static str, entity: &'static str) -> Self {
        Self {
            pkg: Cow::Borrowed(pkg),
            entity: Cow::Borrowed(entity),
        }
    }

    /// Parses `pkg.entity`. The string `.` parses to the null name.
    pub fn parse(s: &str) -> Result<Self> {
        if s == "." {
            return Ok(NULL_QNAME);
        }
        let (pkg, entity) = s
            .split_once('.')
            .ok_or_else(|| Error::InvalidName(format!("qualified name «{}» has no «.»", s)))?;
        let q = QName::new(pkg, entity);
        q.validate()?;
        Ok(q)
    }

    /// Package identifier.
    pub fn pkg(&self) -> &str {
        &self.pkg
    }

    /// Entity identifier.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Returns true for the null name.
    pub fn is_null(&self) -> bool {
        self.pkg.is_empty() && self.entity.is_empty()
    }

    /// Returns true for names of the system package.
    pub fn is_sys(&self) -> bool {
        self.pkg == SYS_PACKAGE
    }

    /// Checks both parts against the identifier syntax. The null name is valid.
    pub fn validate(&self) -> Result<()> {
        if self.is_null() {
            return Ok(());
        }
        validate_ident(&self.pkg)?;
        validate_ident(&self.entity)
    }
}

impl Default for QName {
    fn default() -> Self {
        NULL_QNAME
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.pkg, self.entity)
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QName({})", self)
    }
}

impl FromStr for QName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        QName::parse(s)
    }
}

impl Serialize for QName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        QName::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Qualified application name: owner and application identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppQName {
    owner: String,
    name: String,
}

impl AppQName {
    /// Creates an application name.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parses `owner/name`.
    pub fn parse(s: &str) -> Result<Self> {
        let (owner, name) = s
            .split_once('/')
            .ok_or_else(|| Error::InvalidName(format!("application name «{}» has no «/»", s)))?;
        validate_ident(owner)?;
        validate_ident(name)?;
        Ok(AppQName::new(owner, name))
    }

    /// Owner identifier.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Application identifier.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for AppQName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Record identifier
///
/// IDs in `1..=65535` are raw: client-chosen placeholders valid only inside
/// one event, replaced by permanent IDs when the event is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Null record ID
    pub const NULL: RecordId = RecordId(0);

    /// Returns true for the null ID.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns true for placeholder IDs.
    pub fn is_raw(self) -> bool {
        self >= MIN_RAW_RECORD_ID && self <= MAX_RAW_RECORD_ID
    }

    /// Raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for RecordId {
    fn from(v: u64) -> Self {
        RecordId(v)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of log entries requested by a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCount {
    /// Read at most this many entries
    Exactly(u64),
    /// Read until the log ends
    ToEnd,
}

impl ReadCount {
    /// Returns true if exactly one entry is requested.
    pub fn is_single(self) -> bool {
        self == ReadCount::Exactly(1)
    }
}

impl From<u64> for ReadCount {
    fn from(n: u64) -> Self {
        ReadCount::Exactly(n)
    }
}
