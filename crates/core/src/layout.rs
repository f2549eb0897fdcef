//! Storage key layout
//!
//! Record IDs and log offsets are split into a shard ("partition") part,
//! `value >> PARTITION_BITS`, stored in the partition key, and an in-shard
//! part, `value & LOW_MASK`, stored big-endian in the clustering columns.
//! Inside one shard the clustering columns sort in the same order as the
//! original values, so a clustering range scan returns ascending IDs.
//!
//! | View       | Partition key                          | Clustering columns |
//! |------------|----------------------------------------|--------------------|
//! | Records    | `u16 view`, `u64 ws`, `u64 id hi`      | `u16 id lo`        |
//! | PLog       | `u16 view`, `u16 partition`, `u64 hi`  | `u16 offset lo`    |
//! | WLog       | `u16 view`, `u64 ws`, `u64 hi`         | `u16 offset lo`    |
//! | Versions   | `u16 view`                             | `u16 version key`  |
//! | Name views | `u16 view`, `u16 version`              | name bytes         |
//! | View records | `u16 view`, `u16 view qname`, `u64 ws`, partition fields | clustering fields |

use crate::consts::{SysView, VersionKey, LOW_MASK, PARTITION_BITS};
use crate::types::{Offset, PartitionId, QNameId, ReadCount, RecordId, WsId};
use byteorder::{BigEndian, ByteOrder};

/// Partition key and clustering columns of one storage entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    /// Partition key
    pub pkey: Vec<u8>,
    /// Clustering columns
    pub ccols: Vec<u8>,
}

/// Splits a value into shard and in-shard parts.
pub fn crack(value: u64) -> (u64, u16) {
    (value >> PARTITION_BITS, (value as u16) & LOW_MASK)
}

/// Inverse of [`crack`].
pub fn glue(hi: u64, lo: u16) -> u64 {
    (hi << PARTITION_BITS) | u64::from(lo & LOW_MASK)
}

/// Big-endian bytes of an in-shard part.
pub fn lo_bytes(lo: u16) -> Vec<u8> {
    let mut buf = vec![0u8; 2];
    BigEndian::write_u16(&mut buf, lo);
    buf
}

/// Reads an in-shard part from clustering columns.
///
/// Returns `None` if `ccols` is not exactly two bytes.
pub fn lo_from_bytes(ccols: &[u8]) -> Option<u16> {
    if ccols.len() != 2 {
        return None;
    }
    Some(BigEndian::read_u16(ccols))
}

fn sharded_key(prefix: &[u8], value: u64) -> StorageKey {
    let (hi, lo) = crack(value);
    let mut pkey = Vec::with_capacity(prefix.len() + 8);
    pkey.extend_from_slice(prefix);
    pkey.extend_from_slice(&hi.to_be_bytes());
    StorageKey {
        pkey,
        ccols: lo_bytes(lo),
    }
}

/// Key of a record.
pub fn record_key(ws: WsId, id: RecordId) -> StorageKey {
    let mut prefix = [0u8; 10];
    BigEndian::write_u16(&mut prefix[0..2], SysView::Records.prefix());
    BigEndian::write_u64(&mut prefix[2..10], ws);
    sharded_key(&prefix, id.as_u64())
}

/// Key of a partition ordered log entry.
pub fn plog_key(partition: PartitionId, offset: Offset) -> StorageKey {
    let mut prefix = [0u8; 4];
    BigEndian::write_u16(&mut prefix[0..2], SysView::PLog.prefix());
    BigEndian::write_u16(&mut prefix[2..4], partition);
    sharded_key(&prefix, offset)
}

/// Key of a workspace ordered log entry.
pub fn wlog_key(ws: WsId, offset: Offset) -> StorageKey {
    let mut prefix = [0u8; 10];
    BigEndian::write_u16(&mut prefix[0..2], SysView::WLog.prefix());
    BigEndian::write_u64(&mut prefix[2..10], ws);
    sharded_key(&prefix, offset)
}

/// Partition key of the versions view.
pub fn versions_pkey() -> Vec<u8> {
    SysView::Versions.prefix().to_be_bytes().to_vec()
}

/// Clustering columns of a version marker.
pub fn version_ccols(key: VersionKey) -> Vec<u8> {
    lo_bytes(key.as_u16())
}

/// Partition key of a name view at the given codec version.
pub fn names_pkey(view: SysView, version: u16) -> Vec<u8> {
    let mut pkey = vec![0u8; 4];
    BigEndian::write_u16(&mut pkey[0..2], view.prefix());
    BigEndian::write_u16(&mut pkey[2..4], version);
    pkey
}

/// Partition key prefix of view records: the view and the workspace.
///
/// Encoded partition key fields follow the prefix.
pub fn view_pkey_prefix(view: QNameId, ws: WsId) -> Vec<u8> {
    let mut pkey = vec![0u8; 12];
    BigEndian::write_u16(&mut pkey[0..2], SysView::ViewRecords.prefix());
    BigEndian::write_u16(&mut pkey[2..4], view);
    BigEndian::write_u64(&mut pkey[4..12], ws);
    pkey
}

/// Smallest key greater than every key starting with `prefix`.
///
/// `None` if there is no such key: `prefix` is empty or all `0xFF`.
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let last = prefix.iter().rposition(|b| *b != 0xFF)?;
    let mut end = prefix[..=last].to_vec();
    end[last] += 1;
    Some(end)
}

/// One shard worth of a log read: clustering range `lo_from..=lo_to` in shard `hi`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRange {
    /// Shard part
    pub hi: u64,
    /// First in-shard part to read
    pub lo_from: u16,
    /// Last in-shard part to read (inclusive)
    pub lo_to: u16,
}

impl ShardRange {
    /// First offset of the range.
    pub fn first(&self) -> u64 {
        glue(self.hi, self.lo_from)
    }

    /// Last offset of the range.
    pub fn last(&self) -> u64 {
        glue(self.hi, self.lo_to)
    }

    /// Clustering start bound (inclusive).
    pub fn start_ccols(&self) -> Vec<u8> {
        lo_bytes(self.lo_from)
    }

    /// Clustering finish bound (exclusive); `None` when the range runs to
    /// the end of the shard.
    pub fn finish_ccols(&self) -> Option<Vec<u8>> {
        if self.lo_to >= LOW_MASK {
            None
        } else {
            Some(lo_bytes(self.lo_to + 1))
        }
    }
}

/// Iterator over the shard ranges covering a log read
///
/// Yields ranges in ascending order starting at the shard of the start
/// offset. For [`ReadCount::ToEnd`] the sequence is unbounded; the reader
/// stops when a shard yields nothing.
#[derive(Debug, Clone)]
pub struct ShardRanges {
    hi: u64,
    lo: u16,
    remaining: Option<u64>,
}

impl ShardRanges {
    /// Ranges for reading `count` entries starting at `start`.
    pub fn new(start: Offset, count: ReadCount) -> Self {
        let (hi, lo) = crack(start);
        let remaining = match count {
            ReadCount::Exactly(n) => Some(n),
            ReadCount::ToEnd => None,
        };
        Self { hi, lo, remaining }
    }
}

impl Iterator for ShardRanges {
    type Item = ShardRange;

    fn next(&mut self) -> Option<ShardRange> {
        let in_shard = u64::from(LOW_MASK - self.lo) + 1;
        let take = match self.remaining {
            Some(0) => return None,
            Some(n) => n.min(in_shard),
            None => in_shard,
        };
        let range = ShardRange {
            hi: self.hi,
            lo_from: self.lo,
            lo_to: self.lo + (take - 1) as u16,
        };
        if let Some(n) = self.remaining.as_mut() {
            *n -= take;
        }
        self.hi = self.hi.checked_add(1)?;
        self.lo = 0;
        Some(range)
    }
}
