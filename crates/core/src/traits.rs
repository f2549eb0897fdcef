//! Core trait definitions
//!
//! This module defines the storage collaborator seam:
//! - AppStorage: ordered key-value store of one application
//! - AppStorageProvider: hands out the store of an application
//!
//! Entries are addressed by a partition key and clustering columns. Inside
//! one partition entries are ordered by clustering columns bytewise.

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::types::AppQName;
use std::sync::Arc;

/// One item of a batch read inside a single partition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetBatchItem {
    /// Clustering columns to read
    pub ccols: Vec<u8>,
    /// Value read, `None` if the entry is absent
    pub data: Option<Vec<u8>>,
}

impl GetBatchItem {
    /// Creates an unread item.
    pub fn new(ccols: Vec<u8>) -> Self {
        Self { ccols, data: None }
    }
}

/// One item of a batch write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Partition key
    pub pkey: Vec<u8>,
    /// Clustering columns
    pub ccols: Vec<u8>,
    /// Value to store
    pub value: Vec<u8>,
}

/// Callback of a range read, called with clustering columns and value
pub type ReadCallback<'a> = dyn FnMut(&[u8], &[u8]) -> Result<()> + 'a;

/// Ordered key-value store of one application
///
/// Implementations must be safe for concurrent use from many threads.
/// All calls are blocking. Failures are reported as
/// [`Error::Storage`](crate::Error::Storage).
pub trait AppStorage: Send + Sync {
    /// Reads one value. `Ok(None)` if absent.
    fn get(&self, pkey: &[u8], ccols: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Reads several values of one partition, filling `items[i].data`.
    fn get_batch(&self, pkey: &[u8], items: &mut [GetBatchItem]) -> Result<()>;

    /// Writes one value.
    fn put(&self, pkey: &[u8], ccols: &[u8], value: &[u8]) -> Result<()>;

    /// Writes several values; atomic if the underlying engine is.
    fn put_batch(&self, items: &[BatchItem]) -> Result<()>;

    /// Reads the half-open clustering range `[start, finish)` of one
    /// partition in ascending order. `None` bounds are open.
    ///
    /// Stops without error when `cancel` is signalled; stops with the
    /// callback's error if the callback fails.
    fn read(
        &self,
        cancel: &CancelToken,
        pkey: &[u8],
        start: Option<&[u8]>,
        finish: Option<&[u8]>,
        cb: &mut ReadCallback<'_>,
    ) -> Result<()>;
}

/// Hands out the storage of an application
pub trait AppStorageProvider: Send + Sync {
    /// Returns the storage of `app`, creating it if needed.
    fn app_storage(&self, app: &AppQName) -> Result<Arc<dyn AppStorage>>;
}
