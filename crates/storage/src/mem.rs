//! MemStorage: in-memory ordered key-value store
//!
//! - `FxHashMap<pkey, BTreeMap<ccols, value>>` so a partition scan is an
//!   ordered BTreeMap range
//! - `parking_lot::RwLock` for thread-safe access
//! - Range reads copy the requested range under the read lock and run the
//!   callback after the lock is released, so callbacks may write back into
//!   the same store

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use appstruct_core::{AppStorage, BatchItem, CancelToken, GetBatchItem, ReadCallback, Result};

type Partition = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory storage of one application
#[derive(Debug, Default)]
pub struct MemStorage {
    data: RwLock<FxHashMap<Vec<u8>, Partition>>,
}

impl MemStorage {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries across all partitions
    pub fn len(&self) -> usize {
        self.data.read().values().map(|p| p.len()).sum()
    }

    /// Returns true if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of partitions
    pub fn partitions(&self) -> usize {
        self.data.read().len()
    }

    fn range(
        &self,
        pkey: &[u8],
        start: Option<&[u8]>,
        finish: Option<&[u8]>,
    ) -> Vec<(Vec<u8>, Vec<u8>)> {
        let data = self.data.read();
        let Some(partition) = data.get(pkey) else {
            return Vec::new();
        };
        let lower = match start {
            Some(s) => Bound::Included(s.to_vec()),
            None => Bound::Unbounded,
        };
        let upper = match finish {
            Some(f) => Bound::Excluded(f.to_vec()),
            None => Bound::Unbounded,
        };
        if let (Bound::Included(s), Bound::Excluded(f)) = (&lower, &upper) {
            // BTreeMap::range panics on inverted bounds
            if s >= f {
                return Vec::new();
            }
        }
        partition
            .range((lower, upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl AppStorage for MemStorage {
    fn get(&self, pkey: &[u8], ccols: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .data
            .read()
            .get(pkey)
            .and_then(|p| p.get(ccols))
            .cloned())
    }

    fn get_batch(&self, pkey: &[u8], items: &mut [GetBatchItem]) -> Result<()> {
        let data = self.data.read();
        let partition = data.get(pkey);
        for item in items.iter_mut() {
            item.data = partition.and_then(|p| p.get(&item.ccols)).cloned();
        }
        Ok(())
    }

    fn put(&self, pkey: &[u8], ccols: &[u8], value: &[u8]) -> Result<()> {
        self.data
            .write()
            .entry(pkey.to_vec())
            .or_default()
            .insert(ccols.to_vec(), value.to_vec());
        Ok(())
    }

    fn put_batch(&self, items: &[BatchItem]) -> Result<()> {
        let mut data = self.data.write();
        for item in items {
            data.entry(item.pkey.clone())
                .or_default()
                .insert(item.ccols.clone(), item.value.clone());
        }
        Ok(())
    }

    fn read(
        &self,
        cancel: &CancelToken,
        pkey: &[u8],
        start: Option<&[u8]>,
        finish: Option<&[u8]>,
        cb: &mut ReadCallback<'_>,
    ) -> Result<()> {
        let entries = self.range(pkey, start, finish);
        trace!(target: "appstruct::storage", entries = entries.len(), "range read");
        for (ccols, value) in entries {
            if cancel.is_cancelled() {
                break;
            }
            cb(&ccols, &value)?;
        }
        Ok(())
    }
}
