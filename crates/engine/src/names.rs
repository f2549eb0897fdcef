//! Name to ID maps shared by the qualified name, container name and
//! singleton caches
//!
//! A map is filled in three steps during prepare:
//!
//! 1. Reserved system names are registered with fixed IDs.
//! 2. Persisted pairs are loaded; the highest loaded ID becomes the
//!    high-water mark.
//! 3. Names of the application not seen yet get the first free ID above
//!    the high-water mark; new pairs are collected as changes to persist.
//!
//! After prepare the map is never mutated.

use std::hash::Hash;

use rustc_hash::FxHashMap;
use tracing::info;

use appstruct_core::consts::{UNKNOWN_VERSION, VERSION_01};
use appstruct_core::layout::names_pkey;
use appstruct_core::{AppStorage, BatchItem, CancelToken, Error, Result, SysView, VersionKey};

use crate::versions::Versions;

/// Bijective name to ID map with upward allocation
#[derive(Debug, Clone)]
pub(crate) struct NameIds<N> {
    by_name: FxHashMap<N, u64>,
    by_id: FxHashMap<u64, N>,
    last_id: u64,
    ceiling: u64,
    changes: Vec<(N, u64)>,
}

impl<N: Clone + Eq + Hash + std::fmt::Display> NameIds<N> {
    /// Map allocating IDs in `last_reserved + 1 ..= ceiling`.
    pub(crate) fn new(last_reserved: u64, ceiling: u64) -> Self {
        Self {
            by_name: FxHashMap::default(),
            by_id: FxHashMap::default(),
            last_id: last_reserved,
            ceiling,
            changes: Vec::new(),
        }
    }

    /// Registers a reserved system pair. Never persisted.
    pub(crate) fn reserve(&mut self, name: N, id: u64) {
        self.by_id.insert(id, name.clone());
        self.by_name.insert(name, id);
    }

    /// Registers a persisted pair.
    ///
    /// # Errors
    ///
    /// `CorruptData` if the name or the ID is already mapped.
    pub(crate) fn load(&mut self, name: N, id: u64) -> Result<()> {
        if let Some(other) = self.by_name.get(&name) {
            return Err(Error::corrupt(format!(
                "name «{}» mapped to both {} and {}",
                name, other, id
            )));
        }
        if let Some(other) = self.by_id.get(&id) {
            return Err(Error::corrupt(format!(
                "id {} mapped to both «{}» and «{}»",
                id, other, name
            )));
        }
        self.reserve(name, id);
        if id > self.last_id {
            self.last_id = id;
        }
        Ok(())
    }

    /// ID of `name`, allocating one if the name is new.
    ///
    /// # Errors
    ///
    /// `IdSpaceExhausted` if no free ID remains below the ceiling.
    pub(crate) fn get_or_allocate(&mut self, name: &N) -> Result<u64> {
        if let Some(id) = self.by_name.get(name) {
            return Ok(*id);
        }
        let mut id = self.last_id.saturating_add(1);
        while id <= self.ceiling {
            if !self.by_id.contains_key(&id) {
                self.reserve(name.clone(), id);
                self.last_id = id;
                self.changes.push((name.clone(), id));
                return Ok(id);
            }
            id += 1;
        }
        Err(Error::IdSpaceExhausted(format!(
            "no free id for «{}» above {} up to {}",
            name, self.last_id, self.ceiling
        )))
    }

    pub(crate) fn id(&self, name: &N) -> Option<u64> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn name(&self, id: u64) -> Option<&N> {
        self.by_id.get(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_name.len()
    }

    pub(crate) fn changes(&self) -> &[(N, u64)] {
        &self.changes
    }

    pub(crate) fn clear_changes(&mut self) {
        self.changes.clear();
    }
}

/// Reads every `(name bytes, id bytes)` pair of a name view.
pub(crate) fn read_view(
    storage: &dyn AppStorage,
    view: SysView,
    version: u16,
    cb: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>,
) -> Result<()> {
    storage.read(&CancelToken::new(), &names_pkey(view, version), None, None, cb)
}

/// Writes pairs of a name view in one batch.
pub(crate) fn write_view(
    storage: &dyn AppStorage,
    view: SysView,
    version: u16,
    pairs: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
) -> Result<()> {
    let pkey = names_pkey(view, version);
    let batch: Vec<BatchItem> = pairs
        .into_iter()
        .map(|(ccols, value)| BatchItem {
            pkey: pkey.clone(),
            ccols,
            value,
        })
        .collect();
    if batch.is_empty() {
        return Ok(());
    }
    storage.put_batch(&batch)
}

/// Persisted form of one name view
pub(crate) struct NameView<N> {
    pub(crate) view: SysView,
    pub(crate) version_key: VersionKey,
    /// Decodes a persisted pair; `None` skips a tombstone
    pub(crate) decode: fn(&[u8], &[u8]) -> Result<Option<(N, u64)>>,
    pub(crate) encode: fn(&N, u64) -> (Vec<u8>, Vec<u8>),
}

impl<N: Clone + Eq + Hash + std::fmt::Display> NameView<N> {
    /// Loads persisted pairs into `ids`, registers `names` and stores the
    /// newly allocated pairs.
    ///
    /// # Errors
    ///
    /// - `Version` if the view was written with an unknown codec
    /// - `CorruptData` if a persisted pair fails to decode
    /// - `IdSpaceExhausted` if a name can not get an ID
    /// - storage errors
    pub(crate) fn prepare<'a>(
        &self,
        storage: &dyn AppStorage,
        versions: &mut Versions,
        ids: &mut NameIds<N>,
        names: impl IntoIterator<Item = &'a N>,
    ) -> Result<()>
    where
        N: 'a,
    {
        let target = self.version_key.view_name();
        let version = versions.get(self.version_key);
        match version {
            UNKNOWN_VERSION => {}
            VERSION_01 => {
                let decode = self.decode;
                read_view(storage, self.view, version, &mut |ccols, value| {
                    if let Some((name, id)) = decode(ccols, value)? {
                        ids.load(name, id)?;
                    }
                    Ok(())
                })
                .map_err(|e| e.in_context(&format!("load {}", target)))?;
            }
            _ => {
                return Err(Error::Version {
                    view: target.to_string(),
                    version,
                })
            }
        }
        let loaded = ids.len();

        for name in names {
            ids.get_or_allocate(name)?;
        }

        let allocated = ids.changes().len();
        if allocated > 0 {
            let pairs = ids.changes().iter().map(|(n, id)| (self.encode)(n, *id));
            write_view(storage, self.view, VERSION_01, pairs)
                .map_err(|e| e.in_context(&format!("store {}", target)))?;
            if version != VERSION_01 {
                versions.put(storage, self.version_key, VERSION_01)?;
            }
            ids.clear_changes();
        }

        info!(target: "appstruct::names", view = target, loaded, allocated, "name view prepared");
        Ok(())
    }
}

/// Decodes a persisted name as UTF-8.
pub(crate) fn name_str(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::corrupt(format!("name is not UTF-8: {}", e)))
}
