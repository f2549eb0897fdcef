//! Versions cache
//!
//! Every system view records the codec version it was written with under a
//! key of the versions view. The whole view is read once at prepare; a key
//! that is absent reads as [`UNKNOWN_VERSION`], meaning the view was never
//! written and the latest codec applies.

use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, info};

use appstruct_core::consts::UNKNOWN_VERSION;
use appstruct_core::layout::{lo_from_bytes, version_ccols, versions_pkey};
use appstruct_core::{AppStorage, CancelToken, Error, Result, VersionKey};

fn version_key(raw: u16) -> Option<VersionKey> {
    match raw {
        1 => Some(VersionKey::SysQNames),
        2 => Some(VersionKey::SysContainers),
        3 => Some(VersionKey::SysSingletons),
        _ => None,
    }
}

/// Codec versions of system views
#[derive(Debug, Clone, Default)]
pub struct Versions {
    versions: BTreeMap<VersionKey, u16>,
}

impl Versions {
    /// Reads all version markers.
    ///
    /// # Errors
    ///
    /// Storage errors propagate; a malformed marker is `CorruptData`.
    pub fn load(storage: &dyn AppStorage) -> Result<Self> {
        let mut versions = BTreeMap::new();
        storage
            .read(
                &CancelToken::new(),
                &versions_pkey(),
                None,
                None,
                &mut |ccols, value| {
                    let raw = lo_from_bytes(ccols).ok_or_else(|| {
                        Error::corrupt(format!("version key of {} bytes", ccols.len()))
                    })?;
                    if value.len() != 2 {
                        return Err(Error::corrupt(format!(
                            "version value of {} bytes under key {}",
                            value.len(),
                            raw
                        )));
                    }
                    let version = BigEndian::read_u16(value);
                    match version_key(raw) {
                        Some(key) => {
                            versions.insert(key, version);
                        }
                        None => {
                            debug!(target: "appstruct::versions", key = raw, version, "unknown version key skipped");
                        }
                    }
                    Ok(())
                },
            )
            .map_err(|e| e.in_context("load versions"))?;

        info!(target: "appstruct::versions", count = versions.len(), "versions loaded");
        Ok(Self { versions })
    }

    /// Version of a view; [`UNKNOWN_VERSION`] if never written.
    pub fn get(&self, key: VersionKey) -> u16 {
        self.versions.get(&key).copied().unwrap_or(UNKNOWN_VERSION)
    }

    /// Writes a version marker through to storage, then caches it.
    pub fn put(&mut self, storage: &dyn AppStorage, key: VersionKey, version: u16) -> Result<()> {
        let mut value = [0u8; 2];
        BigEndian::write_u16(&mut value, version);
        storage
            .put(&versions_pkey(), &version_ccols(key), &value)
            .map_err(|e| e.in_context("put version"))?;
        self.versions.insert(key, version);
        info!(target: "appstruct::versions", view = key.view_name(), version, "version stored");
        Ok(())
    }
}
