//! Administrative rename of qualified names
//!
//! Works on a raw storage handle, not on a prepared application. The old
//! name is tombstoned (mapped to the null ID) and the new name takes over
//! its ID, both in one batch. Any prepared cache over the same storage is
//! stale afterwards and must be rebuilt.

use rustc_hash::FxHashMap;
use tracing::info;

use appstruct_core::consts::{NULL_QNAME_ID, UNKNOWN_VERSION, VERSION_01};
use appstruct_core::layout::names_pkey;
use appstruct_core::{
    AppStorage, BatchItem, Error, QName, Result, SysView, VersionKey,
};

use crate::names::{name_str, read_view};
use crate::qnames;
use crate::versions::Versions;

/// Renames `old` to `new`, keeping its ID.
///
/// # Errors
///
/// - `InvalidArgument` if the names are equal
/// - `InvalidName` if `new` is not a valid qualified name
/// - `NameNotFound` if no names are stored, `old` is unknown or `old` is
///   already deleted
/// - `UniqueViolation` if `new` already has a live ID
/// - `Version` if the names view uses an unknown codec
pub fn rename_qname(storage: &dyn AppStorage, old: &QName, new: &QName) -> Result<()> {
    if old == new {
        return Err(Error::invalid_argument(format!(
            "old and new names are equals «{}»",
            old
        )));
    }
    new.validate()?;

    let versions = Versions::load(storage)?;
    let version = versions.get(VersionKey::SysQNames);
    match version {
        VERSION_01 => {}
        UNKNOWN_VERSION => {
            return Err(Error::NameNotFound(
                "no qualified names stored".to_string(),
            ))
        }
        _ => {
            return Err(Error::Version {
                view: VersionKey::SysQNames.view_name().to_string(),
                version,
            })
        }
    }

    let mut names: FxHashMap<String, u16> = FxHashMap::default();
    read_view(storage, SysView::QNames, version, &mut |ccols, value| {
        let name = name_str(ccols)?;
        match qnames::decode(ccols, value)? {
            Some((_, id)) => names.insert(name.to_string(), id as u16),
            None => names.insert(name.to_string(), NULL_QNAME_ID),
        };
        Ok(())
    })
    .map_err(|e| e.in_context("rename"))?;

    let id = match names.get(&old.to_string()) {
        None => return Err(Error::NameNotFound(format!("old qualified name «{}»", old))),
        Some(&NULL_QNAME_ID) => {
            return Err(Error::NameNotFound(format!(
                "old qualified name «{}» already deleted",
                old
            )))
        }
        Some(&id) => id,
    };
    if let Some(&other) = names.get(&new.to_string()) {
        if other != NULL_QNAME_ID {
            return Err(Error::UniqueViolation(format!(
                "new qualified name «{}» exists with id {}",
                new, other
            )));
        }
    }

    let pkey = names_pkey(SysView::QNames, version);
    let (old_ccols, tombstone) = qnames::encode(old, u64::from(NULL_QNAME_ID));
    let (new_ccols, value) = qnames::encode(new, u64::from(id));
    storage
        .put_batch(&[
            BatchItem {
                pkey: pkey.clone(),
                ccols: old_ccols,
                value: tombstone,
            },
            BatchItem {
                pkey,
                ccols: new_ccols,
                value,
            },
        ])
        .map_err(|e| e.in_context("rename"))?;

    info!(target: "appstruct::rename", %old, %new, id, "qualified name renamed");
    Ok(())
}
