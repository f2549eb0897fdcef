//! Qualified name IDs
//!
//! Maps every qualified name of an application to a 16-bit ID used in row
//! and event images. IDs up to [`QNAME_ID_SYS_LAST`] are reserved:
//!
//! | ID | Name          |
//! |----|---------------|
//! | 0  | null          |
//! | 1  | `sys.Error`   |
//! | 2  | `sys.CUD`     |
//! | 3  | `sys.Corrupted` |
//!
//! Persisted as `name → u16 id` in the qualified names view. An ID of 0
//! marks a name deleted by rename.

use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

use appstruct_core::consts::{
    MAX_QNAME_ID, NULL_QNAME_ID, QNAME_ID_COMMAND_CUD, QNAME_ID_FOR_CORRUPTED_DATA,
    QNAME_ID_FOR_ERROR, QNAME_ID_SYS_LAST,
};
use appstruct_core::{
    AppStorage, Error, QName, QNameId, Result, SysView, VersionKey, NULL_QNAME,
    QNAME_COMMAND_CUD, QNAME_FOR_CORRUPTED_DATA, QNAME_FOR_ERROR,
};

use crate::names::{name_str, NameIds, NameView};
use crate::versions::Versions;

pub(crate) const VIEW: NameView<QName> = NameView {
    view: SysView::QNames,
    version_key: VersionKey::SysQNames,
    decode,
    encode,
};

pub(crate) fn decode(ccols: &[u8], value: &[u8]) -> Result<Option<(QName, u64)>> {
    let name = name_str(ccols)?;
    let qname = QName::parse(name)
        .map_err(|e| Error::corrupt(format!("persisted qualified name «{}»: {}", name, e)))?;
    if value.len() != 2 {
        return Err(Error::corrupt(format!(
            "id of «{}» has {} bytes",
            name,
            value.len()
        )));
    }
    let id = BigEndian::read_u16(value);
    if id == NULL_QNAME_ID {
        return Ok(None);
    }
    if id <= QNAME_ID_SYS_LAST {
        return Err(Error::corrupt(format!(
            "«{}» has reserved system id {}",
            name, id
        )));
    }
    Ok(Some((qname, u64::from(id))))
}

pub(crate) fn encode(qname: &QName, id: u64) -> (Vec<u8>, Vec<u8>) {
    let mut value = vec![0u8; 2];
    BigEndian::write_u16(&mut value, id as QNameId);
    (qname.to_string().into_bytes(), value)
}

/// Qualified name cache
#[derive(Debug, Clone)]
pub struct QNames {
    ids: NameIds<QName>,
}

impl QNames {
    fn with_reserved() -> Self {
        let mut ids = NameIds::new(u64::from(QNAME_ID_SYS_LAST), u64::from(MAX_QNAME_ID));
        ids.reserve(NULL_QNAME, u64::from(NULL_QNAME_ID));
        ids.reserve(QNAME_FOR_ERROR, u64::from(QNAME_ID_FOR_ERROR));
        ids.reserve(QNAME_COMMAND_CUD, u64::from(QNAME_ID_COMMAND_CUD));
        ids.reserve(QNAME_FOR_CORRUPTED_DATA, u64::from(QNAME_ID_FOR_CORRUPTED_DATA));
        Self { ids }
    }

    /// Loads persisted IDs and assigns IDs to new `names`.
    pub fn prepare<'a>(
        storage: &dyn AppStorage,
        versions: &mut Versions,
        names: impl IntoIterator<Item = &'a QName>,
    ) -> Result<Self> {
        let mut cache = Self::with_reserved();
        VIEW.prepare(storage, versions, &mut cache.ids, names)?;
        debug!(target: "appstruct::qnames", count = cache.ids.len(), "qnames ready");
        Ok(cache)
    }

    /// ID of a qualified name.
    ///
    /// # Errors
    ///
    /// `NameNotFound` if the name is not registered.
    pub fn id(&self, qname: &QName) -> Result<QNameId> {
        self.ids
            .id(qname)
            .map(|id| id as QNameId)
            .ok_or_else(|| Error::NameNotFound(format!("qualified name «{}»", qname)))
    }

    /// Qualified name of an ID.
    ///
    /// # Errors
    ///
    /// `IdNotFound` if the ID is not registered.
    pub fn qname(&self, id: QNameId) -> Result<QName> {
        self.ids
            .name(u64::from(id))
            .cloned()
            .ok_or_else(|| Error::IdNotFound(format!("qualified name id {}", id)))
    }

    /// Number of registered names, system names included.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Always false: system names are always registered.
    pub fn is_empty(&self) -> bool {
        self.ids.len() == 0
    }
}
