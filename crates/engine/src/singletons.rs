//! Singleton record IDs
//!
//! Each singleton document type owns one record ID per workspace, taken
//! from the reserved range `FIRST_SINGLETON_ID ..= MAX_SINGLETON_ID`. IDs
//! are assigned once, in name order of the first prepare that sees the
//! type, and persisted as `name → u64 id`.

use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

use appstruct_core::consts::{FIRST_SINGLETON_ID, MAX_SINGLETON_ID};
use appstruct_core::{AppStorage, Error, QName, RecordId, Result, SysView, VersionKey};

use crate::names::{name_str, NameIds, NameView};
use crate::versions::Versions;

const VIEW: NameView<QName> = NameView {
    view: SysView::SingletonIds,
    version_key: VersionKey::SysSingletons,
    decode,
    encode,
};

fn decode(ccols: &[u8], value: &[u8]) -> Result<Option<(QName, u64)>> {
    let name = name_str(ccols)?;
    let qname = QName::parse(name)
        .map_err(|e| Error::corrupt(format!("persisted singleton name «{}»: {}", name, e)))?;
    if value.len() != 8 {
        return Err(Error::corrupt(format!(
            "id of singleton «{}» has {} bytes",
            name,
            value.len()
        )));
    }
    let id = BigEndian::read_u64(value);
    if id < FIRST_SINGLETON_ID.as_u64() || id > MAX_SINGLETON_ID.as_u64() {
        return Err(Error::corrupt(format!(
            "singleton «{}» id {} is out of the singleton range",
            name, id
        )));
    }
    Ok(Some((qname, id)))
}

fn encode(qname: &QName, id: u64) -> (Vec<u8>, Vec<u8>) {
    let mut value = vec![0u8; 8];
    BigEndian::write_u64(&mut value, id);
    (qname.to_string().into_bytes(), value)
}

/// Singleton ID cache
#[derive(Debug, Clone)]
pub struct Singletons {
    ids: NameIds<QName>,
}

impl Singletons {
    /// Loads persisted IDs and assigns IDs to new singleton `names`.
    pub fn prepare<'a>(
        storage: &dyn AppStorage,
        versions: &mut Versions,
        names: impl IntoIterator<Item = &'a QName>,
    ) -> Result<Self> {
        let mut ids = NameIds::new(FIRST_SINGLETON_ID.as_u64() - 1, MAX_SINGLETON_ID.as_u64());
        VIEW.prepare(storage, versions, &mut ids, names)?;
        debug!(target: "appstruct::singletons", count = ids.len(), "singletons ready");
        Ok(Self { ids })
    }

    /// Record ID of a singleton type.
    ///
    /// # Errors
    ///
    /// `NameNotFound` if the type is not a registered singleton.
    pub fn id(&self, qname: &QName) -> Result<RecordId> {
        self.ids
            .id(qname)
            .map(RecordId)
            .ok_or_else(|| Error::NameNotFound(format!("singleton «{}»", qname)))
    }

    /// Singleton type of a record ID.
    ///
    /// # Errors
    ///
    /// `IdNotFound` if the ID is not a registered singleton ID.
    pub fn qname(&self, id: RecordId) -> Result<QName> {
        self.ids
            .name(id.as_u64())
            .cloned()
            .ok_or_else(|| Error::IdNotFound(format!("singleton id {}", id)))
    }
}
