//! Container name IDs
//!
//! Same scheme as qualified names: a 16-bit ID per container name, the
//! empty name is 0, IDs up to [`CONTAINER_ID_SYS_LAST`] are reserved.

use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

use appstruct_core::consts::{CONTAINER_ID_SYS_LAST, MAX_CONTAINER_ID, NULL_CONTAINER_ID};
use appstruct_core::{validate_ident, AppStorage, ContainerId, Error, Result, SysView, VersionKey};

use crate::names::{name_str, NameIds, NameView};
use crate::versions::Versions;

const VIEW: NameView<String> = NameView {
    view: SysView::Containers,
    version_key: VersionKey::SysContainers,
    decode,
    encode,
};

fn decode(ccols: &[u8], value: &[u8]) -> Result<Option<(String, u64)>> {
    let name = name_str(ccols)?;
    validate_ident(name)
        .map_err(|e| Error::corrupt(format!("persisted container name «{}»: {}", name, e)))?;
    if value.len() != 2 {
        return Err(Error::corrupt(format!(
            "id of container «{}» has {} bytes",
            name,
            value.len()
        )));
    }
    let id = BigEndian::read_u16(value);
    if id <= CONTAINER_ID_SYS_LAST {
        return Err(Error::corrupt(format!(
            "container «{}» has reserved system id {}",
            name, id
        )));
    }
    Ok(Some((name.to_string(), u64::from(id))))
}

#[allow(clippy::ptr_arg)]
fn encode(name: &String, id: u64) -> (Vec<u8>, Vec<u8>) {
    let mut value = vec![0u8; 2];
    BigEndian::write_u16(&mut value, id as ContainerId);
    (name.as_bytes().to_vec(), value)
}

/// Container name cache
#[derive(Debug, Clone)]
pub struct Containers {
    ids: NameIds<String>,
}

impl Containers {
    /// Loads persisted IDs and assigns IDs to new `names`.
    pub fn prepare<'a>(
        storage: &dyn AppStorage,
        versions: &mut Versions,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let mut ids = NameIds::new(u64::from(CONTAINER_ID_SYS_LAST), u64::from(MAX_CONTAINER_ID));
        ids.reserve(String::new(), u64::from(NULL_CONTAINER_ID));

        let names: Vec<String> = names.into_iter().map(str::to_string).collect();
        VIEW.prepare(storage, versions, &mut ids, &names)?;
        debug!(target: "appstruct::containers", count = ids.len(), "containers ready");
        Ok(Self { ids })
    }

    /// ID of a container name.
    ///
    /// # Errors
    ///
    /// `NameNotFound` if the name is not registered.
    pub fn id(&self, name: &str) -> Result<ContainerId> {
        self.ids
            .id(&name.to_string())
            .map(|id| id as ContainerId)
            .ok_or_else(|| Error::NameNotFound(format!("container «{}»", name)))
    }

    /// Container name of an ID.
    ///
    /// # Errors
    ///
    /// `IdNotFound` if the ID is not registered.
    pub fn name(&self, id: ContainerId) -> Result<&str> {
        self.ids
            .name(u64::from(id))
            .map(String::as_str)
            .ok_or_else(|| Error::IdNotFound(format!("container id {}", id)))
    }
}
