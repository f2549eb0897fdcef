//! Application definition model
//!
//! The definition is an input to this crate: types with fields, containers
//! and uniqueness declarations, assembled in code with [`AppDefBuilder`].
//!
//! System fields are implied by the type kind:
//!
//! | Kind                       | sys.ID | sys.ParentID | sys.Container | sys.IsActive |
//! |----------------------------|--------|--------------|---------------|--------------|
//! | GDoc, CDoc, WDoc           | yes    |              |               | yes          |
//! | ODoc                       | yes    |              |               |              |
//! | GRecord, CRecord, WRecord  | yes    | yes          | yes           | yes          |
//! | ORecord                    | yes    | yes          | yes           |              |
//! | Object                     |        | yes          | yes           |              |
//! | Command, Query, ViewRecord |        |              |               |              |
//!
//! A view record type has a key split into partition fields and clustering
//! fields; its plain fields form the view value.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use appstruct_core::consts::{
    SYS_FIELD_CONTAINER, SYS_FIELD_ID, SYS_FIELD_IS_ACTIVE, SYS_FIELD_PARENT_ID, SYS_FIELD_QNAME,
};
use appstruct_core::{validate_ident, Error, QName, Result};

/// Kind of field data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// Byte string
    Bytes,
    /// UTF-8 string
    String,
    /// Qualified name
    QName,
    /// Boolean
    Bool,
    /// Record reference
    RecordId,
}

impl DataKind {
    /// Returns true for kinds stored in a fixed number of bytes.
    pub fn is_fixed_width(self) -> bool {
        !matches!(self, DataKind::Bytes | DataKind::String)
    }
}

/// Kind of type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Global document
    GDoc,
    /// Configuration document
    CDoc,
    /// Workflow document
    WDoc,
    /// Operation document
    ODoc,
    /// Global record
    GRecord,
    /// Configuration record
    CRecord,
    /// Workflow record
    WRecord,
    /// Operation record
    ORecord,
    /// Object (command arguments)
    Object,
    /// Command function
    Command,
    /// Query function
    Query,
    /// View record (projection)
    ViewRecord,
}

/// System fields carried by a type kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SysFields {
    /// `sys.ID`
    pub id: bool,
    /// `sys.ParentID`
    pub parent_id: bool,
    /// `sys.Container`
    pub container: bool,
    /// `sys.IsActive`
    pub is_active: bool,
}

impl TypeKind {
    /// System fields of this kind.
    pub fn sys_fields(self) -> SysFields {
        use TypeKind::*;
        match self {
            GDoc | CDoc | WDoc => SysFields {
                id: true,
                is_active: true,
                ..SysFields::default()
            },
            ODoc => SysFields {
                id: true,
                ..SysFields::default()
            },
            GRecord | CRecord | WRecord => SysFields {
                id: true,
                parent_id: true,
                container: true,
                is_active: true,
            },
            ORecord => SysFields {
                id: true,
                parent_id: true,
                container: true,
                is_active: false,
            },
            Object => SysFields {
                parent_id: true,
                container: true,
                ..SysFields::default()
            },
            Command | Query | ViewRecord => SysFields::default(),
        }
    }

    /// Documents: GDoc, CDoc, WDoc, ODoc.
    pub fn is_document(self) -> bool {
        matches!(self, TypeKind::GDoc | TypeKind::CDoc | TypeKind::WDoc | TypeKind::ODoc)
    }

    /// Records: GRecord, CRecord, WRecord, ORecord.
    pub fn is_record(self) -> bool {
        matches!(
            self,
            TypeKind::GRecord | TypeKind::CRecord | TypeKind::WRecord | TypeKind::ORecord
        )
    }

    /// Kinds stored in the records view.
    pub fn is_storable(self) -> bool {
        matches!(
            self,
            TypeKind::GDoc
                | TypeKind::CDoc
                | TypeKind::WDoc
                | TypeKind::GRecord
                | TypeKind::CRecord
                | TypeKind::WRecord
        )
    }

    /// Kinds allowed in event CUDs.
    pub fn allowed_in_cuds(self) -> bool {
        self.is_storable() || self == TypeKind::ODoc
    }

    /// Kinds that may declare fields and containers.
    pub fn is_structure(self) -> bool {
        self.is_document() || self.is_record() || self == TypeKind::Object
    }

    /// Command or query.
    pub fn is_function(self) -> bool {
        matches!(self, TypeKind::Command | TypeKind::Query)
    }

    /// Kinds that may declare plain fields.
    pub fn has_fields(self) -> bool {
        self.is_structure() || self == TypeKind::ViewRecord
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Kind of out-of-band verification a field accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationKind {
    /// E-mail confirmation
    Email,
    /// Phone confirmation
    Phone,
}

/// User field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Data kind
    pub kind: DataKind,
    /// Value must be present
    pub required: bool,
    /// Verification kinds accepted; empty if the field is not verified
    pub verify: Vec<VerificationKind>,
    /// Allowed reference targets of a `RecordId` field; empty means any
    pub refs: Vec<QName>,
}

impl FieldDef {
    fn new(name: &str, kind: DataKind, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required,
            verify: Vec::new(),
            refs: Vec::new(),
        }
    }

    /// Returns true if the value is stored in a fixed number of bytes.
    pub fn is_fixed_width(&self) -> bool {
        self.kind.is_fixed_width()
    }

    /// Returns true if values must be passed as verification tokens.
    pub fn is_verifiable(&self) -> bool {
        !self.verify.is_empty()
    }

    /// Returns true if a reference to a record of `target` is allowed.
    pub fn ref_allowed(&self, target: &QName) -> bool {
        self.refs.is_empty() || self.refs.contains(target)
    }
}

/// Container of child elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDef {
    /// Container name
    pub name: String,
    /// Type of children
    pub qname: QName,
    /// Minimum number of children
    pub min_occurs: u16,
    /// Maximum number of children
    pub max_occurs: u16,
}

/// Uniqueness declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueDef {
    /// Declaration name
    pub name: String,
    /// Fields forming the unique key
    pub fields: Vec<String>,
}

/// Type definition
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    qname: QName,
    kind: TypeKind,
    fields: Vec<FieldDef>,
    containers: Vec<ContainerDef>,
    uniques: Vec<UniqueDef>,
    singleton: bool,
    partition: Vec<FieldDef>,
    clustering: Vec<FieldDef>,
}

impl TypeDef {
    /// Creates an empty type.
    pub fn new(qname: QName, kind: TypeKind) -> Self {
        Self {
            qname,
            kind,
            fields: Vec::new(),
            containers: Vec::new(),
            uniques: Vec::new(),
            singleton: false,
            partition: Vec::new(),
            clustering: Vec::new(),
        }
    }

    /// Creates an empty view record type.
    pub fn view(qname: QName) -> Self {
        Self::new(qname, TypeKind::ViewRecord)
    }

    /// Adds a field.
    pub fn field(mut self, name: &str, kind: DataKind, required: bool) -> Self {
        self.fields.push(FieldDef::new(name, kind, required));
        self
    }

    /// Adds a partition key field of a view.
    pub fn partition_field(mut self, name: &str, kind: DataKind) -> Self {
        self.partition.push(FieldDef::new(name, kind, true));
        self
    }

    /// Adds a clustering column of a view.
    pub fn clustering_field(mut self, name: &str, kind: DataKind) -> Self {
        self.clustering.push(FieldDef::new(name, kind, true));
        self
    }

    /// Adds a `RecordId` field restricted to the given targets.
    pub fn ref_field(mut self, name: &str, required: bool, refs: &[QName]) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            kind: DataKind::RecordId,
            required,
            verify: Vec::new(),
            refs: refs.to_vec(),
        });
        self
    }

    /// Adds a field whose values must be verification tokens.
    pub fn verified_field(
        mut self,
        name: &str,
        kind: DataKind,
        required: bool,
        verify: &[VerificationKind],
    ) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            kind,
            required,
            verify: verify.to_vec(),
            refs: Vec::new(),
        });
        self
    }

    /// Adds a container.
    pub fn container(mut self, name: &str, qname: QName, min_occurs: u16, max_occurs: u16) -> Self {
        self.containers.push(ContainerDef {
            name: name.to_string(),
            qname,
            min_occurs,
            max_occurs,
        });
        self
    }

    /// Adds a uniqueness declaration.
    pub fn unique(mut self, name: &str, fields: &[&str]) -> Self {
        self.uniques.push(UniqueDef {
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    /// Marks the type as singleton.
    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    /// Type name.
    pub fn qname(&self) -> &QName {
        &self.qname
    }

    /// Type kind.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// User fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// User field by name.
    pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Index of a user field, used by the row codec.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Containers in declaration order.
    pub fn containers(&self) -> &[ContainerDef] {
        &self.containers
    }

    /// Container by name.
    pub fn container_def(&self, name: &str) -> Option<&ContainerDef> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// Uniqueness declarations.
    pub fn uniques(&self) -> &[UniqueDef] {
        &self.uniques
    }

    /// Returns true for singleton documents.
    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    /// Returns true if `name` is a system field of this type.
    pub fn has_sys_field(&self, name: &str) -> bool {
        let sys = self.kind.sys_fields();
        match name {
            SYS_FIELD_QNAME => true,
            SYS_FIELD_ID => sys.id,
            SYS_FIELD_PARENT_ID => sys.parent_id,
            SYS_FIELD_CONTAINER => sys.container,
            SYS_FIELD_IS_ACTIVE => sys.is_active,
            _ => false,
        }
    }

    /// Partition key fields of a view, in key order.
    pub fn partition_fields(&self) -> &[FieldDef] {
        &self.partition
    }

    /// Clustering columns of a view, in key order.
    pub fn clustering_fields(&self) -> &[FieldDef] {
        &self.clustering
    }

    /// Reference fields (`RecordId` user fields).
    pub fn ref_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.kind == DataKind::RecordId)
    }
}

/// Application definition: all types by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppDef {
    types: BTreeMap<QName, TypeDef>,
}

impl AppDef {
    /// Type by name.
    pub fn type_def(&self, qname: &QName) -> Option<&TypeDef> {
        self.types.get(qname)
    }

    /// All types ordered by name.
    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    /// Names of all types ordered by name.
    pub fn qnames(&self) -> impl Iterator<Item = &QName> {
        self.types.keys()
    }

    /// Singleton types ordered by name.
    pub fn singletons(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values().filter(|t| t.singleton)
    }

    /// Distinct container names ordered by name.
    pub fn container_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .types
            .values()
            .flat_map(|t| t.containers.iter().map(|c| c.name.as_str()))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Checks every uniqueness declaration.
    ///
    /// A declaration needs at least one field; its fields must exist, be
    /// required and not repeat; its type must be a document or record;
    /// declaration names must not repeat within a type.
    pub fn validate_uniques(&self) -> Result<()> {
        for t in self.types.values() {
            if t.uniques.is_empty() {
                continue;
            }
            if !(t.kind.is_document() || t.kind.is_record()) {
                return Err(Error::invalid_argument(format!(
                    "{} «{}» can not declare uniques",
                    t.kind, t.qname
                )));
            }
            let mut names = HashSet::new();
            for u in &t.uniques {
                if !names.insert(u.name.as_str()) {
                    return Err(Error::invalid_argument(format!(
                        "«{}» declares unique «{}» twice",
                        t.qname, u.name
                    )));
                }
                if u.fields.is_empty() {
                    return Err(Error::invalid_argument(format!(
                        "unique «{}» of «{}» has no fields",
                        u.name, t.qname
                    )));
                }
                let mut seen = HashSet::new();
                for f in &u.fields {
                    if !seen.insert(f.as_str()) {
                        return Err(Error::invalid_argument(format!(
                            "unique «{}» of «{}» repeats field «{}»",
                            u.name, t.qname, f
                        )));
                    }
                    match t.field_def(f) {
                        None => {
                            return Err(Error::NameNotFound(format!(
                                "unique «{}» of «{}» refers to unknown field «{}»",
                                u.name, t.qname, f
                            )))
                        }
                        Some(fd) if !fd.required => {
                            return Err(Error::invalid_argument(format!(
                                "unique «{}» of «{}» field «{}» must be required",
                                u.name, t.qname, f
                            )))
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        Ok(())
    }
}

/// Builder of [`AppDef`]
#[derive(Debug, Default)]
pub struct AppDefBuilder {
    types: Vec<TypeDef>,
}

impl AppDefBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a type.
    pub fn add(&mut self, t: TypeDef) -> &mut Self {
        self.types.push(t);
        self
    }

    /// Checks names and cross references and returns the definition.
    ///
    /// Uniqueness declarations are checked later, when an application is
    /// prepared.
    pub fn build(&mut self) -> Result<AppDef> {
        let mut types = BTreeMap::new();
        for t in self.types.drain(..) {
            if t.qname.is_null() {
                return Err(Error::InvalidName("type name is empty".to_string()));
            }
            t.qname.validate()?;
            if types.contains_key(&t.qname) {
                return Err(Error::UniqueViolation(format!("type «{}» declared twice", t.qname)));
            }
            types.insert(t.qname.clone(), t);
        }

        for t in types.values() {
            check_members(t, &types)?;
        }

        Ok(AppDef { types })
    }
}

fn check_members(t: &TypeDef, types: &BTreeMap<QName, TypeDef>) -> Result<()> {
    if (!t.fields.is_empty() && !t.kind.has_fields())
        || (!t.containers.is_empty() && !t.kind.is_structure())
    {
        return Err(Error::invalid_argument(format!(
            "{} «{}» can not have fields or containers",
            t.kind, t.qname
        )));
    }
    if t.kind == TypeKind::ViewRecord {
        check_view_key(t)?;
    } else if !t.partition.is_empty() || !t.clustering.is_empty() {
        return Err(Error::invalid_argument(format!(
            "{} «{}» can not have key fields",
            t.kind, t.qname
        )));
    }
    if t.singleton && !matches!(t.kind, TypeKind::CDoc | TypeKind::WDoc) {
        return Err(Error::invalid_argument(format!(
            "{} «{}» can not be singleton",
            t.kind, t.qname
        )));
    }

    let mut names: HashSet<&str> = t
        .partition
        .iter()
        .chain(&t.clustering)
        .map(|f| f.name.as_str())
        .collect();
    for f in &t.fields {
        validate_ident(&f.name)?;
        if !names.insert(f.name.as_str()) {
            return Err(Error::UniqueViolation(format!(
                "field «{}» of «{}» declared twice",
                f.name, t.qname
            )));
        }
        if f.is_verifiable() && (f.kind == DataKind::RecordId || t.kind == TypeKind::ViewRecord) {
            return Err(Error::invalid_argument(format!(
                "field «{}» of «{}» can not be verified",
                f.name, t.qname
            )));
        }
        for r in &f.refs {
            if !types.contains_key(r) {
                return Err(Error::NameNotFound(format!(
                    "field «{}» of «{}» refers to unknown type «{}»",
                    f.name, t.qname, r
                )));
            }
        }
    }

    let mut conts = HashSet::new();
    for c in &t.containers {
        validate_ident(&c.name)?;
        if !conts.insert(c.name.as_str()) {
            return Err(Error::UniqueViolation(format!(
                "container «{}» of «{}» declared twice",
                c.name, t.qname
            )));
        }
        if c.min_occurs > c.max_occurs {
            return Err(Error::invalid_argument(format!(
                "container «{}» of «{}» has min occurs {} > max occurs {}",
                c.name, t.qname, c.min_occurs, c.max_occurs
            )));
        }
        if !types.contains_key(&c.qname) {
            return Err(Error::NameNotFound(format!(
                "container «{}» of «{}» refers to unknown type «{}»",
                c.name, t.qname, c.qname
            )));
        }
    }
    Ok(())
}

/// A view key needs partition fields and clustering columns. Partition
/// fields are fixed width; only the last clustering column may be variable
/// width.
fn check_view_key(t: &TypeDef) -> Result<()> {
    if t.partition.is_empty() || t.clustering.is_empty() {
        return Err(Error::invalid_argument(format!(
            "view «{}» needs partition key fields and clustering columns",
            t.qname
        )));
    }
    let mut names = HashSet::new();
    for f in t.partition.iter().chain(&t.clustering) {
        validate_ident(&f.name)?;
        if !names.insert(f.name.as_str()) {
            return Err(Error::UniqueViolation(format!(
                "key field «{}» of view «{}» declared twice",
                f.name, t.qname
            )));
        }
    }
    if let Some(f) = t.partition.iter().find(|f| !f.is_fixed_width()) {
        return Err(Error::invalid_argument(format!(
            "partition key field «{}» of view «{}» must be fixed width, not {:?}",
            f.name, t.qname, f.kind
        )));
    }
    let last = t.clustering.len() - 1;
    if let Some(f) = t.clustering[..last].iter().find(|f| !f.is_fixed_width()) {
        return Err(Error::invalid_argument(format!(
            "{:?} clustering column «{}» of view «{}» must be the last one",
            f.kind, f.name, t.qname
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(e: &str) -> QName {
        QName::new("test", e)
    }

    #[test]
    fn test_sys_fields_by_kind() {
        assert!(TypeKind::CDoc.sys_fields().is_active);
        assert!(!TypeKind::ODoc.sys_fields().is_active);
        assert!(TypeKind::ORecord.sys_fields().parent_id);
        assert!(!TypeKind::ORecord.sys_fields().is_active);
        assert!(!TypeKind::Object.sys_fields().id);
        assert_eq!(TypeKind::Command.sys_fields(), SysFields::default());
    }

    #[test]
    fn test_build_and_lookup() {
        let def = AppDefBuilder::new()
            .add(
                TypeDef::new(q("Doc"), TypeKind::CDoc)
                    .field("name", DataKind::String, true)
                    .container("rec", q("Rec"), 0, 10),
            )
            .add(TypeDef::new(q("Rec"), TypeKind::CRecord).ref_field("doc", false, &[q("Doc")]))
            .build()
            .unwrap();

        let doc = def.type_def(&q("Doc")).unwrap();
        assert_eq!(doc.kind(), TypeKind::CDoc);
        assert_eq!(doc.field_index("name"), Some(0));
        assert!(doc.container_def("rec").is_some());
        assert!(doc.has_sys_field("sys.IsActive"));
        assert!(!doc.has_sys_field("sys.ParentID"));
        assert_eq!(def.container_names(), vec!["rec"]);
        assert_eq!(def.qnames().count(), 2);
    }

    #[test]
    fn test_build_rejects_unknown_container_type() {
        let err = AppDefBuilder::new()
            .add(TypeDef::new(q("Doc"), TypeKind::CDoc).container("rec", q("Missing"), 0, 1))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::NameNotFound(_)));
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let err = AppDefBuilder::new()
            .add(TypeDef::new(q("Doc"), TypeKind::CDoc))
            .add(TypeDef::new(q("Doc"), TypeKind::WDoc))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UniqueViolation(_)));

        let err = AppDefBuilder::new()
            .add(
                TypeDef::new(q("Doc"), TypeKind::CDoc)
                    .field("a", DataKind::Int32, false)
                    .field("a", DataKind::Int64, false),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UniqueViolation(_)));
    }

    #[test]
    fn test_build_rejects_bad_names() {
        assert!(AppDefBuilder::new()
            .add(TypeDef::new(QName::new("test", "1bad"), TypeKind::CDoc))
            .build()
            .is_err());
        assert!(AppDefBuilder::new()
            .add(TypeDef::new(q("Doc"), TypeKind::CDoc).field("bad-name", DataKind::Int32, false))
            .build()
            .is_err());
    }

    #[test]
    fn test_singleton_kinds() {
        assert!(AppDefBuilder::new()
            .add(TypeDef::new(q("S"), TypeKind::CDoc).singleton())
            .build()
            .is_ok());
        assert!(AppDefBuilder::new()
            .add(TypeDef::new(q("S"), TypeKind::ODoc).singleton())
            .build()
            .is_err());
    }

    #[test]
    fn test_validate_uniques() {
        let ok = AppDefBuilder::new()
            .add(
                TypeDef::new(q("Doc"), TypeKind::CDoc)
                    .field("a", DataKind::Int32, true)
                    .field("b", DataKind::String, true)
                    .unique("ab", &["a", "b"]),
            )
            .build()
            .unwrap();
        assert!(ok.validate_uniques().is_ok());

        let not_required = AppDefBuilder::new()
            .add(
                TypeDef::new(q("Doc"), TypeKind::CDoc)
                    .field("a", DataKind::Int32, false)
                    .unique("a", &["a"]),
            )
            .build()
            .unwrap();
        assert!(not_required.validate_uniques().is_err());

        let unknown = AppDefBuilder::new()
            .add(TypeDef::new(q("Doc"), TypeKind::CDoc).unique("x", &["x"]))
            .build()
            .unwrap();
        assert!(matches!(unknown.validate_uniques(), Err(Error::NameNotFound(_))));

        let empty = AppDefBuilder::new()
            .add(TypeDef::new(q("Doc"), TypeKind::CDoc).unique("none", &[]))
            .build()
            .unwrap();
        assert!(empty.validate_uniques().is_err());

        let repeated = AppDefBuilder::new()
            .add(
                TypeDef::new(q("Doc"), TypeKind::CDoc)
                    .field("a", DataKind::Int32, true)
                    .unique("aa", &["a", "a"]),
            )
            .build()
            .unwrap();
        assert!(repeated.validate_uniques().is_err());

        let object = AppDefBuilder::new()
            .add(
                TypeDef::new(q("Obj"), TypeKind::Object)
                    .field("a", DataKind::Int32, true)
                    .unique("a", &["a"]),
            )
            .build()
            .unwrap();
        assert!(object.validate_uniques().is_err());
    }

    #[test]
    fn test_view_definition() {
        let def = AppDefBuilder::new()
            .add(
                TypeDef::view(q("Sales"))
                    .partition_field("year", DataKind::Int32)
                    .clustering_field("month", DataKind::Int32)
                    .clustering_field("city", DataKind::String)
                    .field("total", DataKind::Float64, true),
            )
            .build()
            .unwrap();
        let view = def.type_def(&q("Sales")).unwrap();
        assert_eq!(view.kind(), TypeKind::ViewRecord);
        assert_eq!(view.partition_fields().len(), 1);
        assert_eq!(view.clustering_fields()[1].name, "city");
        assert_eq!(view.field_index("total"), Some(0));
        assert!(!view.has_sys_field("sys.ID"));
    }

    #[test]
    fn test_view_key_rules() {
        let build = |t: TypeDef| AppDefBuilder::new().add(t).build();

        // no clustering columns
        assert!(build(TypeDef::view(q("V")).partition_field("a", DataKind::Int32)).is_err());
        // variable width partition field
        assert!(build(
            TypeDef::view(q("V"))
                .partition_field("a", DataKind::String)
                .clustering_field("b", DataKind::Int32)
        )
        .is_err());
        // variable width clustering column before the last one
        assert!(build(
            TypeDef::view(q("V"))
                .partition_field("a", DataKind::Int32)
                .clustering_field("b", DataKind::Bytes)
                .clustering_field("c", DataKind::Int32)
        )
        .is_err());
        // value field named like a key field
        assert!(matches!(
            build(
                TypeDef::view(q("V"))
                    .partition_field("a", DataKind::Int32)
                    .clustering_field("b", DataKind::Int32)
                    .field("a", DataKind::Int32, false)
            ),
            Err(Error::UniqueViolation(_))
        ));
        // key fields outside views
        assert!(build(TypeDef::new(q("D"), TypeKind::CDoc).partition_field("a", DataKind::Int32)).is_err());
        // views hold no containers
        assert!(AppDefBuilder::new()
            .add(TypeDef::new(q("R"), TypeKind::CRecord))
            .add(
                TypeDef::view(q("V"))
                    .partition_field("a", DataKind::Int32)
                    .clustering_field("b", DataKind::Int32)
                    .container("r", q("R"), 0, 1)
            )
            .build()
            .is_err());
    }
}
