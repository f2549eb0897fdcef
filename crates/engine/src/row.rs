//! Rows, records and the row builder
//!
//! - [`Row`]: qualified name, system fields and user field values
//! - [`Record`]: a row stored in (or destined for) the records view
//! - [`RowBuilder`]: fills a row field by field, collecting every put error
//!   instead of failing on the first one

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

use appstruct_core::consts::{
    SYS_FIELD_CONTAINER, SYS_FIELD_ID, SYS_FIELD_IS_ACTIVE, SYS_FIELD_PARENT_ID, SYS_FIELD_QNAME,
};
use appstruct_core::{QName, RecordId, ValidationCode, ValidationErrors, NULL_QNAME};

use crate::appdef::{AppDef, FieldDef, TypeDef};
use crate::tokens::AppTokens;
use crate::value::Value;

/// Row of field values
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub(crate) qname: QName,
    pub(crate) id: RecordId,
    pub(crate) parent: RecordId,
    pub(crate) container: String,
    pub(crate) is_active: bool,
    pub(crate) values: BTreeMap<String, Value>,
}

impl Row {
    /// Empty active row of the given type.
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            id: RecordId::NULL,
            parent: RecordId::NULL,
            container: String::new(),
            is_active: true,
            values: BTreeMap::new(),
        }
    }

    /// Type name.
    pub fn qname(&self) -> &QName {
        &self.qname
    }

    /// `sys.ID`
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// `sys.ParentID`
    pub fn parent(&self) -> RecordId {
        self.parent
    }

    /// `sys.Container`
    pub fn container(&self) -> &str {
        &self.container
    }

    /// `sys.IsActive`
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Value of a user field.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns true if a user field has a value.
    pub fn has_value(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// User field values ordered by name.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Int32 field value.
    pub fn as_int32(&self, name: &str) -> Option<i32> {
        match self.values.get(name) {
            Some(Value::Int32(v)) => Some(*v),
            _ => None,
        }
    }

    /// Int64 field value.
    pub fn as_int64(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(Value::Int64(v)) => Some(*v),
            _ => None,
        }
    }

    /// Float32 field value.
    pub fn as_float32(&self, name: &str) -> Option<f32> {
        match self.values.get(name) {
            Some(Value::Float32(v)) => Some(*v),
            _ => None,
        }
    }

    /// Float64 field value.
    pub fn as_float64(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(Value::Float64(v)) => Some(*v),
            _ => None,
        }
    }

    /// Bytes field value.
    pub fn as_bytes(&self, name: &str) -> Option<&[u8]> {
        match self.values.get(name) {
            Some(Value::Bytes(v)) => Some(v),
            _ => None,
        }
    }

    /// String field value.
    pub fn as_string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(Value::String(v)) => Some(v),
            _ => None,
        }
    }

    /// QName field value.
    pub fn as_qname(&self, name: &str) -> Option<&QName> {
        match self.values.get(name) {
            Some(Value::QName(v)) => Some(v),
            _ => None,
        }
    }

    /// Bool field value.
    pub fn as_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(Value::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    /// RecordId field value; null if absent.
    pub fn as_record_id(&self, name: &str) -> RecordId {
        match self.values.get(name) {
            Some(Value::RecordId(v)) => *v,
            _ => RecordId::NULL,
        }
    }

    /// Non-null record references held in user fields.
    pub fn record_ids(&self) -> impl Iterator<Item = (&str, RecordId)> {
        self.values.iter().filter_map(|(k, v)| match v {
            Value::RecordId(id) if !id.is_null() => Some((k.as_str(), *id)),
            _ => None,
        })
    }

    /// Replaces references listed in `plan`; returns true if any changed.
    pub(crate) fn remap_record_ids(&mut self, plan: &impl Fn(RecordId) -> Option<RecordId>) -> bool {
        let mut changed = false;
        for v in self.values.values_mut() {
            if let Value::RecordId(id) = v {
                if let Some(new) = plan(*id) {
                    *id = new;
                    changed = true;
                }
            }
        }
        changed
    }

    /// Replaces sensitive values: strings with `*`, bytes with a single `*`
    /// byte; other values are dropped.
    pub(crate) fn mask_values(&mut self) {
        self.values.retain(|_, v| match v {
            Value::String(s) => {
                *s = "*".to_string();
                true
            }
            Value::Bytes(b) => {
                *b = b"*".to_vec();
                true
            }
            _ => false,
        });
    }
}

impl Default for Row {
    fn default() -> Self {
        Row::new(NULL_QNAME)
    }
}

/// Stored row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record(Row);

impl Record {
    /// Null record: what a read returns when no record exists at `id`.
    pub fn null(id: RecordId) -> Self {
        let mut row = Row::new(NULL_QNAME);
        row.id = id;
        Record(row)
    }

    pub(crate) fn from_row(row: Row) -> Self {
        Record(row)
    }

    /// Returns true for the null record.
    pub fn is_null(&self) -> bool {
        self.0.qname.is_null()
    }

    /// Underlying row.
    pub fn row(&self) -> &Row {
        &self.0
    }

    pub(crate) fn row_mut(&mut self) -> &mut Row {
        &mut self.0
    }

    /// Consumes the record, returning its row.
    pub fn into_row(self) -> Row {
        self.0
    }
}

impl Deref for Record {
    type Target = Row;

    fn deref(&self) -> &Row {
        &self.0
    }
}

/// What a row builder needs from its application
#[derive(Clone)]
pub(crate) struct RowCtx {
    pub(crate) app_def: Arc<AppDef>,
    pub(crate) tokens: Arc<dyn AppTokens>,
}

/// Builder of one row
///
/// Put errors are collected; the build step returns them together with
/// the row.
pub struct RowBuilder {
    ctx: RowCtx,
    row: Row,
    errors: ValidationErrors,
}

impl RowBuilder {
    pub(crate) fn new(ctx: RowCtx, qname: QName) -> Self {
        let mut errors = ValidationErrors::new();
        if !qname.is_null() && ctx.app_def.type_def(&qname).is_none() {
            errors.push(
                ValidationCode::InvalidTypeName,
                format!("type «{}» not found", qname),
            );
        }
        Self {
            ctx,
            row: Row::new(qname),
            errors,
        }
    }

    pub(crate) fn from_row(ctx: RowCtx, row: Row) -> Self {
        Self {
            ctx,
            row,
            errors: ValidationErrors::new(),
        }
    }

    /// Type name of the row being built.
    pub fn qname(&self) -> &QName {
        &self.row.qname
    }

    /// Row as built so far.
    pub fn row(&self) -> &Row {
        &self.row
    }

    /// Puts a value into a user or system field.
    pub fn put(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        let app_def = Arc::clone(&self.ctx.app_def);
        let Some(t) = app_def.type_def(&self.row.qname) else {
            self.errors.push(
                ValidationCode::InvalidFieldName,
                format!("field «{}» put into row of unknown type «{}»", name, self.row.qname),
            );
            return self;
        };

        if t.has_sys_field(name) {
            self.put_sys(t, name, value);
            return self;
        }

        match t.field_def(name) {
            None => self.errors.push(
                ValidationCode::InvalidFieldName,
                format!("{} «{}» has no field «{}»", t.kind(), t.qname(), name),
            ),
            Some(f) if f.is_verifiable() => self.put_verified(t, f, value),
            Some(f) if f.kind != value.kind() => self.errors.push(
                ValidationCode::InvalidDataKind,
                format!(
                    "{} «{}» field «{}» is {:?}, but {:?} value put",
                    t.kind(),
                    t.qname(),
                    name,
                    f.kind,
                    value.kind()
                ),
            ),
            Some(_) => {
                self.row.values.insert(name.to_string(), value);
            }
        }
        self
    }

    /// Puts `sys.ID`.
    pub fn put_id(&mut self, id: RecordId) -> &mut Self {
        self.put(SYS_FIELD_ID, id)
    }

    /// Puts `sys.ParentID`.
    pub fn put_parent(&mut self, id: RecordId) -> &mut Self {
        self.put(SYS_FIELD_PARENT_ID, id)
    }

    /// Puts `sys.Container`.
    pub fn put_container(&mut self, name: &str) -> &mut Self {
        self.put(SYS_FIELD_CONTAINER, name)
    }

    /// Puts `sys.IsActive`.
    pub fn put_is_active(&mut self, active: bool) -> &mut Self {
        self.put(SYS_FIELD_IS_ACTIVE, active)
    }

    fn put_sys(&mut self, t: &TypeDef, name: &str, value: Value) {
        match (name, value) {
            (SYS_FIELD_ID, Value::RecordId(id)) => self.row.id = id,
            (SYS_FIELD_PARENT_ID, Value::RecordId(id)) => self.row.parent = id,
            (SYS_FIELD_CONTAINER, Value::String(c)) => self.row.container = c,
            (SYS_FIELD_IS_ACTIVE, Value::Bool(b)) => self.row.is_active = b,
            (SYS_FIELD_QNAME, _) => self.errors.push(
                ValidationCode::InvalidFieldName,
                format!("{} «{}» field «{}» can not be put", t.kind(), t.qname(), name),
            ),
            (_, v) => self.errors.push(
                ValidationCode::InvalidDataKind,
                format!(
                    "{} «{}» system field «{}» can not hold {:?} value",
                    t.kind(),
                    t.qname(),
                    name,
                    v.kind()
                ),
            ),
        }
    }

    fn put_verified(&mut self, t: &TypeDef, f: &FieldDef, value: Value) {
        let describe = |msg: &str| {
            format!(
                "{} «{}» verified field «{}»: {}",
                t.kind(),
                t.qname(),
                f.name,
                msg
            )
        };
        let Value::String(token) = value else {
            self.errors.push(
                ValidationCode::InvalidVerifiedValue,
                describe("value must be a verification token"),
            );
            return;
        };
        let payload = match self.ctx.tokens.validate_verified_value(&token) {
            Ok(p) => p,
            Err(e) => {
                self.errors
                    .push(ValidationCode::InvalidVerifiedValue, describe(&e.to_string()));
                return;
            }
        };
        if !f.verify.contains(&payload.verification_kind) {
            self.errors.push(
                ValidationCode::InvalidVerifiedValue,
                describe(&format!(
                    "verification kind {:?} is not allowed",
                    payload.verification_kind
                )),
            );
            return;
        }
        if &payload.entity != t.qname() || payload.field != f.name {
            self.errors.push(
                ValidationCode::InvalidVerifiedValue,
                describe(&format!(
                    "token verifies «{}» field «{}»",
                    payload.entity, payload.field
                )),
            );
            return;
        }
        match Value::from_json(f.kind, &payload.value) {
            Some(v) => {
                self.row.values.insert(f.name.clone(), v);
            }
            None => self.errors.push(
                ValidationCode::InvalidVerifiedValue,
                describe(&format!("token value does not fit {:?}", f.kind)),
            ),
        }
    }

    pub(crate) fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub(crate) fn ctx(&self) -> &RowCtx {
        &self.ctx
    }

    pub(crate) fn finish(self) -> (Row, ValidationErrors) {
        (self.row, self.errors)
    }
}
