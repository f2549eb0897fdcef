//! View records
//!
//! A view record type keys its values by partition key fields and
//! clustering columns. A record lives under [`view_pkey_prefix`] followed
//! by the encoded partition fields; its clustering columns are the encoded
//! clustering fields. Values use the record image codec.
//!
//! Key fields are encoded so that bytewise order matches value order:
//! integers big-endian with the sign bit flipped, floats in their
//! order-preserving bit form, and the trailing variable width column as raw
//! bytes. A read takes a key with every partition field and a leading run of
//! clustering columns, and returns the records whose clustering columns
//! start with the given ones.

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use rustc_hash::FxHashMap;
use tracing::debug;

use appstruct_core::consts::MAX_GET_BATCH_RECORD_COUNT;
use appstruct_core::layout::{prefix_end, view_pkey_prefix};
use appstruct_core::{
    BatchItem, CancelToken, Error, GetBatchItem, QName, RecordId, Result, ValidationCode,
    ValidationErrors, WsId,
};

use crate::app::AppContext;
use crate::appdef::{AppDef, DataKind, FieldDef, TypeDef, TypeKind};
use crate::row::{Row, RowBuilder, RowCtx};
use crate::validate::validate_row;
use crate::value::Value;

const SIGN_32: u32 = 1 << 31;
const SIGN_64: u64 = 1 << 63;

fn view_type<'a>(app_def: &'a AppDef, view: &QName) -> Option<&'a TypeDef> {
    app_def
        .type_def(view)
        .filter(|t| t.kind() == TypeKind::ViewRecord)
}

fn type_errors(app_def: &AppDef, view: &QName) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    match app_def.type_def(view) {
        None => errors.push(
            ValidationCode::InvalidTypeName,
            format!("view «{}» not found", view),
        ),
        Some(t) if t.kind() != TypeKind::ViewRecord => errors.push(
            ValidationCode::InvalidTypeKind,
            format!("{} «{}» is not a view", t.kind(), view),
        ),
        Some(_) => {}
    }
    errors
}

/// Builder of a view record key
///
/// Fields go to the partition key or the clustering columns by the view
/// definition. Put errors are collected and reported by the view operation
/// using the key.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    app_def: Arc<AppDef>,
    key: Row,
    errors: ValidationErrors,
}

impl KeyBuilder {
    pub(crate) fn new(app_def: Arc<AppDef>, view: QName) -> Self {
        let errors = type_errors(&app_def, &view);
        Self {
            app_def,
            key: Row::new(view),
            errors,
        }
    }

    /// View name.
    pub fn view(&self) -> &QName {
        &self.key.qname
    }

    /// Key fields put so far.
    pub fn key(&self) -> &Row {
        &self.key
    }

    /// Puts a partition key field or a clustering column.
    pub fn put(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        let app_def = Arc::clone(&self.app_def);
        let Some(t) = view_type(&app_def, &self.key.qname) else {
            return self;
        };
        let field = t
            .partition_fields()
            .iter()
            .chain(t.clustering_fields())
            .find(|f| f.name == name);
        match field {
            None => self.errors.push(
                ValidationCode::InvalidFieldName,
                format!("view «{}» key has no field «{}»", t.qname(), name),
            ),
            Some(f) if f.kind != value.kind() => self.errors.push(
                ValidationCode::InvalidDataKind,
                format!(
                    "view «{}» key field «{}» is {:?}, but {:?} value put",
                    t.qname(),
                    name,
                    f.kind,
                    value.kind()
                ),
            ),
            Some(_) => {
                self.key.values.insert(name.to_string(), value);
            }
        }
        self
    }
}

/// Builder of a view record value
pub struct ValueBuilder {
    row: RowBuilder,
    errors: ValidationErrors,
}

impl ValueBuilder {
    fn new(ctx: RowCtx, view: QName) -> Self {
        let mut errors = ValidationErrors::new();
        if let Some(t) = ctx.app_def.type_def(&view) {
            if t.kind() != TypeKind::ViewRecord {
                errors.push(
                    ValidationCode::InvalidTypeKind,
                    format!("{} «{}» is not a view", t.kind(), view),
                );
            }
        }
        Self {
            row: RowBuilder::new(ctx, view),
            errors,
        }
    }

    /// View name.
    pub fn view(&self) -> &QName {
        self.row.qname()
    }

    /// Value as built so far.
    pub fn value(&self) -> &Row {
        self.row.row()
    }

    /// Puts a value field.
    pub fn put(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.row.put(name, value);
        self
    }

    fn errors(&self) -> ValidationErrors {
        let mut errors = self.errors.clone();
        errors.extend(self.row.errors().clone());
        errors
    }
}

/// View records of one application
#[derive(Clone)]
pub struct ViewRecords {
    ctx: Arc<AppContext>,
}

impl ViewRecords {
    pub(crate) fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Empty key of `view`.
    pub fn key_builder(&self, view: &QName) -> KeyBuilder {
        KeyBuilder::new(self.ctx.row_ctx().app_def, view.clone())
    }

    /// Empty value of `view`.
    pub fn value_builder(&self, view: &QName) -> ValueBuilder {
        ValueBuilder::new(self.ctx.row_ctx(), view.clone())
    }

    /// Value builder starting from an existing value.
    pub fn update_value_builder(&self, existing: &Row) -> ValueBuilder {
        let mut b = ValueBuilder::new(self.ctx.row_ctx(), existing.qname().clone());
        b.row = RowBuilder::from_row(self.ctx.row_ctx(), existing.clone());
        b
    }

    /// Reads the value stored under a complete key; `None` if absent.
    ///
    /// # Errors
    ///
    /// `Validation` if the key is not complete or has put errors.
    pub fn get(&self, ws: WsId, key: &KeyBuilder) -> Result<Option<Row>> {
        let t = valid_key(&self.ctx, key, false)?;
        let (pkey, ccols) = encode_key(&self.ctx, t, ws, key.key())?;
        let data = self
            .ctx
            .storage
            .get(&pkey, &ccols)
            .map_err(|e| e.in_context("get view record"))?;
        data.map(|d| decode_value(&self.ctx, t, &d)).transpose()
    }

    /// Reads up to [`MAX_GET_BATCH_RECORD_COUNT`] values, one per key in
    /// request order. Keys sharing a partition are read with one storage
    /// batch.
    ///
    /// # Errors
    ///
    /// `BatchTooLarge` if more keys are requested than supported;
    /// `Validation` for the first key that is not complete.
    pub fn get_batch(&self, ws: WsId, keys: &[KeyBuilder]) -> Result<Vec<Option<Row>>> {
        if keys.len() > MAX_GET_BATCH_RECORD_COUNT {
            return Err(Error::BatchTooLarge {
                requested: keys.len(),
                max: MAX_GET_BATCH_RECORD_COUNT,
            });
        }

        // pkey -> (view, items, positions in the request)
        let mut groups: Vec<(Vec<u8>, &TypeDef, Vec<GetBatchItem>, Vec<usize>)> = Vec::new();
        let mut by_pkey: FxHashMap<Vec<u8>, usize> = FxHashMap::default();
        for (pos, key) in keys.iter().enumerate() {
            let t = valid_key(&self.ctx, key, false)?;
            let (pkey, ccols) = encode_key(&self.ctx, t, ws, key.key())?;
            let g = match by_pkey.get(&pkey) {
                Some(&g) => g,
                None => {
                    by_pkey.insert(pkey.clone(), groups.len());
                    groups.push((pkey, t, Vec::new(), Vec::new()));
                    groups.len() - 1
                }
            };
            groups[g].2.push(GetBatchItem::new(ccols));
            groups[g].3.push(pos);
        }
        debug!(target: "appstruct::views", ws, keys = keys.len(), partitions = groups.len(), "batch read");

        let mut result: Vec<Option<Row>> = vec![None; keys.len()];
        for (pkey, t, mut items, positions) in groups {
            self.ctx
                .storage
                .get_batch(&pkey, &mut items)
                .map_err(|e| e.in_context("get view record batch"))?;
            for (item, pos) in items.into_iter().zip(positions) {
                if let Some(data) = item.data {
                    result[pos] = Some(decode_value(&self.ctx, t, &data)?);
                }
            }
        }
        Ok(result)
    }

    /// Writes one view record.
    ///
    /// # Errors
    ///
    /// `Validation` if the key is not complete, the value misses required
    /// fields, either has put errors, or they belong to different views.
    pub fn put(&self, ws: WsId, key: &KeyBuilder, value: &ValueBuilder) -> Result<()> {
        let item = batch_item(&self.ctx, ws, key, value)?;
        self.ctx
            .storage
            .put(&item.pkey, &item.ccols, &item.value)
            .map_err(|e| e.in_context("put view record"))
    }

    /// Writes view records in one storage batch; nothing is written if any
    /// record is not valid.
    pub fn put_batch(&self, ws: WsId, records: &[(KeyBuilder, ValueBuilder)]) -> Result<()> {
        let mut batch = Vec::with_capacity(records.len());
        for (key, value) in records {
            batch.push(batch_item(&self.ctx, ws, key, value)?);
        }
        self.ctx
            .storage
            .put_batch(&batch)
            .map_err(|e| e.in_context("put view records"))?;
        debug!(target: "appstruct::views", ws, count = batch.len(), "view records written");
        Ok(())
    }

    /// Calls `cb` with the key and the value of every record in the
    /// partition of `key` whose clustering columns start with the ones put
    /// into `key`, in clustering order.
    ///
    /// # Errors
    ///
    /// `Validation` if a partition field is missing or the clustering
    /// columns put have a hole; decode and callback errors stop the read.
    pub fn read(
        &self,
        cancel: &CancelToken,
        ws: WsId,
        key: &KeyBuilder,
        mut cb: impl FnMut(&Row, &Row) -> Result<()>,
    ) -> Result<()> {
        let ctx = self.ctx.as_ref();
        let t = valid_key(ctx, key, true)?;
        let (pkey, prefix) = encode_key(ctx, t, ws, key.key())?;
        let finish = prefix_end(&prefix);

        let mut partition = Row::new(t.qname().clone());
        for f in t.partition_fields() {
            if let Some(v) = key.key().value(&f.name) {
                partition.values.insert(f.name.clone(), v.clone());
            }
        }

        let mut count = 0usize;
        ctx.storage.read(
            cancel,
            &pkey,
            Some(&prefix),
            finish.as_deref(),
            &mut |ccols, data| {
                let mut rec_key = partition.clone();
                decode_clustering(ctx, t, ccols, &mut rec_key)?;
                let value = decode_value(ctx, t, data)?;
                count += 1;
                cb(&rec_key, &value)
            },
        )?;
        debug!(target: "appstruct::views", ws, view = %t.qname(), count, "view read");
        Ok(())
    }
}

/// Checks put errors and key completeness. With `partial`, clustering
/// columns may be a leading run.
fn valid_key<'a>(ctx: &'a AppContext, key: &KeyBuilder, partial: bool) -> Result<&'a TypeDef> {
    key.errors.clone().into_result()?;
    let t = view_type(ctx.config.app_def(), key.view())
        .ok_or_else(|| Error::NameNotFound(format!("view «{}»", key.view())))?;

    let mut errors = ValidationErrors::new();
    for f in t.partition_fields() {
        if !key.key().has_value(&f.name) {
            errors.push(
                ValidationCode::EmptyData,
                format!("view «{}» partition key field «{}» is empty", t.qname(), f.name),
            );
        }
    }
    let clustering = t.clustering_fields();
    if partial {
        if let Some(hole) = clustering.iter().position(|f| !key.key().has_value(&f.name)) {
            if clustering[hole..].iter().any(|f| key.key().has_value(&f.name)) {
                errors.push(
                    ValidationCode::EmptyData,
                    format!(
                        "view «{}» clustering columns have a hole at field «{}»",
                        t.qname(),
                        clustering[hole].name
                    ),
                );
            }
        }
    } else {
        for f in clustering {
            if !key.key().has_value(&f.name) {
                errors.push(
                    ValidationCode::EmptyData,
                    format!("view «{}» clustering column «{}» is empty", t.qname(), f.name),
                );
            }
        }
    }
    errors.into_result()?;
    Ok(t)
}

fn valid_value(t: &TypeDef, key: &KeyBuilder, value: &ValueBuilder) -> Result<()> {
    let mut errors = value.errors();
    if value.view() != key.view() {
        errors.push(
            ValidationCode::InvalidTypeName,
            format!(
                "key of view «{}» used with value of «{}»",
                key.view(),
                value.view()
            ),
        );
    } else if errors.is_empty() {
        validate_row(t, value.value(), &mut errors);
    }
    errors.into_result()
}

fn batch_item(ctx: &AppContext, ws: WsId, key: &KeyBuilder, value: &ValueBuilder) -> Result<BatchItem> {
    let t = valid_key(ctx, key, false)?;
    valid_value(t, key, value)?;
    let (pkey, ccols) = encode_key(ctx, t, ws, key.key())?;
    Ok(BatchItem {
        pkey,
        ccols,
        value: ctx.codec().encode_record(value.value())?,
    })
}

fn encode_key(ctx: &AppContext, t: &TypeDef, ws: WsId, key: &Row) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut pkey = view_pkey_prefix(ctx.qnames.id(t.qname())?, ws);
    encode_fields(ctx, t.partition_fields(), key, &mut pkey)?;
    let mut ccols = Vec::new();
    encode_fields(ctx, t.clustering_fields(), key, &mut ccols)?;
    Ok((pkey, ccols))
}

/// Encodes the leading run of `fields` present in `key`.
fn encode_fields(ctx: &AppContext, fields: &[FieldDef], key: &Row, buf: &mut Vec<u8>) -> Result<()> {
    for f in fields {
        let Some(value) = key.value(&f.name) else {
            break;
        };
        match value {
            Value::Int32(v) => buf.extend_from_slice(&((*v as u32) ^ SIGN_32).to_be_bytes()),
            Value::Int64(v) => buf.extend_from_slice(&((*v as u64) ^ SIGN_64).to_be_bytes()),
            Value::Float32(v) => buf.extend_from_slice(&ordered_f32(*v).to_be_bytes()),
            Value::Float64(v) => buf.extend_from_slice(&ordered_f64(*v).to_be_bytes()),
            Value::Bytes(v) => buf.extend_from_slice(v),
            Value::String(v) => buf.extend_from_slice(v.as_bytes()),
            Value::QName(v) => buf.extend_from_slice(&ctx.qnames.id(v)?.to_be_bytes()),
            Value::Bool(v) => buf.push(u8::from(*v)),
            Value::RecordId(v) => buf.extend_from_slice(&v.as_u64().to_be_bytes()),
        }
    }
    Ok(())
}

fn ordered_f32(v: f32) -> u32 {
    let bits = v.to_bits();
    if bits & SIGN_32 != 0 {
        !bits
    } else {
        bits | SIGN_32
    }
}

fn f32_from_ordered(bits: u32) -> f32 {
    f32::from_bits(if bits & SIGN_32 != 0 { bits & !SIGN_32 } else { !bits })
}

fn ordered_f64(v: f64) -> u64 {
    let bits = v.to_bits();
    if bits & SIGN_64 != 0 {
        !bits
    } else {
        bits | SIGN_64
    }
}

fn f64_from_ordered(bits: u64) -> f64 {
    f64::from_bits(if bits & SIGN_64 != 0 { bits & !SIGN_64 } else { !bits })
}

fn take<'b>(ccols: &'b [u8], pos: &mut usize, len: usize) -> Result<&'b [u8]> {
    let end = *pos + len;
    let bytes = ccols.get(*pos..end).ok_or_else(|| {
        Error::corrupt(format!(
            "view clustering columns truncated: {} bytes expected, {} left",
            len,
            ccols.len() - *pos
        ))
    })?;
    *pos = end;
    Ok(bytes)
}

fn decode_clustering(ctx: &AppContext, t: &TypeDef, ccols: &[u8], key: &mut Row) -> Result<()> {
    let mut pos = 0usize;
    for f in t.clustering_fields() {
        let value = match f.kind {
            DataKind::Int32 => {
                Value::Int32((BigEndian::read_u32(take(ccols, &mut pos, 4)?) ^ SIGN_32) as i32)
            }
            DataKind::Int64 => {
                Value::Int64((BigEndian::read_u64(take(ccols, &mut pos, 8)?) ^ SIGN_64) as i64)
            }
            DataKind::Float32 => {
                Value::Float32(f32_from_ordered(BigEndian::read_u32(take(ccols, &mut pos, 4)?)))
            }
            DataKind::Float64 => {
                Value::Float64(f64_from_ordered(BigEndian::read_u64(take(ccols, &mut pos, 8)?)))
            }
            DataKind::QName => {
                let id = BigEndian::read_u16(take(ccols, &mut pos, 2)?);
                Value::QName(ctx.qnames.qname(id).map_err(|e| Error::corrupt(e.to_string()))?)
            }
            DataKind::Bool => Value::Bool(take(ccols, &mut pos, 1)?[0] != 0),
            DataKind::RecordId => {
                Value::RecordId(RecordId(BigEndian::read_u64(take(ccols, &mut pos, 8)?)))
            }
            DataKind::Bytes => {
                let remaining = ccols.len() - pos;
                let rest = take(ccols, &mut pos, remaining)?;
                Value::Bytes(rest.to_vec())
            }
            DataKind::String => {
                let remaining = ccols.len() - pos;
                let rest = take(ccols, &mut pos, remaining)?;
                Value::String(String::from_utf8(rest.to_vec()).map_err(|e| {
                    Error::corrupt(format!("view «{}» column «{}»: {}", t.qname(), f.name, e))
                })?)
            }
        };
        key.values.insert(f.name.clone(), value);
    }
    if pos != ccols.len() {
        return Err(Error::corrupt(format!(
            "{} unexpected trailing bytes in clustering columns of view «{}»",
            ccols.len() - pos,
            t.qname()
        )));
    }
    Ok(())
}

fn decode_value(ctx: &AppContext, t: &TypeDef, data: &[u8]) -> Result<Row> {
    let row = ctx.codec().decode_record(data)?.into_row();
    if row.qname() != t.qname() {
        return Err(Error::corrupt(format!(
            "view «{}» holds a value of «{}»",
            t.qname(),
            row.qname()
        )));
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_app::{self, doc, sales, stock};
    use appstruct_core::layout::view_pkey_prefix;
    use appstruct_core::AppStorage;
    use appstruct_storage::MemStorage;

    fn sale(app: &crate::AppStructs, month: i32, city: &str, total: f64) -> (KeyBuilder, ValueBuilder) {
        let views = app.views();
        let mut key = views.key_builder(&sales());
        key.put("year", 2024).put("month", month).put("city", city);
        let mut value = views.value_builder(&sales());
        value.put("total", total);
        (key, value)
    }

    fn codes(res: Result<impl std::fmt::Debug>) -> Vec<ValidationCode> {
        match res {
            Err(Error::Validation(errs)) => errs.codes(),
            other => panic!("validation error expected, got {:?}", other),
        }
    }

    #[test]
    fn test_put_then_get() {
        let app = test_app::app();
        let (key, value) = sale(&app, 3, "Oslo", 12.5);
        app.views().put(1, &key, &value).unwrap();

        let got = app.views().get(1, &key).unwrap().unwrap();
        assert_eq!(got.qname(), &sales());
        assert_eq!(got.as_float64("total"), Some(12.5));

        // other workspaces do not see it
        assert!(app.views().get(2, &key).unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let app = test_app::app();
        let (key, value) = sale(&app, 3, "Oslo", 1.0);
        app.views().put(1, &key, &value).unwrap();

        let stored = app.views().get(1, &key).unwrap().unwrap();
        let mut updated = app.views().update_value_builder(&stored);
        updated.put("total", 2.0);
        app.views().put(1, &key, &updated).unwrap();
        assert_eq!(
            app.views().get(1, &key).unwrap().unwrap().as_float64("total"),
            Some(2.0)
        );
    }

    #[test]
    fn test_read_by_clustering_prefix() {
        let app = test_app::app();
        let records = vec![
            sale(&app, 2, "Rome", 4.0),
            sale(&app, 1, "Oslo", 1.0),
            sale(&app, 2, "Oslo", 3.0),
            sale(&app, 1, "Bern", 2.0),
            sale(&app, 3, "Oslo", 5.0),
        ];
        app.views().put_batch(1, &records).unwrap();

        let mut key = app.views().key_builder(&sales());
        key.put("year", 2024).put("month", 2);
        let mut got = Vec::new();
        app.views()
            .read(&CancelToken::new(), 1, &key, |k, v| {
                got.push((
                    k.as_int32("year").unwrap(),
                    k.as_string("city").unwrap().to_string(),
                    v.as_float64("total").unwrap(),
                ));
                Ok(())
            })
            .unwrap();
        assert_eq!(
            got,
            vec![(2024, "Oslo".to_string(), 3.0), (2024, "Rome".to_string(), 4.0)]
        );

        // the whole partition, in clustering order
        let mut key = app.views().key_builder(&sales());
        key.put("year", 2024);
        let mut totals = Vec::new();
        app.views()
            .read(&CancelToken::new(), 1, &key, |_, v| {
                totals.push(v.as_float64("total").unwrap());
                Ok(())
            })
            .unwrap();
        assert_eq!(totals, vec![2.0, 1.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_signed_clustering_columns_keep_order() {
        let app = test_app::app();
        let views = app.views();
        let product = RecordId(322_685_000_131_072);
        let mut records = Vec::new();
        for day in [5i64, -3, 0, i64::MIN, 70, -1] {
            let mut key = views.key_builder(&stock());
            key.put("product", product).put("day", day);
            let mut value = views.value_builder(&stock());
            value.put("qty", day as i32);
            records.push((key, value));
        }
        views.put_batch(1, &records).unwrap();

        let mut key = views.key_builder(&stock());
        key.put("product", product);
        let mut days = Vec::new();
        views
            .read(&CancelToken::new(), 1, &key, |k, _| {
                days.push(k.as_int64("day").unwrap());
                Ok(())
            })
            .unwrap();
        assert_eq!(days, vec![i64::MIN, -3, -1, 0, 5, 70]);
    }

    #[test]
    fn test_read_stops_on_callback_error() {
        let app = test_app::app();
        let records = vec![sale(&app, 1, "A", 1.0), sale(&app, 1, "B", 2.0)];
        app.views().put_batch(1, &records).unwrap();

        let mut key = app.views().key_builder(&sales());
        key.put("year", 2024);
        let mut calls = 0;
        let err = app
            .views()
            .read(&CancelToken::new(), 1, &key, |_, _| {
                calls += 1;
                Err(Error::invalid_argument("stop"))
            })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_incomplete_keys() {
        let app = test_app::app();
        let views = app.views();

        let mut key = views.key_builder(&sales());
        key.put("month", 1).put("city", "Oslo");
        assert_eq!(codes(views.get(1, &key)), vec![ValidationCode::EmptyData]);

        let mut key = views.key_builder(&sales());
        key.put("year", 2024).put("month", 1);
        assert_eq!(codes(views.get(1, &key)), vec![ValidationCode::EmptyData]);

        // reads accept a leading run of clustering columns, not a hole
        let mut key = views.key_builder(&sales());
        key.put("year", 2024).put("city", "Oslo");
        assert_eq!(
            codes(views.read(&CancelToken::new(), 1, &key, |_, _| Ok(()))),
            vec![ValidationCode::EmptyData]
        );
    }

    #[test]
    fn test_key_put_errors() {
        let app = test_app::app();
        let views = app.views();

        let mut key = views.key_builder(&sales());
        key.put("year", 2024).put("month", 1).put("city", "Oslo").put("total", 1.0);
        assert_eq!(codes(views.get(1, &key)), vec![ValidationCode::InvalidFieldName]);

        let mut key = views.key_builder(&sales());
        key.put("year", "2024").put("month", 1).put("city", "Oslo");
        assert_eq!(codes(views.get(1, &key)), vec![ValidationCode::InvalidDataKind]);

        let key = views.key_builder(&QName::new("test", "Missing"));
        assert_eq!(codes(views.get(1, &key)), vec![ValidationCode::InvalidTypeName]);

        let key = views.key_builder(&doc());
        assert_eq!(codes(views.get(1, &key)), vec![ValidationCode::InvalidTypeKind]);
    }

    #[test]
    fn test_value_validation() {
        let app = test_app::app();
        let views = app.views();
        let (key, _) = sale(&app, 1, "Oslo", 0.0);

        let empty = views.value_builder(&sales());
        assert_eq!(codes(views.put(1, &key, &empty)), vec![ValidationCode::EmptyData]);

        let mut other = views.value_builder(&stock());
        other.put("qty", 1);
        assert_eq!(
            codes(views.put(1, &key, &other)),
            vec![ValidationCode::InvalidTypeName]
        );

        let mut wrong = views.value_builder(&sales());
        wrong.put("total", 1.0).put("doc", "not an id");
        assert_eq!(
            codes(views.put(1, &key, &wrong)),
            vec![ValidationCode::InvalidDataKind]
        );

        let mut not_view = views.value_builder(&doc());
        not_view.put("name", "x");
        assert!(codes(views.put(1, &key, &not_view)).contains(&ValidationCode::InvalidTypeKind));

        assert!(views.get(1, &key).unwrap().is_none());
    }

    #[test]
    fn test_put_batch_is_all_or_nothing() {
        let app = test_app::app();
        let views = app.views();
        let good = sale(&app, 1, "Oslo", 1.0);
        let key = good.0.clone();
        let bad = (sale(&app, 2, "Oslo", 0.0).0, views.value_builder(&sales()));
        assert!(views.put_batch(1, &[good, bad]).is_err());
        assert!(views.get(1, &key).unwrap().is_none());
    }

    #[test]
    fn test_get_batch() {
        let app = test_app::app();
        let views = app.views();
        let stored = vec![sale(&app, 1, "Oslo", 1.0), sale(&app, 2, "Rome", 2.0)];
        views.put_batch(1, &stored).unwrap();

        let mut other_year = views.key_builder(&sales());
        other_year.put("year", 2023).put("month", 1).put("city", "Oslo");
        let keys = vec![
            stored[1].0.clone(),
            other_year,
            sale(&app, 9, "Nowhere", 0.0).0,
            stored[0].0.clone(),
        ];
        let got = views.get_batch(1, &keys).unwrap();
        let totals: Vec<Option<f64>> = got
            .iter()
            .map(|v| v.as_ref().and_then(|r| r.as_float64("total")))
            .collect();
        assert_eq!(totals, vec![Some(2.0), None, None, Some(1.0)]);

        let too_many = vec![stored[0].0.clone(); MAX_GET_BATCH_RECORD_COUNT + 1];
        assert!(matches!(
            views.get_batch(1, &too_many),
            Err(Error::BatchTooLarge { .. })
        ));
    }

    #[test]
    fn test_float_key_order() {
        let values = [f64::NEG_INFINITY, -2.5, -0.0, 0.0, 1e-9, 3.0, f64::INFINITY];
        let encoded: Vec<u64> = values.iter().map(|v| ordered_f64(*v)).collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
        for v in values {
            assert_eq!(f64_from_ordered(ordered_f64(v)).to_bits(), v.to_bits());
        }
        assert!(ordered_f32(-1.0) < ordered_f32(1.0));
        assert_eq!(f32_from_ordered(ordered_f32(-7.25)), -7.25);
    }

    #[test]
    fn test_corrupt_clustering_columns() {
        let storage = Arc::new(MemStorage::new());
        let app = test_app::app_on(storage.clone());
        let product = RecordId(7);

        let mut pkey = view_pkey_prefix(app.qname_id(&stock()).unwrap(), 1);
        pkey.extend_from_slice(&product.as_u64().to_be_bytes());
        storage.put(&pkey, &[1, 2, 3], b"ignored").unwrap();

        let mut key = app.views().key_builder(&stock());
        key.put("product", product);
        let res = app
            .views()
            .read(&CancelToken::new(), 1, &key, |_, _| Ok(()));
        assert!(matches!(res, Err(Error::CorruptData(_))), "{:?}", res);
    }
}
