//! Record store
//!
//! Records live in the records view under `(workspace, id)`, split by
//! [`record_key`]. A missing record reads as the null record, never as an
//! error.
//!
//! Applying an event writes every created record and every updated record
//! image in one storage batch; callbacks run only after the batch is
//! written.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use appstruct_core::consts::MAX_GET_BATCH_RECORD_COUNT;
use appstruct_core::layout::record_key;
use appstruct_core::{
    BatchItem, Error, GetBatchItem, QName, RecordId, Result, ValidationCode, ValidationErrors, WsId,
};

use crate::app::AppContext;
use crate::cud::merge;
use crate::event::Event;
use crate::row::{Record, Row};

/// Records of one application
#[derive(Clone)]
pub struct Records {
    ctx: Arc<AppContext>,
}

impl Records {
    pub(crate) fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Reads one record; the null record if absent.
    pub fn get(&self, ws: WsId, id: RecordId) -> Result<Record> {
        load(&self.ctx, ws, id).map(|r| r.unwrap_or_else(|| Record::null(id)))
    }

    /// Reads up to [`MAX_GET_BATCH_RECORD_COUNT`] records.
    ///
    /// The result has one record per requested ID, in request order; absent
    /// records are null records. IDs sharing a shard are read with one
    /// storage batch.
    ///
    /// # Errors
    ///
    /// `BatchTooLarge` if more IDs are requested than supported.
    pub fn get_batch(&self, ws: WsId, ids: &[RecordId]) -> Result<Vec<Record>> {
        if ids.len() > MAX_GET_BATCH_RECORD_COUNT {
            return Err(Error::BatchTooLarge {
                requested: ids.len(),
                max: MAX_GET_BATCH_RECORD_COUNT,
            });
        }
        read_batch(&self.ctx, ws, ids)
    }

    /// Reads the singleton record of type `qname`.
    ///
    /// # Errors
    ///
    /// `NameNotFound` if `qname` is not a singleton.
    pub fn get_singleton(&self, ws: WsId, qname: &QName) -> Result<Record> {
        let id = self.singleton_id(qname)?;
        self.get(ws, id)
    }

    /// Record ID of a singleton type.
    pub fn singleton_id(&self, qname: &QName) -> Result<RecordId> {
        self.ctx.singletons.id(qname)
    }

    /// Writes a complete record, bypassing events.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the ID is null or raw, or the type is not
    /// stored in the records view.
    pub fn put_record(&self, ws: WsId, record: &Record) -> Result<()> {
        self.put_record_batch(ws, std::slice::from_ref(record))
    }

    /// Writes complete records in one storage batch.
    pub fn put_record_batch(&self, ws: WsId, records: &[Record]) -> Result<()> {
        let codec = self.ctx.codec();
        let mut batch = Vec::with_capacity(records.len());
        for rec in records {
            if rec.id().is_null() || rec.id().is_raw() {
                return Err(Error::invalid_argument(format!(
                    "record «{}» needs a storage id, got «{}»",
                    rec.qname(),
                    rec.id()
                )));
            }
            let storable = self
                .ctx
                .config
                .app_def()
                .type_def(rec.qname())
                .map_or(false, |t| t.kind().is_storable());
            if !storable {
                return Err(Error::invalid_argument(format!(
                    "«{}» is not a storable record type",
                    rec.qname()
                )));
            }
            let key = record_key(ws, rec.id());
            batch.push(BatchItem {
                pkey: key.pkey,
                ccols: key.ccols,
                value: codec.encode_record(rec)?,
            });
        }
        self.ctx
            .storage
            .put_batch(&batch)
            .map_err(|e| e.in_context("put records"))
    }

    /// Writes pre-encoded record bytes as is.
    pub fn put(&self, ws: WsId, id: RecordId, data: &[u8]) -> Result<()> {
        let key = record_key(ws, id);
        self.ctx
            .storage
            .put(&key.pkey, &key.ccols, data)
            .map_err(|e| e.in_context("put record"))
    }

    /// Writes pre-encoded record bytes of one workspace in one storage batch.
    pub fn put_batch(&self, ws: WsId, records: &[(RecordId, Vec<u8>)]) -> Result<()> {
        let batch: Vec<BatchItem> = records
            .iter()
            .map(|(id, data)| {
                let key = record_key(ws, *id);
                BatchItem {
                    pkey: key.pkey,
                    ccols: key.ccols,
                    value: data.clone(),
                }
            })
            .collect();
        self.ctx
            .storage
            .put_batch(&batch)
            .map_err(|e| e.in_context("put record batch"))
    }

    /// Stores the CUDs of a valid event.
    pub fn apply(&self, event: &Event) -> Result<()> {
        self.apply2(event, |_| {})
    }

    /// Stores the CUDs of a valid event and calls `cb` for every stored
    /// record once the batch is written.
    ///
    /// Updates without a known origin (events read back from a log) are
    /// merged onto the stored record.
    ///
    /// # Errors
    ///
    /// - `ContractViolation` if the event is an error event
    /// - `UniqueViolation` if a created singleton already exists
    /// - `RecordNotFound` if an updated record does not exist
    pub fn apply2(&self, event: &Event, mut cb: impl FnMut(&Record)) -> Result<()> {
        if let Some(err) = event.error() {
            return Err(Error::contract(format!(
                "can not apply not valid event: {}",
                err.message()
            )));
        }

        let mut stored: Vec<Record> = Vec::new();
        for rec in event.cuds().creates() {
            check_singleton_absent(&self.ctx, event.workspace(), rec)?;
            stored.push(rec.clone());
        }
        for upd in event.cuds().updates() {
            let result = match upd.result() {
                Some(r) => r.clone(),
                None => {
                    let origin = load(&self.ctx, event.workspace(), upd.id())?.ok_or_else(|| {
                        Error::RecordNotFound(format!(
                            "updated «{}» record «{}»",
                            upd.changes().qname(),
                            upd.id()
                        ))
                    })?;
                    merge(&origin, upd.changes()).map_err(Error::invalid_argument)?
                }
            };
            stored.push(result);
        }
        if stored.is_empty() {
            return Ok(());
        }

        let codec = self.ctx.codec();
        let mut batch = Vec::with_capacity(stored.len());
        for rec in &stored {
            let key = record_key(event.workspace(), rec.id());
            batch.push(BatchItem {
                pkey: key.pkey,
                ccols: key.ccols,
                value: codec.encode_record(rec)?,
            });
        }
        self.ctx
            .storage
            .put_batch(&batch)
            .map_err(|e| e.in_context("apply event"))?;
        debug!(
            target: "appstruct::records",
            ws = event.workspace(),
            plog_offset = event.plog_offset(),
            count = stored.len(),
            "event applied"
        );

        for rec in &stored {
            cb(rec);
        }
        Ok(())
    }
}

fn read_batch(ctx: &AppContext, ws: WsId, ids: &[RecordId]) -> Result<Vec<Record>> {
    // shard pkey -> (items, positions in the request)
    let mut groups: Vec<(Vec<u8>, Vec<GetBatchItem>, Vec<usize>)> = Vec::new();
    let mut by_pkey: FxHashMap<Vec<u8>, usize> = FxHashMap::default();
    for (pos, &id) in ids.iter().enumerate() {
        let key = record_key(ws, id);
        let g = match by_pkey.get(&key.pkey) {
            Some(&g) => g,
            None => {
                by_pkey.insert(key.pkey.clone(), groups.len());
                groups.push((key.pkey, Vec::new(), Vec::new()));
                groups.len() - 1
            }
        };
        groups[g].1.push(GetBatchItem::new(key.ccols));
        groups[g].2.push(pos);
    }
    debug!(target: "appstruct::records", ws, ids = ids.len(), shards = groups.len(), "batch read");

    let mut result: Vec<Record> = ids.iter().map(|&id| Record::null(id)).collect();
    let codec = ctx.codec();
    for (pkey, mut items, positions) in groups {
        ctx.storage
            .get_batch(&pkey, &mut items)
            .map_err(|e| e.in_context("get record batch"))?;
        for (item, pos) in items.into_iter().zip(positions) {
            if let Some(data) = item.data {
                result[pos] = codec.decode_record(&data)?;
            }
        }
    }
    Ok(result)
}

fn load(ctx: &AppContext, ws: WsId, id: RecordId) -> Result<Option<Record>> {
    let key = record_key(ws, id);
    let data = ctx
        .storage
        .get(&key.pkey, &key.ccols)
        .map_err(|e| e.in_context("get record"))?;
    data.map(|d| ctx.codec().decode_record(&d)).transpose()
}

fn check_singleton_absent(ctx: &AppContext, ws: WsId, rec: &Record) -> Result<()> {
    let singleton = ctx
        .config
        .app_def()
        .type_def(rec.qname())
        .map_or(false, |t| t.is_singleton());
    if !singleton {
        return Ok(());
    }
    let id = ctx.singletons.id(rec.qname())?;
    let key = record_key(ws, id);
    let exists = ctx
        .storage
        .get(&key.pkey, &key.ccols)
        .map_err(|e| e.in_context(&format!("check singleton «{}» existence", rec.qname())))?
        .is_some();
    if exists {
        return Err(Error::UniqueViolation(format!(
            "can not create singleton, «{}» record «{}» already exists",
            rec.qname(),
            id
        )));
    }
    Ok(())
}

/// Reference from an event row to a record outside of the event
struct OuterRef<'a> {
    row: &'a Row,
    /// Referencing field; `None` for the parent ID
    field: Option<&'a str>,
    id: RecordId,
}

/// Collects parent and reference IDs that are neither raw nor carried by
/// the event itself.
fn outer_refs(event: &Event) -> Vec<OuterRef<'_>> {
    let mut own: FxHashSet<RecordId> = FxHashSet::default();
    let mut rows: Vec<(&Row, bool)> = Vec::new();
    for obj in [&event.arg, &event.unlogged] {
        obj.for_each(&mut |el| {
            own.insert(el.row.id);
            rows.push((&el.row, false));
        });
    }
    for rec in event.cuds().creates() {
        own.insert(rec.id());
        rows.push((rec.row(), true));
    }
    for upd in event.cuds().updates() {
        own.insert(upd.id());
        // parent of an update is the stored one
        rows.push((upd.changes(), false));
    }

    let outer = |id: RecordId| !id.is_null() && !id.is_raw() && !own.contains(&id);
    let mut refs = Vec::new();
    for (row, check_parent) in rows {
        if check_parent && outer(row.parent) {
            refs.push(OuterRef {
                row,
                field: None,
                id: row.parent,
            });
        }
        for (field, id) in row.record_ids() {
            if outer(id) {
                refs.push(OuterRef {
                    row,
                    field: Some(field),
                    id,
                });
            }
        }
    }
    refs
}

/// Checks that every record referenced from outside the event is stored
/// and has a type the reference allows.
fn check_outer_refs(ctx: &AppContext, event: &Event) -> Result<()> {
    let refs = outer_refs(event);
    if refs.is_empty() {
        return Ok(());
    }

    let mut ids: Vec<RecordId> = refs.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    ids.dedup();
    let mut stored: FxHashMap<RecordId, Record> = FxHashMap::default();
    for chunk in ids.chunks(MAX_GET_BATCH_RECORD_COUNT) {
        let recs = read_batch(ctx, event.workspace(), chunk)
            .map_err(|e| e.in_context("read referenced records"))?;
        stored.extend(chunk.iter().copied().zip(recs));
    }

    let app_def = ctx.config.app_def();
    let mut errs = ValidationErrors::new();
    for r in &refs {
        let target = match stored.get(&r.id) {
            Some(rec) if !rec.is_null() => rec.qname(),
            _ => {
                let what = r.field.unwrap_or("sys.ParentID");
                errs.push(
                    ValidationCode::InvalidRefRecordId,
                    format!(
                        "«{}» field «{}» refers to missing record «{}»",
                        r.row.qname, what, r.id
                    ),
                );
                continue;
            }
        };
        match r.field {
            Some(field) => {
                let allowed = app_def
                    .type_def(&r.row.qname)
                    .and_then(|t| t.field_def(field))
                    .map_or(true, |f| f.ref_allowed(target));
                if !allowed {
                    errs.push(
                        ValidationCode::InvalidRefRecordId,
                        format!(
                            "«{}» field «{}» refers to record «{}» of unavailable type «{}»",
                            r.row.qname, field, r.id, target
                        ),
                    );
                }
            }
            None => {
                let fits = app_def
                    .type_def(target)
                    .and_then(|t| t.container_def(&r.row.container))
                    .map_or(false, |c| c.qname == r.row.qname);
                if !fits {
                    errs.push(
                        ValidationCode::InvalidRefRecordId,
                        format!(
                            "«{}» has parent «{}» of «{}», which has no container «{}» of this type",
                            r.row.qname, r.id, target, r.row.container
                        ),
                    );
                }
            }
        }
    }
    errs.into_result()
}

/// Checks the stored state an event depends on: created singletons must
/// not exist, updated records must exist with the same type, records
/// referenced from outside the event must exist.
pub(crate) fn valid_event(ctx: &AppContext, event: &Event) -> Result<()> {
    for rec in event.cuds().creates() {
        check_singleton_absent(ctx, event.workspace(), rec)?;
    }

    for upd in event.cuds().updates() {
        let qname = upd.changes().qname();
        let stored = load(ctx, event.workspace(), upd.id())
            .map_err(|e| e.in_context(&format!("load updated «{}» record «{}»", qname, upd.id())))?
            .ok_or_else(|| {
                Error::RecordNotFound(format!("updated «{}» record «{}»", qname, upd.id()))
            })?;
        if stored.qname() != qname {
            let mut errs = ValidationErrors::new();
            errs.push(
                ValidationCode::InvalidTypeName,
                format!(
                    "updated «{}» record «{}» has unexpected type «{}»",
                    qname,
                    upd.id(),
                    stored.qname()
                ),
            );
            return Err(Error::Validation(errs));
        }
    }

    check_outer_refs(ctx, event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawEventParams;
    use crate::ids::SequentialIdGenerator;
    use crate::test_app;
    use crate::value::Value;
    use appstruct_core::consts::FIRST_SINGLETON_ID;
    use appstruct_core::{AppStorage, QNAME_COMMAND_CUD};
    use appstruct_storage::MemStorage;
    use appstruct_storage::testing::{Damage, DamageTarget, TestStorage};

    fn doc(id: u64, name: &str) -> Record {
        let mut row = Row::new(test_app::doc());
        row.id = RecordId(id);
        row.values.insert("name".into(), Value::String(name.into()));
        Record::from_row(row)
    }

    fn cud_params(offset: u64) -> RawEventParams {
        RawEventParams {
            handling_partition: 1,
            plog_offset: offset,
            workspace: 5,
            wlog_offset: offset,
            qname: QNAME_COMMAND_CUD,
            registered_at: 1,
            event_bytes: Vec::new(),
        }
    }

    #[test]
    fn test_get_absent_is_null() {
        let app = test_app::app();
        let rec = app.records().get(1, RecordId(100_000)).unwrap();
        assert!(rec.is_null());
        assert_eq!(rec.id(), RecordId(100_000));
    }

    #[test]
    fn test_put_and_get() {
        let app = test_app::app();
        app.records().put_record(1, &doc(100_000, "a")).unwrap();
        let rec = app.records().get(1, RecordId(100_000)).unwrap();
        assert_eq!(rec.as_string("name"), Some("a"));
        // other workspace
        assert!(app.records().get(2, RecordId(100_000)).unwrap().is_null());
    }

    #[test]
    fn test_put_record_rejects_raw_and_non_storable() {
        let app = test_app::app();
        assert!(matches!(
            app.records().put_record(1, &doc(5, "raw")),
            Err(Error::InvalidArgument(_))
        ));
        let mut row = Row::new(test_app::order());
        row.id = RecordId(100_000);
        assert!(matches!(
            app.records().put_record(1, &Record::from_row(row)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_put_bytes_verbatim() {
        let storage: Arc<dyn AppStorage> = Arc::new(MemStorage::new());
        let app = test_app::app_on(Arc::clone(&storage));
        app.records().put_record(1, &doc(100_000, "a")).unwrap();
        let key = record_key(1, RecordId(100_000));
        let data = storage.get(&key.pkey, &key.ccols).unwrap().unwrap();

        app.records().put(2, RecordId(100_000), &data).unwrap();
        app.records()
            .put_batch(3, &[(RecordId(100_000), data.clone())])
            .unwrap();
        for ws in [2, 3] {
            let rec = app.records().get(ws, RecordId(100_000)).unwrap();
            assert_eq!(rec.as_string("name"), Some("a"));
            let key = record_key(ws, RecordId(100_000));
            assert_eq!(storage.get(&key.pkey, &key.ccols).unwrap(), Some(data.clone()));
        }
    }

    #[test]
    fn test_get_batch_preserves_order() {
        let app = test_app::app();
        // two shards
        let ids = [RecordId(100_000), RecordId(200_000), RecordId(100_001)];
        app.records()
            .put_record_batch(1, &[doc(100_000, "a"), doc(200_000, "b")])
            .unwrap();
        let recs = app.records().get_batch(1, &ids).unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].as_string("name"), Some("a"));
        assert_eq!(recs[1].as_string("name"), Some("b"));
        assert!(recs[2].is_null());
        assert_eq!(recs[2].id(), RecordId(100_001));
    }

    #[test]
    fn test_get_batch_too_large() {
        let app = test_app::app();
        let ids: Vec<RecordId> = (0..257).map(|i| RecordId(100_000 + i)).collect();
        assert!(matches!(
            app.records().get_batch(1, &ids),
            Err(Error::BatchTooLarge {
                requested: 257,
                max: 256
            })
        ));
        assert_eq!(app.records().get_batch(1, &ids[..256]).unwrap().len(), 256);
    }

    #[test]
    fn test_singleton_lookup() {
        let app = test_app::app();
        assert_eq!(
            app.records().singleton_id(&test_app::settings()).unwrap(),
            FIRST_SINGLETON_ID
        );
        assert!(app.records().singleton_id(&test_app::doc()).is_err());
        assert!(app
            .records()
            .get_singleton(1, &test_app::settings())
            .unwrap()
            .is_null());
    }

    #[test]
    fn test_apply_creates_and_updates() {
        let app = test_app::app();
        let mut b = app.events().new_raw_event_builder(cud_params(1));
        b.cud_builder().create(test_app::doc()).put_id(RecordId(1)).put("name", "first");
        let (raw, res) = b.build_raw_event();
        res.unwrap();
        let ev = app
            .events()
            .put_plog(raw, None, &mut SequentialIdGenerator::new())
            .unwrap();
        let mut seen = Vec::new();
        app.records().apply2(&ev, |r| seen.push(r.id())).unwrap();
        assert_eq!(seen.len(), 1);
        let id = seen[0];
        assert!(!id.is_raw());

        let stored = app.records().get(5, id).unwrap();
        let mut b = app.events().new_raw_event_builder(cud_params(2));
        b.cud_builder().update(&stored).put("name", "second").put_is_active(false);
        let (raw, res) = b.build_raw_event();
        res.unwrap();
        let ev = app
            .events()
            .put_plog(raw, None, &mut SequentialIdGenerator::new())
            .unwrap();
        app.records().apply(&ev).unwrap();

        let rec = app.records().get(5, id).unwrap();
        assert_eq!(rec.as_string("name"), Some("second"));
        assert!(!rec.is_active());
    }

    #[test]
    fn test_update_of_missing_record() {
        let app = test_app::app();
        let ghost = doc(100_000, "ghost");
        let mut b = app.events().new_raw_event_builder(cud_params(1));
        b.cud_builder().update(&ghost).put("name", "x");
        let (_, res) = b.build_raw_event();
        assert!(matches!(res, Err(Error::RecordNotFound(_))));
    }

    #[test]
    fn test_update_with_wrong_type() {
        let app = test_app::app();
        app.records().put_record(5, &doc(100_000, "a")).unwrap();
        let mut row = Row::new(test_app::settings());
        row.id = RecordId(100_000);
        let fake = Record::from_row(row);
        let mut b = app.events().new_raw_event_builder(cud_params(1));
        b.cud_builder().update(&fake).put("theme", "dark");
        let (_, res) = b.build_raw_event();
        assert_eq!(res.unwrap_err().validation_codes(), vec![ValidationCode::InvalidTypeName]);
    }

    fn settings(id: u64) -> Record {
        let mut row = Row::new(test_app::settings());
        row.id = RecordId(id);
        Record::from_row(row)
    }

    fn create_line(app: &crate::app::AppStructs, parent: u64, doc: u64) -> Result<()> {
        let mut b = app.events().new_raw_event_builder(cud_params(1));
        b.cud_builder()
            .create(test_app::line())
            .put_id(RecordId(1))
            .put_parent(RecordId(parent))
            .put_container("lines")
            .put("doc", RecordId(doc));
        b.build_raw_event().1
    }

    #[test]
    fn test_refs_to_missing_records() {
        let app = test_app::app();
        let err = create_line(&app, 987_654_321, 123_456_789).unwrap_err();
        assert_eq!(
            err.validation_codes(),
            vec![ValidationCode::InvalidRefRecordId, ValidationCode::InvalidRefRecordId]
        );

        // stored in another workspace only
        app.records().put_record(6, &doc(100_000, "a")).unwrap();
        let err = create_line(&app, 100_000, 100_000).unwrap_err();
        assert_eq!(err.validation_codes().len(), 2);
    }

    #[test]
    fn test_refs_to_stored_records() {
        let app = test_app::app();
        app.records().put_record(5, &doc(100_000, "a")).unwrap();
        create_line(&app, 100_000, 100_000).unwrap();
    }

    #[test]
    fn test_refs_to_stored_records_of_wrong_type() {
        let app = test_app::app();
        app.records()
            .put_record_batch(5, &[doc(100_000, "a"), settings(100_001)])
            .unwrap();

        // reference field allows Doc only
        let err = create_line(&app, 100_000, 100_001).unwrap_err();
        assert_eq!(err.validation_codes(), vec![ValidationCode::InvalidRefRecordId]);

        // Settings has no `lines` container
        let err = create_line(&app, 100_001, 100_000).unwrap_err();
        assert_eq!(err.validation_codes(), vec![ValidationCode::InvalidRefRecordId]);
    }

    #[test]
    fn test_argument_ref_to_missing_record() {
        let app = test_app::app();
        let mut b = app.events().new_raw_event_builder(RawEventParams {
            qname: test_app::order(),
            ..cud_params(1)
        });
        let o = b.argument_object_builder();
        o.put_id(RecordId(1)).put("number", "A-1");
        o.child("items")
            .put_id(RecordId(2))
            .put("qty", 1i32)
            .put("product", RecordId(100_000));
        let err = b.build_raw_event().1.unwrap_err();
        assert_eq!(err.validation_codes(), vec![ValidationCode::InvalidRefRecordId]);

        app.records().put_record(5, &doc(100_000, "a")).unwrap();
        let mut b = app.events().new_raw_event_builder(RawEventParams {
            qname: test_app::order(),
            ..cud_params(2)
        });
        let o = b.argument_object_builder();
        o.put_id(RecordId(1)).put("number", "A-1");
        o.child("items")
            .put_id(RecordId(2))
            .put("qty", 1i32)
            .put("product", RecordId(100_000));
        b.build_raw_event().1.unwrap();
    }

    #[test]
    fn test_update_ref_to_missing_record() {
        let app = test_app::app();
        app.records().put_record(5, &doc(100_000, "a")).unwrap();
        let mut line = Row::new(test_app::line());
        line.id = RecordId(100_002);
        line.parent = RecordId(100_000);
        line.container = "lines".into();
        app.records().put_record(5, &Record::from_row(line)).unwrap();

        let stored = app.records().get(5, RecordId(100_002)).unwrap();
        let mut b = app.events().new_raw_event_builder(cud_params(1));
        b.cud_builder().update(&stored).put("doc", RecordId(100_500));
        let err = b.build_raw_event().1.unwrap_err();
        assert_eq!(err.validation_codes(), vec![ValidationCode::InvalidRefRecordId]);
    }

    #[test]
    fn test_apply_error_event_is_contract_violation() {
        let app = test_app::app();
        let b = app.events().new_raw_event_builder(cud_params(1));
        let (raw, res) = b.build_raw_event();
        let err = res.unwrap_err();
        let ev = app
            .events()
            .put_plog(raw, Some(err), &mut SequentialIdGenerator::new())
            .unwrap();
        assert!(matches!(
            app.records().apply(&ev),
            Err(Error::ContractViolation(_))
        ));
    }

    #[test]
    fn test_apply_storage_failure_skips_callback() {
        let storage = Arc::new(TestStorage::new());
        let app = test_app::app_on(storage.clone());
        let mut b = app.events().new_raw_event_builder(cud_params(1));
        b.cud_builder().create(test_app::doc()).put_id(RecordId(1)).put("name", "x");
        let (raw, res) = b.build_raw_event();
        res.unwrap();
        let ev = app
            .events()
            .put_plog(raw, None, &mut SequentialIdGenerator::new())
            .unwrap();

        storage.schedule_put_error("disk full", None, None);
        let mut called = false;
        let err = app.records().apply2(&ev, |_| called = true).unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
        assert!(!called);
    }

    #[test]
    fn test_corrupted_record_read() {
        let storage = Arc::new(TestStorage::new());
        let app = test_app::app_on(storage.clone());
        app.records().put_record(1, &doc(100_000, "a")).unwrap();
        let key = record_key(1, RecordId(100_000));
        storage.schedule_read_damage(
            Damage::flip_byte(DamageTarget::Value, 3),
            Some(&key.pkey),
            Some(&key.ccols),
        );
        assert!(matches!(
            app.records().get(1, RecordId(100_000)),
            Err(Error::CorruptData(_))
        ));
    }
}
