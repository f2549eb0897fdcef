//! Event logs
//!
//! Every event is stored twice: in the partition log (PLog), keyed by
//! handling partition and PLog offset, and in the workspace log (WLog),
//! keyed by workspace and WLog offset. Both use the sharded offset layout,
//! so a range read walks one storage partition per 4096 offsets.
//!
//! Reads of exactly one event are point lookups. The PLog keeps a bounded
//! cache of recently written events for them.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use appstruct_core::layout::{glue, lo_from_bytes, plog_key, wlog_key};
use appstruct_core::{
    CancelToken, Error, Offset, PartitionId, ReadCount, RecordId, Result, ShardRange, ShardRanges,
    StorageKey, WsId, QNAME_FOR_CORRUPTED_DATA,
};

use crate::app::AppContext;
use crate::appdef::{AppDef, TypeDef};
use crate::cud::Cuds;
use crate::element::Element;
use crate::event::{Event, RawEventBuilder, RawEventParams, SyncInfo, SyncRawEventParams};
use crate::ids::IdGenerator;
use crate::row::Row;

/// Which log a read addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Log {
    PLog(PartitionId),
    WLog(WsId),
}

impl Log {
    fn key(self, offset: Offset) -> StorageKey {
        match self {
            Log::PLog(p) => plog_key(p, offset),
            Log::WLog(ws) => wlog_key(ws, offset),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Log::PLog(_) => "plog",
            Log::WLog(_) => "wlog",
        }
    }
}

/// Recently written PLog events, evicted oldest first
struct PlogCache {
    capacity: usize,
    events: FxHashMap<(PartitionId, Offset), Arc<Event>>,
    order: VecDeque<(PartitionId, Offset)>,
}

impl PlogCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: FxHashMap::default(),
            order: VecDeque::new(),
        }
    }

    fn put(&mut self, partition: PartitionId, offset: Offset, event: Arc<Event>) {
        if self.capacity == 0 {
            return;
        }
        let key = (partition, offset);
        if self.events.insert(key, event).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.events.remove(&old);
            }
        }
    }

    fn get(&self, partition: PartitionId, offset: Offset) -> Option<Arc<Event>> {
        self.events.get(&(partition, offset)).cloned()
    }
}

/// Event logs of one application
pub struct Events {
    ctx: Arc<AppContext>,
    cache: Mutex<PlogCache>,
}

impl Events {
    pub(crate) fn new(ctx: Arc<AppContext>) -> Self {
        let capacity = ctx.config.params().plog_cache_size;
        Self {
            ctx,
            cache: Mutex::new(PlogCache::new(capacity)),
        }
    }

    /// Builder of a new event.
    pub fn new_raw_event_builder(&self, params: RawEventParams) -> RawEventBuilder {
        RawEventBuilder::new(Arc::clone(&self.ctx), params, None)
    }

    /// Builder of an event synced from a device. Synced events carry
    /// storage IDs instead of raw IDs.
    pub fn sync_raw_event_builder(&self, params: SyncRawEventParams) -> RawEventBuilder {
        let sync = SyncInfo {
            device_id: params.device_id,
            synced_at: params.synced_at,
        };
        RawEventBuilder::new(Arc::clone(&self.ctx), params.generic, Some(sync))
    }

    /// Wraps a `sys.Corrupted` event without storing it.
    ///
    /// # Errors
    ///
    /// `ContractViolation` for any other event or a non-null PLog offset.
    pub fn build_plog_event(&self, event: Event) -> Result<Arc<Event>> {
        if event.qname() != &QNAME_FOR_CORRUPTED_DATA {
            return Err(Error::contract(format!(
                "plog event can be built only from «{}», got «{}»",
                QNAME_FOR_CORRUPTED_DATA,
                event.qname()
            )));
        }
        if event.plog_offset() != 0 {
            return Err(Error::contract(format!(
                "plog event «{}» must have null plog offset, got {}",
                QNAME_FOR_CORRUPTED_DATA,
                event.plog_offset()
            )));
        }
        Ok(Arc::new(event))
    }

    /// Stores an event in the partition log.
    ///
    /// A `build_error` turns the event into an error event. Raw IDs of a
    /// valid event are replaced by IDs from `gen` (singletons take their
    /// reserved ID); if that fails the event is stored as an error event
    /// too. Unlogged argument values are masked before storing.
    ///
    /// Raw request bytes are kept only by error events.
    pub fn put_plog(
        &self,
        mut event: Event,
        build_error: Option<Error>,
        gen: &mut dyn IdGenerator,
    ) -> Result<Arc<Event>> {
        if let Some(err) = build_error {
            event.set_build_error(&err);
        }

        if event.is_valid() {
            if let Err(e) = regenerate_ids(&self.ctx, &mut event, gen) {
                debug!(
                    target: "appstruct::events",
                    plog_offset = event.plog_offset(),
                    error = %e,
                    "id regeneration failed"
                );
                event.set_build_error(&e);
            }
        }

        if event.is_valid() {
            if !event.unlogged.qname().is_null() {
                event.unlogged.mask_values();
            }
            event.bytes.clear();
        } else {
            if !event.unlogged.qname().is_null() {
                event.bytes.clear();
                if let Some(err) = event.error.as_mut() {
                    err.original_bytes.clear();
                }
            }
            event.arg = Element::null();
            event.unlogged = Element::null();
            event.cuds = Cuds::default();
        }

        let data = self.ctx.codec().encode_event(&event)?;
        let key = plog_key(event.partition, event.plog_offset);
        self.ctx
            .storage
            .put(&key.pkey, &key.ccols, &data)
            .map_err(|e| e.in_context("put plog event"))?;
        debug!(
            target: "appstruct::events",
            partition = event.partition,
            plog_offset = event.plog_offset,
            valid = event.is_valid(),
            bytes = data.len(),
            "plog event stored"
        );

        let event = Arc::new(event);
        self.cache
            .lock()
            .put(event.partition, event.plog_offset, Arc::clone(&event));
        Ok(event)
    }

    /// Stores a partition log event in the workspace log.
    pub fn put_wlog(&self, event: &Event) -> Result<()> {
        let data = self.ctx.codec().encode_event(event)?;
        let key = wlog_key(event.ws, event.wlog_offset);
        self.ctx
            .storage
            .put(&key.pkey, &key.ccols, &data)
            .map_err(|e| e.in_context("put wlog event"))?;
        debug!(
            target: "appstruct::events",
            ws = event.ws,
            wlog_offset = event.wlog_offset,
            "wlog event stored"
        );
        Ok(())
    }

    /// Reads `count` partition log events from `offset` in ascending order.
    ///
    /// A read of one event is a point lookup; a missing event calls
    /// nothing. Longer reads stop at the first shard without events, at
    /// the first decode or callback error, or on cancellation (without
    /// error).
    pub fn read_plog(
        &self,
        cancel: &CancelToken,
        partition: PartitionId,
        offset: Offset,
        count: ReadCount,
        mut cb: impl FnMut(Offset, Arc<Event>) -> Result<()>,
    ) -> Result<()> {
        if count.is_single() {
            let cached = self.cache.lock().get(partition, offset);
            if let Some(event) = cached {
                return cb(offset, event);
            }
        }
        read_log(&self.ctx, cancel, Log::PLog(partition), offset, count, &mut cb)
    }

    /// Reads `count` workspace log events from `offset` in ascending order.
    ///
    /// Same stop rules as [`read_plog`](Self::read_plog).
    pub fn read_wlog(
        &self,
        cancel: &CancelToken,
        ws: WsId,
        offset: Offset,
        count: ReadCount,
        mut cb: impl FnMut(Offset, Arc<Event>) -> Result<()>,
    ) -> Result<()> {
        read_log(&self.ctx, cancel, Log::WLog(ws), offset, count, &mut cb)
    }

    /// Lazy iterator over partition log events.
    pub fn plog_reader(
        &self,
        cancel: CancelToken,
        partition: PartitionId,
        offset: Offset,
        count: ReadCount,
    ) -> LogReader {
        LogReader::new(Arc::clone(&self.ctx), cancel, Log::PLog(partition), offset, count)
    }

    /// Lazy iterator over workspace log events.
    pub fn wlog_reader(&self, cancel: CancelToken, ws: WsId, offset: Offset, count: ReadCount) -> LogReader {
        LogReader::new(Arc::clone(&self.ctx), cancel, Log::WLog(ws), offset, count)
    }
}

fn type_def<'a>(app_def: &'a AppDef, row: &Row) -> Result<&'a TypeDef> {
    app_def
        .type_def(row.qname())
        .ok_or_else(|| Error::NameNotFound(format!("type «{}»", row.qname())))
}

fn remap_row(row: &mut Row, plan: &impl Fn(RecordId) -> Option<RecordId>) {
    if let Some(id) = plan(row.id) {
        row.id = id;
    }
    if let Some(parent) = plan(row.parent) {
        row.parent = parent;
    }
    row.remap_record_ids(plan);
}

/// Replaces raw IDs of a document argument and of created records, then
/// rewrites parents and references pointing at them.
fn regenerate_ids(ctx: &AppContext, event: &mut Event, gen: &mut dyn IdGenerator) -> Result<()> {
    let app_def = ctx.config.app_def();
    let mut plan: FxHashMap<RecordId, RecordId> = FxHashMap::default();

    let arg_is_document = !event.arg.qname().is_null()
        && type_def(app_def, &event.arg)?.kind().is_document();
    if arg_is_document {
        let mut raws: Vec<&Element> = Vec::new();
        event.arg.for_each(&mut |el| {
            if el.id().is_raw() {
                raws.push(el);
            }
        });
        for el in raws {
            let id = gen.next_id(el.id(), type_def(app_def, el)?)?;
            plan.insert(el.id(), id);
        }
    }

    for rec in &event.cuds.creates {
        let raw = rec.id();
        if !raw.is_raw() {
            continue;
        }
        let t = type_def(app_def, rec)?;
        let id = if t.is_singleton() {
            ctx.singletons.id(t.qname())?
        } else {
            gen.next_id(raw, t)?
        };
        plan.insert(raw, id);
    }

    if plan.is_empty() {
        return Ok(());
    }
    debug!(target: "appstruct::events", count = plan.len(), "raw ids regenerated");

    let remap = |id: RecordId| plan.get(&id).copied();
    event.arg.for_each_mut(&mut |el| remap_row(&mut el.row, &remap));
    for rec in &mut event.cuds.creates {
        remap_row(rec.row_mut(), &remap);
    }
    for upd in &mut event.cuds.updates {
        if upd.changes.remap_record_ids(&remap) {
            if let Some(origin) = upd.origin.take() {
                upd.rebuild(origin).map_err(Error::invalid_argument)?;
            }
        }
    }
    Ok(())
}

fn decode_at(ctx: &AppContext, data: &[u8]) -> Result<Arc<Event>> {
    ctx.codec().decode_event(data).map(Arc::new)
}

/// Reads one shard range, returning the number of entries seen.
fn read_shard(
    ctx: &AppContext,
    cancel: &CancelToken,
    log: Log,
    range: &ShardRange,
    cb: &mut dyn FnMut(Offset, Arc<Event>) -> Result<()>,
) -> Result<usize> {
    let key = log.key(range.first());
    let start = range.start_ccols();
    let finish = range.finish_ccols();
    let mut seen = 0usize;
    ctx.storage.read(
        cancel,
        &key.pkey,
        Some(&start),
        finish.as_deref(),
        &mut |ccols, value| {
            seen += 1;
            let lo = lo_from_bytes(ccols).ok_or_else(|| {
                Error::corrupt(format!("{} clustering columns of {} bytes", log.name(), ccols.len()))
            })?;
            let event = decode_at(ctx, value)?;
            cb(glue(range.hi, lo), event)
        },
    )?;
    Ok(seen)
}

fn read_log(
    ctx: &AppContext,
    cancel: &CancelToken,
    log: Log,
    offset: Offset,
    count: ReadCount,
    cb: &mut dyn FnMut(Offset, Arc<Event>) -> Result<()>,
) -> Result<()> {
    if count.is_single() {
        let key = log.key(offset);
        let data = ctx
            .storage
            .get(&key.pkey, &key.ccols)
            .map_err(|e| e.in_context(&format!("read {} event", log.name())))?;
        return match data {
            Some(data) => cb(offset, decode_at(ctx, &data)?),
            None => Ok(()),
        };
    }

    for range in ShardRanges::new(offset, count) {
        if cancel.is_cancelled() {
            break;
        }
        let seen = read_shard(ctx, cancel, log, &range, cb)
            .map_err(|e| e.in_context(&format!("read {} events", log.name())))?;
        debug!(
            target: "appstruct::events",
            log = log.name(),
            from = range.first(),
            to = range.last(),
            seen,
            "shard read"
        );
        if seen == 0 {
            break;
        }
    }
    Ok(())
}

/// Iterator over log events, reading one shard at a time
///
/// Yields `(offset, event)` in ascending offset order. The first error is
/// yielded once and ends the iteration. To read again, request a new
/// reader; a reader can not resume after an error.
pub struct LogReader {
    ctx: Arc<AppContext>,
    cancel: CancelToken,
    log: Log,
    ranges: ShardRanges,
    buffer: VecDeque<Result<(Offset, Arc<Event>)>>,
    done: bool,
}

impl LogReader {
    fn new(ctx: Arc<AppContext>, cancel: CancelToken, log: Log, offset: Offset, count: ReadCount) -> Self {
        Self {
            ctx,
            cancel,
            log,
            ranges: ShardRanges::new(offset, count),
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn fill(&mut self) {
        let Some(range) = self.ranges.next() else {
            self.done = true;
            return;
        };
        if self.cancel.is_cancelled() {
            self.done = true;
            return;
        }
        let mut events = Vec::new();
        let res = read_shard(&self.ctx, &self.cancel, self.log, &range, &mut |ofs, ev| {
            events.push((ofs, ev));
            Ok(())
        });
        let empty = events.is_empty();
        self.buffer.extend(events.into_iter().map(Ok));
        match res {
            Ok(0) => self.done = true,
            Ok(_) => {}
            Err(e) => {
                self.buffer
                    .push_back(Err(e.in_context(&format!("read {} events", self.log.name()))));
                self.done = true;
            }
        }
        if empty && self.buffer.is_empty() {
            self.done = true;
        }
    }
}

impl Iterator for LogReader {
    type Item = Result<(Offset, Arc<Event>)>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.buffer.is_empty() && !self.done {
            self.fill();
        }
        self.buffer.pop_front()
    }
}
