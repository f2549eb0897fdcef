//! Fault-injecting storage wrapper
//!
//! Every scheduled fault fires once: on the first matching call it is
//! consumed. A fault matches a call when its partition key (if given) and
//! clustering columns (if given) equal the call's.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use appstruct_core::{
    AppStorage, BatchItem, CancelToken, Error, GetBatchItem, ReadCallback, Result,
};

use crate::mem::MemStorage;

/// Part of an entry a damage mutates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageTarget {
    /// Clustering columns passed to a range read callback
    Key,
    /// Value returned by get, get_batch or a range read
    Value,
}

/// One-shot mutation applied to data on its way out of the store
pub struct Damage {
    target: DamageTarget,
    apply: Box<dyn FnMut(&mut Vec<u8>) + Send>,
}

impl Damage {
    /// Damage of values.
    pub fn value(f: impl FnMut(&mut Vec<u8>) + Send + 'static) -> Self {
        Self {
            target: DamageTarget::Value,
            apply: Box::new(f),
        }
    }

    /// Damage of clustering columns seen by range reads.
    pub fn key(f: impl FnMut(&mut Vec<u8>) + Send + 'static) -> Self {
        Self {
            target: DamageTarget::Key,
            apply: Box::new(f),
        }
    }

    /// Replaces the byte at `index` (if present) with `byte`.
    pub fn set_byte(target: DamageTarget, index: usize, byte: u8) -> Self {
        let f = move |b: &mut Vec<u8>| {
            if let Some(x) = b.get_mut(index) {
                *x = byte;
            }
        };
        Self {
            target,
            apply: Box::new(f),
        }
    }

    /// Flips every bit of the byte at `index` (if present).
    pub fn flip_byte(target: DamageTarget, index: usize) -> Self {
        let f = move |b: &mut Vec<u8>| {
            if let Some(x) = b.get_mut(index) {
                *x ^= 0xFF;
            }
        };
        Self {
            target,
            apply: Box::new(f),
        }
    }
}

impl std::fmt::Debug for Damage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Damage").field("target", &self.target).finish()
    }
}

#[derive(Debug, Default)]
struct Filter {
    pkey: Option<Vec<u8>>,
    ccols: Option<Vec<u8>>,
}

impl Filter {
    fn new(pkey: Option<&[u8]>, ccols: Option<&[u8]>) -> Self {
        Self {
            pkey: pkey.map(<[u8]>::to_vec),
            ccols: ccols.map(<[u8]>::to_vec),
        }
    }

    fn matches(&self, pkey: &[u8], ccols: &[u8]) -> bool {
        self.pkey.as_deref().map_or(true, |p| p == pkey)
            && self.ccols.as_deref().map_or(true, |c| c == ccols)
    }
}

#[derive(Debug, Default)]
struct Schedule {
    get_error: Option<(String, Filter)>,
    put_error: Option<(String, Filter)>,
    damage: Option<(Damage, Filter)>,
}

impl Schedule {
    fn take_get_error(&mut self, pkey: &[u8], ccols: &[u8]) -> Option<Error> {
        take_error(&mut self.get_error, "get", pkey, ccols)
    }

    fn take_put_error(&mut self, pkey: &[u8], ccols: &[u8]) -> Option<Error> {
        take_error(&mut self.put_error, "put", pkey, ccols)
    }

    fn apply_damage(&mut self, target: DamageTarget, pkey: &[u8], ccols: &[u8], data: &mut Vec<u8>) {
        let fire = matches!(&self.damage, Some((d, f)) if d.target == target && f.matches(pkey, ccols));
        if fire {
            if let Some((mut d, _)) = self.damage.take() {
                debug!(target: "appstruct::storage", ?target, "scheduled damage applied");
                (d.apply)(data);
            }
        }
    }
}

fn take_error(
    slot: &mut Option<(String, Filter)>,
    op: &str,
    pkey: &[u8],
    ccols: &[u8],
) -> Option<Error> {
    let fire = matches!(slot, Some((_, f)) if f.matches(pkey, ccols));
    if !fire {
        return None;
    }
    slot.take().map(|(msg, _)| {
        debug!(target: "appstruct::storage", op, "scheduled error fired");
        Error::storage(op, msg)
    })
}

/// Store wrapper with scheduled failures
pub struct TestStorage {
    inner: Arc<dyn AppStorage>,
    schedule: Mutex<Schedule>,
}

impl TestStorage {
    /// Wraps a fresh [`MemStorage`]
    pub fn new() -> Self {
        Self::wrap(Arc::new(MemStorage::new()))
    }

    /// Wraps an existing store
    pub fn wrap(inner: Arc<dyn AppStorage>) -> Self {
        Self {
            inner,
            schedule: Mutex::new(Schedule::default()),
        }
    }

    /// The wrapped store, bypassing scheduled faults
    pub fn inner(&self) -> &Arc<dyn AppStorage> {
        &self.inner
    }

    /// Clears all scheduled faults
    pub fn reset(&self) {
        *self.schedule.lock() = Schedule::default();
    }

    /// Next matching get, get_batch or range read entry fails with `message`
    pub fn schedule_get_error(&self, message: &str, pkey: Option<&[u8]>, ccols: Option<&[u8]>) {
        self.schedule.lock().get_error = Some((message.to_string(), Filter::new(pkey, ccols)));
    }

    /// Next matching put or put_batch fails with `message`
    pub fn schedule_put_error(&self, message: &str, pkey: Option<&[u8]>, ccols: Option<&[u8]>) {
        self.schedule.lock().put_error = Some((message.to_string(), Filter::new(pkey, ccols)));
    }

    /// Next matching read output is mutated by `damage`
    pub fn schedule_read_damage(&self, damage: Damage, pkey: Option<&[u8]>, ccols: Option<&[u8]>) {
        self.schedule.lock().damage = Some((damage, Filter::new(pkey, ccols)));
    }

    /// Returns true if no fault is pending
    pub fn is_idle(&self) -> bool {
        let s = self.schedule.lock();
        s.get_error.is_none() && s.put_error.is_none() && s.damage.is_none()
    }
}

impl Default for TestStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl AppStorage for TestStorage {
    fn get(&self, pkey: &[u8], ccols: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(err) = self.schedule.lock().take_get_error(pkey, ccols) {
            return Err(err);
        }
        let mut data = self.inner.get(pkey, ccols)?;
        if let Some(v) = data.as_mut() {
            self.schedule
                .lock()
                .apply_damage(DamageTarget::Value, pkey, ccols, v);
        }
        Ok(data)
    }

    fn get_batch(&self, pkey: &[u8], items: &mut [GetBatchItem]) -> Result<()> {
        {
            let mut s = self.schedule.lock();
            for item in items.iter() {
                if let Some(err) = s.take_get_error(pkey, &item.ccols) {
                    return Err(err);
                }
            }
        }
        self.inner.get_batch(pkey, items)?;
        let mut s = self.schedule.lock();
        for item in items.iter_mut() {
            if let Some(v) = item.data.as_mut() {
                s.apply_damage(DamageTarget::Value, pkey, &item.ccols, v);
            }
        }
        Ok(())
    }

    fn put(&self, pkey: &[u8], ccols: &[u8], value: &[u8]) -> Result<()> {
        if let Some(err) = self.schedule.lock().take_put_error(pkey, ccols) {
            return Err(err);
        }
        self.inner.put(pkey, ccols, value)
    }

    fn put_batch(&self, items: &[BatchItem]) -> Result<()> {
        {
            let mut s = self.schedule.lock();
            for item in items {
                if let Some(err) = s.take_put_error(&item.pkey, &item.ccols) {
                    return Err(err);
                }
            }
        }
        self.inner.put_batch(items)
    }

    fn read(
        &self,
        cancel: &CancelToken,
        pkey: &[u8],
        start: Option<&[u8]>,
        finish: Option<&[u8]>,
        cb: &mut ReadCallback<'_>,
    ) -> Result<()> {
        self.inner.read(cancel, pkey, start, finish, &mut |ccols, value| {
            let (ccols, value) = {
                let mut s = self.schedule.lock();
                if let Some(err) = s.take_get_error(pkey, ccols) {
                    return Err(err);
                }
                let mut value = value.to_vec();
                s.apply_damage(DamageTarget::Value, pkey, ccols, &mut value);
                let mut key = ccols.to_vec();
                s.apply_damage(DamageTarget::Key, pkey, ccols, &mut key);
                (key, value)
            };
            cb(&ccols, &value)
        })
    }
}
