//! Storage ID generation
//!
//! Raw IDs chosen by clients are replaced with storage IDs when an event
//! is written to the partition log. The generator is supplied by the
//! caller, which owns the ID sequences of its workspaces.

use appstruct_core::consts::{MAX_RAW_RECORD_ID, MAX_SINGLETON_ID};
use appstruct_core::{Error, RecordId, Result};

use crate::appdef::TypeDef;

/// Issues storage IDs for raw IDs
pub trait IdGenerator {
    /// Returns the storage ID replacing `raw` in a row of type `t`.
    fn next_id(&mut self, raw: RecordId, t: &TypeDef) -> Result<RecordId>;
}

impl<F> IdGenerator for F
where
    F: FnMut(RecordId, &TypeDef) -> Result<RecordId>,
{
    fn next_id(&mut self, raw: RecordId, t: &TypeDef) -> Result<RecordId> {
        self(raw, t)
    }
}

/// First ID issued by [`SequentialIdGenerator::new`]: above raw and
/// singleton IDs.
pub const FIRST_STORAGE_ID: RecordId = RecordId(MAX_SINGLETON_ID.0 + 1);

/// Issues increasing IDs from one sequence
#[derive(Debug, Clone)]
pub struct SequentialIdGenerator {
    next: u64,
}

impl SequentialIdGenerator {
    /// Generator starting at [`FIRST_STORAGE_ID`].
    pub fn new() -> Self {
        Self {
            next: FIRST_STORAGE_ID.0,
        }
    }

    /// Generator starting at `first`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `first` is null or raw.
    pub fn starting_at(first: RecordId) -> Result<Self> {
        if first.as_u64() <= MAX_RAW_RECORD_ID.as_u64() {
            return Err(Error::invalid_argument(format!(
                "first storage id {} must be above raw ids",
                first
            )));
        }
        Ok(Self { next: first.0 })
    }

    /// ID the next call will issue.
    pub fn peek(&self) -> RecordId {
        RecordId(self.next)
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&mut self, _raw: RecordId, _t: &TypeDef) -> Result<RecordId> {
        let id = RecordId(self.next);
        self.next = self
            .next
            .checked_add(1)
            .ok_or_else(|| Error::IdSpaceExhausted("record id sequence".to_string()))?;
        Ok(id)
    }
}
