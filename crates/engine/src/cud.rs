//! Creates and updates carried by an event

use appstruct_core::{QName, RecordId, ValidationCode, ValidationErrors};

use crate::row::{Record, Row, RowBuilder, RowCtx};

/// Planned update of one record
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRec {
    pub(crate) origin: Option<Record>,
    pub(crate) changes: Row,
    pub(crate) result: Option<Record>,
}

impl UpdateRec {
    /// Updated record ID.
    pub fn id(&self) -> RecordId {
        self.changes.id
    }

    /// Record before the update; absent for events read back from a log
    /// until the update is applied.
    pub fn origin(&self) -> Option<&Record> {
        self.origin.as_ref()
    }

    /// Changed fields only.
    pub fn changes(&self) -> &Row {
        &self.changes
    }

    /// Record after the update, when the origin is known.
    pub fn result(&self) -> Option<&Record> {
        self.result.as_ref()
    }

    pub(crate) fn with_origin(origin: Record, changes: Row) -> std::result::Result<Self, String> {
        let result = merge(&origin, &changes)?;
        Ok(Self {
            origin: Some(origin),
            changes,
            result: Some(result),
        })
    }

    /// Sets the origin and rebuilds the result.
    pub(crate) fn rebuild(&mut self, origin: Record) -> std::result::Result<(), String> {
        self.result = Some(merge(&origin, &self.changes)?);
        self.origin = Some(origin);
        Ok(())
    }
}

/// Applies `changes` to a copy of `origin`.
///
/// The ID, parent and container of a record can not change.
pub(crate) fn merge(origin: &Record, changes: &Row) -> std::result::Result<Record, String> {
    if changes.id != origin.id {
        return Err(format!(
            "record «{}» ID «{}» can not be updated",
            origin.qname, origin.id
        ));
    }
    if !changes.parent.is_null() && changes.parent != origin.parent {
        return Err(format!(
            "record «{}» «{}» parent ID «{}» can not be updated",
            origin.qname, origin.id, origin.parent
        ));
    }
    if !changes.container.is_empty() && changes.container != origin.container {
        return Err(format!(
            "record «{}» «{}» container «{}» can not be updated",
            origin.qname, origin.id, origin.container
        ));
    }

    let mut result = origin.clone();
    let row = result.row_mut();
    row.is_active = changes.is_active;
    for (k, v) in &changes.values {
        row.values.insert(k.clone(), v.clone());
    }
    Ok(result)
}

/// One CUD row, dispatched by kind
#[derive(Debug, Clone, Copy)]
pub enum CudRow<'a> {
    /// Created record
    Create(&'a Record),
    /// Updated record
    Update {
        /// Record before the update, if known
        origin: Option<&'a Record>,
        /// Changed fields
        changes: &'a Row,
        /// Record after the update, if known
        result: Option<&'a Record>,
    },
}

impl<'a> CudRow<'a> {
    /// Returns true for creates.
    pub fn is_new(&self) -> bool {
        matches!(self, CudRow::Create(_))
    }

    /// Created record or update changes.
    pub fn row(&self) -> &'a Row {
        match *self {
            CudRow::Create(r) => r.row(),
            CudRow::Update { changes, .. } => changes,
        }
    }
}

/// Creates and updates of one event
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cuds {
    pub(crate) creates: Vec<Record>,
    pub(crate) updates: Vec<UpdateRec>,
}

impl Cuds {
    /// Returns true if nothing is created or updated.
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty()
    }

    /// Created records.
    pub fn creates(&self) -> &[Record] {
        &self.creates
    }

    /// Updates.
    pub fn updates(&self) -> &[UpdateRec] {
        &self.updates
    }

    /// Creates, then updates.
    pub fn iter(&self) -> impl Iterator<Item = CudRow<'_>> {
        self.creates.iter().map(CudRow::Create).chain(self.updates.iter().map(|u| {
            CudRow::Update {
                origin: u.origin.as_ref(),
                changes: &u.changes,
                result: u.result.as_ref(),
            }
        }))
    }
}

/// Builder of event CUDs
pub struct CudBuilder {
    ctx: RowCtx,
    creates: Vec<RowBuilder>,
    updates: Vec<(Record, RowBuilder)>,
}

impl CudBuilder {
    pub(crate) fn new(ctx: RowCtx) -> Self {
        Self {
            ctx,
            creates: Vec::new(),
            updates: Vec::new(),
        }
    }

    /// Adds a new record of type `qname`.
    pub fn create(&mut self, qname: QName) -> &mut RowBuilder {
        self.creates.push(RowBuilder::new(self.ctx.clone(), qname));
        let idx = self.creates.len() - 1;
        &mut self.creates[idx]
    }

    /// Changes an existing record. Repeated updates of one record share
    /// their changes.
    pub fn update(&mut self, record: &Record) -> &mut RowBuilder {
        let idx = match self.updates.iter().position(|(r, _)| r.id == record.id) {
            Some(idx) => idx,
            None => {
                let mut changes = Row::new(record.qname.clone());
                changes.id = record.id;
                changes.parent = record.parent;
                changes.container = record.container.clone();
                changes.is_active = record.is_active;
                self.updates.push((
                    record.clone(),
                    RowBuilder::from_row(self.ctx.clone(), changes),
                ));
                self.updates.len() - 1
            }
        };
        &mut self.updates[idx].1
    }

    pub(crate) fn finish(self) -> (Cuds, ValidationErrors) {
        let mut errors = ValidationErrors::new();
        let mut cuds = Cuds::default();

        for b in self.creates {
            let (row, errs) = b.finish();
            errors.extend(errs);
            cuds.creates.push(Record::from_row(row));
        }

        for (origin, b) in self.updates {
            let (changes, errs) = b.finish();
            errors.extend(errs);
            match UpdateRec::with_origin(origin.clone(), changes.clone()) {
                Ok(u) => cuds.updates.push(u),
                Err(msg) => {
                    errors.push(ValidationCode::InvalidFieldName, msg);
                    cuds.updates.push(UpdateRec {
                        origin: Some(origin.clone()),
                        changes,
                        result: Some(origin),
                    });
                }
            }
        }

        (cuds, errors)
    }
}
