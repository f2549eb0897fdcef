//! Events and the raw event builder
//!
//! An event is built in three steps:
//!
//! 1. Take a [`RawEventBuilder`] from the application events with the
//!    event coordinates (partition, offsets, workspace, command name).
//! 2. Fill the argument object, the unlogged argument object and the CUDs.
//! 3. Call [`RawEventBuilder::build_raw_event`]. The event is returned even
//!    when the build fails: pass the failure to `put_plog` to store the
//!    event as an error event (`sys.Error`).

use std::sync::Arc;

use appstruct_core::{
    Error, Offset, PartitionId, QName, Result, UnixMilli, ValidationCode, ValidationErrors, WsId,
    NULL_QNAME, QNAME_COMMAND_CUD, QNAME_FOR_CORRUPTED_DATA, QNAME_FOR_ERROR,
};

use crate::app::AppContext;
use crate::appdef::TypeKind;
use crate::cud::{CudBuilder, Cuds};
use crate::element::{Element, ObjectBuilder};
use crate::records;
use crate::validate;

static ERROR_QNAME: QName = QNAME_FOR_ERROR;

/// Coordinates and payload of a new event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEventParams {
    /// Partition that handled the command
    pub handling_partition: PartitionId,
    /// Offset in the partition log
    pub plog_offset: Offset,
    /// Destination workspace
    pub workspace: WsId,
    /// Offset in the workspace log
    pub wlog_offset: Offset,
    /// Command name, or the name of an operation document
    pub qname: QName,
    /// Registration time
    pub registered_at: UnixMilli,
    /// Raw request bytes, kept for error events
    pub event_bytes: Vec<u8>,
}

/// Coordinates of an event synced from a device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncRawEventParams {
    /// Generic event coordinates
    pub generic: RawEventParams,
    /// Device the event was created on
    pub device_id: u16,
    /// Time the event was synced
    pub synced_at: UnixMilli,
}

/// Sync attributes of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncInfo {
    /// Device the event was created on
    pub device_id: u16,
    /// Time the event was synced
    pub synced_at: UnixMilli,
}

/// Why an event was stored as `sys.Error`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventError {
    pub(crate) message: String,
    pub(crate) original_name: QName,
    pub(crate) original_bytes: Vec<u8>,
}

impl EventError {
    /// Build or ID regeneration failure text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Event name the event was built with.
    pub fn original_name(&self) -> &QName {
        &self.original_name
    }

    /// Raw request bytes; empty if the event had unlogged arguments.
    pub fn original_bytes(&self) -> &[u8] {
        &self.original_bytes
    }
}

/// Event as stored in both logs
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub(crate) partition: PartitionId,
    pub(crate) plog_offset: Offset,
    pub(crate) ws: WsId,
    pub(crate) wlog_offset: Offset,
    pub(crate) name: QName,
    pub(crate) registered_at: UnixMilli,
    pub(crate) sync: Option<SyncInfo>,
    pub(crate) bytes: Vec<u8>,
    pub(crate) arg: Element,
    pub(crate) unlogged: Element,
    pub(crate) cuds: Cuds,
    pub(crate) error: Option<EventError>,
}

impl Event {
    pub(crate) fn from_params(params: RawEventParams, sync: Option<SyncInfo>) -> Self {
        Self {
            partition: params.handling_partition,
            plog_offset: params.plog_offset,
            ws: params.workspace,
            wlog_offset: params.wlog_offset,
            name: params.qname,
            registered_at: params.registered_at,
            sync,
            bytes: params.event_bytes,
            arg: Element::null(),
            unlogged: Element::null(),
            cuds: Cuds::default(),
            error: None,
        }
    }

    /// Event name: `sys.Error` for error events, otherwise the built name.
    pub fn qname(&self) -> &QName {
        match self.error {
            Some(_) => &ERROR_QNAME,
            None => &self.name,
        }
    }

    /// Handling partition.
    pub fn handling_partition(&self) -> PartitionId {
        self.partition
    }

    /// Offset in the partition log.
    pub fn plog_offset(&self) -> Offset {
        self.plog_offset
    }

    /// Destination workspace.
    pub fn workspace(&self) -> WsId {
        self.ws
    }

    /// Offset in the workspace log.
    pub fn wlog_offset(&self) -> Offset {
        self.wlog_offset
    }

    /// Registration time.
    pub fn registered_at(&self) -> UnixMilli {
        self.registered_at
    }

    /// Returns true for events synced from a device.
    pub fn synced(&self) -> bool {
        self.sync.is_some()
    }

    /// Sync attributes, if synced.
    pub fn sync_info(&self) -> Option<SyncInfo> {
        self.sync
    }

    /// Raw request bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Argument object; null if the command has no argument.
    pub fn argument_object(&self) -> &Element {
        &self.arg
    }

    /// Unlogged argument object, values masked once stored.
    pub fn argument_unlogged_object(&self) -> &Element {
        &self.unlogged
    }

    /// Creates and updates.
    pub fn cuds(&self) -> &Cuds {
        &self.cuds
    }

    /// Error of an error event.
    pub fn error(&self) -> Option<&EventError> {
        self.error.as_ref()
    }

    /// Returns true unless this is an error event.
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    pub(crate) fn set_build_error(&mut self, err: &Error) {
        self.error = Some(EventError {
            message: err.to_string(),
            original_name: self.name.clone(),
            original_bytes: self.bytes.clone(),
        });
    }
}

/// Argument and unlogged argument names of an event name.
///
/// `sys.CUD` and `sys.Corrupted` have no argument objects; a command takes
/// the names from its resource; an operation document is its own argument.
pub(crate) fn argument_names(ctx: &AppContext, name: &QName) -> Result<(QName, QName)> {
    if name == &QNAME_COMMAND_CUD || name == &QNAME_FOR_CORRUPTED_DATA {
        return Ok((NULL_QNAME, NULL_QNAME));
    }
    if let Some(cmd) = ctx.config.resources().command_function(name) {
        return Ok((cmd.params().clone(), cmd.unlogged_params().clone()));
    }
    match ctx.config.app_def().type_def(name) {
        Some(t) if t.kind() == TypeKind::ODoc => Ok((name.clone(), NULL_QNAME)),
        _ => Err(Error::NameNotFound(format!("command function «{}»", name))),
    }
}

/// Builder of one raw event
pub struct RawEventBuilder {
    ctx: Arc<AppContext>,
    event: Event,
    arg: ObjectBuilder,
    unlogged: ObjectBuilder,
    cud: CudBuilder,
}

impl RawEventBuilder {
    pub(crate) fn new(ctx: Arc<AppContext>, params: RawEventParams, sync: Option<SyncInfo>) -> Self {
        let event = Event::from_params(params, sync);
        let (arg, unlogged) =
            argument_names(&ctx, &event.name).unwrap_or((NULL_QNAME, NULL_QNAME));
        let row_ctx = ctx.row_ctx();
        Self {
            arg: ObjectBuilder::new(row_ctx.clone(), arg),
            unlogged: ObjectBuilder::new(row_ctx.clone(), unlogged),
            cud: CudBuilder::new(row_ctx),
            ctx,
            event,
        }
    }

    /// Builder of the argument object.
    pub fn argument_object_builder(&mut self) -> &mut ObjectBuilder {
        &mut self.arg
    }

    /// Builder of the unlogged argument object.
    pub fn argument_unlogged_object_builder(&mut self) -> &mut ObjectBuilder {
        &mut self.unlogged
    }

    /// Builder of creates and updates.
    pub fn cud_builder(&mut self) -> &mut CudBuilder {
        &mut self.cud
    }

    /// Builds and validates the event.
    ///
    /// Checks, in order: the event name, collected put errors, argument and
    /// CUD validation, then the state of the records the event touches. The
    /// event is returned in every case; a failed event is still storable
    /// when the failure is handed to `put_plog`.
    pub fn build_raw_event(self) -> (Event, Result<()>) {
        let RawEventBuilder {
            ctx,
            mut event,
            arg,
            unlogged,
            cud,
        } = self;

        let mut errors = ValidationErrors::new();
        let (arg, errs) = arg.finish();
        errors.extend(errs);
        let (unlogged, errs) = unlogged.finish();
        errors.extend(errs);
        let (cuds, errs) = cud.finish();
        errors.extend(errs);
        event.arg = arg;
        event.unlogged = unlogged;
        event.cuds = cuds;

        let result = build(&ctx, &mut event, errors);
        (event, result)
    }
}

fn build(ctx: &AppContext, event: &mut Event, errors: ValidationErrors) -> Result<()> {
    if event.name.is_null() {
        let mut errs = ValidationErrors::new();
        errs.push(ValidationCode::EmptyTypeName, "empty event command name");
        return Err(Error::Validation(errs));
    }
    if let Err(e) = ctx.qnames.id(&event.name) {
        let mut errs = ValidationErrors::new();
        errs.push(
            ValidationCode::InvalidTypeName,
            format!("unknown event command name «{}»: {}", event.name, e),
        );
        return Err(Error::Validation(errs));
    }
    errors.into_result()?;

    let names = argument_names(ctx, &event.name);
    validate::validate_event(ctx.config.app_def(), event, names).into_result()?;

    records::valid_event(ctx, event)
}
