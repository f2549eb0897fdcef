//! Event validation
//!
//! Runs on a built event before it is stored. Every failure is collected
//! with its [`ValidationCode`]; nothing stops at the first failure.
//!
//! - IDs: raw IDs where required, no ID used twice, references to IDs
//!   created in the same event point at allowed types, created children
//!   fit the container of their parent
//! - Arguments: argument types match the command, required fields are
//!   set, container occurrences are respected, children point at their
//!   parent (an omitted parent ID is restored)
//! - CUDs: `sys.CUD` carries at least one CUD, counts fit, kinds are
//!   allowed, required fields are set

use rustc_hash::{FxHashMap, FxHashSet};

use appstruct_core::{
    QName, RecordId, Result, ValidationCode, ValidationErrors, NULL_QNAME, QNAME_COMMAND_CUD,
};

use crate::appdef::{AppDef, DataKind, TypeDef};
use crate::element::Element;
use crate::event::Event;
use crate::row::Row;

/// Validates `event`, restoring omitted parent IDs of argument children.
///
/// `arg_names` are the expected argument and unlogged argument names.
pub(crate) fn validate_event(
    app_def: &AppDef,
    event: &mut Event,
    arg_names: Result<(QName, QName)>,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    validate_ids(app_def, event, &mut errors);
    validate_args(app_def, event, arg_names, &mut errors);
    validate_cuds(app_def, event, &mut errors);
    errors
}

fn describe(row: &Row) -> String {
    if row.container.is_empty() {
        format!("«{}»", row.qname)
    } else {
        format!("«{}: {}»", row.container, row.qname)
    }
}

/// IDs of one event mapped to the type of the row that carries them.
type Ids = FxHashMap<RecordId, QName>;

fn validate_ids(app_def: &AppDef, event: &Event, errors: &mut ValidationErrors) {
    let raw_required = !event.synced();
    let mut ids = object_ids(app_def, &event.arg, raw_required, errors);
    cud_ids(app_def, event, raw_required, &mut ids, errors);
}

fn object_ids(
    app_def: &AppDef,
    obj: &Element,
    raw_required: bool,
    errors: &mut ValidationErrors,
) -> Ids {
    let mut ids = Ids::default();

    obj.for_each(&mut |el| {
        let id = el.row.id;
        if id.is_null() {
            return;
        }
        if raw_required && !id.is_raw() {
            errors.push(
                ValidationCode::InvalidRecordId,
                format!("{} sys.ID: id «{}» is not raw", describe(&el.row), id),
            );
        }
        if let Some(other) = ids.insert(id, el.row.qname.clone()) {
            errors.push(
                ValidationCode::InvalidRecordId,
                format!("id «{}» used by «{}» and {}", id, other, describe(&el.row)),
            );
        }
    });

    obj.for_each(&mut |el| {
        let Some(t) = app_def.type_def(&el.row.qname) else {
            return;
        };
        for f in t.ref_fields() {
            let id = el.row.as_record_id(&f.name);
            if id.is_null() {
                continue;
            }
            match ids.get(&id) {
                None if id.is_raw() => errors.push(
                    ValidationCode::InvalidRefRecordId,
                    format!(
                        "{} field «{}» refers to unknown ID «{}»",
                        describe(&el.row),
                        f.name,
                        id
                    ),
                ),
                None => {}
                Some(target) if !f.ref_allowed(target) => errors.push(
                    ValidationCode::InvalidRefRecordId,
                    format!(
                        "{} field «{}» refers to record ID «{}» of unavailable type «{}»",
                        describe(&el.row),
                        f.name,
                        id,
                        target
                    ),
                ),
                Some(_) => {}
            }
        }
    });

    ids
}

fn check_refs(app_def: &AppDef, row: &Row, ids: &Ids, errors: &mut ValidationErrors) {
    let t = app_def.type_def(&row.qname);
    for (name, id) in row.record_ids() {
        let Some(target) = ids.get(&id) else {
            if id.is_raw() {
                errors.push(
                    ValidationCode::InvalidRefRecordId,
                    format!("{} field «{}» refers to unknown ID «{}»", describe(row), name, id),
                );
            }
            continue;
        };
        let allowed = t
            .and_then(|t| t.field_def(name))
            .map_or(true, |f| f.ref_allowed(target));
        if !allowed {
            errors.push(
                ValidationCode::InvalidRefRecordId,
                format!(
                    "{} field «{}» refers to record ID «{}» of unavailable type «{}»",
                    describe(row),
                    name,
                    id,
                    target
                ),
            );
        }
    }
}

fn cud_ids(
    app_def: &AppDef,
    event: &Event,
    raw_required: bool,
    ids: &mut Ids,
    errors: &mut ValidationErrors,
) {
    let mut singletons: FxHashSet<&QName> = FxHashSet::default();

    for rec in &event.cuds.creates {
        let id = rec.id;
        if id.is_null() {
            // reported as empty sys.ID by the row check
            continue;
        }
        if raw_required && !id.is_raw() {
            errors.push(
                ValidationCode::InvalidRecordId,
                format!("{} sys.ID: id «{}» is not raw", describe(rec), id),
            );
        }
        if let Some(other) = ids.insert(id, rec.qname.clone()) {
            errors.push(
                ValidationCode::InvalidRecordId,
                format!("id «{}» used by «{}» and {}", id, other, describe(rec)),
            );
        }
        if app_def.type_def(&rec.qname).map_or(false, TypeDef::is_singleton)
            && !singletons.insert(&rec.qname)
        {
            errors.push(
                ValidationCode::InvalidRecordId,
                format!("singleton «{}» created twice", rec.qname),
            );
        }
    }

    for upd in &event.cuds.updates {
        let id = upd.changes.id;
        if id.is_raw() {
            errors.push(
                ValidationCode::InvalidRecordId,
                format!("updated {} sys.ID: id «{}» should not be raw", describe(&upd.changes), id),
            );
        }
        if let Some(other) = ids.insert(id, upd.changes.qname.clone()) {
            errors.push(
                ValidationCode::InvalidRecordId,
                format!("id «{}» used by «{}» and {}", id, other, describe(&upd.changes)),
            );
        }
    }

    for rec in &event.cuds.creates {
        if let Some(parent) = ids.get(&rec.parent) {
            if let Some(pt) = app_def.type_def(parent) {
                match pt.container_def(&rec.container) {
                    None => errors.push(
                        ValidationCode::InvalidRefRecordId,
                        format!(
                            "{} has parent ID «{}» of «{}», which has no container «{}»",
                            describe(rec),
                            rec.parent,
                            parent,
                            rec.container
                        ),
                    ),
                    Some(c) if c.qname != rec.qname => errors.push(
                        ValidationCode::InvalidRefRecordId,
                        format!(
                            "{} has parent ID «{}» of «{}», which container «{}» has type «{}»",
                            describe(rec),
                            rec.parent,
                            parent,
                            rec.container,
                            c.qname
                        ),
                    ),
                    Some(_) => {}
                }
            }
        }
        check_refs(app_def, rec, ids, errors);
    }

    for upd in &event.cuds.updates {
        check_refs(app_def, &upd.changes, ids, errors);
    }
}

fn validate_args(
    app_def: &AppDef,
    event: &mut Event,
    arg_names: Result<(QName, QName)>,
    errors: &mut ValidationErrors,
) {
    let (arg, unlogged) = match arg_names {
        Ok(names) => names,
        Err(e) => {
            errors.push(ValidationCode::InvalidTypeName, e.to_string());
            return;
        }
    };

    for (what, el, expected) in [
        ("argument", &mut event.arg, arg),
        ("unlogged argument", &mut event.unlogged, unlogged),
    ] {
        if el.row.qname != expected {
            errors.push(
                ValidationCode::InvalidTypeName,
                format!(
                    "event «{}» {} uses wrong type «{}», expected «{}»",
                    event.name, what, el.row.qname, expected
                ),
            );
        } else if expected != NULL_QNAME {
            validate_object(app_def, el, errors);
        }
    }
}

fn validate_object(app_def: &AppDef, obj: &mut Element, errors: &mut ValidationErrors) {
    let Some(t) = app_def.type_def(&obj.row.qname) else {
        errors.push(
            ValidationCode::InvalidTypeName,
            format!("type «{}» not found", obj.row.qname),
        );
        return;
    };
    validate_row(t, &obj.row, errors);

    for c in t.containers() {
        let occurs = obj.elements(&c.name).count();
        if occurs < usize::from(c.min_occurs) {
            errors.push(
                ValidationCode::InvalidOccursMin,
                format!(
                    "{} container «{}» has not enough occurrences ({}, minimum {})",
                    describe(&obj.row),
                    c.name,
                    occurs,
                    c.min_occurs
                ),
            );
        }
        if occurs > usize::from(c.max_occurs) {
            errors.push(
                ValidationCode::InvalidOccursMax,
                format!(
                    "{} container «{}» has too many occurrences ({}, maximum {})",
                    describe(&obj.row),
                    c.name,
                    occurs,
                    c.max_occurs
                ),
            );
        }
    }

    let obj_id = obj.row.id;
    let obj_desc = describe(&obj.row);
    for (idx, child) in obj.children.iter_mut().enumerate() {
        let Some(c) = t.container_def(&child.row.container) else {
            errors.push(
                ValidationCode::InvalidChildName,
                format!(
                    "{} child[{}] has unknown container name «{}»",
                    obj_desc, idx, child.row.container
                ),
            );
            continue;
        };
        if child.row.qname != c.qname {
            errors.push(
                ValidationCode::InvalidTypeName,
                format!(
                    "{} child[{}] {} has wrong type name, expected «{}»",
                    obj_desc,
                    idx,
                    describe(&child.row),
                    c.qname
                ),
            );
            continue;
        }

        let has_parent = app_def
            .type_def(&child.row.qname)
            .map_or(false, |ct| ct.kind().sys_fields().parent_id);
        if has_parent {
            if child.row.parent.is_null() {
                child.row.parent = obj_id;
            } else if child.row.parent != obj_id {
                errors.push(
                    ValidationCode::InvalidRefRecordId,
                    format!(
                        "{} child[{}] {} has wrong parent id «{}», expected «{}»",
                        obj_desc,
                        idx,
                        describe(&child.row),
                        child.row.parent,
                        obj_id
                    ),
                );
            }
        }

        validate_object(app_def, child, errors);
    }
}

/// Checks required fields of a row.
///
/// System fields of documents and records are required, except `sys.IsActive`;
/// a required reference must not be null.
pub(crate) fn validate_row(t: &TypeDef, row: &Row, errors: &mut ValidationErrors) {
    let sys = t.kind().sys_fields();
    if sys.id && row.id.is_null() {
        errors.push(
            ValidationCode::EmptyData,
            format!("field is empty: {} sys.ID", describe(row)),
        );
    }
    if t.kind().is_record() {
        if row.parent.is_null() {
            errors.push(
                ValidationCode::EmptyData,
                format!("field is empty: {} sys.ParentID", describe(row)),
            );
        }
        if row.container.is_empty() {
            errors.push(
                ValidationCode::EmptyData,
                format!("field is empty: {} sys.Container", describe(row)),
            );
        }
    }

    for f in t.fields().iter().filter(|f| f.required) {
        if !row.has_value(&f.name) {
            errors.push(
                ValidationCode::EmptyData,
                format!("field is empty: {} {}", describe(row), f.name),
            );
            continue;
        }
        if f.kind == DataKind::RecordId && row.as_record_id(&f.name).is_null() {
            errors.push(
                ValidationCode::InvalidRefRecordId,
                format!(
                    "{} required ref field «{}» has null record ID value",
                    describe(row),
                    f.name
                ),
            );
        }
    }
}

fn validate_cuds(app_def: &AppDef, event: &Event, errors: &mut ValidationErrors) {
    if event.cuds.is_empty() {
        if event.name == QNAME_COMMAND_CUD {
            errors.push(
                ValidationCode::EmptyCuds,
                format!("event «{}» has no CUDs", event.name),
            );
        }
        return;
    }

    if event.cuds.creates.len() > usize::from(u16::MAX) {
        errors.push(
            ValidationCode::TooManyCreates,
            format!("creates number must not be more than {}", u16::MAX),
        );
        return;
    }
    if event.cuds.updates.len() > usize::from(u16::MAX) {
        errors.push(
            ValidationCode::TooManyUpdates,
            format!("updates number must not be more than {}", u16::MAX),
        );
        return;
    }

    let rows = event
        .cuds
        .creates
        .iter()
        .map(|r| r.row())
        .chain(event.cuds.updates.iter().map(|u| match &u.result {
            Some(r) => r.row(),
            None => &u.changes,
        }));
    for row in rows {
        let Some(t) = app_def.type_def(&row.qname) else {
            errors.push(
                ValidationCode::InvalidTypeName,
                format!("type «{}» not found", row.qname),
            );
            continue;
        };
        if !t.kind().allowed_in_cuds() {
            errors.push(
                ValidationCode::InvalidTypeKind,
                format!("{} «{}» in event «{}» CUDs", t.kind(), row.qname, event.name),
            );
            continue;
        }
        validate_row(t, row, errors);
    }
}
