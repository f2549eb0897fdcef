//! Binary images of records and events
//!
//! Both images share one frame:
//!
//! ```text
//! [codec: u8][body ...][crc32 of codec and body: u32]
//! ```
//!
//! The checksum is verified before anything else is decoded, so a damaged
//! image is reported as `CorruptData` rather than decoded into plausible
//! but wrong values. All integers are big-endian.
//!
//! Row body:
//!
//! ```text
//! [qname id: u16]                       -- null name ends the row
//! [sys mask: u8]                        -- 0x01 id, 0x02 parent, 0x04 container, 0x08 inactive
//! [id: u64]? [parent: u64]? [container id: u16]?
//! [field count: u16] { [field index: u16][value] }*
//! ```
//!
//! Event body:
//!
//! ```text
//! [qname id: u16]                       -- sys.Error for invalid events
//! [partition: u16][plog offset: u64][workspace: u64][wlog offset: u64]
//! [registered at: i64][synced: u8] ([device: u16][synced at: i64])?
//! [valid: u8]
//! invalid: [error: short str][original name: short str][raw bytes: u32 len + bytes]
//! valid:   [argument element][unlogged argument element]
//!          [creates: u16] {row}* [updates: u16] {changes row}*
//! ```

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};

use appstruct_core::consts::QNAME_ID_FOR_ERROR;
use appstruct_core::{Error, QName, RecordId, Result, QNAME_FOR_ERROR};

use crate::appdef::{AppDef, DataKind, TypeDef};
use crate::containers::Containers;
use crate::cud::{Cuds, UpdateRec};
use crate::element::Element;
use crate::event::{Event, EventError, SyncInfo};
use crate::qnames::QNames;
use crate::row::{Record, Row};
use crate::value::Value;

/// Codec byte of the current image layout
pub const CODEC_01: u8 = 1;

const SYS_ID: u8 = 0x01;
const SYS_PARENT: u8 = 0x02;
const SYS_CONTAINER: u8 = 0x04;
const SYS_INACTIVE: u8 = 0x08;

type Reader<'b> = Cursor<&'b [u8]>;

fn truncated(e: std::io::Error) -> Error {
    Error::corrupt(format!("image truncated: {}", e))
}

/// Appends the checksum trailer.
fn seal(mut buf: Vec<u8>) -> Vec<u8> {
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_be_bytes());
    buf
}

/// Verifies the checksum and the codec byte; returns the body.
fn unseal(data: &[u8]) -> Result<&[u8]> {
    if data.len() < 5 {
        return Err(Error::corrupt(format!("image of {} bytes is too short", data.len())));
    }
    let (framed, trailer) = data.split_at(data.len() - 4);
    let stored = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let actual = crc32fast::hash(framed);
    if stored != actual {
        return Err(Error::corrupt(format!(
            "checksum mismatch: stored {:#010x}, computed {:#010x}",
            stored, actual
        )));
    }
    match framed[0] {
        CODEC_01 => Ok(&framed[1..]),
        other => Err(Error::UnknownCodec(other)),
    }
}

fn ensure_consumed(r: &Reader<'_>) -> Result<()> {
    let left = r.get_ref().len() as u64 - r.position();
    if left > 0 {
        return Err(Error::corrupt(format!("{} unexpected trailing bytes", left)));
    }
    Ok(())
}

fn write_short_str(w: &mut Vec<u8>, s: &str) {
    let mut end = s.len().min(u16::MAX as usize);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    w.extend_from_slice(&(end as u16).to_be_bytes());
    w.extend_from_slice(&s.as_bytes()[..end]);
}

fn read_exact(r: &mut Reader<'_>, len: usize) -> Result<Vec<u8>> {
    let left = r.get_ref().len() as u64 - r.position();
    if (len as u64) > left {
        return Err(Error::corrupt(format!(
            "image truncated: {} bytes expected, {} left",
            len, left
        )));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf)
}

fn read_string(r: &mut Reader<'_>, len: usize) -> Result<String> {
    String::from_utf8(read_exact(r, len)?)
        .map_err(|e| Error::corrupt(format!("string is not UTF-8: {}", e)))
}

fn read_short_str(r: &mut Reader<'_>) -> Result<String> {
    let len = r.read_u16::<BigEndian>().map_err(truncated)?;
    read_string(r, len as usize)
}

/// Row, record and event codec of one prepared application
pub(crate) struct Codec<'a> {
    pub(crate) app_def: &'a AppDef,
    pub(crate) qnames: &'a QNames,
    pub(crate) containers: &'a Containers,
}

impl<'a> Codec<'a> {
    fn type_def(&self, qname: &QName) -> Result<&'a TypeDef> {
        self.app_def
            .type_def(qname)
            .ok_or_else(|| Error::NameNotFound(format!("type «{}»", qname)))
    }

    /// Record image.
    pub(crate) fn encode_record(&self, row: &Row) -> Result<Vec<u8>> {
        let mut buf = vec![CODEC_01];
        self.write_row(&mut buf, row)?;
        Ok(seal(buf))
    }

    /// Decodes a record image.
    pub(crate) fn decode_record(&self, data: &[u8]) -> Result<Record> {
        let body = unseal(data)?;
        let mut r = Cursor::new(body);
        let row = self.read_row(&mut r)?;
        ensure_consumed(&r)?;
        Ok(Record::from_row(row))
    }

    /// Event image.
    pub(crate) fn encode_event(&self, ev: &Event) -> Result<Vec<u8>> {
        let mut buf = vec![CODEC_01];

        let id = match &ev.error {
            Some(_) => QNAME_ID_FOR_ERROR,
            None => self.qnames.id(&ev.name)?,
        };
        buf.extend_from_slice(&id.to_be_bytes());

        buf.extend_from_slice(&ev.partition.to_be_bytes());
        buf.extend_from_slice(&ev.plog_offset.to_be_bytes());
        buf.extend_from_slice(&ev.ws.to_be_bytes());
        buf.extend_from_slice(&ev.wlog_offset.to_be_bytes());
        buf.extend_from_slice(&ev.registered_at.to_be_bytes());
        match &ev.sync {
            Some(s) => {
                buf.push(1);
                buf.extend_from_slice(&s.device_id.to_be_bytes());
                buf.extend_from_slice(&s.synced_at.to_be_bytes());
            }
            None => {
                buf.push(0);
            }
        }

        if let Some(err) = &ev.error {
            buf.push(0);
            write_short_str(&mut buf, &err.message);
            write_short_str(&mut buf, &err.original_name.to_string());
            // raw bytes may hold unlogged arguments
            let bytes: &[u8] = if ev.unlogged.qname().is_null() {
                &err.original_bytes
            } else {
                &[]
            };
            buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            buf.extend_from_slice(bytes);
            return Ok(seal(buf));
        }
        buf.push(1);

        self.write_element(&mut buf, &ev.arg)?;
        self.write_element(&mut buf, &ev.unlogged)?;

        buf.extend_from_slice(&(ev.cuds.creates.len() as u16).to_be_bytes());
        for rec in &ev.cuds.creates {
            self.write_row(&mut buf, rec)?;
        }
        buf.extend_from_slice(&(ev.cuds.updates.len() as u16).to_be_bytes());
        for upd in &ev.cuds.updates {
            self.write_row(&mut buf, &upd.changes)?;
        }

        Ok(seal(buf))
    }

    /// Decodes an event image.
    pub(crate) fn decode_event(&self, data: &[u8]) -> Result<Event> {
        let body = unseal(data)?;
        let mut r = Cursor::new(body);

        let id = r.read_u16::<BigEndian>().map_err(truncated)?;
        let name = self.qnames.qname(id).map_err(|e| Error::corrupt(e.to_string()))?;
        if name.is_null() {
            return Err(Error::corrupt("event has null name"));
        }

        let partition = r.read_u16::<BigEndian>().map_err(truncated)?;
        let plog_offset = r.read_u64::<BigEndian>().map_err(truncated)?;
        let ws = r.read_u64::<BigEndian>().map_err(truncated)?;
        let wlog_offset = r.read_u64::<BigEndian>().map_err(truncated)?;
        let registered_at = r.read_i64::<BigEndian>().map_err(truncated)?;
        let sync = match r.read_u8().map_err(truncated)? {
            0 => None,
            1 => Some(SyncInfo {
                device_id: r.read_u16::<BigEndian>().map_err(truncated)?,
                synced_at: r.read_i64::<BigEndian>().map_err(truncated)?,
            }),
            b => return Err(Error::corrupt(format!("invalid sync flag {}", b))),
        };

        let mut ev = Event {
            partition,
            plog_offset,
            ws,
            wlog_offset,
            name,
            registered_at,
            sync,
            bytes: Vec::new(),
            arg: Element::null(),
            unlogged: Element::null(),
            cuds: Cuds::default(),
            error: None,
        };

        match r.read_u8().map_err(truncated)? {
            0 => {
                if ev.name != QNAME_FOR_ERROR {
                    return Err(Error::corrupt(format!("invalid event «{}» not stored as error", ev.name)));
                }
                let message = read_short_str(&mut r)?;
                let original = read_short_str(&mut r)?;
                let original_name = QName::parse(&original)
                    .map_err(|e| Error::corrupt(format!("original event name: {}", e)))?;
                let len = r.read_u32::<BigEndian>().map_err(truncated)?;
                let original_bytes = read_exact(&mut r, len as usize)?;
                ev.name = original_name.clone();
                ev.bytes = original_bytes.clone();
                ev.error = Some(EventError {
                    message,
                    original_name,
                    original_bytes,
                });
            }
            1 => {
                ev.arg = self.read_element(&mut r)?;
                ev.unlogged = self.read_element(&mut r)?;

                let creates = r.read_u16::<BigEndian>().map_err(truncated)?;
                for _ in 0..creates {
                    let row = self.read_row(&mut r)?;
                    ev.cuds.creates.push(Record::from_row(row));
                }
                let updates = r.read_u16::<BigEndian>().map_err(truncated)?;
                for _ in 0..updates {
                    let changes = self.read_row(&mut r)?;
                    ev.cuds.updates.push(UpdateRec {
                        origin: None,
                        changes,
                        result: None,
                    });
                }
            }
            b => return Err(Error::corrupt(format!("invalid valid flag {}", b))),
        }

        ensure_consumed(&r)?;
        Ok(ev)
    }

    fn write_element(&self, w: &mut Vec<u8>, el: &Element) -> Result<()> {
        self.write_row(w, &el.row)?;
        if el.row.qname.is_null() {
            return Ok(());
        }
        w.extend_from_slice(&(el.children.len() as u16).to_be_bytes());
        for c in &el.children {
            self.write_element(w, c)?;
        }
        Ok(())
    }

    fn read_element(&self, r: &mut Reader<'_>) -> Result<Element> {
        let row = self.read_row(r)?;
        let mut el = Element::new(row);
        if el.row.qname.is_null() {
            return Ok(el);
        }
        let count = r.read_u16::<BigEndian>().map_err(truncated)?;
        for _ in 0..count {
            el.children.push(self.read_element(r)?);
        }
        Ok(el)
    }

    fn write_row(&self, w: &mut Vec<u8>, row: &Row) -> Result<()> {
        w.extend_from_slice(&(self.qnames.id(&row.qname)?).to_be_bytes());
        if row.qname.is_null() {
            return Ok(());
        }
        let t = self.type_def(&row.qname)?;

        let mut mask = 0u8;
        if !row.id.is_null() {
            mask |= SYS_ID;
        }
        if !row.parent.is_null() {
            mask |= SYS_PARENT;
        }
        if !row.container.is_empty() {
            mask |= SYS_CONTAINER;
        }
        if !row.is_active {
            mask |= SYS_INACTIVE;
        }
        w.push(mask);
        if !row.id.is_null() {
            w.extend_from_slice(&row.id.as_u64().to_be_bytes());
        }
        if !row.parent.is_null() {
            w.extend_from_slice(&row.parent.as_u64().to_be_bytes());
        }
        if !row.container.is_empty() {
            w.extend_from_slice(&(self.containers.id(&row.container)?).to_be_bytes());
        }

        w.extend_from_slice(&(row.values.len() as u16).to_be_bytes());
        for (name, value) in &row.values {
            let idx = t.field_index(name).ok_or_else(|| {
                Error::NameNotFound(format!("field «{}» of «{}»", name, row.qname))
            })?;
            w.extend_from_slice(&(idx as u16).to_be_bytes());
            self.write_value(w, value)?;
        }
        Ok(())
    }

    fn read_row(&self, r: &mut Reader<'_>) -> Result<Row> {
        let id = r.read_u16::<BigEndian>().map_err(truncated)?;
        let qname = self.qnames.qname(id).map_err(|e| Error::corrupt(e.to_string()))?;
        let mut row = Row::new(qname);
        if row.qname.is_null() {
            return Ok(row);
        }
        let t = self
            .type_def(&row.qname)
            .map_err(|e| Error::corrupt(e.to_string()))?;

        let mask = r.read_u8().map_err(truncated)?;
        if mask & !(SYS_ID | SYS_PARENT | SYS_CONTAINER | SYS_INACTIVE) != 0 {
            return Err(Error::corrupt(format!("invalid system field mask {:#04x}", mask)));
        }
        if mask & SYS_ID != 0 {
            row.id = RecordId(r.read_u64::<BigEndian>().map_err(truncated)?);
        }
        if mask & SYS_PARENT != 0 {
            row.parent = RecordId(r.read_u64::<BigEndian>().map_err(truncated)?);
        }
        if mask & SYS_CONTAINER != 0 {
            let cid = r.read_u16::<BigEndian>().map_err(truncated)?;
            row.container = self
                .containers
                .name(cid)
                .map_err(|e| Error::corrupt(e.to_string()))?
                .to_string();
        }
        row.is_active = mask & SYS_INACTIVE == 0;

        let count = r.read_u16::<BigEndian>().map_err(truncated)?;
        for _ in 0..count {
            let idx = r.read_u16::<BigEndian>().map_err(truncated)? as usize;
            let f = t.fields().get(idx).ok_or_else(|| {
                Error::corrupt(format!("«{}» has no field #{}", row.qname, idx))
            })?;
            let value = self.read_value(r, f.kind)?;
            row.values.insert(f.name.clone(), value);
        }
        Ok(row)
    }

    fn write_value(&self, w: &mut Vec<u8>, value: &Value) -> Result<()> {
        match value {
            Value::Int32(v) => {
                w.extend_from_slice(&v.to_be_bytes());
            }
            Value::Int64(v) => {
                w.extend_from_slice(&v.to_be_bytes());
            }
            Value::Float32(v) => {
                w.extend_from_slice(&v.to_be_bytes());
            }
            Value::Float64(v) => {
                w.extend_from_slice(&v.to_be_bytes());
            }
            Value::Bytes(v) => {
                w.extend_from_slice(&(v.len() as u32).to_be_bytes());
                w.extend_from_slice(v);
            }
            Value::String(v) => {
                w.extend_from_slice(&(v.len() as u32).to_be_bytes());
                w.extend_from_slice(v.as_bytes());
            }
            Value::QName(v) => {
                w.extend_from_slice(&(self.qnames.id(v)?).to_be_bytes());
            }
            Value::Bool(v) => {
                w.push(u8::from(*v));
            }
            Value::RecordId(v) => {
                w.extend_from_slice(&v.as_u64().to_be_bytes());
            }
        }
        Ok(())
    }

    fn read_value(&self, r: &mut Reader<'_>, kind: DataKind) -> Result<Value> {
        Ok(match kind {
            DataKind::Int32 => Value::Int32(r.read_i32::<BigEndian>().map_err(truncated)?),
            DataKind::Int64 => Value::Int64(r.read_i64::<BigEndian>().map_err(truncated)?),
            DataKind::Float32 => Value::Float32(r.read_f32::<BigEndian>().map_err(truncated)?),
            DataKind::Float64 => Value::Float64(r.read_f64::<BigEndian>().map_err(truncated)?),
            DataKind::Bytes => {
                let len = r.read_u32::<BigEndian>().map_err(truncated)?;
                Value::Bytes(read_exact(r, len as usize)?)
            }
            DataKind::String => {
                let len = r.read_u32::<BigEndian>().map_err(truncated)?;
                Value::String(read_string(r, len as usize)?)
            }
            DataKind::QName => {
                let id = r.read_u16::<BigEndian>().map_err(truncated)?;
                Value::QName(self.qnames.qname(id).map_err(|e| Error::corrupt(e.to_string()))?)
            }
            DataKind::Bool => match r.read_u8().map_err(truncated)? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                b => return Err(Error::corrupt(format!("invalid bool {}", b))),
            },
            DataKind::RecordId => Value::RecordId(RecordId(r.read_u64::<BigEndian>().map_err(truncated)?)),
        })
    }
}
