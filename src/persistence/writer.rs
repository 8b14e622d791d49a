//! Encoder: column snapshot to file family.

use std::collections::BTreeSet;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use super::header::{FileHeader, FileKind, FORMAT_VERSION};
use super::target::{BufferWriter, SaveTarget};
use crate::attribute::column::ColumnData;
use crate::attribute::{AttributeResult, BasicType, Value};

/// What a save produced.
#[derive(Debug, Clone)]
pub struct SaveSummary {
    pub save_id: Uuid,
    pub doc_id_limit: u32,
    pub num_values: u64,
    pub unique_values: Option<usize>,
    pub bytes: u64,
}

pub(crate) struct SaveRequest<'a> {
    pub data: &'a ColumnData,
    pub doc_id_limit: u32,
    pub create_serial_num: u64,
    pub enumerated: bool,
}

/// Write a full family for documents below `doc_id_limit`.
pub(crate) fn save_column(
    request: SaveRequest<'_>,
    target: &mut dyn SaveTarget,
) -> AttributeResult<SaveSummary> {
    let data = request.data;
    let basic_type = data.basic_type();
    let collection = data.collection();
    let limit = request.doc_id_limit as usize;

    let mut kinds = vec![FileKind::Dat];
    if collection.is_multi_value() {
        kinds.push(FileKind::Idx);
    }
    if collection.is_weighted_set() {
        kinds.push(FileKind::Weight);
    }

    let dictionary: Option<Vec<Value>> = request.enumerated.then(|| {
        let unique: BTreeSet<&Value> = data
            .docs(limit)
            .flat_map(|(_, slots)| slots.iter().map(|s| &s.value))
            .collect();
        unique.into_iter().cloned().collect()
    });

    if let Some(dict) = &dictionary {
        kinds.push(FileKind::Udat);
        let udat = target.writer(FileKind::Udat);
        for value in dict {
            write_value(udat, basic_type, value);
        }
    }

    let mut num_values: u64 = 0;
    {
        let dat = target.writer(FileKind::Dat);
        for (_, slots) in data.docs(limit) {
            for slot in slots {
                match &dictionary {
                    Some(dict) => {
                        // Every value was collected above
                        let index = dict.binary_search(&slot.value).unwrap_or(0);
                        dat.write_u32(index as u32);
                    }
                    None => write_value(dat, basic_type, &slot.value),
                }
            }
            num_values += slots.len() as u64;
        }
    }

    if collection.is_multi_value() {
        let idx = target.writer(FileKind::Idx);
        let mut offset: u32 = 0;
        idx.write_u32(offset);
        for (_, slots) in data.docs(limit) {
            offset += slots.len() as u32;
            idx.write_u32(offset);
        }
    }

    if collection.is_weighted_set() {
        let weight = target.writer(FileKind::Weight);
        for (_, slots) in data.docs(limit) {
            for slot in slots {
                weight.write_i32(slot.weight);
            }
        }
    }

    let save_id = Uuid::new_v4();
    let saved_at = Utc
        .timestamp_millis_opt(Utc::now().timestamp_millis())
        .single()
        .unwrap_or_else(Utc::now);
    let mut bytes = 0u64;
    let headers: Vec<FileHeader> = kinds
        .iter()
        .map(|&kind| {
            let writer = target.writer(kind);
            bytes += writer.len() as u64;
            FileHeader {
                kind,
                basic_type,
                collection_type: collection,
                enumerated: request.enumerated,
                version: FORMAT_VERSION,
                create_serial_num: request.create_serial_num,
                doc_id_limit: request.doc_id_limit,
                save_id,
                saved_at,
                payload_len: writer.len() as u64,
                payload_crc: writer.checksum(),
            }
        })
        .collect();

    target.finalize(&headers)?;

    Ok(SaveSummary {
        save_id,
        doc_id_limit: request.doc_id_limit,
        num_values,
        unique_values: dictionary.map(|d| d.len()),
        bytes,
    })
}

/// Raw encoding of one value: fixed width little endian, strings as a u32
/// length followed by UTF-8 bytes.
pub(crate) fn write_value(out: &mut BufferWriter, basic_type: BasicType, value: &Value) {
    match (basic_type, value) {
        (BasicType::Int8, Value::Int(v)) => out.write_bytes(&(*v as i8).to_le_bytes()),
        (BasicType::Int16, Value::Int(v)) => out.write_bytes(&(*v as i16).to_le_bytes()),
        (BasicType::Int32, Value::Int(v)) => out.write_bytes(&(*v as i32).to_le_bytes()),
        (BasicType::Int64, Value::Int(v)) => out.write_bytes(&v.to_le_bytes()),
        (BasicType::Float, Value::Float(v)) => out.write_bytes(&(*v as f32).to_le_bytes()),
        (BasicType::Double, Value::Float(v)) => out.write_bytes(&v.to_le_bytes()),
        (BasicType::String, Value::Str(s)) => {
            out.write_u32(s.len() as u32);
            out.write_bytes(s.as_bytes());
        }
        // Stored values are normalized on enqueue
        (t, _) => write_value(out, t, &t.undefined()),
    }
}

/// Upper bound on the bytes a save of `data` would write.
pub(crate) fn estimated_save_bytes(data: &ColumnData, limit: usize, enumerated: bool) -> u64 {
    let basic_type = data.basic_type();
    let collection = data.collection();
    let header = super::header::HEADER_LEN as u64;
    let mut values = 0u64;
    let mut raw = 0u64;
    for (_, slots) in data.docs(limit) {
        values += slots.len() as u64;
        raw += slots
            .iter()
            .map(|s| match basic_type {
                BasicType::String => 4 + s.value.as_str().map_or(0, str::len) as u64,
                t => t.fixed_size() as u64,
            })
            .sum::<u64>();
    }
    let docs = limit.min(data.num_docs()) as u64;
    let mut total = header + if enumerated { values * 4 + header + raw } else { raw };
    if collection.is_multi_value() {
        total += header + (docs + 1) * 4;
    }
    if collection.is_weighted_set() {
        total += header + values * 4;
    }
    total
}
