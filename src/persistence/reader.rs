//! Decoder: file family to per-document values.
//!
//! Everything is parsed and validated before the caller touches live state,
//! so a failed load leaves the column as it was.

use super::header::{FileHeader, FileKind};
use super::target::LoadSource;
use crate::attribute::{
    AttributeConfig, AttributeError, AttributeResult, BasicType, CollectionType, Value, Weighted,
};

const ENUM_CODE_WIDTH: usize = 4;

/// A fully validated family.
#[derive(Debug)]
pub struct DecodedColumn {
    pub header: FileHeader,
    /// Values per document, `header.doc_id_limit` entries
    pub docs: Vec<Vec<Weighted<Value>>>,
    /// Sorted unique values when the family was saved enumerated
    pub dictionary: Option<Vec<Value>>,
}

impl DecodedColumn {
    pub fn num_values(&self) -> usize {
        self.docs.iter().map(Vec::len).sum()
    }
}

struct LoadedFile {
    name: String,
    header: FileHeader,
    bytes: Vec<u8>,
}

impl LoadedFile {
    fn payload(&self) -> &[u8] {
        &self.bytes[super::header::HEADER_LEN..]
    }
}

fn open(source: &dyn LoadSource, kind: FileKind) -> AttributeResult<Option<LoadedFile>> {
    let name = source.describe(kind);
    let Some(bytes) = source.read(kind)? else {
        return Ok(None);
    };
    let (header, _) = FileHeader::decode(&name, &bytes)?;
    if header.kind != kind {
        return Err(AttributeError::corrupt(&name, "file kind does not match suffix"));
    }
    Ok(Some(LoadedFile {
        name,
        header,
        bytes,
    }))
}

fn require(
    source: &dyn LoadSource,
    kind: FileKind,
    dat: &FileHeader,
) -> AttributeResult<LoadedFile> {
    let file = open(source, kind)?
        .ok_or_else(|| AttributeError::corrupt(source.describe(kind), "missing from family"))?;
    dat.check_same_family(&file.header, &file.name)?;
    Ok(file)
}

/// Read only the headers of every present file.
pub fn read_headers(source: &dyn LoadSource) -> AttributeResult<Vec<FileHeader>> {
    let mut headers = Vec::new();
    for kind in FileKind::ALL {
        if let Some(file) = open(source, kind)? {
            headers.push(file.header);
        }
    }
    Ok(headers)
}

/// Read and validate a whole family against `config`.
pub fn load_column(
    config: &AttributeConfig,
    source: &dyn LoadSource,
) -> AttributeResult<DecodedColumn> {
    let dat = open(source, FileKind::Dat)?.ok_or_else(|| {
        AttributeError::io(
            source.describe(FileKind::Dat),
            std::io::Error::new(std::io::ErrorKind::NotFound, "no dat file"),
        )
    })?;
    let header = dat.header.clone();
    header.check_config(config, &dat.name)?;
    if header.doc_id_limit == 0 {
        return Err(AttributeError::corrupt(&dat.name, "doc id limit is zero"));
    }
    let basic_type = header.basic_type;
    let collection = header.collection_type;
    let limit = header.doc_id_limit as usize;

    let dictionary = if header.enumerated {
        let udat = require(source, FileKind::Udat, &header)?;
        let values = decode_values(&udat.name, udat.payload(), basic_type)?;
        if values.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AttributeError::corrupt(&udat.name, "dictionary not strictly ascending"));
        }
        Some(values)
    } else {
        None
    };

    let values: Vec<Value> = match &dictionary {
        Some(dict) => {
            let payload = dat.payload();
            if payload.len() % ENUM_CODE_WIDTH != 0 {
                return Err(AttributeError::corrupt(
                    &dat.name,
                    format!("{} bytes is not a whole number of enum codes", payload.len()),
                ));
            }
            payload
                .chunks_exact(ENUM_CODE_WIDTH)
                .map(|c| {
                    let index = u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize;
                    dict.get(index).cloned().ok_or_else(|| {
                        AttributeError::corrupt(
                            &dat.name,
                            format!("enum index {} beyond dictionary of {}", index, dict.len()),
                        )
                    })
                })
                .collect::<AttributeResult<_>>()?
        }
        None => decode_values(&dat.name, dat.payload(), basic_type)?,
    };

    let offsets: Vec<usize> = if collection.is_multi_value() {
        let idx = require(source, FileKind::Idx, &header)?;
        let offsets = decode_u32s(&idx.name, idx.payload())?;
        validate_offsets(&idx.name, &offsets, limit, values.len())?;
        offsets.into_iter().map(|o| o as usize).collect()
    } else {
        if values.len() != limit {
            return Err(AttributeError::corrupt(
                &dat.name,
                format!("{} values for {} documents", values.len(), limit),
            ));
        }
        (0..=limit).collect()
    };

    let weights: Option<Vec<i32>> = if collection == CollectionType::WeightedSet {
        let weight = require(source, FileKind::Weight, &header)?;
        let weights: Vec<i32> = decode_u32s(&weight.name, weight.payload())?
            .into_iter()
            .map(|w| w as i32)
            .collect();
        if weights.len() != values.len() {
            return Err(AttributeError::corrupt(
                &weight.name,
                format!("{} weights for {} values", weights.len(), values.len()),
            ));
        }
        Some(weights)
    } else {
        None
    };

    // Offsets, values and weights advance in lockstep
    let mut values = values.into_iter();
    let mut docs = Vec::with_capacity(limit);
    for doc in 0..limit {
        let count = offsets[doc + 1] - offsets[doc];
        let start = offsets[doc];
        let doc_values: Vec<Weighted<Value>> = (0..count)
            .filter_map(|i| {
                values.next().map(|v| {
                    let weight = weights.as_ref().map_or(1, |w| w[start + i]);
                    Weighted::new(v, weight)
                })
            })
            .collect();
        docs.push(doc_values);
    }

    Ok(DecodedColumn {
        header,
        docs,
        dictionary,
    })
}

fn validate_offsets(
    file: &str,
    offsets: &[u32],
    limit: usize,
    num_values: usize,
) -> AttributeResult<()> {
    if offsets.len() != limit + 1 {
        return Err(AttributeError::corrupt(
            file,
            format!("{} offsets for {} documents", offsets.len(), limit),
        ));
    }
    if offsets[0] != 0 {
        return Err(AttributeError::corrupt(file, "first offset is not zero"));
    }
    if offsets.windows(2).any(|w| w[0] > w[1]) {
        return Err(AttributeError::corrupt(file, "offsets not monotonic"));
    }
    if offsets[limit] as usize != num_values {
        return Err(AttributeError::corrupt(
            file,
            format!(
                "last offset {} does not match {} values",
                offsets[limit], num_values
            ),
        ));
    }
    Ok(())
}

fn decode_u32s(file: &str, payload: &[u8]) -> AttributeResult<Vec<u32>> {
    if payload.len() % 4 != 0 {
        return Err(AttributeError::corrupt(
            file,
            format!("{} bytes is not a whole number of u32", payload.len()),
        ));
    }
    Ok(payload
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Decode a packed sequence of raw values.
pub(crate) fn decode_values(
    file: &str,
    payload: &[u8],
    basic_type: BasicType,
) -> AttributeResult<Vec<Value>> {
    let width = basic_type.fixed_size();
    if width > 0 {
        if payload.len() % width != 0 {
            return Err(AttributeError::corrupt(
                file,
                format!(
                    "{} bytes is not a multiple of element width {}",
                    payload.len(),
                    width
                ),
            ));
        }
        return Ok(payload
            .chunks_exact(width)
            .map(|c| decode_fixed(basic_type, c))
            .collect());
    }

    let mut values = Vec::new();
    let mut pos = 0usize;
    while pos < payload.len() {
        let Some(len_bytes) = payload.get(pos..pos + 4) else {
            return Err(AttributeError::corrupt(file, "truncated string length"));
        };
        let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
            as usize;
        pos += 4;
        let Some(bytes) = payload.get(pos..pos + len) else {
            return Err(AttributeError::corrupt(file, "truncated string"));
        };
        let s = std::str::from_utf8(bytes)
            .map_err(|_| AttributeError::corrupt(file, "string is not UTF-8"))?;
        values.push(Value::Str(s.to_string()));
        pos += len;
    }
    Ok(values)
}

fn decode_fixed(basic_type: BasicType, c: &[u8]) -> Value {
    match basic_type {
        BasicType::Int8 => Value::Int(i8::from_le_bytes([c[0]]) as i64),
        BasicType::Int16 => Value::Int(i16::from_le_bytes([c[0], c[1]]) as i64),
        BasicType::Int32 => Value::Int(i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i64),
        BasicType::Int64 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            Value::Int(i64::from_le_bytes(b))
        }
        BasicType::Float => Value::Float(f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64),
        BasicType::Double => {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            Value::Float(f64::from_le_bytes(b))
        }
        BasicType::String => Value::Str(String::new()),
    }
}
