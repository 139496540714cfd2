// Value payload decoding, pinned to sub-format v1: a kind tag, an
// element count, then inline little-endian data. `count == 1` is a
// scalar, anything else an array; strings store raw UTF-8 bytes.

use serde::{Deserialize, Serialize};

use crate::decode::ByteCursor;
use crate::error::{ReadError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
    String,
}

impl ValueKind {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(ValueKind::Bool),
            1 => Some(ValueKind::Int32),
            2 => Some(ValueKind::Uint32),
            3 => Some(ValueKind::Int64),
            4 => Some(ValueKind::Uint64),
            5 => Some(ValueKind::Float32),
            6 => Some(ValueKind::Float64),
            7 => Some(ValueKind::String),
            _ => None,
        }
    }

    /// Serialized element width in bytes. Strings are byte-counted.
    fn element_size(self) -> usize {
        match self {
            ValueKind::Bool => 1,
            ValueKind::Int32 | ValueKind::Uint32 | ValueKind::Float32 => 4,
            ValueKind::Int64 | ValueKind::Uint64 | ValueKind::Float64 => 8,
            ValueKind::String => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Bool(bool),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
}

/// Typed payload carried by a `Value` block instead of a duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValuePayload {
    Scalar(ScalarValue),
    Array(ValueKind, Vec<ScalarValue>),
    String(String),
}

impl ValuePayload {
    pub fn kind(&self) -> ValueKind {
        match self {
            ValuePayload::Scalar(s) => s.kind(),
            ValuePayload::Array(kind, _) => *kind,
            ValuePayload::String(_) => ValueKind::String,
        }
    }

    /// Scalar numeric payload widened to f64, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ValuePayload::Scalar(s) => s.as_f64(),
            _ => None,
        }
    }
}

impl ScalarValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ScalarValue::Bool(_) => ValueKind::Bool,
            ScalarValue::Int32(_) => ValueKind::Int32,
            ScalarValue::Uint32(_) => ValueKind::Uint32,
            ScalarValue::Int64(_) => ValueKind::Int64,
            ScalarValue::Uint64(_) => ValueKind::Uint64,
            ScalarValue::Float32(_) => ValueKind::Float32,
            ScalarValue::Float64(_) => ValueKind::Float64,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ScalarValue::Bool(_) => None,
            ScalarValue::Int32(v) => Some(v as f64),
            ScalarValue::Uint32(v) => Some(v as f64),
            ScalarValue::Int64(v) => Some(v as f64),
            ScalarValue::Uint64(v) => Some(v as f64),
            ScalarValue::Float32(v) => Some(v as f64),
            ScalarValue::Float64(v) => Some(v),
        }
    }
}

/// Decode one value payload at the cursor.
///
/// The declared size is validated against the remaining input before
/// any element is read, so a hostile count fails cleanly instead of
/// driving allocation.
pub fn read_value_payload(cur: &mut ByteCursor<'_>, block_index: u32) -> Result<ValuePayload> {
    let raw_kind = cur.read_u8()?;
    let kind = ValueKind::from_u8(raw_kind).ok_or_else(|| {
        ReadError::block_record(format!(
            "block {block_index}: unknown value kind {raw_kind}"
        ))
    })?;

    let count = cur.read_u32()? as usize;
    let declared = count as u64 * kind.element_size() as u64;
    if declared > cur.remaining() as u64 {
        return Err(ReadError::block_record(format!(
            "block {block_index}: value payload declares {declared} bytes, {} remain",
            cur.remaining()
        )));
    }

    if kind == ValueKind::String {
        let bytes = cur.read_bytes(count)?;
        return Ok(ValuePayload::String(
            String::from_utf8_lossy(bytes).into_owned(),
        ));
    }

    let mut elements = Vec::with_capacity(count);
    for _ in 0..count {
        elements.push(read_scalar(cur, kind)?);
    }

    if elements.len() == 1 {
        Ok(ValuePayload::Scalar(elements.remove(0)))
    } else {
        Ok(ValuePayload::Array(kind, elements))
    }
}

fn read_scalar(cur: &mut ByteCursor<'_>, kind: ValueKind) -> Result<ScalarValue> {
    Ok(match kind {
        ValueKind::Bool => ScalarValue::Bool(cur.read_u8()? != 0),
        ValueKind::Int32 => ScalarValue::Int32(cur.read_i32()?),
        ValueKind::Uint32 => ScalarValue::Uint32(cur.read_u32()?),
        ValueKind::Int64 => ScalarValue::Int64(cur.read_i64()?),
        ValueKind::Uint64 => ScalarValue::Uint64(cur.read_u64()?),
        ValueKind::Float32 => ScalarValue::Float32(cur.read_f32()?),
        ValueKind::Float64 => ScalarValue::Float64(cur.read_f64()?),
        // Strings never reach here; they are byte-sliced above.
        ValueKind::String => unreachable!("string payloads are decoded as raw bytes"),
    })
}
