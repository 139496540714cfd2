// Descriptor table: one record per distinct static instrumentation
// point, addressed by dense id for the lifetime of the loaded capture.

use tracing::debug;

use crate::decode::{ByteCursor, StrId, StringTable};
use crate::error::{ReadError, Result};
use crate::types::{BlockStatus, BlockType, CaptureHeader};

/// One static instrumentation point.
///
/// `id` is the dense 0-based index assigned in file order; it is
/// unrelated to the serialized `origin_id`. A descriptor with
/// `origin_id == id` is compile-time and carries a permanent name; any
/// other descriptor starts unnamed and receives its name lazily from
/// the first block instance that supplies one.
#[derive(Debug, Clone)]
pub struct BlockDescriptor {
    pub id: u32,
    pub origin_id: u32,
    pub line_number: u32,
    pub argb_color: u32,
    pub block_type: BlockType,
    pub status: BlockStatus,
    pub file_name: StrId,
    pub name: StrId,
}

impl BlockDescriptor {
    /// True when the serialized record carries its own permanent name.
    pub fn is_compile_time(&self) -> bool {
        self.origin_id == self.id
    }
}

/// Decode the descriptor region into the dense descriptor list.
///
/// The region must contain exactly `descriptors_count` records spanning
/// exactly `descriptors_bytes` bytes; any mismatch is a
/// `CorruptedDescriptorTable`, never silently tolerated.
pub fn read_descriptor_table(
    cur: &mut ByteCursor<'_>,
    header: &CaptureHeader,
    strings: &mut StringTable,
) -> Result<Vec<BlockDescriptor>> {
    let region_start = cur.offset();
    let mut descriptors = Vec::with_capacity(header.descriptors_count as usize);

    for dense_id in 0..header.descriptors_count {
        let consumed = cur.offset() - region_start;
        if consumed as u64 >= header.descriptors_bytes && header.descriptors_bytes > 0 {
            return Err(ReadError::descriptor_table(format!(
                "region exhausted after {dense_id} of {} records",
                header.descriptors_count
            )));
        }

        let record = read_descriptor_record(cur, dense_id, strings)
            .map_err(|err| wrap_truncation(err, dense_id))?;
        descriptors.push(record);
    }

    let consumed = (cur.offset() - region_start) as u64;
    if consumed != header.descriptors_bytes {
        return Err(ReadError::descriptor_table(format!(
            "region declared {} bytes but records consumed {consumed}",
            header.descriptors_bytes
        )));
    }

    debug!(
        count = descriptors.len(),
        bytes = consumed,
        "descriptor table built"
    );
    Ok(descriptors)
}

fn read_descriptor_record(
    cur: &mut ByteCursor<'_>,
    dense_id: u32,
    strings: &mut StringTable,
) -> Result<BlockDescriptor> {
    let origin_id = cur.read_u32()?;
    let line_number = cur.read_u32()?;
    let argb_color = cur.read_u32()?;
    let block_type = BlockType::from_u8(cur.read_u8()?);
    let status = BlockStatus::from_u8(cur.read_u8()?);
    let file_name = cur.read_string()?;
    let serialized_name = cur.read_string()?;

    // Runtime-named descriptors leave `name` empty until the forest
    // builder sees a named instance.
    let name = if origin_id == dense_id {
        strings.intern(&serialized_name)
    } else {
        StrId::EMPTY
    };

    Ok(BlockDescriptor {
        id: dense_id,
        origin_id,
        line_number,
        argb_color,
        block_type,
        status,
        file_name: strings.intern(&file_name),
        name,
    })
}

fn wrap_truncation(err: ReadError, dense_id: u32) -> ReadError {
    match err {
        ReadError::UnexpectedEndOfData { .. } => {
            ReadError::descriptor_table(format!("truncated record {dense_id}: {err}"))
        }
        other => other,
    }
}
