// Block forest reconstruction. Block records arrive as one flat list in
// instrumentation order with no explicit parent pointers; the hierarchy
// is rebuilt per thread from interval containment and record order,
// with an explicit open-block stack instead of call recursion because
// instrumented call depth is caller-controlled input.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::decode::{ByteCursor, StrId, StringTable};
use crate::descriptor::BlockDescriptor;
use crate::error::{ReadError, Result};
use crate::reader::LoadControl;
use crate::types::{BlockType, CaptureHeader};
use crate::value::{read_value_payload, ValuePayload};

/// Stable handle into the flat per-capture block list. All block
/// relations are expressed through these indices; the backing storage
/// may be bulk-reallocated while records stream in, so nothing holds a
/// reference into it.
pub type BlockIndex = u32;

/// How many records are parsed between cancellation checks.
const CANCEL_CHECK_INTERVAL: u32 = 256;

/// One captured profiling event instance. Immutable once the forest is
/// built.
#[derive(Debug, Clone)]
pub struct Block {
    pub begin_time: u64,
    pub end_time: u64,
    pub descriptor_id: u32,
    pub block_index: BlockIndex,
    pub thread_id: u64,
    /// Instance-level runtime name; empty for most blocks.
    pub name: StrId,
    /// Child handles in the order the instrumentation stack unwound.
    pub children: Vec<BlockIndex>,
    /// Direct child carrying a value payload, if any.
    pub value: Option<BlockIndex>,
    /// Set when this block itself is `Value`-typed.
    pub payload: Option<ValuePayload>,
}

impl Block {
    /// Duration in serialized ticks. Non-negative by construction:
    /// records with `end < begin` fail the load.
    pub fn duration(&self) -> u64 {
        self.end_time - self.begin_time
    }
}

/// One observed OS context switch, attached to the thread whose
/// execution was interrupted.
#[derive(Debug, Clone)]
pub struct ContextSwitchEvent {
    pub begin_time: u64,
    pub end_time: u64,
    pub target_thread_id: u64,
    pub target_process: StrId,
}

/// Per-thread root: the ordered top-level blocks of one thread plus its
/// context switches and its flattened marker-event index.
#[derive(Debug)]
pub struct BlocksTreeRoot {
    pub thread_id: u64,
    pub thread_name: StrId,
    /// Distinguishes "named" from "numbered only" threads.
    pub got_name: bool,
    /// Begin time of the first top-level child, or 0 when empty.
    pub begin_time: u64,
    /// End time of the last top-level child, or 0 when empty.
    pub end_time: u64,
    pub children: Vec<BlockIndex>,
    pub sync: Vec<ContextSwitchEvent>,
    /// Marker/event blocks in time order, independent of the hierarchy,
    /// for binary-search access.
    pub events: Vec<BlockIndex>,
}

impl BlocksTreeRoot {
    fn new(thread_id: u64) -> Self {
        BlocksTreeRoot {
            thread_id,
            thread_name: StrId::EMPTY,
            got_name: false,
            begin_time: 0,
            end_time: 0,
            children: Vec::new(),
            sync: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// Output of the forest build: the flat block index plus the per-thread
/// roots, keyed by thread id.
#[derive(Debug)]
pub struct Forest {
    pub blocks: Vec<Block>,
    pub threads: BTreeMap<u64, BlocksTreeRoot>,
}

/// Decode the block region and reconstruct the per-thread forests.
///
/// Fails on the first corrupt record and returns nothing: a partial
/// forest with dangling descriptor references cannot be rendered
/// safely, so the load is all-or-nothing.
pub fn build_forest(
    cur: &mut ByteCursor<'_>,
    header: &CaptureHeader,
    descriptors: &mut [BlockDescriptor],
    strings: &mut StringTable,
    control: &LoadControl,
) -> Result<Forest> {
    let region_start = cur.offset();
    let mut blocks: Vec<Block> = Vec::with_capacity(header.blocks_count as usize);
    let mut threads: BTreeMap<u64, BlocksTreeRoot> = BTreeMap::new();
    // Per-thread stack of currently open blocks.
    let mut stacks: HashMap<u64, Vec<BlockIndex>> = HashMap::new();

    for i in 0..header.blocks_count {
        if i % CANCEL_CHECK_INTERVAL == 0 && control.is_interrupted() {
            return Err(ReadError::Interrupted);
        }

        read_block_record(cur, i, descriptors, strings, &mut blocks, &mut threads, &mut stacks)
            .map_err(wrap_truncation)?;
        control.add_blocks(1);
    }

    let consumed = (cur.offset() - region_start) as u64;
    if consumed != header.blocks_bytes {
        return Err(ReadError::block_record(format!(
            "block region declared {} bytes but records consumed {consumed}",
            header.blocks_bytes
        )));
    }

    for root in threads.values_mut() {
        if let Some(&first) = root.children.first() {
            root.begin_time = blocks[first as usize].begin_time;
        }
        if let Some(&last) = root.children.last() {
            root.end_time = blocks[last as usize].end_time;
        }
    }

    debug!(
        blocks = blocks.len(),
        threads = threads.len(),
        "block forest built"
    );
    Ok(Forest { blocks, threads })
}

#[allow(clippy::too_many_arguments)]
fn read_block_record(
    cur: &mut ByteCursor<'_>,
    record: u32,
    descriptors: &mut [BlockDescriptor],
    strings: &mut StringTable,
    blocks: &mut Vec<Block>,
    threads: &mut BTreeMap<u64, BlocksTreeRoot>,
    stacks: &mut HashMap<u64, Vec<BlockIndex>>,
) -> Result<()> {
    let thread_id = cur.read_u64()?;
    let descriptor_id = cur.read_u32()?;
    let begin_time = cur.read_u64()?;
    let end_time = cur.read_u64()?;
    let runtime_name = cur.read_string()?;

    if descriptor_id as usize >= descriptors.len() {
        return Err(ReadError::block_record(format!(
            "record {record}: descriptor id {descriptor_id} out of range ({} descriptors)",
            descriptors.len()
        )));
    }
    if end_time < begin_time {
        return Err(ReadError::block_record(format!(
            "record {record}: negative duration (begin {begin_time}, end {end_time})"
        )));
    }

    let block_index = blocks.len() as BlockIndex;
    let block_type = descriptors[descriptor_id as usize].block_type;

    let payload = if block_type == BlockType::Value {
        Some(read_value_payload(cur, block_index)?)
    } else {
        None
    };

    let name = if runtime_name.is_empty() {
        StrId::EMPTY
    } else {
        strings.intern(&runtime_name)
    };

    // Deferred fill-in: the first named instance of a runtime-named
    // descriptor donates its name permanently.
    let desc = &mut descriptors[descriptor_id as usize];
    if !desc.is_compile_time() && desc.name.is_empty() && !name.is_empty() {
        desc.name = name;
    }

    let root = threads
        .entry(thread_id)
        .or_insert_with(|| BlocksTreeRoot::new(thread_id));
    let stack = stacks.entry(thread_id).or_default();

    // Close every open block this record no longer nests within.
    while let Some(&top) = stack.last() {
        if begin_time >= blocks[top as usize].end_time {
            stack.pop();
        } else {
            break;
        }
    }

    match stack.last() {
        Some(&parent) => {
            let parent_block = &blocks[parent as usize];
            if begin_time < parent_block.begin_time || end_time > parent_block.end_time {
                return Err(ReadError::block_record(format!(
                    "record {record}: interval [{begin_time}, {end_time}) escapes parent \
                     block {parent} [{}, {})",
                    parent_block.begin_time, parent_block.end_time
                )));
            }
            blocks[parent as usize].children.push(block_index);
            if block_type == BlockType::Value {
                blocks[parent as usize].value = Some(block_index);
            }
        }
        None => root.children.push(block_index),
    }

    if block_type == BlockType::Event {
        root.events.push(block_index);
    }

    blocks.push(Block {
        begin_time,
        end_time,
        descriptor_id,
        block_index,
        thread_id,
        name,
        children: Vec::new(),
        value: None,
        payload,
    });
    stack.push(block_index);

    Ok(())
}

/// Decode the context-switch trailer records onto their thread roots.
/// A thread observed only through switches still gets a root.
pub fn read_context_switches(
    cur: &mut ByteCursor<'_>,
    header: &CaptureHeader,
    strings: &mut StringTable,
    threads: &mut BTreeMap<u64, BlocksTreeRoot>,
) -> Result<()> {
    for i in 0..header.context_switch_count {
        let thread_id = cur.read_u64().map_err(wrap_truncation)?;
        let begin_time = cur.read_u64().map_err(wrap_truncation)?;
        let end_time = cur.read_u64().map_err(wrap_truncation)?;
        let target_thread_id = cur.read_u64().map_err(wrap_truncation)?;
        let target_process = cur.read_string().map_err(wrap_truncation)?;

        if end_time < begin_time {
            return Err(ReadError::block_record(format!(
                "context switch {i}: negative duration (begin {begin_time}, end {end_time})"
            )));
        }

        let root = threads
            .entry(thread_id)
            .or_insert_with(|| BlocksTreeRoot::new(thread_id));
        root.sync.push(ContextSwitchEvent {
            begin_time,
            end_time,
            target_thread_id,
            target_process: strings.intern(&target_process),
        });
    }
    Ok(())
}

/// Decode the thread-name trailer records onto their thread roots.
pub fn read_thread_names(
    cur: &mut ByteCursor<'_>,
    header: &CaptureHeader,
    strings: &mut StringTable,
    threads: &mut BTreeMap<u64, BlocksTreeRoot>,
) -> Result<()> {
    for _ in 0..header.thread_name_count {
        let thread_id = cur.read_u64().map_err(wrap_truncation)?;
        let name = cur.read_string().map_err(wrap_truncation)?;

        let root = threads
            .entry(thread_id)
            .or_insert_with(|| BlocksTreeRoot::new(thread_id));
        if !name.is_empty() {
            root.thread_name = strings.intern(&name);
            root.got_name = true;
        }
    }
    Ok(())
}

// Truncation inside the block region or its trailers invalidates the
// same offset chain as a bad record.
fn wrap_truncation(err: ReadError) -> ReadError {
    match err {
        ReadError::UnexpectedEndOfData { .. } => {
            ReadError::block_record(format!("truncated record: {err}"))
        }
        other => other,
    }
}
