// Reader facade: owns the loaded capture, exposes read-only views, and
// carries the advisory progress/cancellation handle shared with the
// caller's worker orchestration.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::decode::{ByteCursor, StrId, StringTable};
use crate::descriptor::{read_descriptor_table, BlockDescriptor};
use crate::error::{ReadError, Result};
use crate::forest::{
    build_forest, read_context_switches, read_thread_names, Block, BlocksTreeRoot,
    ContextSwitchEvent,
};
use crate::types::{CaptureHeader, Version};

/// Clonable progress/cancellation handle, safe to poll from another
/// thread. The counter is advisory (single writer, relaxed ordering);
/// the interrupt flag stays set until [`LoadControl::clear_interrupt`]
/// so a request raised just before a load still lands.
#[derive(Clone)]
pub struct LoadControl {
    blocks_processed: Arc<AtomicU64>,
    interrupted: Arc<AtomicBool>,
}

impl LoadControl {
    pub fn new() -> Self {
        LoadControl {
            blocks_processed: Arc::new(AtomicU64::new(0)),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Monotonically increasing count of block records parsed by the
    /// load in progress.
    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed.load(Ordering::Relaxed)
    }

    /// Request cancellation of the load in progress (or the next one).
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    pub fn clear_interrupt(&self) {
        self.interrupted.store(false, Ordering::Relaxed);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }

    pub(crate) fn add_blocks(&self, n: u64) {
        self.blocks_processed.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn reset_progress(&self) {
        self.blocks_processed.store(0, Ordering::Relaxed);
    }
}

impl Default for LoadControl {
    fn default() -> Self {
        Self::new()
    }
}

/// User-authored annotation. The only entity with a post-load mutation
/// path: the facade's bookmark operations edit and re-sort these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub timestamp: u64,
    pub argb_color: u32,
    pub text: String,
}

/// Per-thread one-pass summary for trace-info surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadStats {
    pub thread_id: u64,
    pub block_count: usize,
    pub top_level_count: usize,
    pub begin_time: u64,
    pub end_time: u64,
}

/// Everything one successful load produces, owned as a single value:
/// constructed whole, replaced whole, never merged. Consumers receive
/// it by reference from the facade.
pub struct LoadedCapture {
    pub(crate) version: Version,
    pub(crate) process_id: u64,
    pub(crate) begin_time: u64,
    pub(crate) end_time: u64,
    pub(crate) memory_stream: bool,
    pub(crate) descriptors: Vec<BlockDescriptor>,
    pub(crate) blocks: Vec<Block>,
    pub(crate) threads: BTreeMap<u64, BlocksTreeRoot>,
    pub(crate) bookmarks: Vec<Bookmark>,
    pub(crate) strings: StringTable,
}

impl LoadedCapture {
    /// Parse a complete capture image. All-or-nothing: any failure
    /// discards everything built so far.
    pub fn from_bytes(data: &[u8], control: &LoadControl) -> Result<Self> {
        let mut cur = ByteCursor::new(data);
        let header = CaptureHeader::decode(&mut cur)?;
        debug!(
            version = %header.version,
            descriptors = header.descriptors_count,
            blocks = header.blocks_count,
            "capture header accepted"
        );

        let mut strings = StringTable::new();
        let mut descriptors = read_descriptor_table(&mut cur, &header, &mut strings)?;
        let forest = build_forest(&mut cur, &header, &mut descriptors, &mut strings, control)?;

        let mut threads = forest.threads;
        read_context_switches(&mut cur, &header, &mut strings, &mut threads)?;
        read_thread_names(&mut cur, &header, &mut strings, &mut threads)?;
        let bookmarks = read_bookmarks(&mut cur, &header)?;

        Ok(LoadedCapture {
            version: header.version,
            process_id: header.process_id,
            begin_time: header.begin_time,
            end_time: header.end_time,
            memory_stream: header.memory_stream,
            descriptors,
            blocks: forest.blocks,
            threads,
            bookmarks,
            strings,
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn process_id(&self) -> u64 {
        self.process_id
    }

    pub fn memory_stream(&self) -> bool {
        self.memory_stream
    }

    /// Capture-wide time bounds from the header.
    pub fn time_range(&self) -> (u64, u64) {
        (self.begin_time, self.end_time)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn descriptors(&self) -> &[BlockDescriptor] {
        &self.descriptors
    }

    pub fn threads(&self) -> &BTreeMap<u64, BlocksTreeRoot> {
        &self.threads
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn string(&self, id: StrId) -> &str {
        self.strings.get(id)
    }

    /// Display name for a descriptor: its (possibly runtime-filled)
    /// name, or the block-type label when it never received one.
    pub fn descriptor_name(&self, id: u32) -> &str {
        match self.descriptors.get(id as usize) {
            Some(desc) if !desc.name.is_empty() => self.strings.get(desc.name),
            Some(desc) => desc.block_type.label(),
            None => "",
        }
    }

    pub fn thread_name(&self, thread_id: u64) -> Option<&str> {
        let root = self.threads.get(&thread_id)?;
        root.got_name.then(|| self.strings.get(root.thread_name))
    }

    pub fn context_switches(&self, thread_id: u64) -> Option<&[ContextSwitchEvent]> {
        self.threads.get(&thread_id).map(|root| root.sync.as_slice())
    }

    /// One-pass per-thread summaries, in thread-id order.
    pub fn thread_stats(&self) -> Vec<ThreadStats> {
        self.threads
            .values()
            .map(|root| ThreadStats {
                thread_id: root.thread_id,
                block_count: self
                    .blocks
                    .iter()
                    .filter(|b| b.thread_id == root.thread_id)
                    .count(),
                top_level_count: root.children.len(),
                begin_time: root.begin_time,
                end_time: root.end_time,
            })
            .collect()
    }
}

fn read_bookmarks(cur: &mut ByteCursor<'_>, header: &CaptureHeader) -> Result<Vec<Bookmark>> {
    let mut bookmarks = Vec::with_capacity(header.bookmark_count as usize);
    for _ in 0..header.bookmark_count {
        let timestamp = cur.read_u64().map_err(wrap_trailer)?;
        let argb_color = cur.read_u32().map_err(wrap_trailer)?;
        let text = cur.read_string().map_err(wrap_trailer)?;
        bookmarks.push(Bookmark {
            timestamp,
            argb_color,
            text,
        });
    }
    bookmarks.sort_by_key(|b| b.timestamp);
    Ok(bookmarks)
}

fn wrap_trailer(err: ReadError) -> ReadError {
    match err {
        ReadError::UnexpectedEndOfData { .. } => {
            ReadError::block_record(format!("truncated bookmark record: {err}"))
        }
        other => other,
    }
}

/// Public entry point. One facade owns at most one loaded capture;
/// re-reading fully replaces it, and a failed read leaves the previous
/// capture exactly as it was.
pub struct CaptureReader {
    capture: LoadedCapture,
    control: LoadControl,
    last_error: Option<String>,
}

impl CaptureReader {
    pub fn new() -> Self {
        CaptureReader {
            capture: LoadedCapture::empty(),
            control: LoadControl::new(),
            last_error: None,
        }
    }

    /// Handle for progress polling and cancellation, clonable across
    /// threads.
    pub fn control(&self) -> LoadControl {
        self.control.clone()
    }

    /// Load a capture file. The whole file is mapped into memory up
    /// front; the format is count-prefixed, so no streaming parse is
    /// needed. Returns the number of blocks loaded.
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<u32> {
        let path = path.as_ref();
        let file =
            File::open(path).map_err(|err| self.fail(ReadError::file_not_found(path, err)))?;
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|err| self.fail(ReadError::file_not_found(path, err)))?;
        info!(path = %path.display(), bytes = mmap.len(), "reading capture file");
        self.load(&mmap)
    }

    /// Load a capture from an in-memory byte stream; identical contract
    /// to [`CaptureReader::read_file`].
    pub fn read_stream(&mut self, data: &[u8]) -> Result<u32> {
        debug!(bytes = data.len(), "reading capture stream");
        self.load(data)
    }

    fn load(&mut self, data: &[u8]) -> Result<u32> {
        self.control.reset_progress();
        match LoadedCapture::from_bytes(data, &self.control) {
            Ok(capture) => {
                let count = capture.blocks.len() as u32;
                info!(
                    blocks = count,
                    threads = capture.threads.len(),
                    descriptors = capture.descriptors.len(),
                    "capture loaded"
                );
                self.capture = capture;
                self.last_error = None;
                Ok(count)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn fail(&mut self, err: ReadError) -> ReadError {
        warn!(error = %err, "capture load failed, previous state retained");
        self.last_error = Some(err.to_string());
        err
    }

    /// Human-readable message from the most recent failed load, if the
    /// last load failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Discard the loaded capture.
    pub fn clear(&mut self) {
        self.capture = LoadedCapture::empty();
        self.last_error = None;
        self.control.reset_progress();
    }

    /// The loaded capture; empty (all collections present, zero-length)
    /// before the first successful load.
    pub fn capture(&self) -> &LoadedCapture {
        &self.capture
    }

    pub fn blocks_len(&self) -> usize {
        self.capture.blocks.len()
    }

    pub fn threads_len(&self) -> usize {
        self.capture.threads.len()
    }

    pub fn descriptors_len(&self) -> usize {
        self.capture.descriptors.len()
    }

    /// Append a bookmark, keeping the list ordered by time.
    pub fn add_bookmark(&mut self, bookmark: Bookmark) {
        self.capture.bookmarks.push(bookmark);
        self.capture.bookmarks.sort_by_key(|b| b.timestamp);
    }

    /// Replace the bookmark at `index`, re-sorting afterwards. Returns
    /// false when the index is out of range.
    pub fn set_bookmark(&mut self, index: usize, bookmark: Bookmark) -> bool {
        match self.capture.bookmarks.get_mut(index) {
            Some(slot) => {
                *slot = bookmark;
                self.capture.bookmarks.sort_by_key(|b| b.timestamp);
                true
            }
            None => false,
        }
    }

    /// Remove and return the bookmark at `index`.
    pub fn remove_bookmark(&mut self, index: usize) -> Option<Bookmark> {
        if index < self.capture.bookmarks.len() {
            Some(self.capture.bookmarks.remove(index))
        } else {
            None
        }
    }
}

impl Default for CaptureReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadedCapture {
    /// The state of a facade before its first successful load: every
    /// accessor collection present and empty, never absent.
    fn empty() -> Self {
        LoadedCapture {
            version: Version::new(0, 0, 0),
            process_id: 0,
            begin_time: 0,
            end_time: 0,
            memory_stream: false,
            descriptors: Vec::new(),
            blocks: Vec::new(),
            threads: BTreeMap::new(),
            bookmarks: Vec::new(),
            strings: StringTable::new(),
        }
    }
}
