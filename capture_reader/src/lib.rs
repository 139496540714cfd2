//! Reader for binary profiling captures.
//!
//! A capture file holds the output of an instrumented application run:
//! a table of block descriptors (one per static instrumentation point),
//! a flat stream of timed block records, and trailing context-switch,
//! thread-name and bookmark records. This crate deserializes that image
//! into an index-addressable forest of blocks per thread, suitable for
//! random-access querying by a presentation layer.
//!
//! Loading is synchronous and all-or-nothing: one call to
//! [`CaptureReader::read_file`] or [`CaptureReader::read_stream`] fully
//! parses the input or fails without touching previously loaded state.
//! A clonable [`LoadControl`] handle exposes an advisory progress
//! counter and a cancellation flag for callers that run the load on a
//! worker thread.

pub mod decode;
pub mod descriptor;
pub mod error;
pub mod forest;
pub mod reader;
pub mod tree;
pub mod types;
pub mod value;

pub use decode::{ByteCursor, StrId, StringTable};
pub use descriptor::BlockDescriptor;
pub use error::{ReadError, Result};
pub use forest::{Block, BlockIndex, BlocksTreeRoot, ContextSwitchEvent};
pub use reader::{Bookmark, CaptureReader, LoadControl, LoadedCapture, ThreadStats};
pub use tree::{build_display_tree, DisplayNode, DisplayTree};
pub use types::{BlockStatus, BlockType, CaptureHeader, Version, MAGIC, SUPPORTED_MAJOR};
pub use value::{ScalarValue, ValueKind, ValuePayload};
