// Error types for capture loading. Every parse failure aborts the whole
// load; partially decoded state is never published.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use crate::types::Version;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("capture file not found or unreadable: {path:?}: {source}")]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupted header: {reason}")]
    CorruptedHeader { reason: String },

    #[error("unsupported capture version: {version}")]
    VersionUnsupported { version: Version },

    #[error("corrupted descriptor table: {reason}")]
    CorruptedDescriptorTable { reason: String },

    #[error("corrupted block record: {reason}")]
    CorruptedBlockRecord { reason: String },

    #[error("unexpected end of data at offset {offset}: wanted {wanted} bytes, {available} available")]
    UnexpectedEndOfData {
        offset: usize,
        wanted: usize,
        available: usize,
    },

    /// Caller-requested cancellation. A normal alternate outcome, not a
    /// corruption: the previously loaded capture (if any) stays intact.
    #[error("capture load interrupted")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, ReadError>;

impl ReadError {
    pub fn file_not_found(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileNotFound {
            path: path.into(),
            source,
        }
    }

    pub fn header(reason: impl fmt::Display) -> Self {
        Self::CorruptedHeader {
            reason: reason.to_string(),
        }
    }

    pub fn descriptor_table(reason: impl fmt::Display) -> Self {
        Self::CorruptedDescriptorTable {
            reason: reason.to_string(),
        }
    }

    pub fn block_record(reason: impl fmt::Display) -> Self {
        Self::CorruptedBlockRecord {
            reason: reason.to_string(),
        }
    }
}
