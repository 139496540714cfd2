// Wire-level types shared by every region of the capture format:
// the file header, the packed version word, and the descriptor enums.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decode::ByteCursor;
use crate::error::{ReadError, Result};

/// Magic word at offset 0 of every capture file.
pub const MAGIC: u32 = 0xB10C_CA97;

/// Highest major version this reader understands.
pub const SUPPORTED_MAJOR: u8 = 1;

/// Serialized size of the fixed header.
pub const HEADER_SIZE: usize = 72;

/// Format version packed into 32 bits: `major << 24 | minor << 16 | patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version(pub u32);

impl Version {
    pub fn new(major: u8, minor: u8, patch: u16) -> Self {
        Version(((major as u32) << 24) | ((minor as u32) << 16) | patch as u32)
    }

    pub fn major(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn minor(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn patch(self) -> u16 {
        self.0 as u16
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

/// Kind of instrumentation point a descriptor was registered as.
///
/// Unknown values decode as `Unknown` instead of failing the load;
/// enum skew is the most common forward/backward compatibility hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockType {
    Block,
    Event,
    Value,
    Unknown,
}

impl BlockType {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => BlockType::Block,
            1 => BlockType::Event,
            2 => BlockType::Value,
            _ => BlockType::Unknown,
        }
    }

    /// Display label used when a descriptor never received a name.
    pub fn label(self) -> &'static str {
        match self {
            BlockType::Block => "Block",
            BlockType::Event => "Event",
            BlockType::Value => "Value",
            BlockType::Unknown => "Unknown",
        }
    }
}

/// Enabled/disabled state of an instrumentation point, used for
/// selective re-capture. Unknown values fall back to `Off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockStatus {
    Off,
    On,
    ForceOn,
    OffRecursive,
    ForceOnRecursive,
}

impl BlockStatus {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => BlockStatus::On,
            2 => BlockStatus::ForceOn,
            3 => BlockStatus::OffRecursive,
            4 => BlockStatus::ForceOnRecursive,
            _ => BlockStatus::Off,
        }
    }
}

/// Fixed file header. Region byte lengths are exact; the reader checks
/// them against both the input size and the bytes each region actually
/// consumes.
#[derive(Debug, Clone)]
pub struct CaptureHeader {
    pub version: Version,
    pub process_id: u64,
    pub begin_time: u64,
    pub end_time: u64,
    pub memory_stream: bool,
    pub descriptors_count: u32,
    pub descriptors_bytes: u64,
    pub blocks_count: u32,
    pub blocks_bytes: u64,
    pub context_switch_count: u32,
    pub thread_name_count: u32,
    pub bookmark_count: u32,
}

impl CaptureHeader {
    pub fn decode(cur: &mut ByteCursor<'_>) -> Result<Self> {
        if cur.remaining() < HEADER_SIZE {
            return Err(ReadError::header(format!(
                "input is {} bytes, header needs {HEADER_SIZE}",
                cur.remaining()
            )));
        }

        let magic = cur.read_u32()?;
        if magic != MAGIC {
            return Err(ReadError::header(format!(
                "bad magic 0x{magic:08X}, expected 0x{MAGIC:08X}"
            )));
        }

        let version = Version(cur.read_u32()?);
        if version.major() != SUPPORTED_MAJOR {
            return Err(ReadError::VersionUnsupported { version });
        }

        let process_id = cur.read_u64()?;
        let begin_time = cur.read_u64()?;
        let end_time = cur.read_u64()?;
        let memory_stream = cur.read_u8()? != 0;
        cur.skip(3)?;
        let descriptors_count = cur.read_u32()?;
        let descriptors_bytes = cur.read_u64()?;
        let blocks_count = cur.read_u32()?;
        let blocks_bytes = cur.read_u64()?;
        let context_switch_count = cur.read_u32()?;
        let thread_name_count = cur.read_u32()?;
        let bookmark_count = cur.read_u32()?;

        if end_time < begin_time {
            return Err(ReadError::header(format!(
                "inverted time bounds: begin {begin_time} > end {end_time}"
            )));
        }

        let declared = descriptors_bytes.saturating_add(blocks_bytes);
        if declared > cur.remaining() as u64 {
            return Err(ReadError::header(format!(
                "declared region lengths ({declared} bytes) exceed remaining input ({} bytes)",
                cur.remaining()
            )));
        }

        Ok(CaptureHeader {
            version,
            process_id,
            begin_time,
            end_time,
            memory_stream,
            descriptors_count,
            descriptors_bytes,
            blocks_count,
            blocks_bytes,
            context_switch_count,
            thread_name_count,
            bookmark_count,
        })
    }
}
