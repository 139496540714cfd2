// Test-only capture writer: builds wire images byte by byte for the
// reader to consume. The production crate has no write path.
#![allow(dead_code)]

use std::fs;
use std::path::Path;

use capture_reader::{Version, MAGIC};

// Header field offsets, for tests that corrupt a built image in place.
pub const OFF_MAGIC: usize = 0;
pub const OFF_VERSION: usize = 4;
pub const OFF_DESC_COUNT: usize = 36;
pub const OFF_DESC_BYTES: usize = 40;
pub const OFF_BLOCK_COUNT: usize = 48;
pub const OFF_BLOCK_BYTES: usize = 52;

pub struct CaptureBuilder {
    version: Version,
    process_id: u64,
    begin_time: u64,
    end_time: u64,
    memory_stream: bool,
    descriptors: Vec<Vec<u8>>,
    blocks: Vec<Vec<u8>>,
    context_switches: Vec<Vec<u8>>,
    thread_names: Vec<Vec<u8>>,
    bookmarks: Vec<Vec<u8>>,
}

impl CaptureBuilder {
    pub fn new() -> Self {
        CaptureBuilder {
            version: Version::new(1, 3, 0),
            process_id: 1000,
            begin_time: 0,
            end_time: u64::MAX / 2,
            memory_stream: false,
            descriptors: Vec::new(),
            blocks: Vec::new(),
            context_switches: Vec::new(),
            thread_names: Vec::new(),
            bookmarks: Vec::new(),
        }
    }

    pub fn time_bounds(mut self, begin: u64, end: u64) -> Self {
        self.begin_time = begin;
        self.end_time = end;
        self
    }

    pub fn descriptor(
        mut self,
        origin_id: u32,
        block_type: u8,
        status: u8,
        file: &str,
        name: &str,
    ) -> Self {
        let mut rec = Vec::new();
        rec.extend_from_slice(&origin_id.to_le_bytes());
        rec.extend_from_slice(&1u32.to_le_bytes()); // line number
        rec.extend_from_slice(&0xFF33_6699u32.to_le_bytes()); // argb
        rec.push(block_type);
        rec.push(status);
        push_str(&mut rec, file);
        push_str(&mut rec, name);
        self.descriptors.push(rec);
        self
    }

    pub fn block(self, thread_id: u64, descriptor_id: u32, begin: u64, end: u64) -> Self {
        self.named_block(thread_id, descriptor_id, begin, end, "")
    }

    pub fn named_block(
        mut self,
        thread_id: u64,
        descriptor_id: u32,
        begin: u64,
        end: u64,
        name: &str,
    ) -> Self {
        self.blocks
            .push(encode_block(thread_id, descriptor_id, begin, end, name, None));
        self
    }

    /// Block carrying a Float64 scalar payload; its descriptor must be
    /// Value-typed.
    pub fn value_block_f64(
        mut self,
        thread_id: u64,
        descriptor_id: u32,
        begin: u64,
        end: u64,
        value: f64,
    ) -> Self {
        let mut payload = Vec::new();
        payload.push(6u8); // Float64
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&value.to_le_bytes());
        self.blocks.push(encode_block(
            thread_id,
            descriptor_id,
            begin,
            end,
            "",
            Some(&payload),
        ));
        self
    }

    pub fn context_switch(
        mut self,
        thread_id: u64,
        begin: u64,
        end: u64,
        target_thread_id: u64,
        target_process: &str,
    ) -> Self {
        let mut rec = Vec::new();
        rec.extend_from_slice(&thread_id.to_le_bytes());
        rec.extend_from_slice(&begin.to_le_bytes());
        rec.extend_from_slice(&end.to_le_bytes());
        rec.extend_from_slice(&target_thread_id.to_le_bytes());
        push_str(&mut rec, target_process);
        self.context_switches.push(rec);
        self
    }

    pub fn thread_name(mut self, thread_id: u64, name: &str) -> Self {
        let mut rec = Vec::new();
        rec.extend_from_slice(&thread_id.to_le_bytes());
        push_str(&mut rec, name);
        self.thread_names.push(rec);
        self
    }

    pub fn bookmark(mut self, timestamp: u64, argb_color: u32, text: &str) -> Self {
        let mut rec = Vec::new();
        rec.extend_from_slice(&timestamp.to_le_bytes());
        rec.extend_from_slice(&argb_color.to_le_bytes());
        push_str(&mut rec, text);
        self.bookmarks.push(rec);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let descriptor_bytes: usize = self.descriptors.iter().map(Vec::len).sum();
        let block_bytes: usize = self.blocks.iter().map(Vec::len).sum();

        let mut data = Vec::new();
        data.extend_from_slice(&MAGIC.to_le_bytes());
        data.extend_from_slice(&self.version.0.to_le_bytes());
        data.extend_from_slice(&self.process_id.to_le_bytes());
        data.extend_from_slice(&self.begin_time.to_le_bytes());
        data.extend_from_slice(&self.end_time.to_le_bytes());
        data.push(self.memory_stream as u8);
        data.extend_from_slice(&[0, 0, 0]);
        data.extend_from_slice(&(self.descriptors.len() as u32).to_le_bytes());
        data.extend_from_slice(&(descriptor_bytes as u64).to_le_bytes());
        data.extend_from_slice(&(self.blocks.len() as u32).to_le_bytes());
        data.extend_from_slice(&(block_bytes as u64).to_le_bytes());
        data.extend_from_slice(&(self.context_switches.len() as u32).to_le_bytes());
        data.extend_from_slice(&(self.thread_names.len() as u32).to_le_bytes());
        data.extend_from_slice(&(self.bookmarks.len() as u32).to_le_bytes());

        for region in [
            &self.descriptors,
            &self.blocks,
            &self.context_switches,
            &self.thread_names,
            &self.bookmarks,
        ] {
            for rec in region {
                data.extend_from_slice(rec);
            }
        }
        data
    }

    pub fn write_to(&self, path: &Path) {
        fs::write(path, self.build()).unwrap();
    }
}

fn encode_block(
    thread_id: u64,
    descriptor_id: u32,
    begin: u64,
    end: u64,
    name: &str,
    payload: Option<&[u8]>,
) -> Vec<u8> {
    let mut rec = Vec::new();
    rec.extend_from_slice(&thread_id.to_le_bytes());
    rec.extend_from_slice(&descriptor_id.to_le_bytes());
    rec.extend_from_slice(&begin.to_le_bytes());
    rec.extend_from_slice(&end.to_le_bytes());
    push_str(&mut rec, name);
    if let Some(p) = payload {
        rec.extend_from_slice(p);
    }
    rec
}

fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}
