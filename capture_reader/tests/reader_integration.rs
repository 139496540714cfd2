// Load semantics of the reader facade: file and stream entry points,
// all-or-nothing replacement, error taxonomy, cancellation, bookmarks.

mod common;

use capture_reader::{Bookmark, CaptureReader, ReadError, Version};
use common::{CaptureBuilder, OFF_BLOCK_BYTES, OFF_DESC_COUNT, OFF_MAGIC, OFF_VERSION};
use tempfile::TempDir;

fn two_thread_capture() -> CaptureBuilder {
    CaptureBuilder::new()
        .time_bounds(0, 10_000)
        .descriptor(0, 0, 1, "engine.rs", "frame")
        .descriptor(1, 0, 1, "engine.rs", "physics")
        .block(1, 0, 100, 900)
        .block(1, 1, 200, 600)
        .block(2, 0, 150, 800)
        .block(2, 1, 300, 700)
        .block(1, 0, 1_000, 1_500)
        .thread_name(1, "main")
        .bookmark(500, 0xFFFF_0000, "spike here")
        .bookmark(120, 0xFF00_FF00, "start")
}

#[test]
fn test_read_file__valid_capture__then_counts_and_bounds_match() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.prof");
    two_thread_capture().write_to(&path);

    let mut reader = CaptureReader::new();
    let count = reader.read_file(&path).unwrap();

    assert_eq!(count, 5);
    assert_eq!(reader.blocks_len(), 5);
    assert_eq!(reader.descriptors_len(), 2);
    assert_eq!(reader.threads_len(), 2);
    assert_eq!(reader.capture().version(), Version::new(1, 3, 0));
    assert_eq!(reader.capture().time_range(), (0, 10_000));
    assert!(reader.last_error().is_none());

    let thread1 = &reader.capture().threads()[&1];
    assert_eq!(thread1.begin_time, 100);
    assert_eq!(thread1.end_time, 1_500);
    assert_eq!(thread1.children.len(), 2);

    let thread2 = &reader.capture().threads()[&2];
    assert_eq!(thread2.begin_time, 150);
    assert_eq!(thread2.end_time, 800);
}

#[test]
fn test_read_stream__same_bytes__then_identical_to_file_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.prof");
    let builder = two_thread_capture();
    builder.write_to(&path);

    let mut from_file = CaptureReader::new();
    let mut from_stream = CaptureReader::new();
    from_file.read_file(&path).unwrap();
    from_stream.read_stream(&builder.build()).unwrap();

    assert_eq!(from_file.blocks_len(), from_stream.blocks_len());
    assert_eq!(from_file.threads_len(), from_stream.threads_len());
    assert_eq!(
        from_file.capture().thread_name(1),
        from_stream.capture().thread_name(1)
    );
}

#[test]
fn test_reload__same_capture_twice__then_structurally_identical() {
    let data = two_thread_capture().build();
    let mut reader = CaptureReader::new();

    reader.read_stream(&data).unwrap();
    let first: Vec<(u64, usize, Vec<u32>)> = reader
        .capture()
        .threads()
        .values()
        .map(|r| (r.thread_id, r.children.len(), r.children.clone()))
        .collect();

    reader.read_stream(&data).unwrap();
    let second: Vec<(u64, usize, Vec<u32>)> = reader
        .capture()
        .threads()
        .values()
        .map(|r| (r.thread_id, r.children.len(), r.children.clone()))
        .collect();

    assert_eq!(first, second);
}

#[test]
fn test_reload__replaces_prior_state_wholesale() {
    let mut reader = CaptureReader::new();
    reader.read_stream(&two_thread_capture().build()).unwrap();
    assert_eq!(reader.blocks_len(), 5);

    let smaller = CaptureBuilder::new()
        .descriptor(0, 0, 1, "a.rs", "only")
        .block(9, 0, 1, 2)
        .build();
    reader.read_stream(&smaller).unwrap();

    assert_eq!(reader.blocks_len(), 1);
    assert_eq!(reader.threads_len(), 1);
    assert!(reader.capture().threads().contains_key(&9));
    assert!(reader.capture().bookmarks().is_empty());
}

#[test]
fn test_failed_load__then_previous_state_untouched() {
    let mut reader = CaptureReader::new();
    reader.read_stream(&two_thread_capture().build()).unwrap();

    let mut corrupt = two_thread_capture().build();
    corrupt[OFF_MAGIC..OFF_MAGIC + 4].copy_from_slice(&0u32.to_le_bytes());
    let err = reader.read_stream(&corrupt).unwrap_err();

    assert!(matches!(err, ReadError::CorruptedHeader { .. }));
    assert_eq!(reader.blocks_len(), 5);
    assert_eq!(reader.threads_len(), 2);
    assert!(reader.last_error().unwrap().contains("magic"));
}

#[test]
fn test_empty_capture__then_zero_blocks_not_an_error() {
    let data = CaptureBuilder::new().build();
    let mut reader = CaptureReader::new();

    let count = reader.read_stream(&data).unwrap();
    assert_eq!(count, 0);
    assert_eq!(reader.blocks_len(), 0);
    assert!(reader.capture().threads().is_empty());
    assert!(reader.capture().descriptors().is_empty());
    assert!(reader.capture().bookmarks().is_empty());
    assert!(reader.last_error().is_none());
}

#[test]
fn test_corrupted__unsupported_version__then_version_error() {
    let mut data = two_thread_capture().build();
    data[OFF_VERSION..OFF_VERSION + 4].copy_from_slice(&Version::new(2, 0, 0).0.to_le_bytes());

    let mut reader = CaptureReader::new();
    match reader.read_stream(&data) {
        Err(ReadError::VersionUnsupported { version }) => assert_eq!(version.major(), 2),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_corrupted__descriptor_count_mismatch__then_descriptor_table_error() {
    let mut data = two_thread_capture().build();
    data[OFF_DESC_COUNT..OFF_DESC_COUNT + 4].copy_from_slice(&1u32.to_le_bytes());

    let mut reader = CaptureReader::new();
    assert!(matches!(
        reader.read_stream(&data),
        Err(ReadError::CorruptedDescriptorTable { .. })
    ));
}

#[test]
fn test_corrupted__block_region_length_mismatch__then_block_record_error() {
    let mut data = two_thread_capture().build();
    let declared = u64::from_le_bytes(data[OFF_BLOCK_BYTES..OFF_BLOCK_BYTES + 8].try_into().unwrap());
    data[OFF_BLOCK_BYTES..OFF_BLOCK_BYTES + 8].copy_from_slice(&(declared - 2).to_le_bytes());

    let mut reader = CaptureReader::new();
    assert!(matches!(
        reader.read_stream(&data),
        Err(ReadError::CorruptedBlockRecord { .. })
    ));
}

#[test]
fn test_corrupted__truncated_input__then_error_not_panic() {
    let data = two_thread_capture().build();
    let mut reader = CaptureReader::new();

    for len in [0, 10, 71, data.len() - 1] {
        assert!(reader.read_stream(&data[..len]).is_err());
    }
}

#[test]
fn test_cancellation__interrupt_before_load__then_interrupted_and_state_kept() {
    let mut reader = CaptureReader::new();
    reader.read_stream(&two_thread_capture().build()).unwrap();

    // Large synthetic trace: many sequential top-level blocks.
    let mut big = CaptureBuilder::new().descriptor(0, 0, 1, "a.rs", "tick");
    for i in 0..4_000u64 {
        big = big.block(1, 0, i * 10, i * 10 + 5);
    }

    let control = reader.control();
    control.interrupt();
    let err = reader.read_stream(&big.build()).unwrap_err();

    assert!(matches!(err, ReadError::Interrupted));
    // The earlier capture survives an interrupted reload.
    assert_eq!(reader.blocks_len(), 5);

    control.clear_interrupt();
    reader.read_stream(&big.build()).unwrap();
    assert_eq!(reader.blocks_len(), 4_000);
    assert_eq!(control.blocks_processed(), 4_000);
}

#[test]
fn test_bookmarks__loaded_sorted_then_editable() {
    let mut reader = CaptureReader::new();
    reader.read_stream(&two_thread_capture().build()).unwrap();

    let times: Vec<u64> = reader
        .capture()
        .bookmarks()
        .iter()
        .map(|b| b.timestamp)
        .collect();
    assert_eq!(times, vec![120, 500]);
    assert_eq!(reader.capture().bookmarks()[0].text, "start");

    reader.add_bookmark(Bookmark {
        timestamp: 250,
        argb_color: 0,
        text: "mid".into(),
    });
    let times: Vec<u64> = reader
        .capture()
        .bookmarks()
        .iter()
        .map(|b| b.timestamp)
        .collect();
    assert_eq!(times, vec![120, 250, 500]);
}

#[test]
fn test_thread_stats__one_pass_summaries() {
    let mut reader = CaptureReader::new();
    reader.read_stream(&two_thread_capture().build()).unwrap();

    let stats = reader.capture().thread_stats();
    assert_eq!(stats.len(), 2);

    let t1 = stats.iter().find(|s| s.thread_id == 1).unwrap();
    assert_eq!(t1.block_count, 3);
    assert_eq!(t1.top_level_count, 2);
    assert_eq!(t1.begin_time, 100);
    assert_eq!(t1.end_time, 1_500);
}

#[test]
fn test_thread_name__named_and_numbered_threads() {
    let mut reader = CaptureReader::new();
    reader.read_stream(&two_thread_capture().build()).unwrap();

    assert_eq!(reader.capture().thread_name(1), Some("main"));
    assert_eq!(reader.capture().thread_name(2), None);
    assert!(reader.capture().threads()[&1].got_name);
    assert!(!reader.capture().threads()[&2].got_name);
}
