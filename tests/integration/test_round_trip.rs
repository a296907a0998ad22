//! SAM -> mgrec -> SAM round trips through both commands.

use mgtranscode_lib::mgrec::{AlignmentSplit, ClassType};
use mgtranscode_lib::sam::{PairBuilder, RecordBuilder, SamRecord};
use std::path::Path;
use tempfile::TempDir;

use crate::helpers::{assert_success, read_mgrec, read_sam_lines, run_mgtranscode, write_sam};

/// Transcode `records` and export them again, returning the exported SAM lines.
fn round_trip(dir: &Path, records: &[SamRecord], extra: &[&str]) -> Vec<String> {
    let input = dir.join("input.sam");
    let mgrec = dir.join("sorted.mgrec");
    let exported = dir.join("exported.sam");
    write_sam(&input, records);

    let mut args = vec!["transcode", "-i", input.to_str().unwrap(), "-o", mgrec.to_str().unwrap()];
    args.extend_from_slice(extra);
    assert_success(&run_mgtranscode(&args));

    assert_success(&run_mgtranscode(&[
        "export",
        "-i",
        mgrec.to_str().unwrap(),
        "-o",
        exported.to_str().unwrap(),
        "--header",
        input.to_str().unwrap(),
    ]));
    read_sam_lines(&exported)
}

#[test]
fn test_proper_pair_round_trip() {
    let dir = TempDir::new().unwrap();
    let (r1, r2) = PairBuilder::new("q1").r1("chr1", 0, 100).r2("chr1", 0, 150).build();
    assert_eq!((r1.flag, r2.flag), (99, 147));

    let lines = round_trip(dir.path(), &[r1.clone(), r2.clone()], &[]);
    assert_eq!(lines, vec![r1.to_string(), r2.to_string()]);

    let fields: Vec<&str> = lines[0].split('\t').collect();
    assert_eq!(fields[6], "=");
    assert_eq!(fields[8], "60");
    let fields: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(fields[8], "-60");

    let records = read_mgrec(&dir.path().join("sorted.mgrec"));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].template_count, 2);
    assert_eq!(records[0].segments.len(), 2);
    assert!(matches!(
        records[0].alignments[0].1.split,
        Some(AlignmentSplit::SameRec { delta: 50, .. })
    ));
}

#[test]
fn test_single_end_round_trip() {
    let dir = TempDir::new().unwrap();
    let read = RecordBuilder::new()
        .name("s1")
        .reference("chr2", 1)
        .position(2_000)
        .mapq(42)
        .cigar("3S7M")
        .build();

    let lines = round_trip(dir.path(), std::slice::from_ref(&read), &[]);
    assert_eq!(lines, vec![read.to_string()]);
}

#[test]
fn test_output_is_sorted_after_export() {
    let dir = TempDir::new().unwrap();
    let records = vec![
        RecordBuilder::new().name("a").reference("chr2", 1).position(10).build(),
        RecordBuilder::new().name("b").unmapped().build(),
        RecordBuilder::new().name("c").reference("chr1", 0).position(900).build(),
        RecordBuilder::new().name("d").reference("chr1", 0).position(300).build(),
    ];

    let lines = round_trip(dir.path(), &records, &["--buffer-size", "1"]);
    let names: Vec<&str> = lines.iter().map(|l| l.split('\t').next().unwrap()).collect();
    assert_eq!(names, vec!["d", "c", "a", "b"]);
}

#[test]
fn test_cross_reference_pair_loses_template_length() {
    let dir = TempDir::new().unwrap();
    let (r1, r2) = PairBuilder::new("x").r1("chr2", 1, 500).r2("chr1", 0, 700).build();

    let lines = round_trip(dir.path(), &[r1, r2], &[]);
    assert_eq!(lines.len(), 2);
    // chr1 sorts before chr2, so read 2 comes first
    let first: Vec<&str> = lines[0].split('\t').collect();
    let second: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(&first[2..9], &["chr1", "700", "60", "10M", "chr2", "500", "0"]);
    assert_eq!(&second[2..9], &["chr2", "500", "60", "10M", "chr1", "700", "0"]);

    let records = read_mgrec(&dir.path().join("sorted.mgrec"));
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.class_type == ClassType::I && r.segments.len() == 1));
}

#[test]
fn test_export_without_header_writes_reference_ids() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    let mgrec = dir.path().join("sorted.mgrec");
    let exported = dir.path().join("exported.sam");
    write_sam(&input, &[RecordBuilder::new().name("r").reference("chr2", 1).position(5).build()]);

    assert_success(&run_mgtranscode(&[
        "transcode",
        "-i",
        input.to_str().unwrap(),
        "-o",
        mgrec.to_str().unwrap(),
    ]));
    assert_success(&run_mgtranscode(&[
        "export",
        "-i",
        mgrec.to_str().unwrap(),
        "-o",
        exported.to_str().unwrap(),
    ]));

    let text = std::fs::read_to_string(&exported).unwrap();
    assert!(text.starts_with("@PG\tID:mgtranscode"));
    let lines = read_sam_lines(&exported);
    assert_eq!(lines[0].split('\t').nth(2), Some("1"));
}
