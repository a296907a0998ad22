//! Error path integration tests.
//!
//! Every error is fatal for the run: the command exits non-zero with a descriptive
//! message and leaves no scratch files behind.

use mgtranscode_lib::errors::TranscodeError;
use mgtranscode_lib::sam::{PairBuilder, RecordBuilder, SamReader};
use mgtranscode_lib::sort::{TranscodeOptions, Transcoder};
use std::io::Cursor;
use tempfile::TempDir;

use crate::helpers::{HEADER, assert_failure_contains, run_mgtranscode, sam_text, write_sam};

/// Run `transcode` on raw SAM text with a dedicated scratch directory, returning the
/// process output and whether the scratch directory is empty afterwards.
fn transcode_text(text: &str) -> (std::process::Output, bool) {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    let scratch = dir.path().join("scratch");
    std::fs::create_dir(&scratch).unwrap();
    std::fs::write(&input, text).unwrap();

    let output = run_mgtranscode(&[
        "transcode",
        "-i",
        input.to_str().unwrap(),
        "-o",
        dir.path().join("out.mgrec").to_str().unwrap(),
        "-T",
        scratch.to_str().unwrap(),
        "--buffer-size",
        "1",
    ]);
    let clean = std::fs::read_dir(&scratch).unwrap().count() == 0;
    (output, clean)
}

#[test]
fn test_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let output = run_mgtranscode(&[
        "transcode",
        "-i",
        "/nonexistent/input.sam",
        "-o",
        dir.path().join("out.mgrec").to_str().unwrap(),
    ]);
    assert_failure_contains(&output, "File does not exist");
}

#[test]
fn test_too_few_columns() {
    let good = RecordBuilder::new().name("a").reference("chr1", 0).position(5).build();
    let text = format!("{HEADER}{good}\nb\t0\tchr1\t10\n");
    let (output, clean) = transcode_text(&text);
    assert_failure_contains(&output, "Malformed SAM line 5");
    assert!(clean, "scratch files left behind");
}

#[test]
fn test_unparsable_position() {
    let text = format!("{HEADER}a\t0\tchr1\tten\t60\t10M\t*\t0\t0\tACGTACGTAC\t*\n");
    let (output, _) = transcode_text(&text);
    assert_failure_contains(&output, "invalid POS 'ten'");
}

#[test]
fn test_padding_cigar_is_rejected() {
    let read = RecordBuilder::new().name("p").reference("chr1", 0).position(5).cigar("5M1P5M").build();
    let (output, clean) = transcode_text(&sam_text(&[read]));
    assert_failure_contains(&output, "Invalid CIGAR token 'P'");
    assert!(clean, "scratch files left behind");
}

#[test]
fn test_paired_read_without_read_number() {
    let (mut r1, r2) = PairBuilder::new("q").r1("chr1", 0, 100).r2("chr1", 0, 200).build();
    r1.flag &= !0x40;
    let (output, _) = transcode_text(&sam_text(&[r1, r2]));
    assert_failure_contains(&output, "neither read 1 nor read 2");
}

#[test]
fn test_duplicate_single_end_primaries_are_invalid() {
    let mut records = Vec::new();
    for i in 0..5 {
        records.push(RecordBuilder::new().name(&format!("ok{i}")).reference("chr1", 0).position(i + 1).build());
    }
    records.push(RecordBuilder::new().name("dup").unmapped().build());
    records.push(RecordBuilder::new().name("dup").unmapped().build());

    let (output, clean) = transcode_text(&sam_text(&records));
    assert_failure_contains(&output, "Invalid record group 'dup'");
    assert!(clean, "scratch files left behind");
}

#[test]
fn test_truncated_mgrec_fails_export() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    let mgrec = dir.path().join("out.mgrec");
    write_sam(&input, &[RecordBuilder::new().name("r").reference("chr1", 0).position(5).build()]);
    assert!(
        run_mgtranscode(&["transcode", "-i", input.to_str().unwrap(), "-o", mgrec.to_str().unwrap()])
            .status
            .success()
    );

    let bytes = std::fs::read(&mgrec).unwrap();
    std::fs::write(&mgrec, &bytes[..bytes.len() - 3]).unwrap();

    let output = run_mgtranscode(&[
        "export",
        "-i",
        mgrec.to_str().unwrap(),
        "-o",
        dir.path().join("out.sam").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_library_error_is_typed() {
    let text = format!("{HEADER}a\t0\tchr1\t1\n");
    let reader = SamReader::new(Cursor::new(text)).unwrap();
    let dir = TempDir::new().unwrap();

    let err = Transcoder::new(TranscodeOptions::new())
        .transcode_reader(reader, &dir.path().join("out.mgrec"))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TranscodeError>(),
        Some(TranscodeError::MalformedSamLine { line_number: 4, .. })
    ));
}
