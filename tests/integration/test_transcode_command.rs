//! Integration tests for the `transcode` command.

use mgtranscode_lib::mgrec::ClassType;
use rstest::rstest;
use tempfile::TempDir;

use crate::helpers::{
    assert_failure_contains, assert_position_sorted, assert_success, mixed_templates, read_mgrec,
    run_mgtranscode, write_sam,
};

#[rstest]
#[case::single_thread("1")]
#[case::multi_thread("4")]
fn test_transcode_sorts_input_larger_than_buffer(#[case] threads: &str) {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    let output = dir.path().join("output.mgrec");
    let scratch = dir.path().join("scratch");
    std::fs::create_dir(&scratch).unwrap();
    write_sam(&input, &mixed_templates(400));

    let result = run_mgtranscode(&[
        "transcode",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "-T",
        scratch.to_str().unwrap(),
        "--buffer-size",
        "25",
        "--threads",
        threads,
    ]);
    assert_success(&result);

    let records = read_mgrec(&output);
    assert!(records.len() >= 3 * 25);
    assert_position_sorted(&records);
    assert!(records.iter().any(|r| r.class_type == ClassType::Hm));
    assert_eq!(records.last().map(|r| r.class_type), Some(ClassType::U));
    assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0, "scratch files left behind");
}

#[test]
fn test_thread_count_does_not_change_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    write_sam(&input, &mixed_templates(300));

    let mut outputs = Vec::new();
    for threads in ["1", "3"] {
        let output = dir.path().join(format!("out.{threads}.mgrec"));
        assert_success(&run_mgtranscode(&[
            "transcode",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--buffer-size",
            "40",
            "--threads",
            threads,
        ]));
        outputs.push(std::fs::read(&output).unwrap());
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_force_split_stores_reads_separately() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    let output = dir.path().join("output.mgrec");
    let templates = mixed_templates(50);
    write_sam(&input, &templates);

    assert_success(&run_mgtranscode(&[
        "transcode",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--force-split",
    ]));

    let records = read_mgrec(&output);
    assert_position_sorted(&records);
    assert!(records.iter().all(|r| r.segments.len() == 1 || r.class_type != ClassType::I));
}

#[test]
fn test_clean_removes_half_mapped_records() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    let output = dir.path().join("output.mgrec");
    write_sam(&input, &mixed_templates(100));

    assert_success(&run_mgtranscode(&[
        "transcode",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--clean",
    ]));

    let records = read_mgrec(&output);
    assert_position_sorted(&records);
    assert!(records.iter().all(|r| r.class_type != ClassType::Hm));
    assert!(records.iter().all(|r| r.alignments.len() <= 1));
}

#[test]
fn test_header_only_input_gives_empty_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    let output = dir.path().join("output.mgrec");
    write_sam(&input, &[]);

    assert_success(&run_mgtranscode(&[
        "transcode",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ]));
    assert!(read_mgrec(&output).is_empty());
}

#[test]
fn test_zero_buffer_size_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    write_sam(&input, &mixed_templates(5));

    let result = run_mgtranscode(&[
        "transcode",
        "-i",
        input.to_str().unwrap(),
        "-o",
        dir.path().join("output.mgrec").to_str().unwrap(),
        "--buffer-size",
        "0",
    ]);
    assert_failure_contains(&result, "buffer-size");
}
