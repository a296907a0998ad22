//! Assertions over transcoder outputs.

#![allow(dead_code)]

use mgtranscode_lib::mgrec::{MpeggRecord, open_mgrec_reader};
use mgtranscode_lib::sam::RefId;
use std::path::Path;
use std::process::Output;

/// Read every record of an mgrec file.
pub fn read_mgrec(path: &Path) -> Vec<MpeggRecord> {
    open_mgrec_reader(path)
        .expect("Failed to open mgrec output")
        .collect::<anyhow::Result<Vec<_>>>()
        .expect("Failed to read mgrec output")
}

/// Non-header lines of a SAM file.
pub fn read_sam_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("Failed to read SAM output")
        .lines()
        .filter(|l| !l.starts_with('@'))
        .map(str::to_string)
        .collect()
}

/// Asserts that records are ordered by reference and `min_pos`, with every unaligned
/// record after all aligned ones.
///
/// # Panics
///
/// Panics on the first record out of order.
pub fn assert_position_sorted(records: &[MpeggRecord]) {
    let mut previous: Option<(RefId, u64)> = None;
    let mut in_unmapped_tail = false;
    for record in records {
        match (record.reference(), record.min_pos()) {
            (Some(ref_id), Some(pos)) => {
                assert!(!in_unmapped_tail, "aligned record {} after unaligned records", record.read_name);
                if let Some(prev) = previous {
                    assert!(
                        prev <= (ref_id, pos),
                        "record {} at {:?} follows {:?}",
                        record.read_name,
                        (ref_id, pos),
                        prev
                    );
                }
                previous = Some((ref_id, pos));
            }
            _ => in_unmapped_tail = true,
        }
    }
}

/// Asserts that a process exited successfully, showing its stderr otherwise.
pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "mgtranscode failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Asserts that a process failed with `message` somewhere in its stderr.
pub fn assert_failure_contains(output: &Output, message: &str) {
    assert!(!output.status.success(), "mgtranscode unexpectedly succeeded");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(message), "expected '{message}' in stderr:\n{stderr}");
}
