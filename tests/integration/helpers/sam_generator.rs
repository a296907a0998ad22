//! Builders for SAM input files used by the integration tests.

#![allow(dead_code)]

use mgtranscode_lib::sam::{PairBuilder, RecordBuilder, SamRecord};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Header with two references.
pub const HEADER: &str = "@HD\tVN:1.6\tSO:queryname\n\
@SQ\tSN:chr1\tLN:1000000\n\
@SQ\tSN:chr2\tLN:1000000\n";

/// Path of the compiled `mgtranscode` binary.
pub fn mgtranscode_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mgtranscode"))
}

/// Run `mgtranscode` with `args`, returning its output.
pub fn run_mgtranscode(args: &[&str]) -> Output {
    Command::new(mgtranscode_binary()).args(args).output().expect("Failed to run mgtranscode")
}

/// Render `records` as SAM text below [`HEADER`].
pub fn sam_text(records: &[SamRecord]) -> String {
    let mut text = HEADER.to_string();
    for record in records {
        text.push_str(&record.to_string());
        text.push('\n');
    }
    text
}

/// Write `records` as a SAM file at `path`.
pub fn write_sam(path: &Path, records: &[SamRecord]) {
    std::fs::write(path, sam_text(records)).expect("Failed to write SAM file");
}

/// A QNAME-grouped mix of templates spread over both references:
/// same-reference pairs, cross-reference pairs, half-mapped pairs, single-end reads
/// and unmapped reads, placed at pseudo-random positions.
pub fn mixed_templates(n: u32) -> Vec<SamRecord> {
    let mut records = Vec::new();
    let mut state = 0x2545_f491_u32;
    for i in 0..n {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let pos = 1 + state % 500_000;
        let (reference, id) = if state % 2 == 0 { ("chr1", 0) } else { ("chr2", 1) };
        let name = format!("t{i:06}");
        match i % 10 {
            0 => records.push(RecordBuilder::new().name(&name).unmapped().build()),
            1 => records.push(RecordBuilder::new().name(&name).reference(reference, id).position(pos).build()),
            2 => {
                let (r1, r2) = PairBuilder::new(&name).r1("chr1", 0, pos).r2("chr2", 1, pos / 2 + 1).build();
                records.extend([r1, r2]);
            }
            3 => {
                let (r1, r2) = PairBuilder::new(&name).r2(reference, id, pos).build();
                records.extend([r1, r2]);
            }
            _ => {
                let (r1, r2) =
                    PairBuilder::new(&name).r1(reference, id, pos).r2(reference, id, pos + 150).build();
                records.extend([r1, r2]);
            }
        }
    }
    records
}
