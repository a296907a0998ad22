//! Transcode SAM into position-sorted mgrec.
//!
//! Reads a QNAME-grouped SAM file, converts every read group into MPEG-G records and
//! sorts them by reference and leftmost mapped position with a two-phase external
//! sort. Unmapped records are written after all mapped records, in input order.

use anyhow::Result;
use clap::Parser;
use log::info;
use mgtranscode_lib::logging::{OperationTimer, log_transcode_summary};
use mgtranscode_lib::sort::{PHASE2_BUFFER_SIZE, TranscodeOptions, Transcoder};
use mgtranscode_lib::validation::{validate_file_exists, validate_output_parent};
use std::path::PathBuf;

use crate::commands::command::Command;

/// Transcode a SAM file to position-sorted mgrec.
#[derive(Debug, Parser)]
#[command(
    name = "transcode",
    about = "\x1b[38;5;72m[CONVERSION]\x1b[0m     \x1b[36mTranscode QNAME-grouped SAM to position-sorted mgrec\x1b[0m",
    long_about = r#"
Transcode a SAM file into a position-sorted stream of MPEG-G records (mgrec).

The input must be grouped by read name (all lines of a template adjacent), as
produced by aligners or `samtools sort -n`. Each group is classified as unmapped,
single-end or paired and converted into one or more MPEG-G records:

  - pairs on one reference become one two-segment record
  - pairs on different references become one record per read
  - pairs with one unmapped read become a half-mapped (CLASS_HM) record
  - secondary and supplementary lines become additional alignments

Records are then sorted by reference and leftmost mapped position using an
external sort that keeps at most --buffer-size records in memory. Unmapped
records follow all mapped records in input order.

EXAMPLES:

  # Transcode with defaults
  mgtranscode transcode -i aligned.sam -o aligned.mgrec

  # Large input on a fast scratch disk with 8 threads
  mgtranscode transcode -i aligned.sam -o aligned.mgrec -T /scratch --threads 8

  # Simplify records for encoders without split or spliced alignment support
  mgtranscode transcode -i aligned.sam -o aligned.mgrec --clean
"#
)]
pub struct Transcode {
    /// Input SAM file, grouped by read name.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output mgrec file.
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Directory in which temporary files are created.
    ///
    /// If not specified, uses the system default temp directory.
    #[arg(short = 'T', long = "tmp-dir")]
    pub tmp_dir: Option<PathBuf>,

    /// Maximum number of records held in memory before spilling sorted sub-chunks.
    #[arg(long = "buffer-size", default_value_t = PHASE2_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Number of threads for buffer sorts and per-reference merges.
    #[arg(short = '@', short_alias = 't', long = "threads", default_value = "1")]
    pub threads: usize,

    /// Strip additional alignments, unalign half-mapped and spliced records and split
    /// pairs too far apart for one record.
    #[arg(long = "clean", default_value = "false")]
    pub clean: bool,

    /// Store the two reads of a pair in separate records even on the same reference.
    #[arg(long = "force-split", default_value = "false")]
    pub force_split: bool,
}

impl Transcode {
    fn options(&self) -> TranscodeOptions {
        let mut options = TranscodeOptions::new()
            .buffer_size(self.buffer_size)
            .threads(self.threads)
            .clean(self.clean)
            .force_split(self.force_split);
        if let Some(ref tmp) = self.tmp_dir {
            options = options.temp_dir(tmp.clone());
        }
        options
    }
}

impl Command for Transcode {
    fn execute(&self, _command_line: &str) -> Result<()> {
        validate_file_exists(&self.input, "Input SAM")?;
        validate_output_parent(&self.output, "Output mgrec")?;
        let options = self.options();
        options.validate()?;

        info!("Starting Transcode");
        info!("Input: {}", self.input.display());
        info!("Output: {}", self.output.display());
        if let Some(ref tmp) = self.tmp_dir {
            info!("Temp directory: {}", tmp.display());
        }
        if self.clean {
            info!("Clean mode: enabled");
        }
        if self.force_split {
            info!("Force split: enabled");
        }

        let timer = OperationTimer::new("Transcoding SAM");
        let transcoder = Transcoder::new(options);
        let stats = transcoder.transcode(&self.input, &self.output)?;

        log_transcode_summary(&stats);
        timer.log_completion(stats.sam_records);
        Ok(())
    }
}
