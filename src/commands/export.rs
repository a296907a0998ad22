//! Export mgrec records back to SAM text.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use noodles::sam;
use noodles::sam::Header;
use mgtranscode_lib::logging::OperationTimer;
use mgtranscode_lib::mgrec::open_mgrec_reader;
use mgtranscode_lib::mgrec_to_sam::record_to_sam;
use mgtranscode_lib::progress::ProgressTracker;
use mgtranscode_lib::sam::ReferenceDictionary;
use mgtranscode_lib::sam::header::read_sam_header;
use mgtranscode_lib::sam::program::add_program_record;
use mgtranscode_lib::validation::{validate_file_exists, validate_output_parent};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::commands::command::Command;

const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// Export an mgrec file as SAM.
#[derive(Debug, Parser)]
#[command(
    name = "export",
    about = "\x1b[38;5;72m[CONVERSION]\x1b[0m     \x1b[36mExport mgrec records as SAM text\x1b[0m",
    long_about = r#"
Export MPEG-G records (mgrec) as SAM text.

Each record produces one SAM line per segment and alignment. Reference ids are
mapped back to names using the @SQ lines of --header; without a header the
numeric reference id is written in the RNAME and RNEXT columns.

EXAMPLES:

  # Export using the header of the original input
  mgtranscode export -i aligned.mgrec -o aligned.sam --header aligned.sam
"#
)]
pub struct Export {
    /// Input mgrec file.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output SAM file.
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// SAM file whose header is copied to the output and whose @SQ lines name the
    /// references. An @PG record for this run is appended to it.
    #[arg(long = "header")]
    pub header: Option<PathBuf>,
}

impl Command for Export {
    fn execute(&self, command_line: &str) -> Result<()> {
        validate_file_exists(&self.input, "Input mgrec")?;
        if let Some(ref header) = self.header {
            validate_file_exists(header, "Header SAM")?;
        }
        validate_output_parent(&self.output, "Output SAM")?;

        info!("Starting Export");
        info!("Input: {}", self.input.display());
        info!("Output: {}", self.output.display());

        let header = match self.header {
            Some(ref header) => read_sam_header(header)?,
            None => Header::default(),
        };
        let references = ReferenceDictionary::from_header(&header);
        let header = add_program_record(header, crate::version::VERSION.as_str(), command_line)?;
        if references.is_empty() {
            info!("No reference names available, writing reference ids");
        }

        let timer = OperationTimer::new("Exporting records");
        let reader = open_mgrec_reader(&self.input)?;
        let file = File::create(&self.output)
            .with_context(|| format!("Failed to create output file: {}", self.output.display()))?;
        let mut sam_writer = sam::io::Writer::new(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file));
        sam_writer
            .write_header(&header)
            .with_context(|| format!("Failed to write header: {}", self.output.display()))?;
        let mut writer = sam_writer.into_inner();

        let progress = ProgressTracker::new("Exported records");
        let mut lines = 0u64;
        for record in reader {
            let record = record.with_context(|| format!("Failed to read {}", self.input.display()))?;
            for sam in record_to_sam(&record, &references)? {
                writeln!(writer, "{sam}")?;
                lines += 1;
            }
            progress.log_if_needed(1);
        }
        progress.log_final();
        writer
            .flush()
            .with_context(|| format!("Failed to flush output file: {}", self.output.display()))?;

        info!("SAM lines written: {lines}");
        timer.log_completion(progress.count());
        Ok(())
    }
}
