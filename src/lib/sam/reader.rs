//! Streaming SAM text reader.

use anyhow::{Context, Result};
use noodles::sam::Header;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::sam::header::{ReferenceDictionary, parse_sam_header};
use crate::sam::record::SamRecord;

const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Reads [`SamRecord`]s one line at a time.
///
/// Header lines at the top of the stream are parsed into a [`Header`] on construction
/// and its `@SQ` records seed the [`ReferenceDictionary`]. Blank lines are skipped.
pub struct SamReader<R: BufRead> {
    inner: R,
    header: Header,
    references: ReferenceDictionary,
    line: String,
    pending: Option<String>,
    line_number: u64,
}

impl SamReader<BufReader<File>> {
    /// Open a SAM file for reading.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open SAM file: {}", path.display()))?;
        Self::new(BufReader::with_capacity(READ_BUFFER_SIZE, file))
    }
}

impl<R: BufRead> SamReader<R> {
    /// Wrap a buffered reader, consuming any leading header lines.
    pub fn new(inner: R) -> Result<Self> {
        let mut reader = Self {
            inner,
            header: Header::default(),
            references: ReferenceDictionary::new(),
            line: String::new(),
            pending: None,
            line_number: 0,
        };
        let mut header_text = String::new();
        while reader.next_line()? {
            if reader.line.starts_with('@') {
                header_text.push_str(&reader.line);
            } else if !reader.line.trim().is_empty() {
                reader.pending = Some(std::mem::take(&mut reader.line));
                break;
            }
        }
        if !header_text.is_empty() {
            reader.header = parse_sam_header(&header_text)?;
            reader.references = ReferenceDictionary::from_header(&reader.header);
        }
        Ok(reader)
    }

    /// The parsed SAM header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Reference dictionary accumulated so far.
    #[must_use]
    pub fn references(&self) -> &ReferenceDictionary {
        &self.references
    }

    /// Consume the reader and return its reference dictionary.
    #[must_use]
    pub fn into_references(self) -> ReferenceDictionary {
        self.references
    }

    /// Read the next record, or `None` at end of input.
    pub fn read_record(&mut self) -> Result<Option<SamRecord>> {
        let line = match self.pending.take() {
            Some(line) => line,
            None => loop {
                if !self.next_line()? {
                    return Ok(None);
                }
                if !self.line.trim().is_empty() {
                    break std::mem::take(&mut self.line);
                }
            },
        };
        let record = SamRecord::parse(&line, self.line_number, &mut self.references)?;
        Ok(Some(record))
    }

    fn next_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self
            .inner
            .read_line(&mut self.line)
            .with_context(|| format!("Failed to read SAM line {}", self.line_number + 1))?;
        if n == 0 {
            return Ok(false);
        }
        self.line_number += 1;
        Ok(true)
    }
}

impl<R: BufRead> Iterator for SamReader<R> {
    type Item = Result<SamRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
