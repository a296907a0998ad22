//! Binary encoding of [`MpeggRecord`]s.
//!
//! Records are written back to back with no container framing. All integers are
//! big-endian and byte aligned:
//!
//! ```text
//! u8  template_count | u8 class | u8 flags | u8 read1_is_first
//! u16 name_len | name
//! u8  n_segments, per segment:  u32 seq_len | seq | u8 has_qual [| u32 qual_len | qual]
//! u16 n_alignments, per box:    u32 ref | u64 pos | alignment | u8 split_tag [| payload]
//! u8  more_tag [| u64 next_pos | u32 next_ref]
//!
//! alignment: u32 ecigar_len | ecigar | u8 rcomp | u8 n_scores | u32 score * n_scores
//! split_tag: 0 none, 1 unpaired, 2 same record (i64 delta | alignment),
//!            3 other record (u64 next_pos | u32 next_ref)
//! ```
//!
//! A stream that ends cleanly before the first byte of a record yields end of input;
//! a stream that ends inside a record is an error.

use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use crate::errors::TranscodeError;
use crate::mgrec::{
    Alignment, AlignmentBox, AlignmentSplit, ClassType, ExternalAlignment, MpeggRecord, Segment,
};

const IO_BUFFER_SIZE: usize = 64 * 1024;

const SPLIT_NONE: u8 = 0;
const SPLIT_UNPAIRED: u8 = 1;
const SPLIT_SAME_REC: u8 = 2;
const SPLIT_OTHER_REC: u8 = 3;

fn too_long(what: &str, len: usize) -> TranscodeError {
    TranscodeError::InvalidRecord { reason: format!("{what} of length {len} cannot be encoded") }
}

fn put_str_u32<W: Write>(w: &mut W, what: &str, value: &str) -> Result<()> {
    let len = u32::try_from(value.len()).map_err(|_| too_long(what, value.len()))?;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(value.as_bytes())?;
    Ok(())
}

fn put_alignment<W: Write>(w: &mut W, alignment: &Alignment) -> Result<()> {
    put_str_u32(w, "ECIGAR", &alignment.ecigar)?;
    w.write_all(&[u8::from(alignment.rcomp)])?;
    let n = u8::try_from(alignment.mapping_scores.len())
        .map_err(|_| too_long("mapping score list", alignment.mapping_scores.len()))?;
    w.write_all(&[n])?;
    for score in &alignment.mapping_scores {
        w.write_all(&score.to_be_bytes())?;
    }
    Ok(())
}

/// Encode one record.
pub fn write_record<W: Write>(w: &mut W, record: &MpeggRecord) -> Result<()> {
    w.write_all(&[
        record.template_count,
        record.class_type as u8,
        record.flags,
        u8::from(record.read1_is_first),
    ])?;

    let name_len = u16::try_from(record.read_name.len())
        .map_err(|_| too_long("read name", record.read_name.len()))?;
    w.write_all(&name_len.to_be_bytes())?;
    w.write_all(record.read_name.as_bytes())?;

    let n_segments =
        u8::try_from(record.segments.len()).map_err(|_| too_long("segment list", record.segments.len()))?;
    w.write_all(&[n_segments])?;
    for segment in &record.segments {
        put_str_u32(w, "sequence", &segment.sequence)?;
        match &segment.quality {
            Some(quality) => {
                w.write_all(&[1])?;
                put_str_u32(w, "quality", quality)?;
            }
            None => w.write_all(&[0])?,
        }
    }

    let n_alignments = u16::try_from(record.alignments.len())
        .map_err(|_| too_long("alignment list", record.alignments.len()))?;
    w.write_all(&n_alignments.to_be_bytes())?;
    for (rid, abox) in &record.alignments {
        w.write_all(&rid.to_be_bytes())?;
        w.write_all(&abox.position.to_be_bytes())?;
        put_alignment(w, &abox.alignment)?;
        match &abox.split {
            None => w.write_all(&[SPLIT_NONE])?,
            Some(AlignmentSplit::Unpaired) => w.write_all(&[SPLIT_UNPAIRED])?,
            Some(AlignmentSplit::SameRec { delta, alignment }) => {
                w.write_all(&[SPLIT_SAME_REC])?;
                w.write_all(&delta.to_be_bytes())?;
                put_alignment(w, alignment)?;
            }
            Some(AlignmentSplit::OtherRec { next_pos, next_ref }) => {
                w.write_all(&[SPLIT_OTHER_REC])?;
                w.write_all(&next_pos.to_be_bytes())?;
                w.write_all(&next_ref.to_be_bytes())?;
            }
        }
    }

    match &record.more_alignments {
        None => w.write_all(&[0])?,
        Some(ExternalAlignment::OtherRec { next_pos, next_ref }) => {
            w.write_all(&[1])?;
            w.write_all(&next_pos.to_be_bytes())?;
            w.write_all(&next_ref.to_be_bytes())?;
        }
    }
    Ok(())
}

fn get_array<R: Read, const N: usize>(r: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf).context("Truncated mgrec record")?;
    Ok(buf)
}

fn get_u8<R: Read>(r: &mut R) -> Result<u8> {
    Ok(get_array::<R, 1>(r)?[0])
}

fn get_u16<R: Read>(r: &mut R) -> Result<u16> {
    Ok(u16::from_be_bytes(get_array(r)?))
}

fn get_u32<R: Read>(r: &mut R) -> Result<u32> {
    Ok(u32::from_be_bytes(get_array(r)?))
}

fn get_u64<R: Read>(r: &mut R) -> Result<u64> {
    Ok(u64::from_be_bytes(get_array(r)?))
}

fn get_bool<R: Read>(r: &mut R) -> Result<bool> {
    match get_u8(r)? {
        0 => Ok(false),
        1 => Ok(true),
        other => bail!(TranscodeError::InvalidRecord { reason: format!("invalid boolean {other}") }),
    }
}

/// Reads exactly `len` bytes, growing the buffer only as data arrives so a corrupt length
/// cannot force a large allocation.
fn get_string<R: Read>(r: &mut R, len: usize) -> Result<String> {
    let mut buf = Vec::new();
    r.by_ref().take(len as u64).read_to_end(&mut buf).context("Failed to read mgrec string")?;
    if buf.len() != len {
        bail!("Truncated mgrec record: expected {len} string bytes, found {}", buf.len());
    }
    String::from_utf8(buf).map_err(|e| {
        TranscodeError::InvalidRecord { reason: format!("string is not UTF-8: {e}") }.into()
    })
}

fn get_str_u32<R: Read>(r: &mut R) -> Result<String> {
    let len = get_u32(r)? as usize;
    get_string(r, len)
}

fn get_alignment<R: Read>(r: &mut R) -> Result<Alignment> {
    let ecigar = get_str_u32(r)?;
    let rcomp = get_bool(r)?;
    let n_scores = get_u8(r)?;
    let mapping_scores = (0..n_scores).map(|_| get_u32(r)).collect::<Result<Vec<_>>>()?;
    Ok(Alignment { ecigar, rcomp, mapping_scores })
}

/// Read the first byte of a record, distinguishing a clean end of stream.
fn get_first_byte<R: Read>(r: &mut R) -> Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match r.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e).context("Failed to read mgrec record"),
        }
    }
}

/// Decode one record, or `None` at a clean end of stream.
pub fn read_record<R: Read>(r: &mut R) -> Result<Option<MpeggRecord>> {
    let Some(template_count) = get_first_byte(r)? else {
        return Ok(None);
    };
    let class_type = ClassType::from_u8(get_u8(r)?)?;
    let flags = get_u8(r)?;
    let read1_is_first = get_bool(r)?;
    let name_len = get_u16(r)? as usize;
    let read_name = get_string(r, name_len)?;

    let mut record = MpeggRecord::new(template_count, class_type, read_name, flags, read1_is_first);

    let n_segments = get_u8(r)?;
    for _ in 0..n_segments {
        let sequence = get_str_u32(r)?;
        let quality = if get_bool(r)? { Some(get_str_u32(r)?) } else { None };
        record.segments.push(Segment { sequence, quality });
    }

    let n_alignments = get_u16(r)?;
    for _ in 0..n_alignments {
        let rid = get_u32(r)?;
        let position = get_u64(r)?;
        let alignment = get_alignment(r)?;
        let split = match get_u8(r)? {
            SPLIT_NONE => None,
            SPLIT_UNPAIRED => Some(AlignmentSplit::Unpaired),
            SPLIT_SAME_REC => {
                let delta = i64::from_be_bytes(get_array(r)?);
                Some(AlignmentSplit::SameRec { delta, alignment: get_alignment(r)? })
            }
            SPLIT_OTHER_REC => {
                let next_pos = get_u64(r)?;
                Some(AlignmentSplit::OtherRec { next_pos, next_ref: get_u32(r)? })
            }
            tag => bail!(TranscodeError::InvalidRecord {
                reason: format!("unknown split alignment tag {tag}")
            }),
        };
        record.alignments.push((rid, AlignmentBox { position, alignment, split }));
    }

    record.more_alignments = match get_u8(r)? {
        0 => None,
        1 => {
            let next_pos = get_u64(r)?;
            Some(ExternalAlignment::OtherRec { next_pos, next_ref: get_u32(r)? })
        }
        tag => bail!(TranscodeError::InvalidRecord {
            reason: format!("unknown external alignment tag {tag}")
        }),
    };

    Ok(Some(record))
}

/// Sequential reader over an encoded record stream.
pub struct MgrecReader<R: Read> {
    inner: R,
    records_read: u64,
}

impl<R: Read> MgrecReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, records_read: 0 }
    }

    /// Read the next record, or `None` at end of stream.
    pub fn read_record(&mut self) -> Result<Option<MpeggRecord>> {
        let record = read_record(&mut self.inner)
            .with_context(|| format!("Failed to decode mgrec record {}", self.records_read + 1))?;
        if record.is_some() {
            self.records_read += 1;
        }
        Ok(record)
    }

    #[must_use]
    pub fn records_read(&self) -> u64 {
        self.records_read
    }
}

impl<R: Read> Iterator for MgrecReader<R> {
    type Item = Result<MpeggRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Sequential writer of encoded records.
pub struct MgrecWriter<W: Write> {
    inner: W,
    records_written: u64,
}

impl<W: Write> MgrecWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, records_written: 0 }
    }

    pub fn write(&mut self, record: &MpeggRecord) -> Result<()> {
        write_record(&mut self.inner, record)?;
        self.records_written += 1;
        Ok(())
    }

    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flush buffered output and return the number of records written.
    pub fn finish(mut self) -> Result<u64> {
        self.inner.flush().context("Failed to flush mgrec output")?;
        Ok(self.records_written)
    }
}

/// Open an mgrec file for buffered reading.
pub fn open_mgrec_reader<P: AsRef<Path>>(path: P) -> Result<MgrecReader<BufReader<File>>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open mgrec file: {}", path.display()))?;
    Ok(MgrecReader::new(BufReader::with_capacity(IO_BUFFER_SIZE, file)))
}

/// Create (or truncate) an mgrec file for buffered writing.
pub fn create_mgrec_writer<P: AsRef<Path>>(path: P) -> Result<MgrecWriter<BufWriter<File>>> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create mgrec file: {}", path.display()))?;
    Ok(MgrecWriter::new(BufWriter::with_capacity(IO_BUFFER_SIZE, file)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn paired_record() -> MpeggRecord {
        let mut rec = MpeggRecord::new(2, ClassType::I, "read1", 0x04, true);
        rec.segments.push(Segment { sequence: "ACGT".into(), quality: Some("FFFF".into()) });
        rec.segments.push(Segment { sequence: "TTGG".into(), quality: None });
        rec.alignments.push((
            3,
            AlignmentBox {
                position: 99,
                alignment: Alignment { ecigar: "4=".into(), rcomp: false, mapping_scores: vec![60] },
                split: Some(AlignmentSplit::SameRec {
                    delta: -12,
                    alignment: Alignment { ecigar: "(1)3=".into(), rcomp: true, mapping_scores: vec![] },
                }),
            },
        ));
        rec.alignments.push((
            3,
            AlignmentBox {
                position: 5000,
                alignment: Alignment { ecigar: "4=".into(), rcomp: true, mapping_scores: vec![0, 7] },
                split: Some(AlignmentSplit::OtherRec { next_pos: 17, next_ref: 9 }),
            },
        ));
        rec.more_alignments = Some(ExternalAlignment::OtherRec { next_pos: 1234, next_ref: 1 });
        rec
    }

    #[test]
    fn test_paired_record_survives_encoding() {
        let rec = paired_record();
        let mut buf = Vec::new();
        write_record(&mut buf, &rec).unwrap();
        let decoded = read_record(&mut Cursor::new(buf)).unwrap().unwrap();
        assert_eq!(decoded, rec);
    }

    #[test]
    fn test_clean_end_of_stream() {
        assert!(read_record(&mut Cursor::new(Vec::<u8>::new())).unwrap().is_none());
    }

    #[test]
    fn test_truncated_record_is_error() {
        let mut buf = Vec::new();
        write_record(&mut buf, &paired_record()).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(read_record(&mut Cursor::new(buf)).is_err());
    }

    #[test]
    fn test_oversized_string_length_is_truncation_error() {
        let mut rec = MpeggRecord::new(1, ClassType::U, "r", 0, true);
        rec.segments.push(Segment { sequence: "ACGT".into(), quality: None });
        let mut buf = Vec::new();
        write_record(&mut buf, &rec).unwrap();

        // header (4) + name length (2) + name (1) + segment count (1)
        buf[8..12].copy_from_slice(&u32::MAX.to_be_bytes());
        let err = read_record(&mut Cursor::new(buf)).unwrap_err();
        assert!(err.to_string().contains("Truncated mgrec record"));
    }

    #[test]
    fn test_unknown_class_is_error() {
        let mut buf = Vec::new();
        write_record(&mut buf, &paired_record()).unwrap();
        buf[1] = 42;
        let err = read_record(&mut Cursor::new(buf)).unwrap_err();
        assert!(err.to_string().contains("unknown class id 42"));
    }

    #[test]
    fn test_reader_and_writer_count_records() {
        let mut writer = MgrecWriter::new(Vec::new());
        let unmapped = MpeggRecord::new(1, ClassType::U, "u", 0, true);
        writer.write(&paired_record()).unwrap();
        writer.write(&unmapped).unwrap();
        assert_eq!(writer.records_written(), 2);
        let bytes = writer.inner;

        let mut reader = MgrecReader::new(Cursor::new(bytes));
        let records: Vec<MpeggRecord> = reader.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], unmapped);
        assert_eq!(reader.records_read(), 2);
    }

    #[test]
    fn test_file_helpers() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("records.mgrec");
        let mut writer = create_mgrec_writer(&path).unwrap();
        writer.write(&paired_record()).unwrap();
        assert_eq!(writer.finish().unwrap(), 1);

        let records: Vec<MpeggRecord> =
            open_mgrec_reader(&path).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records, vec![paired_record()]);
    }
}
