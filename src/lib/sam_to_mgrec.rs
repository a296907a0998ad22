//! Conversion of QNAME groups of SAM records into MPEG-G records.
//!
//! The conversion path depends on the [`RecordCategory`] of the group:
//!
//! - **Unmapped**: one `CLASS_U` record with one segment and no alignment.
//! - **Single**: one record for the read; the primary line gives the first alignment and
//!   every secondary or supplementary line adds another.
//! - **Paired**: the primary lines decide the shape of the output. Two unmapped reads give
//!   a `CLASS_U` record, one unmapped read a `CLASS_HM` record, two reads on one reference a
//!   two-segment record with a `SameRec` split and reads on different references one
//!   record per read with `OtherRec` splits. Non-primary lines are then paired up with
//!   [`SamRecord::is_pair_of`] and added as further alignments.

use log::warn;
use std::collections::BTreeMap;

use crate::cigar::cigar_to_ecigar;
use crate::errors::{Result, TranscodeError};
use crate::grouper::{ReadGroup, ReadIndex, RecordCategory};
use crate::mgrec::{
    Alignment, AlignmentBox, AlignmentSplit, ClassType, ExternalAlignment, FLAG_DUPLICATE,
    FLAG_PROPER_PAIR, FLAG_QC_FAIL, MpeggRecord, Segment,
};
use crate::sam::{RefId, SamRecord, flags};

/// Options controlling how groups are converted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionOptions {
    /// Store the reads of a pair in separate records even when they share a reference.
    pub force_split: bool,
}

/// Split SAM flags into the reverse-complement bit and the MPEG-G record flags.
///
/// ```
/// use mgtranscode_lib::sam_to_mgrec::convert_flags;
///
/// // duplicate, proper pair, reverse
/// assert_eq!(convert_flags(0x400 | 0x2 | 0x10 | 0x1), (true, 0x05));
/// ```
#[must_use]
pub fn convert_flags(flag: u16) -> (bool, u8) {
    let mut mpeg_flags = 0;
    if flag & flags::DUPLICATE != 0 {
        mpeg_flags |= FLAG_DUPLICATE;
    }
    if flag & flags::QC_FAIL != 0 {
        mpeg_flags |= FLAG_QC_FAIL;
    }
    if flag & flags::PROPER_PAIR != 0 {
        mpeg_flags |= FLAG_PROPER_PAIR;
    }
    (flag & flags::REVERSE != 0, mpeg_flags)
}

/// Convert all lines of one template into MPEG-G records.
///
/// # Errors
///
/// Fails for groups classified [`RecordCategory::Invalid`], for CIGARs that cannot be
/// transcoded and for mapped lines without a reference.
pub fn convert_group(
    mut group: ReadGroup,
    options: &ConversionOptions,
) -> Result<Vec<MpeggRecord>> {
    match group.classify() {
        RecordCategory::Unmapped => {
            let record = group.take(ReadIndex::Unmapped).into_iter().next();
            let record = record.ok_or_else(|| invalid_group(&group, "empty group"))?;
            Ok(vec![convert_unmapped(record)])
        }
        RecordCategory::Single => {
            let records = group.take(ReadIndex::Single);
            Ok(vec![convert_single_end(group.qname(), records)?])
        }
        RecordCategory::Paired => PairedEndResolver::new(group.qname(), options).resolve(group),
        RecordCategory::Invalid => {
            if group.bucket(ReadIndex::Unknown).is_empty() {
                let reason = format!(
                    "cannot classify {} unmapped, {} single, {}/{} primary and {}/{} \
                     non-primary read 1/read 2 lines",
                    group.bucket(ReadIndex::Unmapped).len(),
                    group.bucket(ReadIndex::Single).len(),
                    group.bucket(ReadIndex::PairRead1Primary).len(),
                    group.bucket(ReadIndex::PairRead2Primary).len(),
                    group.bucket(ReadIndex::PairRead1NonPrimary).len(),
                    group.bucket(ReadIndex::PairRead2NonPrimary).len(),
                );
                Err(invalid_group(&group, &reason))
            } else {
                Err(TranscodeError::NeitherRead1NorRead2 { qname: group.qname().to_string() })
            }
        }
    }
}

fn invalid_group(group: &ReadGroup, reason: &str) -> TranscodeError {
    TranscodeError::InvalidGroup { qname: group.qname().to_string(), reason: reason.to_string() }
}

/// Move the sequence and quality out of a record.
fn take_segment(record: &mut SamRecord) -> Segment {
    let sequence = std::mem::take(&mut record.seq);
    let quality = std::mem::take(&mut record.qual);
    Segment {
        sequence: if sequence == "*" { String::new() } else { sequence },
        quality: if quality == "*" || quality.is_empty() { None } else { Some(quality) },
    }
}

/// Sequence and quality of a non-primary line, taken from `primary` when the line
/// carries no sequence of its own.
fn segment_or(record: &SamRecord, primary: &Segment) -> Segment {
    if record.seq == "*" || record.seq.is_empty() {
        return primary.clone();
    }
    Segment {
        sequence: record.seq.clone(),
        quality: if record.qual == "*" || record.qual.is_empty() {
            None
        } else {
            Some(record.qual.clone())
        },
    }
}

fn alignment_of(record: &SamRecord) -> Result<Alignment> {
    let (rcomp, _) = convert_flags(record.flag);
    Ok(Alignment {
        ecigar: cigar_to_ecigar(&record.cigar)?,
        rcomp,
        mapping_scores: vec![u32::from(record.mapq)],
    })
}

fn reference_of(record: &SamRecord) -> Result<RefId> {
    record.rid.ok_or_else(|| TranscodeError::InvalidGroup {
        qname: record.qname.clone(),
        reason: format!("mapped line with FLAG {} has no reference name", record.flag),
    })
}

/// 0-based position of a 1-based SAM `POS`.
fn position_of(record: &SamRecord) -> u64 {
    u64::from(record.pos.saturating_sub(1))
}

fn alignment_box(record: &SamRecord, split: Option<AlignmentSplit>) -> Result<AlignmentBox> {
    Ok(AlignmentBox { position: position_of(record), alignment: alignment_of(record)?, split })
}

fn same_rec_box(first: &SamRecord, second: &SamRecord) -> Result<AlignmentBox> {
    let delta = i64::from(second.pos) - i64::from(first.pos);
    let split = AlignmentSplit::SameRec { delta, alignment: alignment_of(second)? };
    alignment_box(first, Some(split))
}

fn other_rec_box(record: &SamRecord, mate: &SamRecord) -> Result<AlignmentBox> {
    let split = AlignmentSplit::OtherRec { next_pos: position_of(mate), next_ref: reference_of(mate)? };
    alignment_box(record, Some(split))
}

fn convert_unmapped(mut record: SamRecord) -> MpeggRecord {
    let (_, mpeg_flags) = convert_flags(record.flag);
    let mut out = MpeggRecord::new(1, ClassType::U, record.qname.as_str(), mpeg_flags, true);
    out.segments.push(take_segment(&mut record));
    out
}

fn convert_single_end(qname: &str, mut records: Vec<SamRecord>) -> Result<MpeggRecord> {
    let primary_idx = records.iter().position(SamRecord::is_primary).unwrap_or(0);
    if primary_idx >= records.len() {
        return Err(TranscodeError::InvalidGroup {
            qname: qname.to_string(),
            reason: "no single-end lines".to_string(),
        });
    }
    let mut primary = records.remove(primary_idx);

    let (_, mpeg_flags) = convert_flags(primary.flag);
    let mut out = MpeggRecord::new(1, ClassType::I, qname, mpeg_flags, true);
    out.alignments.push((reference_of(&primary)?, alignment_box(&primary, None)?));
    out.segments.push(take_segment(&mut primary));

    for record in &records {
        let split = record.is_mate_unmapped().then_some(AlignmentSplit::Unpaired);
        out.alignments.push((reference_of(record)?, alignment_box(record, split)?));
    }
    Ok(out)
}

/// A single-segment record for one read of a pair.
fn read_record(qname: &str, mpeg_flags: u8, segment: Segment, read1: bool) -> MpeggRecord {
    let mut record = MpeggRecord::new(2, ClassType::I, qname, mpeg_flags, read1);
    record.segments.push(segment);
    record
}

/// A two-segment record with read 1 as the first segment.
fn pair_record(qname: &str, mpeg_flags: u8, segment1: Segment, segment2: Segment) -> MpeggRecord {
    let mut record = MpeggRecord::new(2, ClassType::I, qname, mpeg_flags, true);
    record.segments.push(segment1);
    record.segments.push(segment2);
    record
}

/// Point each record at the first alignment of the next one.
fn link_records(records: &mut [MpeggRecord]) {
    for i in 1..records.len() {
        let next = records[i].alignments.first().map(|(next_ref, abox)| {
            ExternalAlignment::OtherRec { next_pos: abox.position, next_ref: *next_ref }
        });
        records[i - 1].more_alignments = next;
    }
}

/// Builds the records of a paired template, keyed by the reference they align to.
struct PairedEndResolver<'a> {
    qname: String,
    options: &'a ConversionOptions,
    mpeg_flags: u8,
    segment1: Segment,
    segment2: Segment,
    standalone: Vec<MpeggRecord>,
    pairs_by_rid: BTreeMap<RefId, MpeggRecord>,
    recs1_by_rid: BTreeMap<RefId, MpeggRecord>,
    recs2_by_rid: BTreeMap<RefId, MpeggRecord>,
}

impl<'a> PairedEndResolver<'a> {
    fn new(qname: &str, options: &'a ConversionOptions) -> Self {
        Self {
            qname: qname.to_string(),
            options,
            mpeg_flags: 0,
            segment1: Segment::default(),
            segment2: Segment::default(),
            standalone: Vec::new(),
            pairs_by_rid: BTreeMap::new(),
            recs1_by_rid: BTreeMap::new(),
            recs2_by_rid: BTreeMap::new(),
        }
    }

    fn resolve(mut self, mut group: ReadGroup) -> Result<Vec<MpeggRecord>> {
        let mut r1_non_primary = group.take(ReadIndex::PairRead1NonPrimary);
        let mut r2_non_primary = group.take(ReadIndex::PairRead2NonPrimary);

        // Extra primary lines are treated like any other additional alignment
        let mut r1_primaries = group.take(ReadIndex::PairRead1Primary).into_iter();
        let mut r2_primaries = group.take(ReadIndex::PairRead2Primary).into_iter();
        let (Some(r1), Some(r2)) = (r1_primaries.next(), r2_primaries.next()) else {
            return Err(invalid_group(&group, "missing primary line"));
        };
        r1_non_primary.extend(r1_primaries);
        r2_non_primary.extend(r2_primaries);

        self.add_primaries(r1, r2)?;

        for record in r1_non_primary {
            if record.is_unmapped() {
                warn!("Dropping unmapped non-primary line of read 1 of '{}'", self.qname);
                continue;
            }
            match r2_non_primary.iter().position(|mate| record.is_pair_of(mate)) {
                Some(idx) => {
                    let mate = r2_non_primary.remove(idx);
                    self.add_pair(&record, &mate)?;
                }
                None => self.add_unpaired(&record, true)?,
            }
        }
        for record in r2_non_primary {
            if record.is_unmapped() {
                warn!("Dropping unmapped non-primary line of read 2 of '{}'", self.qname);
                continue;
            }
            self.add_unpaired(&record, false)?;
        }

        let mut out = self.standalone;
        for map in [self.pairs_by_rid, self.recs1_by_rid, self.recs2_by_rid] {
            let mut records: Vec<MpeggRecord> = map.into_values().collect();
            link_records(&mut records);
            out.extend(records);
        }
        Ok(out)
    }

    fn add_primaries(&mut self, mut r1: SamRecord, mut r2: SamRecord) -> Result<()> {
        let (_, mpeg_flags) = convert_flags(r1.flag);
        self.mpeg_flags = mpeg_flags;

        match (r1.is_unmapped(), r2.is_unmapped()) {
            (true, true) => {
                let mut out = MpeggRecord::new(2, ClassType::U, self.qname.as_str(), mpeg_flags, true);
                out.segments.push(take_segment(&mut r1));
                out.segments.push(take_segment(&mut r2));
                self.segment1 = out.segments[0].clone();
                self.segment2 = out.segments[1].clone();
                self.standalone.push(out);
            }
            (false, true) | (true, false) => {
                let read1_mapped = !r1.is_unmapped();
                let (mut mapped, mut unmapped) = if read1_mapped { (r1, r2) } else { (r2, r1) };
                let (_, mpeg_flags) = convert_flags(mapped.flag);
                let mut out =
                    MpeggRecord::new(2, ClassType::Hm, self.qname.as_str(), mpeg_flags, read1_mapped);
                out.alignments.push((reference_of(&mapped)?, alignment_box(&mapped, None)?));
                let mapped_segment = take_segment(&mut mapped);
                let unmapped_segment = take_segment(&mut unmapped);
                if read1_mapped {
                    self.segment1 = mapped_segment.clone();
                    self.segment2 = unmapped_segment.clone();
                } else {
                    self.segment1 = unmapped_segment.clone();
                    self.segment2 = mapped_segment.clone();
                }
                out.segments.push(mapped_segment);
                out.segments.push(unmapped_segment);
                self.standalone.push(out);
            }
            (false, false) => {
                let rid1 = reference_of(&r1)?;
                let rid2 = reference_of(&r2)?;
                if rid1 == rid2 && !self.options.force_split {
                    let read1_is_first = r1.pos <= r2.pos;
                    let abox = if read1_is_first {
                        same_rec_box(&r1, &r2)?
                    } else {
                        same_rec_box(&r2, &r1)?
                    };
                    self.segment1 = take_segment(&mut r1);
                    self.segment2 = take_segment(&mut r2);
                    let mut out =
                        MpeggRecord::new(2, ClassType::I, self.qname.as_str(), mpeg_flags, read1_is_first);
                    if read1_is_first {
                        out.segments.push(self.segment1.clone());
                        out.segments.push(self.segment2.clone());
                    } else {
                        out.segments.push(self.segment2.clone());
                        out.segments.push(self.segment1.clone());
                    }
                    out.alignments.push((rid1, abox));
                    self.pairs_by_rid.insert(rid1, out);
                } else {
                    let box1 = other_rec_box(&r1, &r2)?;
                    let box2 = other_rec_box(&r2, &r1)?;
                    let (_, flags2) = convert_flags(r2.flag);
                    self.segment1 = take_segment(&mut r1);
                    self.segment2 = take_segment(&mut r2);

                    let mut out1 = read_record(&self.qname, mpeg_flags, self.segment1.clone(), true);
                    out1.alignments.push((rid1, box1));
                    self.recs1_by_rid.insert(rid1, out1);

                    let mut out2 = read_record(&self.qname, flags2, self.segment2.clone(), false);
                    out2.alignments.push((rid2, box2));
                    self.recs2_by_rid.insert(rid2, out2);
                }
            }
        }
        Ok(())
    }

    /// Add a matched pair of non-primary lines.
    fn add_pair(&mut self, read1: &SamRecord, read2: &SamRecord) -> Result<()> {
        if read2.is_unmapped() {
            return self.add_unpaired(read1, true);
        }
        let rid1 = reference_of(read1)?;
        let rid2 = reference_of(read2)?;

        if rid1 == rid2 && !self.options.force_split {
            let record = self.pairs_by_rid.entry(rid1).or_insert_with(|| {
                pair_record(
                    &self.qname,
                    self.mpeg_flags,
                    segment_or(read1, &self.segment1),
                    segment_or(read2, &self.segment2),
                )
            });
            let abox = if record.read1_is_first {
                same_rec_box(read1, read2)?
            } else {
                same_rec_box(read2, read1)?
            };
            record.alignments.push((rid1, abox));
        } else {
            let box1 = other_rec_box(read1, read2)?;
            let box2 = other_rec_box(read2, read1)?;
            self.recs1_by_rid
                .entry(rid1)
                .or_insert_with(|| {
                    read_record(&self.qname, self.mpeg_flags, segment_or(read1, &self.segment1), true)
                })
                .alignments
                .push((rid1, box1));
            self.recs2_by_rid
                .entry(rid2)
                .or_insert_with(|| {
                    read_record(&self.qname, self.mpeg_flags, segment_or(read2, &self.segment2), false)
                })
                .alignments
                .push((rid2, box2));
        }
        Ok(())
    }

    /// Add a non-primary line whose mate alignment is unknown.
    fn add_unpaired(&mut self, record: &SamRecord, is_read1: bool) -> Result<()> {
        let rid = reference_of(record)?;
        let abox = alignment_box(record, Some(AlignmentSplit::Unpaired))?;
        let (map, segment) = if is_read1 {
            (&mut self.recs1_by_rid, &self.segment1)
        } else {
            (&mut self.recs2_by_rid, &self.segment2)
        };
        map.entry(rid)
            .or_insert_with(|| {
                read_record(&self.qname, self.mpeg_flags, segment_or(record, segment), is_read1)
            })
            .alignments
            .push((rid, abox));
        Ok(())
    }
}

impl ReadGroup {
    /// Convert this group into MPEG-G records, see [`convert_group`].
    pub fn convert(self, options: &ConversionOptions) -> Result<Vec<MpeggRecord>> {
        convert_group(self, options)
    }
}
