//! Reconstruction of SAM lines from MPEG-G records.
//!
//! One SAM line is produced per (segment, alignment) pair of a record; records without
//! alignments produce one line per segment. Lines for alignments after the first are
//! flagged secondary.

use crate::cigar::{ecigar_to_cigar, mapped_length};
use crate::errors::{Result, TranscodeError};
use crate::mgrec::{Alignment, AlignmentBox, AlignmentSplit, ClassType, MpeggRecord};
use crate::sam::{RefId, ReferenceDictionary, SamRecord, flags};

/// MAPQ written when an alignment carries no mapping score.
const MAPQ_UNAVAILABLE: u8 = 255;

/// Where one segment aligned, as needed to fill SAM columns.
#[derive(Debug, Clone)]
struct Placement {
    rid: RefId,
    /// 0-based position.
    position: u64,
    cigar: String,
    mapq: u8,
    rcomp: bool,
}

impl Placement {
    fn new(rid: RefId, position: u64, alignment: &Alignment) -> Result<Self> {
        let mapq = alignment
            .mapping_scores
            .first()
            .map_or(MAPQ_UNAVAILABLE, |&s| u8::try_from(s).unwrap_or(MAPQ_UNAVAILABLE));
        Ok(Self {
            rid,
            position,
            cigar: ecigar_to_cigar(&alignment.ecigar)?,
            mapq,
            rcomp: alignment.rcomp,
        })
    }

    fn end(&self) -> u64 {
        self.position + mapped_length(&self.cigar)
    }
}

/// Signed observed template length between two placements on one reference.
///
/// Positive for the leftmost segment, negative for the other; on equal starts the
/// segment emitted first is the positive one.
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
fn template_length(own: &Placement, mate: &Placement, own_is_first: bool) -> i32 {
    let start = own.position.min(mate.position);
    let end = own.end().max(mate.end());
    let span = (end - start) as i32;
    let own_is_left =
        own.position < mate.position || (own.position == mate.position && own_is_first);
    if own_is_left { span } else { -span }
}

fn apply_shift(position: u64, delta: i64) -> u64 {
    position.saturating_add_signed(delta)
}

fn unsupported(
    record: &MpeggRecord,
    segment: usize,
    found: Option<&AlignmentSplit>,
) -> TranscodeError {
    let kind = match found {
        None => "no split",
        Some(AlignmentSplit::Unpaired) => "an unpaired split",
        Some(AlignmentSplit::OtherRec { .. }) => "an other-record split",
        Some(AlignmentSplit::SameRec { .. }) => "a same-record split",
    };
    TranscodeError::UnsupportedSplit {
        read_name: record.read_name.clone(),
        segment,
        reason: format!("only SameRec split alignments supported, found {kind}"),
    }
}

/// Placement of segment 1 of a two-segment record within one alignment box.
fn second_segment(record: &MpeggRecord, rid: RefId, abox: &AlignmentBox) -> Result<Placement> {
    match &abox.split {
        Some(AlignmentSplit::SameRec { delta, alignment }) => {
            Placement::new(rid, apply_shift(abox.position, *delta), alignment)
        }
        other => Err(unsupported(record, 1, other.as_ref())),
    }
}

/// Convert one record into SAM lines.
///
/// # Errors
///
/// Fails with [`TranscodeError::UnsupportedSplit`] when the second segment of a
/// two-segment record is not described by a `SameRec` split and with
/// [`TranscodeError::InvalidCigarToken`] for an ECIGAR that cannot be converted.
pub fn record_to_sam(record: &MpeggRecord, refs: &ReferenceDictionary) -> Result<Vec<SamRecord>> {
    let paired = record.template_count > 1;
    let two_segments = record.segments.len() > 1;
    let n_alignments = record.alignments.len().max(1);
    let mut lines = Vec::with_capacity(record.segments.len() * n_alignments);

    for (s, segment) in record.segments.iter().enumerate() {
        let is_read1 = !paired || (record.read1_is_first == (s == 0));

        for a in 0..n_alignments {
            let entry = record.alignments.get(a);

            // Placement of this segment and of its mate, and whether the mate is unmapped
            let (own, mate, mate_unmapped) = match (record.class_type, entry) {
                (ClassType::U, _) | (_, None) => (None, None, paired),
                (ClassType::Hm, Some((rid, abox))) => {
                    let mapped = Placement::new(*rid, abox.position, &abox.alignment)?;
                    if s == 0 { (Some(mapped), None, true) } else { (None, Some(mapped), false) }
                }
                (_, Some((rid, abox))) => {
                    let first = Placement::new(*rid, abox.position, &abox.alignment)?;
                    if two_segments {
                        let second = second_segment(record, *rid, abox)?;
                        if s == 0 {
                            (Some(first), Some(second), false)
                        } else {
                            (Some(second), Some(first), false)
                        }
                    } else {
                        match &abox.split {
                            Some(AlignmentSplit::OtherRec { next_pos, next_ref }) => {
                                let mate = Placement {
                                    rid: *next_ref,
                                    position: *next_pos,
                                    cigar: "*".to_string(),
                                    mapq: 0,
                                    rcomp: false,
                                };
                                (Some(first), Some(mate), false)
                            }
                            Some(AlignmentSplit::Unpaired) => (Some(first), None, paired),
                            Some(AlignmentSplit::SameRec { .. }) | None => (Some(first), None, false),
                        }
                    }
                }
            };

            let mut flag = 0u16;
            if paired {
                flag |= flags::PAIRED;
                flag |= if is_read1 { flags::FIRST_SEGMENT } else { flags::LAST_SEGMENT };
                if mate_unmapped {
                    flag |= flags::MATE_UNMAPPED;
                }
            }
            if record.is_proper_pair() {
                flag |= flags::PROPER_PAIR;
            }
            if own.is_none() {
                flag |= flags::UNMAPPED;
            }
            if a > 0 {
                flag |= flags::SECONDARY;
            }
            if record.is_quality_fail() {
                flag |= flags::QC_FAIL;
            }
            if record.is_duplicate() {
                flag |= flags::DUPLICATE;
            }

            let mut line = SamRecord {
                qname: record.read_name.clone(),
                seq: if segment.sequence.is_empty() {
                    "*".to_string()
                } else {
                    segment.sequence.clone()
                },
                qual: segment.quality.clone().unwrap_or_else(|| "*".to_string()),
                ..SamRecord::default()
            };

            // An unmapped segment with a mapped mate is placed at the mate's position
            if let Some(anchor) = own.as_ref().or(mate.as_ref()) {
                line.rid = Some(anchor.rid);
                line.rname = refs.name_or_id(anchor.rid);
                line.pos = u32::try_from(anchor.position + 1).unwrap_or(u32::MAX);
            }
            if let Some(own) = &own {
                line.mapq = own.mapq;
                line.cigar.clone_from(&own.cigar);
                if own.rcomp {
                    flag |= flags::REVERSE;
                }
            }

            if paired {
                if let Some(mate) = &mate {
                    line.mate_rid = Some(mate.rid);
                    line.rnext = refs.name_or_id(mate.rid);
                    line.pnext = u32::try_from(mate.position + 1).unwrap_or(u32::MAX);
                    if mate.rcomp {
                        flag |= flags::MATE_REVERSE;
                    }
                    let forces_zero = matches!(record.class_type, ClassType::Hm | ClassType::U);
                    if let (Some(own), false, true) = (&own, forces_zero, two_segments) {
                        line.tlen = template_length(own, mate, s == 0);
                    }
                } else if mate_unmapped {
                    if let Some(own) = &own {
                        // Mate is unmapped and placed with this segment
                        line.mate_rid = Some(own.rid);
                        line.rnext = refs.name_or_id(own.rid);
                        line.pnext = line.pos;
                    }
                }
            }
            if line.rnext != "*" && line.rnext == line.rname {
                line.rnext = "=".to_string();
            }

            line.flag = flag;
            lines.push(line);
        }
    }
    Ok(lines)
}
