//! Simplification of records for encoders that only accept simple records.
//!
//! Cleaning applies, in order:
//! 1. drop every alignment after the first
//! 2. unalign half-mapped (`CLASS_HM`) records
//! 3. unalign records whose alignment contains a splice (`*`, `/` or `%` in the ECIGAR)
//! 4. split two-segment records whose segments are further apart than a signed 16-bit
//!    delta can express into two records linked by `OtherRec` splits
//!
//! Every change is counted in [`CleanStatistics`].

use log::warn;

use crate::mgrec::{AlignmentBox, AlignmentSplit, ClassType, MpeggRecord};

/// Largest distance between the two segments of one record.
pub const MAX_SAME_REC_DELTA: i64 = i16::MAX as i64;

/// Counts of the changes made by [`clean_record`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanStatistics {
    pub records_examined: u64,
    pub additional_alignments_removed: u64,
    pub half_mapped_unaligned: u64,
    pub spliced_unaligned: u64,
    pub distant_pairs_split: u64,
}

impl CleanStatistics {
    /// Whether any record was changed.
    #[must_use]
    pub fn any_changes(&self) -> bool {
        self.additional_alignments_removed > 0
            || self.half_mapped_unaligned > 0
            || self.spliced_unaligned > 0
            || self.distant_pairs_split > 0
    }

    /// Add the counts of `other` to these.
    pub fn merge(&mut self, other: &Self) {
        self.records_examined += other.records_examined;
        self.additional_alignments_removed += other.additional_alignments_removed;
        self.half_mapped_unaligned += other.half_mapped_unaligned;
        self.spliced_unaligned += other.spliced_unaligned;
        self.distant_pairs_split += other.distant_pairs_split;
    }

    /// Log a warning for each kind of change that was made.
    pub fn log_warnings(&self) {
        if self.additional_alignments_removed > 0 {
            warn!(
                "Removed {} additional alignments from records",
                self.additional_alignments_removed
            );
        }
        if self.half_mapped_unaligned > 0 {
            warn!("Unaligned {} half-mapped records", self.half_mapped_unaligned);
        }
        if self.spliced_unaligned > 0 {
            warn!("Unaligned {} records with spliced alignments", self.spliced_unaligned);
        }
        if self.distant_pairs_split > 0 {
            warn!(
                "Split {} pairs with segments more than {} bases apart",
                self.distant_pairs_split, MAX_SAME_REC_DELTA
            );
        }
    }
}

fn is_spliced(ecigar: &str) -> bool {
    ecigar.bytes().any(|b| matches!(b, b'*' | b'/' | b'%'))
}

fn has_splice(abox: &AlignmentBox) -> bool {
    is_spliced(&abox.alignment.ecigar)
        || matches!(&abox.split, Some(AlignmentSplit::SameRec { alignment, .. }) if is_spliced(&alignment.ecigar))
}

fn unalign(record: &mut MpeggRecord) {
    record.class_type = ClassType::U;
    record.alignments.clear();
    record.more_alignments = None;
}

/// Clean one record, returning one record or, for split pairs, two.
pub fn clean_record(mut record: MpeggRecord, stats: &mut CleanStatistics) -> Vec<MpeggRecord> {
    stats.records_examined += 1;

    if record.alignments.len() > 1 {
        stats.additional_alignments_removed += (record.alignments.len() - 1) as u64;
        record.alignments.truncate(1);
        record.more_alignments = None;
    }

    if record.class_type == ClassType::Hm {
        stats.half_mapped_unaligned += 1;
        unalign(&mut record);
        return vec![record];
    }

    let Some((rid, abox)) = record.alignments.first() else {
        return vec![record];
    };
    if has_splice(abox) {
        stats.spliced_unaligned += 1;
        unalign(&mut record);
        return vec![record];
    }

    let rid = *rid;
    let distant = matches!(
        &abox.split,
        Some(AlignmentSplit::SameRec { delta, .. }) if delta.abs() > MAX_SAME_REC_DELTA
    );
    if !distant || record.segments.len() != 2 {
        return vec![record];
    }

    stats.distant_pairs_split += 1;
    let (_, abox) = record.alignments.remove(0);
    let Some(AlignmentSplit::SameRec { delta, alignment: mate_alignment }) = abox.split else {
        return vec![record];
    };
    let mate_position = abox.position.saturating_add_signed(delta);
    let second_segment = record.segments.pop().unwrap_or_default();

    let mut first = MpeggRecord::new(
        record.template_count,
        record.class_type,
        record.read_name.clone(),
        record.flags,
        record.read1_is_first,
    );
    first.segments = record.segments;
    first.alignments.push((
        rid,
        AlignmentBox {
            position: abox.position,
            alignment: abox.alignment,
            split: Some(AlignmentSplit::OtherRec { next_pos: mate_position, next_ref: rid }),
        },
    ));

    let mut second = MpeggRecord::new(
        record.template_count,
        record.class_type,
        record.read_name,
        record.flags,
        !record.read1_is_first,
    );
    second.segments.push(second_segment);
    second.alignments.push((
        rid,
        AlignmentBox {
            position: mate_position,
            alignment: mate_alignment,
            split: Some(AlignmentSplit::OtherRec { next_pos: abox.position, next_ref: rid }),
        },
    ));

    vec![first, second]
}
