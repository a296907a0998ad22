//! MPEG-G genomic record model.
//!
//! An [`MpeggRecord`] describes one sequenced template (or one read of it): its
//! segments (sequence and quality), the alignments of its first segment and, through
//! [`AlignmentSplit`], where the other segment aligned. Positions are 0-based.
//!
//! # Class types
//!
//! | Class | Meaning |
//! |-------|---------|
//! | `P`, `N`, `M`, `I` | aligned record (increasing edit complexity) |
//! | `HM` | half mapped pair: first segment aligned, second unmapped |
//! | `U`  | unaligned record |
//!
//! # Alignment splits
//!
//! For paired records each [`AlignmentBox`] may say where the mate aligned:
//! - [`AlignmentSplit::SameRec`] - the mate is a segment of this record on the same
//!   reference, `delta` bases from the box position (negative when the mate is to the left)
//! - [`AlignmentSplit::OtherRec`] - the mate is stored in another record, possibly on
//!   another reference
//! - [`AlignmentSplit::Unpaired`] - this alignment has no mate alignment

pub mod codec;

use std::fmt;

use crate::errors::{Result, TranscodeError};
use crate::sam::header::RefId;

pub use codec::{MgrecReader, MgrecWriter, create_mgrec_writer, open_mgrec_reader};

/// Record flag: PCR or optical duplicate.
pub const FLAG_DUPLICATE: u8 = 0x01;
/// Record flag: failed quality checks.
pub const FLAG_QC_FAIL: u8 = 0x02;
/// Record flag: segments form a proper pair.
pub const FLAG_PROPER_PAIR: u8 = 0x04;

/// MPEG-G record class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ClassType {
    None = 0,
    P = 1,
    N = 2,
    M = 3,
    I = 4,
    Hm = 5,
    U = 6,
}

impl ClassType {
    /// Decode a class id.
    ///
    /// # Errors
    ///
    /// Returns [`TranscodeError::InvalidRecord`] for ids above 6.
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::None,
            1 => Self::P,
            2 => Self::N,
            3 => Self::M,
            4 => Self::I,
            5 => Self::Hm,
            6 => Self::U,
            _ => {
                return Err(TranscodeError::InvalidRecord {
                    reason: format!("unknown class id {value}"),
                });
            }
        })
    }

    /// Whether records of this class carry at least one alignment.
    #[must_use]
    pub fn is_aligned(self) -> bool {
        matches!(self, Self::P | Self::N | Self::M | Self::I | Self::Hm)
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "CLASS_NONE",
            Self::P => "CLASS_P",
            Self::N => "CLASS_N",
            Self::M => "CLASS_M",
            Self::I => "CLASS_I",
            Self::Hm => "CLASS_HM",
            Self::U => "CLASS_U",
        };
        f.write_str(name)
    }
}

/// Sequence and quality of one read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    /// Bases; empty when the read carried no sequence.
    pub sequence: String,
    pub quality: Option<String>,
}

/// How one segment aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    pub ecigar: String,
    pub rcomp: bool,
    pub mapping_scores: Vec<u32>,
}

/// Where the mate of an alignment aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignmentSplit {
    Unpaired,
    SameRec { delta: i64, alignment: Alignment },
    OtherRec { next_pos: u64, next_ref: RefId },
}

/// One alignment of a record: position and alignment of the first segment plus the
/// optional location of the second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentBox {
    pub position: u64,
    pub alignment: Alignment,
    pub split: Option<AlignmentSplit>,
}

impl AlignmentBox {
    /// Leftmost position covered by either segment of this box.
    #[must_use]
    pub fn min_pos(&self) -> u64 {
        match &self.split {
            Some(AlignmentSplit::SameRec { delta, .. }) if *delta < 0 => {
                self.position.saturating_sub(delta.unsigned_abs())
            }
            _ => self.position,
        }
    }
}

/// Link from a record to the next record of the same read on another reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalAlignment {
    OtherRec { next_pos: u64, next_ref: RefId },
}

/// One MPEG-G genomic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpeggRecord {
    /// Number of segments in the sequenced template (1 or 2).
    pub template_count: u8,
    pub class_type: ClassType,
    pub read_name: String,
    /// Combination of `FLAG_*` bits.
    pub flags: u8,
    pub segments: Vec<Segment>,
    /// Alignments of the record, each on its own reference.
    pub alignments: Vec<(RefId, AlignmentBox)>,
    /// Whether segment 0 is read 1 of the template.
    pub read1_is_first: bool,
    pub more_alignments: Option<ExternalAlignment>,
}

impl MpeggRecord {
    #[must_use]
    pub fn new(
        template_count: u8,
        class_type: ClassType,
        read_name: impl Into<String>,
        flags: u8,
        read1_is_first: bool,
    ) -> Self {
        Self {
            template_count,
            class_type,
            read_name: read_name.into(),
            flags,
            segments: Vec::new(),
            alignments: Vec::new(),
            read1_is_first,
            more_alignments: None,
        }
    }

    /// Reference of the first alignment, which determines the record's sort bucket.
    #[must_use]
    pub fn reference(&self) -> Option<RefId> {
        self.alignments.first().map(|(rid, _)| *rid)
    }

    /// Leftmost mapped coordinate of the first alignment, the merge sort key.
    ///
    /// When the second segment of the first box lies left of the first one, the
    /// position is lowered by the `SameRec` delta.
    #[must_use]
    pub fn min_pos(&self) -> Option<u64> {
        self.alignments.first().map(|(_, b)| b.min_pos())
    }

    /// Whether the record has no alignment and sorts after all mapped records.
    #[must_use]
    pub fn is_unaligned(&self) -> bool {
        self.alignments.is_empty()
    }

    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.flags & FLAG_DUPLICATE != 0
    }

    #[must_use]
    pub fn is_quality_fail(&self) -> bool {
        self.flags & FLAG_QC_FAIL != 0
    }

    #[must_use]
    pub fn is_proper_pair(&self) -> bool {
        self.flags & FLAG_PROPER_PAIR != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligned_box(position: u64, split: Option<AlignmentSplit>) -> AlignmentBox {
        AlignmentBox {
            position,
            alignment: Alignment { ecigar: "10=".into(), rcomp: false, mapping_scores: vec![60] },
            split,
        }
    }

    #[test]
    fn test_class_type_round_trip() {
        for id in 0..=6u8 {
            assert_eq!(ClassType::from_u8(id).unwrap() as u8, id);
        }
        assert!(ClassType::from_u8(7).is_err());
    }

    #[test]
    fn test_class_type_display() {
        assert_eq!(ClassType::Hm.to_string(), "CLASS_HM");
        assert_eq!(ClassType::U.to_string(), "CLASS_U");
    }

    #[test]
    fn test_is_aligned() {
        assert!(ClassType::I.is_aligned());
        assert!(ClassType::Hm.is_aligned());
        assert!(!ClassType::U.is_aligned());
        assert!(!ClassType::None.is_aligned());
    }

    #[test]
    fn test_min_pos_without_alignment() {
        let rec = MpeggRecord::new(1, ClassType::U, "r", 0, true);
        assert_eq!(rec.min_pos(), None);
        assert!(rec.is_unaligned());
    }

    #[test]
    fn test_min_pos_positive_delta_uses_box_position() {
        let mut rec = MpeggRecord::new(2, ClassType::I, "r", 0, true);
        let split = AlignmentSplit::SameRec { delta: 50, alignment: Alignment::default() };
        rec.alignments.push((0, aligned_box(99, Some(split))));
        assert_eq!(rec.min_pos(), Some(99));
    }

    #[test]
    fn test_min_pos_negative_delta_lowers_position() {
        let mut rec = MpeggRecord::new(2, ClassType::I, "r", 0, true);
        let split = AlignmentSplit::SameRec { delta: -30, alignment: Alignment::default() };
        rec.alignments.push((3, aligned_box(99, Some(split))));
        assert_eq!(rec.min_pos(), Some(69));
        assert_eq!(rec.reference(), Some(3));
    }

    #[test]
    fn test_flag_accessors() {
        let rec = MpeggRecord::new(2, ClassType::I, "r", FLAG_DUPLICATE | FLAG_PROPER_PAIR, true);
        assert!(rec.is_duplicate());
        assert!(rec.is_proper_pair());
        assert!(!rec.is_quality_fail());
    }
}
