//! SAM FLAG bit definitions.

/// Template has multiple segments in sequencing.
pub const PAIRED: u16 = 0x1;
/// Each segment is properly aligned according to the aligner.
pub const PROPER_PAIR: u16 = 0x2;
/// Segment unmapped.
pub const UNMAPPED: u16 = 0x4;
/// Next segment in the template unmapped.
pub const MATE_UNMAPPED: u16 = 0x8;
/// SEQ is reverse complemented.
pub const REVERSE: u16 = 0x10;
/// SEQ of the next segment is reverse complemented.
pub const MATE_REVERSE: u16 = 0x20;
/// The first segment in the template.
pub const FIRST_SEGMENT: u16 = 0x40;
/// The last segment in the template.
pub const LAST_SEGMENT: u16 = 0x80;
/// Secondary alignment.
pub const SECONDARY: u16 = 0x100;
/// Not passing quality controls.
pub const QC_FAIL: u16 = 0x200;
/// PCR or optical duplicate.
pub const DUPLICATE: u16 = 0x400;
/// Supplementary alignment.
pub const SUPPLEMENTARY: u16 = 0x800;

/// Bits that mark a record as a non-primary line.
pub const NON_PRIMARY: u16 = SECONDARY | SUPPLEMENTARY;
