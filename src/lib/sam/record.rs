//! A single SAM alignment line.

use std::fmt;
use std::str::FromStr;

use crate::errors::{Result, TranscodeError};
use crate::sam::flags;
use crate::sam::header::{RefId, ReferenceDictionary};

/// Number of mandatory tab-separated SAM columns.
pub const MANDATORY_FIELDS: usize = 11;

/// One SAM record with its eleven mandatory fields.
///
/// Optional tag columns are not retained. Alongside the textual `RNAME`/`RNEXT` the record
/// carries the reference ids they resolve to, so that pairing and bucketing never compare
/// names: `rid` is `None` for `RNAME == "*"`, and `mate_rid` follows `RNEXT` with `"="`
/// resolving to `rid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamRecord {
    pub qname: String,
    pub flag: u16,
    pub rname: String,
    pub rid: Option<RefId>,
    /// 1-based leftmost mapping position, 0 when unavailable.
    pub pos: u32,
    pub mapq: u8,
    pub cigar: String,
    pub rnext: String,
    pub mate_rid: Option<RefId>,
    /// 1-based mate position, 0 when unavailable.
    pub pnext: u32,
    pub tlen: i32,
    pub seq: String,
    pub qual: String,
}

impl Default for SamRecord {
    fn default() -> Self {
        Self {
            qname: "*".to_string(),
            flag: 0,
            rname: "*".to_string(),
            rid: None,
            pos: 0,
            mapq: 0,
            cigar: "*".to_string(),
            rnext: "*".to_string(),
            mate_rid: None,
            pnext: 0,
            tlen: 0,
            seq: "*".to_string(),
            qual: "*".to_string(),
        }
    }
}

fn parse_field<T: FromStr>(value: &str, name: &str, line_number: u64) -> Result<T> {
    value.parse().map_err(|_| TranscodeError::MalformedSamLine {
        line_number,
        reason: format!("invalid {name} '{value}'"),
    })
}

impl SamRecord {
    /// Parse a tab-separated SAM line, resolving reference names through `refs`.
    ///
    /// # Errors
    ///
    /// Returns [`TranscodeError::MalformedSamLine`] if the line has fewer than eleven
    /// columns or a numeric column cannot be parsed.
    pub fn parse(line: &str, line_number: u64, refs: &mut ReferenceDictionary) -> Result<Self> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
        if fields.len() < MANDATORY_FIELDS {
            return Err(TranscodeError::MalformedSamLine {
                line_number,
                reason: format!(
                    "expected at least {MANDATORY_FIELDS} columns, found {}",
                    fields.len()
                ),
            });
        }

        let rname = fields[2].to_string();
        let rid = if rname == "*" { None } else { Some(refs.get_or_insert(&rname)) };
        let rnext = fields[6].to_string();
        let mate_rid = match rnext.as_str() {
            "*" => None,
            "=" => rid,
            name => Some(refs.get_or_insert(name)),
        };

        Ok(Self {
            qname: fields[0].to_string(),
            flag: parse_field(fields[1], "FLAG", line_number)?,
            rname,
            rid,
            pos: parse_field(fields[3], "POS", line_number)?,
            mapq: parse_field(fields[4], "MAPQ", line_number)?,
            cigar: fields[5].to_string(),
            rnext,
            mate_rid,
            pnext: parse_field(fields[7], "PNEXT", line_number)?,
            tlen: parse_field(fields[8], "TLEN", line_number)?,
            seq: fields[9].to_string(),
            qual: fields[10].to_string(),
        })
    }

    #[inline]
    fn has(&self, bits: u16) -> bool {
        self.flag & bits == bits
    }

    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.has(flags::PAIRED)
    }

    /// Paired, flagged as a proper pair, and mapped.
    #[must_use]
    pub fn is_properly_paired(&self) -> bool {
        self.has(flags::PAIRED | flags::PROPER_PAIR) && !self.is_unmapped()
    }

    #[must_use]
    pub fn is_unmapped(&self) -> bool {
        self.has(flags::UNMAPPED)
    }

    #[must_use]
    pub fn is_mate_unmapped(&self) -> bool {
        self.has(flags::MATE_UNMAPPED)
    }

    #[must_use]
    pub fn is_reverse(&self) -> bool {
        self.has(flags::REVERSE)
    }

    #[must_use]
    pub fn is_mate_reverse(&self) -> bool {
        self.has(flags::MATE_REVERSE)
    }

    #[must_use]
    pub fn is_read1(&self) -> bool {
        self.has(flags::PAIRED | flags::FIRST_SEGMENT)
    }

    #[must_use]
    pub fn is_read2(&self) -> bool {
        self.has(flags::PAIRED | flags::LAST_SEGMENT)
    }

    #[must_use]
    pub fn is_secondary(&self) -> bool {
        self.has(flags::SECONDARY)
    }

    #[must_use]
    pub fn is_quality_fail(&self) -> bool {
        self.has(flags::QC_FAIL)
    }

    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.has(flags::DUPLICATE)
    }

    #[must_use]
    pub fn is_supplementary(&self) -> bool {
        self.has(flags::SUPPLEMENTARY)
    }

    /// Neither secondary nor supplementary.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.flag & flags::NON_PRIMARY == 0
    }

    /// Whether `self` and `other` are the two halves of one physical pairing.
    ///
    /// Both must be paired lines of the same primary-ness whose mapping states and
    /// positions point at each other. A zero `PNEXT` on either side carries no mate
    /// information and the positional match is accepted as is; otherwise the reference
    /// ids must also cross-match and exactly one of the two must be read 1.
    #[must_use]
    pub fn is_pair_of(&self, other: &Self) -> bool {
        if !self.is_paired() || !other.is_paired() {
            return false;
        }
        if self.is_primary() != other.is_primary() {
            return false;
        }
        if self.is_unmapped() != other.is_mate_unmapped()
            || other.is_unmapped() != self.is_mate_unmapped()
        {
            return false;
        }
        if self.pnext != other.pos || other.pnext != self.pos {
            return false;
        }
        if self.pnext == 0 || other.pnext == 0 {
            return true;
        }
        self.rid == other.mate_rid
            && other.rid == self.mate_rid
            && self.is_read1() != other.is_read1()
    }
}

impl fmt::Display for SamRecord {
    /// Formats the record as a tab-separated SAM line without a trailing newline.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.qname,
            self.flag,
            self.rname,
            self.pos,
            self.mapq,
            self.cigar,
            self.rnext,
            self.pnext,
            self.tlen,
            self.seq,
            self.qual
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(line: &str) -> SamRecord {
        SamRecord::parse(line, 1, &mut ReferenceDictionary::new()).unwrap()
    }

    #[test]
    fn test_parse_all_fields() {
        let mut refs = ReferenceDictionary::from_names(["chr1", "chr2"]);
        let line = "q1\t99\tchr2\t100\t60\t10M\t=\t150\t60\tACGTACGTAC\tFFFFFFFFFF\tNM:i:0";
        let rec = SamRecord::parse(line, 3, &mut refs).unwrap();
        assert_eq!(rec.qname, "q1");
        assert_eq!(rec.flag, 99);
        assert_eq!(rec.rid, Some(1));
        assert_eq!(rec.mate_rid, Some(1));
        assert_eq!(rec.pos, 100);
        assert_eq!(rec.mapq, 60);
        assert_eq!(rec.cigar, "10M");
        assert_eq!(rec.pnext, 150);
        assert_eq!(rec.tlen, 60);
        assert_eq!(rec.qual, "FFFFFFFFFF");
    }

    #[test]
    fn test_parse_registers_unknown_references() {
        let mut refs = ReferenceDictionary::from_names(["chr1"]);
        let rec =
            SamRecord::parse("q\t1\tchr3\t5\t0\t4M\tchr9\t7\t0\tACGT\t*", 1, &mut refs).unwrap();
        assert_eq!(rec.rid, Some(1));
        assert_eq!(rec.mate_rid, Some(2));
        assert_eq!(refs.names(), &["chr1", "chr3", "chr9"]);
    }

    #[test]
    fn test_parse_unmapped_has_no_reference() {
        let rec = parse("q\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t*");
        assert_eq!(rec.rid, None);
        assert_eq!(rec.mate_rid, None);
        assert!(rec.is_unmapped());
    }

    #[rstest]
    #[case("q\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT", "expected at least 11 columns")]
    #[case("q\tx\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\t*", "invalid FLAG")]
    #[case("q\t0\tchr1\t-1\t60\t4M\t*\t0\t0\tACGT\t*", "invalid POS")]
    #[case("q\t0\tchr1\t1\t300\t4M\t*\t0\t0\tACGT\t*", "invalid MAPQ")]
    #[case("q\t0\tchr1\t1\t60\t4M\t*\t0\tNaN\tACGT\t*", "invalid TLEN")]
    fn test_parse_malformed(#[case] line: &str, #[case] expected: &str) {
        let err = SamRecord::parse(line, 12, &mut ReferenceDictionary::new()).unwrap_err();
        assert!(matches!(err, TranscodeError::MalformedSamLine { line_number: 12, .. }));
        assert!(err.to_string().contains(expected), "{err}");
    }

    #[rstest]
    #[case(99, true, true, false, true, false)]
    #[case(147, true, true, false, false, true)]
    #[case(0x4, false, false, true, false, false)]
    #[case(0x1 | 0x4 | 0x40, true, false, true, true, false)]
    fn test_flag_predicates(
        #[case] flag: u16,
        #[case] paired: bool,
        #[case] proper: bool,
        #[case] unmapped: bool,
        #[case] read1: bool,
        #[case] read2: bool,
    ) {
        let rec = SamRecord { flag, ..SamRecord::default() };
        assert_eq!(rec.is_paired(), paired);
        assert_eq!(rec.is_properly_paired(), proper);
        assert_eq!(rec.is_unmapped(), unmapped);
        assert_eq!(rec.is_read1(), read1);
        assert_eq!(rec.is_read2(), read2);
    }

    #[rstest]
    #[case(0, true)]
    #[case(0x100, false)]
    #[case(0x800, false)]
    #[case(0x900, false)]
    fn test_is_primary(#[case] flag: u16, #[case] primary: bool) {
        assert_eq!(SamRecord { flag, ..SamRecord::default() }.is_primary(), primary);
    }

    #[test]
    fn test_read1_requires_paired_bit() {
        let rec = SamRecord { flag: 0x40, ..SamRecord::default() };
        assert!(!rec.is_read1());
    }

    #[test]
    fn test_is_pair_of_primary_pair() {
        let mut refs = ReferenceDictionary::new();
        let r1 = SamRecord::parse("q\t99\tchr1\t100\t60\t10M\t=\t150\t60\tA\t*", 1, &mut refs)
            .unwrap();
        let r2 = SamRecord::parse("q\t147\tchr1\t150\t60\t10M\t=\t100\t-60\tA\t*", 2, &mut refs)
            .unwrap();
        assert!(r1.is_pair_of(&r2));
        assert!(r2.is_pair_of(&r1));
    }

    #[test]
    fn test_is_pair_of_rejects_mixed_primary() {
        let mut refs = ReferenceDictionary::new();
        let r1 = SamRecord::parse("q\t355\tchr1\t100\t60\t10M\t=\t150\t60\tA\t*", 1, &mut refs)
            .unwrap();
        let r2 = SamRecord::parse("q\t147\tchr1\t150\t60\t10M\t=\t100\t-60\tA\t*", 2, &mut refs)
            .unwrap();
        assert!(!r1.is_pair_of(&r2));
    }

    #[test]
    fn test_is_pair_of_rejects_position_mismatch() {
        let mut refs = ReferenceDictionary::new();
        let r1 = SamRecord::parse("q\t99\tchr1\t100\t60\t10M\t=\t151\t60\tA\t*", 1, &mut refs)
            .unwrap();
        let r2 = SamRecord::parse("q\t147\tchr1\t150\t60\t10M\t=\t100\t-60\tA\t*", 2, &mut refs)
            .unwrap();
        assert!(!r1.is_pair_of(&r2));
    }

    #[test]
    fn test_is_pair_of_rejects_reference_mismatch() {
        let mut refs = ReferenceDictionary::new();
        let r1 = SamRecord::parse("q\t97\tchr1\t100\t60\t10M\tchr2\t150\t0\tA\t*", 1, &mut refs)
            .unwrap();
        let r2 = SamRecord::parse("q\t145\tchr1\t150\t60\t10M\tchr1\t100\t0\tA\t*", 2, &mut refs)
            .unwrap();
        assert!(!r1.is_pair_of(&r2));
    }

    #[test]
    fn test_is_pair_of_rejects_same_read_number() {
        let mut refs = ReferenceDictionary::new();
        let a = SamRecord::parse("q\t99\tchr1\t100\t60\t10M\t=\t150\t60\tA\t*", 1, &mut refs)
            .unwrap();
        let b = SamRecord::parse("q\t83\tchr1\t150\t60\t10M\t=\t100\t-60\tA\t*", 2, &mut refs)
            .unwrap();
        assert!(!a.is_pair_of(&b));
    }

    #[test]
    fn test_is_pair_of_accepts_zero_pnext() {
        let a = parse("q\t73\tchr1\t100\t60\t10M\t=\t0\t0\tA\t*");
        let b = parse("q\t133\t*\t0\t0\t*\t*\t100\t0\tA\t*");
        // a is mapped with unmapped mate, b is unmapped pointing at a
        assert!(a.is_pair_of(&b));
    }

    #[test]
    fn test_display_round_trips() {
        let line = "q1\t99\tchr1\t100\t60\t10M\t=\t150\t60\tACGTACGTAC\tFFFFFFFFFF";
        assert_eq!(parse(line).to_string(), line);
    }
}
