//! Fluent builders for SAM records, used to construct fixtures in tests.
//!
//! ```
//! use mgtranscode_lib::sam::{PairBuilder, RecordBuilder};
//!
//! let single = RecordBuilder::new().name("r1").reference("chr1", 0).position(100).build();
//! assert_eq!(single.pos, 100);
//!
//! let (r1, r2) = PairBuilder::new("q1").r1("chr1", 0, 100).r2("chr1", 0, 150).build();
//! assert_eq!(r1.flag, 99);
//! assert_eq!(r2.flag, 147);
//! ```

use crate::cigar::mapped_length;
use crate::sam::flags;
use crate::sam::header::RefId;
use crate::sam::record::SamRecord;

const DEFAULT_SEQUENCE: &str = "ACGTACGTAC";
const DEFAULT_QUALITIES: &str = "FFFFFFFFFF";

/// Builder for a single [`SamRecord`].
///
/// Defaults to a mapped-looking single-end record with a `10M` CIGAR, MAPQ 60 and a
/// ten base sequence; no reference is set until [`RecordBuilder::reference`] is called.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: SamRecord,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            record: SamRecord {
                qname: "read".to_string(),
                mapq: 60,
                cigar: "10M".to_string(),
                seq: DEFAULT_SEQUENCE.to_string(),
                qual: DEFAULT_QUALITIES.to_string(),
                ..SamRecord::default()
            },
        }
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.record.qname = name.to_string();
        self
    }

    #[must_use]
    pub fn flags(mut self, flag: u16) -> Self {
        self.record.flag = flag;
        self
    }

    #[must_use]
    pub fn reference(mut self, name: &str, id: RefId) -> Self {
        self.record.rname = name.to_string();
        self.record.rid = Some(id);
        self
    }

    #[must_use]
    pub fn position(mut self, pos: u32) -> Self {
        self.record.pos = pos;
        self
    }

    #[must_use]
    pub fn mapq(mut self, mapq: u8) -> Self {
        self.record.mapq = mapq;
        self
    }

    #[must_use]
    pub fn cigar(mut self, cigar: &str) -> Self {
        self.record.cigar = cigar.to_string();
        self
    }

    /// Set `RNEXT`/`PNEXT`. Pass `"="` to point at the record's own reference.
    #[must_use]
    pub fn mate(mut self, name: &str, id: Option<RefId>, pos: u32) -> Self {
        self.record.rnext = name.to_string();
        self.record.mate_rid = if name == "=" { self.record.rid } else { id };
        self.record.pnext = pos;
        self
    }

    #[must_use]
    pub fn tlen(mut self, tlen: i32) -> Self {
        self.record.tlen = tlen;
        self
    }

    #[must_use]
    pub fn sequence(mut self, seq: &str) -> Self {
        self.record.seq = seq.to_string();
        self
    }

    #[must_use]
    pub fn qualities(mut self, qual: &str) -> Self {
        self.record.qual = qual.to_string();
        self
    }

    /// Mark the record unmapped and clear its alignment fields.
    #[must_use]
    pub fn unmapped(mut self) -> Self {
        self.record.flag |= flags::UNMAPPED;
        self.record.rname = "*".to_string();
        self.record.rid = None;
        self.record.pos = 0;
        self.record.mapq = 0;
        self.record.cigar = "*".to_string();
        self
    }

    #[must_use]
    pub fn build(self) -> SamRecord {
        self.record
    }
}

type Locus = (String, RefId, u32);

/// Builder for the two primary records of a read pair.
///
/// Read 1 is placed on the forward strand and read 2 on the reverse strand. A read
/// without a locus is built unmapped. Mate fields, `TLEN` and the proper-pair bit are
/// derived from the two loci.
#[derive(Debug, Clone)]
pub struct PairBuilder {
    name: String,
    r1: Option<Locus>,
    r2: Option<Locus>,
    cigar: String,
    sequence: String,
    qualities: String,
    extra_flags: u16,
}

impl PairBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            r1: None,
            r2: None,
            cigar: "10M".to_string(),
            sequence: DEFAULT_SEQUENCE.to_string(),
            qualities: DEFAULT_QUALITIES.to_string(),
            extra_flags: 0,
        }
    }

    #[must_use]
    pub fn r1(mut self, reference: &str, id: RefId, pos: u32) -> Self {
        self.r1 = Some((reference.to_string(), id, pos));
        self
    }

    #[must_use]
    pub fn r2(mut self, reference: &str, id: RefId, pos: u32) -> Self {
        self.r2 = Some((reference.to_string(), id, pos));
        self
    }

    #[must_use]
    pub fn cigar(mut self, cigar: &str) -> Self {
        self.cigar = cigar.to_string();
        self
    }

    #[must_use]
    pub fn sequence(mut self, seq: &str, qual: &str) -> Self {
        self.sequence = seq.to_string();
        self.qualities = qual.to_string();
        self
    }

    /// Additional flag bits applied to both reads (e.g. secondary or duplicate).
    #[must_use]
    pub fn flags(mut self, extra: u16) -> Self {
        self.extra_flags = extra;
        self
    }

    #[must_use]
    pub fn build(self) -> (SamRecord, SamRecord) {
        let r1 = self.read(self.r1.as_ref(), self.r2.as_ref(), true);
        let r2 = self.read(self.r2.as_ref(), self.r1.as_ref(), false);
        (r1, r2)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn read(&self, own: Option<&Locus>, mate: Option<&Locus>, is_read1: bool) -> SamRecord {
        let mut flag = flags::PAIRED | self.extra_flags;
        flag |= if is_read1 { flags::FIRST_SEGMENT } else { flags::LAST_SEGMENT };
        if own.is_none() {
            flag |= flags::UNMAPPED;
        } else if !is_read1 {
            flag |= flags::REVERSE;
        }
        if mate.is_none() {
            flag |= flags::MATE_UNMAPPED;
        } else if is_read1 {
            flag |= flags::MATE_REVERSE;
        }

        let mut record = RecordBuilder::new()
            .name(&self.name)
            .cigar(&self.cigar)
            .sequence(&self.sequence)
            .qualities(&self.qualities)
            .build();

        if let Some((name, id, pos)) = own {
            record.rname.clone_from(name);
            record.rid = Some(*id);
            record.pos = *pos;
        } else {
            record.mapq = 0;
            record.cigar = "*".to_string();
        }

        if let Some((name, id, pos)) = mate {
            record.rnext = if own.is_some_and(|(_, own_id, _)| own_id == id) {
                "=".to_string()
            } else {
                name.clone()
            };
            record.mate_rid = Some(*id);
            record.pnext = *pos;
        }

        if let (Some((_, own_id, own_pos)), Some((_, mate_id, mate_pos))) = (own, mate) {
            if own_id == mate_id {
                flag |= flags::PROPER_PAIR;
                let len = mapped_length(&self.cigar) as i64;
                let start = i64::from(*own_pos.min(mate_pos));
                let end = i64::from(*own_pos.max(mate_pos)) + len;
                let span = (end - start) as i32;
                let own_is_left = own_pos < mate_pos || (own_pos == mate_pos && is_read1);
                record.tlen = if own_is_left { span } else { -span };
            }
        }

        record.flag = flag;
        record
    }
}
