//! Grouping of SAM records by QNAME and classification of the groups.
//!
//! The converter works on all lines of one template at a time. [`QnameGroups`] turns a
//! QNAME-ordered record stream into [`ReadGroup`]s; each group buckets its records by
//! [`ReadIndex`] and is classified into exactly one [`RecordCategory`] that selects
//! the conversion path.

use anyhow::Result;
use std::iter::Peekable;

use crate::sam::SamRecord;

/// Bucket a record is placed in within its [`ReadGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadIndex {
    /// Unpaired and unmapped.
    Unmapped,
    /// Unpaired and mapped.
    Single,
    PairRead1Primary,
    PairRead2Primary,
    PairRead1NonPrimary,
    PairRead2NonPrimary,
    /// Paired but neither read 1 nor read 2.
    Unknown,
}

impl ReadIndex {
    /// Bucket for `record`.
    ///
    /// Paired records are bucketed by read number whether or not they are mapped; the
    /// paired-end conversion resolves their mapping state.
    #[must_use]
    pub fn of(record: &SamRecord) -> Self {
        if !record.is_paired() {
            return if record.is_unmapped() { Self::Unmapped } else { Self::Single };
        }
        match (record.is_read1(), record.is_read2(), record.is_primary()) {
            (true, _, true) => Self::PairRead1Primary,
            (true, _, false) => Self::PairRead1NonPrimary,
            (false, true, true) => Self::PairRead2Primary,
            (false, true, false) => Self::PairRead2NonPrimary,
            (false, false, _) => Self::Unknown,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Conversion path selected for a [`ReadGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCategory {
    Unmapped,
    Single,
    Paired,
    Invalid,
}

/// All SAM lines sharing one QNAME, bucketed by [`ReadIndex`].
#[derive(Debug, Clone, Default)]
pub struct ReadGroup {
    qname: String,
    buckets: [Vec<SamRecord>; 7],
}

impl ReadGroup {
    #[must_use]
    pub fn new(qname: impl Into<String>) -> Self {
        Self { qname: qname.into(), buckets: Default::default() }
    }

    /// Build a group from records that all share the same QNAME.
    #[must_use]
    pub fn from_records(records: Vec<SamRecord>) -> Self {
        let qname = records.first().map(|r| r.qname.clone()).unwrap_or_default();
        let mut group = Self::new(qname);
        for record in records {
            group.add_record(record);
        }
        group
    }

    #[must_use]
    pub fn qname(&self) -> &str {
        &self.qname
    }

    /// Move `record` into its bucket.
    pub fn add_record(&mut self, record: SamRecord) {
        self.buckets[ReadIndex::of(&record).slot()].push(record);
    }

    #[must_use]
    pub fn bucket(&self, index: ReadIndex) -> &[SamRecord] {
        &self.buckets[index.slot()]
    }

    /// Take ownership of a bucket's records, leaving it empty.
    pub fn take(&mut self, index: ReadIndex) -> Vec<SamRecord> {
        std::mem::take(&mut self.buckets[index.slot()])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    fn has(&self, index: ReadIndex) -> bool {
        !self.buckets[index.slot()].is_empty()
    }

    /// Decide the conversion path for this group.
    ///
    /// Exactly one category applies to any group:
    /// - `Unmapped`: a single unpaired unmapped record and nothing else
    /// - `Single`: unpaired mapped records only
    /// - `Paired`: both primary reads present, no unpaired records
    /// - `Invalid`: anything else, including records with an unknown read number
    #[must_use]
    pub fn classify(&self) -> RecordCategory {
        use ReadIndex::{
            PairRead1NonPrimary, PairRead1Primary, PairRead2NonPrimary, PairRead2Primary, Single,
            Unknown, Unmapped,
        };

        if self.has(Unknown) {
            return RecordCategory::Invalid;
        }
        let any_pair = [PairRead1Primary, PairRead2Primary, PairRead1NonPrimary, PairRead2NonPrimary]
            .into_iter()
            .any(|i| self.has(i));

        if self.bucket(Unmapped).len() == 1 && !self.has(Single) && !any_pair {
            RecordCategory::Unmapped
        } else if self.has(Single) && !self.has(Unmapped) && !any_pair {
            RecordCategory::Single
        } else if self.has(PairRead1Primary)
            && self.has(PairRead2Primary)
            && !self.has(Unmapped)
            && !self.has(Single)
        {
            RecordCategory::Paired
        } else {
            RecordCategory::Invalid
        }
    }
}

/// Iterator adaptor yielding consecutive runs of same-QNAME records as [`ReadGroup`]s.
///
/// Input must be grouped by QNAME; a QNAME that reappears after a different one starts
/// a new group.
pub struct QnameGroups<I: Iterator<Item = Result<SamRecord>>> {
    records: Peekable<I>,
}

impl<I: Iterator<Item = Result<SamRecord>>> QnameGroups<I> {
    pub fn new(records: I) -> Self {
        Self { records: records.peekable() }
    }
}

impl<I: Iterator<Item = Result<SamRecord>>> Iterator for QnameGroups<I> {
    type Item = Result<ReadGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };
        let mut group = ReadGroup::new(first.qname.clone());
        group.add_record(first);

        while let Some(Ok(next)) = self.records.peek() {
            if next.qname != group.qname {
                break;
            }
            if let Some(Ok(record)) = self.records.next() {
                group.add_record(record);
            }
        }
        // A pending error is returned with the following call
        Some(Ok(group))
    }
}
