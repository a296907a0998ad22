//! SAM text record model, header dictionary and streaming reader.
//!
//! This module provides the input side of the transcoder:
//! - [`record::SamRecord`] - one parsed alignment line with its flag predicates
//! - [`header::ReferenceDictionary`] - reference name to numeric id mapping
//! - [`reader::SamReader`] - streaming line reader that resolves reference ids
//! - [`program`] - `@PG` record added to exported headers
//! - [`builder`] - fluent builders for constructing records in tests
//!
//! # Reference ids
//!
//! Reference ids are assigned from `@SQ` header lines in header order. Names that
//! appear in records but not in the header are appended to the dictionary in the order
//! they are first seen, so every mapped record resolves to an id.

pub mod builder;
pub mod flags;
pub mod header;
pub mod program;
pub mod reader;
pub mod record;

pub use builder::{PairBuilder, RecordBuilder};
pub use header::{RefId, ReferenceDictionary};
pub use reader::SamReader;
pub use record::SamRecord;
