//! Reference sequence dictionary built from SAM `@SQ` header records.

use ahash::AHashMap;
use anyhow::{Context, Result};
use noodles::sam::{self, Header};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Numeric reference sequence id (0-based, in dictionary order).
pub type RefId = u32;

/// Bidirectional mapping between reference names and [`RefId`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceDictionary {
    names: Vec<String>,
    ids: AHashMap<String, RefId>,
}

impl ReferenceDictionary {
    /// Create an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dictionary from an iterator of names, assigning ids in order.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dict = Self::new();
        for name in names {
            dict.get_or_insert(&name.into());
        }
        dict
    }

    /// Build a dictionary from the `@SQ` records of `header`, in header order.
    #[must_use]
    pub fn from_header(header: &Header) -> Self {
        let mut dict = Self::new();
        for name in header.reference_sequences().keys() {
            dict.get_or_insert(&name.to_string());
        }
        dict
    }

    /// Read the `@SQ` records from the header of a SAM file.
    pub fn from_sam_header<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_sam_header(path).map(|header| Self::from_header(&header))
    }

    /// Look up the id of `name`, adding it to the end of the dictionary if unseen.
    pub fn get_or_insert(&mut self, name: &str) -> RefId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as RefId;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    /// The id of `name`, if known.
    #[must_use]
    pub fn id(&self, name: &str) -> Option<RefId> {
        self.ids.get(name).copied()
    }

    /// The name of reference `id`, if known.
    #[must_use]
    pub fn name(&self, id: RefId) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    /// The name of reference `id`, falling back to the decimal id for unknown references.
    #[must_use]
    pub fn name_or_id(&self, id: RefId) -> String {
        self.name(id).map_or_else(|| id.to_string(), str::to_string)
    }

    /// Number of references in the dictionary.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the dictionary holds no references.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Reference names in id order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Parse SAM header text (all `@` lines) into a [`Header`].
pub fn parse_sam_header(text: &str) -> Result<Header> {
    text.parse().context("Failed to parse SAM header")
}

/// Read the header of a SAM file.
///
/// Reading stops at the first line that is not a header line.
pub fn read_sam_header<P: AsRef<Path>>(path: P) -> Result<Header> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open SAM header file: {}", path.display()))?;
    sam::io::Reader::new(BufReader::new(file))
        .read_header()
        .with_context(|| format!("Failed to read SAM header from {}", path.display()))
}
