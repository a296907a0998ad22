//! Two-phase external sort of transcoded records.
//!
//! Turns a QNAME-grouped SAM stream of any size into an mgrec stream ordered by
//! reference and then by leftmost mapped position, holding at most one bounded buffer
//! of records in memory.
//!
//! # Algorithm
//!
//! 1. **Phase 1** (bucketed local sort): QNAME groups are converted (and optionally
//!    cleaned) into a buffer of at most `buffer_size` records. When the buffer fills or
//!    the input ends, records without an alignment are appended to the pass-through
//!    chunk; the rest are partitioned by the reference of their first alignment, each
//!    partition is stably sorted by `min_pos` and written to a fresh sub-chunk.
//! 2. **Phase 2** (k-way merge): for every reference the sub-chunks are merged with a
//!    binary heap into one position-ordered chunk. Ties go to the earlier sub-chunk, so
//!    records with equal positions keep their input order. References are merged in
//!    parallel when more than one thread is configured.
//! 3. **Concatenation**: merged references in id order, then the pass-through chunk.
//!
//! # Scratch files
//!
//! All files live in a fresh [`TempDir`] created inside the configured temporary
//! directory:
//!
//! | File | Contents |
//! |------|----------|
//! | `unmapped.phase1.mgrec` | records without alignment, in arrival order |
//! | `<ref_id>.<n>.phase2.tmp` | `n`-th sorted sub-chunk of a reference |
//! | `<ref_id>.phase2.mgrec` | merged records of a reference |
//!
//! Every file is owned by a [`Chunk`] guard, so nothing is left behind on success,
//! on error or on cancellation.

use anyhow::{Context, Result};
use log::{debug, info};
use rayon::ThreadPool;
use rayon::prelude::*;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

use crate::cancel::CancellationToken;
use crate::cleaner::{CleanStatistics, clean_record};
use crate::errors::TranscodeError;
use crate::grouper::QnameGroups;
use crate::logging::OperationTimer;
use crate::mgrec::MpeggRecord;
use crate::progress::ProgressTracker;
use crate::sam::{RefId, SamReader};
use crate::sam_to_mgrec::ConversionOptions;
use crate::sort::chunk::{Chunk, ChunkReader, ChunkWriter};
use crate::validation::{
    validate_directory, validate_file_exists, validate_output_parent, validate_positive,
};

/// Default number of records buffered in memory during phase 1.
pub const PHASE2_BUFFER_SIZE: usize = 500_000;

/// Name of the pass-through chunk holding records without alignment.
pub const UNMAPPED_CHUNK_NAME: &str = "unmapped.phase1.mgrec";

const OUTPUT_BUFFER_SIZE: usize = 256 * 1024;

/// Name of the `n`-th sorted sub-chunk of a reference.
#[must_use]
pub fn sub_chunk_name(ref_id: RefId, n: usize) -> String {
    format!("{ref_id}.{n}.phase2.tmp")
}

/// Name of the merged chunk of a reference.
#[must_use]
pub fn merged_chunk_name(ref_id: RefId) -> String {
    format!("{ref_id}.phase2.mgrec")
}

/// Settings for a [`Transcoder`].
#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    /// Maximum number of records held in memory during phase 1.
    pub buffer_size: usize,
    /// Directory in which the scratch directory is created; the system default if unset.
    pub temp_dir: Option<PathBuf>,
    /// Threads for buffer sorts and per-reference merges.
    pub threads: usize,
    /// Simplify records with [`clean_record`] before sorting.
    pub clean: bool,
    /// Store the reads of a pair in separate records even on one reference.
    pub force_split: bool,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self { buffer_size: PHASE2_BUFFER_SIZE, temp_dir: None, threads: 1, clean: false, force_split: false }
    }
}

impl TranscodeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn buffer_size(mut self, records: usize) -> Self {
        self.buffer_size = records;
        self
    }

    #[must_use]
    pub fn temp_dir(mut self, path: PathBuf) -> Self {
        self.temp_dir = Some(path);
        self
    }

    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    #[must_use]
    pub fn clean(mut self, enabled: bool) -> Self {
        self.clean = enabled;
        self
    }

    #[must_use]
    pub fn force_split(mut self, enabled: bool) -> Self {
        self.force_split = enabled;
        self
    }

    /// Check that the settings can be used.
    pub fn validate(&self) -> crate::errors::Result<()> {
        validate_positive(self.buffer_size, "buffer-size")?;
        validate_positive(self.threads, "threads")?;
        validate_directory(self.temp_dir.as_ref(), "temporary directory")
    }
}

/// Counts collected over a transcode.
#[derive(Debug, Default, Clone)]
pub struct TranscodeStats {
    /// SAM records read from the input.
    pub sam_records: u64,
    /// QNAME groups converted.
    pub read_groups: u64,
    /// Records written to the output.
    pub output_records: u64,
    /// Records with at least one alignment.
    pub mapped_records: u64,
    /// Records without alignment.
    pub unmapped_records: u64,
    /// Sorted sub-chunks written by phase 1.
    pub sub_chunks_written: u64,
    /// References with at least one mapped record.
    pub references: usize,
    /// Changes made by clean mode.
    pub clean: CleanStatistics,
}

/// Scratch state handed from phase 1 to phase 2.
pub struct Phase1Output {
    /// Sorted sub-chunks per reference, in creation order.
    pub sub_chunks: BTreeMap<RefId, Vec<Chunk>>,
    /// Records without alignment, if there were any.
    pub unmapped: Option<Chunk>,
    pub stats: TranscodeStats,
}

/// SAM to mgrec transcoder with an out-of-core position sort.
///
/// # Example
///
/// ```no_run
/// use mgtranscode_lib::sort::{TranscodeOptions, Transcoder};
/// use std::path::Path;
///
/// # fn main() -> anyhow::Result<()> {
/// let options = TranscodeOptions::new().buffer_size(100_000).threads(4);
/// let stats = Transcoder::new(options).transcode(Path::new("in.sam"), Path::new("out.mgrec"))?;
/// println!("{} records", stats.output_records);
/// # Ok(())
/// # }
/// ```
pub struct Transcoder {
    options: TranscodeOptions,
    cancellation: CancellationToken,
}

impl Transcoder {
    #[must_use]
    pub fn new(options: TranscodeOptions) -> Self {
        Self { options, cancellation: CancellationToken::new() }
    }

    /// Use `token` to stop the transcode from elsewhere.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[must_use]
    pub fn options(&self) -> &TranscodeOptions {
        &self.options
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Transcode the SAM file `input` into the position-sorted mgrec file `output`.
    pub fn transcode(&self, input: &Path, output: &Path) -> Result<TranscodeStats> {
        validate_file_exists(input, "input SAM")?;
        validate_output_parent(output, "output mgrec")?;
        let reader = SamReader::from_path(input)?;
        self.transcode_reader(reader, output)
    }

    /// Transcode an already opened SAM stream into `output`.
    pub fn transcode_reader<R: BufRead>(
        &self,
        reader: SamReader<R>,
        output: &Path,
    ) -> Result<TranscodeStats> {
        self.options.validate()?;
        info!("Buffer size: {} records", self.options.buffer_size);
        info!("Threads: {}", self.options.threads);

        let scratch = self.create_temp_dir()?;
        debug!("Scratch directory: {}", scratch.path().display());

        let Phase1Output { sub_chunks, unmapped, mut stats } = self.phase1(reader, scratch.path())?;
        let merged = self.phase2(scratch.path(), sub_chunks)?;
        self.cancellation.check()?;

        let timer = OperationTimer::new("Writing output");
        stats.output_records = concatenate(merged.iter().chain(unmapped.as_ref()), output)?;
        timer.log_completion(stats.output_records);
        Ok(stats)
    }

    /// Convert, bucket and locally sort all records of `reader` into scratch files in `dir`.
    pub fn phase1<R: BufRead>(&self, reader: SamReader<R>, dir: &Path) -> Result<Phase1Output> {
        let timer = OperationTimer::new("Phase 1: converting and bucketing records");
        let pool = self.thread_pool()?;
        let conversion = ConversionOptions { force_split: self.options.force_split };
        let progress = ProgressTracker::new("Read SAM records");
        let mut bucketer = Bucketer::new(dir, self.options.buffer_size, pool.as_ref())?;
        let mut stats = TranscodeStats::default();

        for group in QnameGroups::new(reader) {
            self.cancellation.check()?;
            let group = group?;
            let n = group.len() as u64;
            stats.sam_records += n;
            stats.read_groups += 1;

            for record in group.convert(&conversion)? {
                if self.options.clean {
                    for cleaned in clean_record(record, &mut stats.clean) {
                        bucketer.push(cleaned)?;
                    }
                } else {
                    bucketer.push(record)?;
                }
            }
            progress.log_if_needed(n);
        }
        progress.log_final();

        let Bucketed { sub_chunks, unmapped, mapped_records } = bucketer.finish()?;
        stats.mapped_records = mapped_records;
        stats.unmapped_records = unmapped.as_ref().map_or(0, Chunk::records);
        stats.sub_chunks_written = sub_chunks.values().map(|c| c.len() as u64).sum();
        stats.references = sub_chunks.len();
        timer.log_completion(stats.sam_records);

        Ok(Phase1Output { sub_chunks, unmapped, stats })
    }

    /// Merge the sub-chunks of every reference, returning the merged chunks in
    /// reference order. Every sub-chunk is removed.
    pub fn phase2(&self, dir: &Path, sub_chunks: BTreeMap<RefId, Vec<Chunk>>) -> Result<Vec<Chunk>> {
        let timer = OperationTimer::new("Phase 2: merging sub-chunks");
        let work: Vec<(RefId, Vec<Chunk>)> = sub_chunks.into_iter().collect();
        let cancel = &self.cancellation;

        let merged = match self.thread_pool()? {
            Some(pool) => pool.install(|| {
                work.into_par_iter()
                    .map(|(ref_id, chunks)| merge_reference(dir, ref_id, chunks, cancel))
                    .collect::<Result<Vec<_>>>()
            })?,
            None => work
                .into_iter()
                .map(|(ref_id, chunks)| merge_reference(dir, ref_id, chunks, cancel))
                .collect::<Result<Vec<_>>>()?,
        };

        timer.log_completion(merged.iter().map(Chunk::records).sum());
        Ok(merged)
    }

    fn thread_pool(&self) -> Result<Option<ThreadPool>> {
        if self.options.threads <= 1 {
            return Ok(None);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .build()
            .context("Failed to build thread pool")?;
        Ok(Some(pool))
    }

    fn create_temp_dir(&self) -> Result<TempDir> {
        match &self.options.temp_dir {
            Some(base) => TempDir::new_in(base).context("Failed to create temp directory"),
            None => TempDir::new().context("Failed to create temp directory"),
        }
    }
}

/// Result of phase 1 bucketing.
struct Bucketed {
    sub_chunks: BTreeMap<RefId, Vec<Chunk>>,
    unmapped: Option<Chunk>,
    mapped_records: u64,
}

/// The bounded phase 1 buffer and the scratch files it spills into.
struct Bucketer<'a> {
    dir: &'a Path,
    capacity: usize,
    pool: Option<&'a ThreadPool>,
    buffer: Vec<MpeggRecord>,
    sub_chunks: BTreeMap<RefId, Vec<Chunk>>,
    unmapped: ChunkWriter,
    mapped_records: u64,
}

impl<'a> Bucketer<'a> {
    fn new(dir: &'a Path, capacity: usize, pool: Option<&'a ThreadPool>) -> Result<Self> {
        Ok(Self {
            dir,
            capacity,
            pool,
            buffer: Vec::with_capacity(capacity.min(PHASE2_BUFFER_SIZE)),
            sub_chunks: BTreeMap::new(),
            unmapped: ChunkWriter::create(dir.join(UNMAPPED_CHUNK_NAME))?,
            mapped_records: 0,
        })
    }

    fn push(&mut self, record: MpeggRecord) -> Result<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let mut buffer = std::mem::take(&mut self.buffer);
        let mut partitions: BTreeMap<RefId, Vec<MpeggRecord>> = BTreeMap::new();
        for record in buffer.drain(..) {
            match record.reference() {
                Some(ref_id) => partitions.entry(ref_id).or_default().push(record),
                None => self.unmapped.write(&record)?,
            }
        }
        self.buffer = buffer;

        for (ref_id, mut records) in partitions {
            match self.pool {
                Some(pool) => pool.install(|| records.par_sort_by_key(MpeggRecord::min_pos)),
                None => records.sort_by_key(MpeggRecord::min_pos),
            }
            let chunks = self.sub_chunks.entry(ref_id).or_default();
            let path = self.dir.join(sub_chunk_name(ref_id, chunks.len()));
            let chunk = Chunk::write(path, &records)?;
            debug!("Wrote {} records to {}", chunk.records(), chunk.path().display());
            self.mapped_records += chunk.records();
            chunks.push(chunk);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Bucketed> {
        self.flush()?;
        let unmapped = self.unmapped.finish()?;
        let unmapped = if unmapped.records() > 0 { Some(unmapped) } else { None };
        Ok(Bucketed { sub_chunks: self.sub_chunks, unmapped, mapped_records: self.mapped_records })
    }
}

/// Merge position: leftmost mapped coordinate of a re-ingested record.
fn merge_key(record: &MpeggRecord) -> crate::errors::Result<u64> {
    if !record.class_type.is_aligned() {
        return Err(TranscodeError::InvalidClass {
            read_name: record.read_name.clone(),
            class: record.class_type.to_string(),
        });
    }
    record.min_pos().ok_or_else(|| TranscodeError::InvalidRecord {
        reason: format!("record '{}' of class {} has no alignment", record.read_name, record.class_type),
    })
}

/// Entry in the merge heap.
#[derive(Debug)]
struct HeapEntry {
    key: u64,
    chunk_idx: usize,
    record: MpeggRecord,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key).then(self.chunk_idx.cmp(&other.chunk_idx))
    }
}

/// Read the next record of the sub-chunk in `slot` onto the heap, closing and removing
/// the sub-chunk once it is exhausted.
fn advance(
    slot: &mut Option<ChunkReader>,
    chunk_idx: usize,
    heap: &mut BinaryHeap<Reverse<HeapEntry>>,
) -> Result<()> {
    let Some(reader) = slot.as_mut() else {
        return Ok(());
    };
    match reader.next_record()? {
        Some(record) => {
            let key = merge_key(&record)?;
            heap.push(Reverse(HeapEntry { key, chunk_idx, record }));
        }
        None => *slot = None,
    }
    Ok(())
}

/// K-way merge of the sorted sub-chunks of one reference into `<ref_id>.phase2.mgrec`.
fn merge_reference(
    dir: &Path,
    ref_id: RefId,
    chunks: Vec<Chunk>,
    cancel: &CancellationToken,
) -> Result<Chunk> {
    let n_chunks = chunks.len();
    let mut writer = ChunkWriter::create(dir.join(merged_chunk_name(ref_id)))?;
    let mut readers: Vec<Option<ChunkReader>> =
        chunks.into_iter().map(|chunk| ChunkReader::new(chunk).map(Some)).collect::<Result<_>>()?;

    let mut heap = BinaryHeap::with_capacity(n_chunks);
    for (chunk_idx, slot) in readers.iter_mut().enumerate() {
        advance(slot, chunk_idx, &mut heap)?;
    }

    while let Some(Reverse(entry)) = heap.pop() {
        cancel.check()?;
        writer.write(&entry.record)?;
        advance(&mut readers[entry.chunk_idx], entry.chunk_idx, &mut heap)?;
    }
    drop(readers);

    let merged = writer.finish()?;
    debug!("Merged {n_chunks} sub-chunks of reference {ref_id} into {} records", merged.records());
    Ok(merged)
}

/// Append the contents of `chunks` to a new file at `output`, returning the record count.
fn concatenate<'a, I>(chunks: I, output: &Path) -> Result<u64>
where
    I: IntoIterator<Item = &'a Chunk>,
{
    let output_dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = NamedTempFile::new_in(output_dir).with_context(|| {
        format!("Failed to create temporary output in {}", output_dir.display())
    })?;
    let mut out = BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, staged);

    let mut records = 0;
    for chunk in chunks {
        let mut input = File::open(chunk.path())
            .with_context(|| format!("Failed to open scratch file {}", chunk.path().display()))?;
        std::io::copy(&mut input, &mut out)
            .with_context(|| format!("Failed to write output file: {}", output.display()))?;
        records += chunk.records();
    }
    let staged = out
        .into_inner()
        .map_err(|e| e.into_error())
        .with_context(|| format!("Failed to flush output file: {}", output.display()))?;
    staged
        .persist(output)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    Ok(records)
}
