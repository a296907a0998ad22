//! Out-of-core position sort of mgrec records.
//!
//! SAM input arrives grouped by read name; downstream container packaging needs records
//! ordered by reference and position. This module converts the stream and sorts it
//! with bounded memory:
//!
//! 1. **Phase 1**: convert QNAME groups into a bounded buffer, spill sorted per-reference
//!    sub-chunks and pass unmapped records straight through
//! 2. **Phase 2**: k-way merge of each reference's sub-chunks using a min-heap
//! 3. **Concatenation**: references in id order, unmapped records last
//!
//! Scratch files are owned by [`Chunk`] guards and removed on every exit path.

pub mod chunk;
pub mod external;

pub use chunk::{Chunk, ChunkReader, ChunkWriter};
pub use external::{
    PHASE2_BUFFER_SIZE, Phase1Output, TranscodeOptions, TranscodeStats, Transcoder,
    UNMAPPED_CHUNK_NAME, merged_chunk_name, sub_chunk_name,
};
