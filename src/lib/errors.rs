//! Custom error types for mgtranscode operations.

use thiserror::Error;

/// Result type alias for mgtranscode operations
pub type Result<T> = std::result::Result<T, TranscodeError>;

/// Error type for transcoding operations.
///
/// None of these are recoverable mid-stream: the transcoder is an all-or-nothing batch
/// process and every variant terminates the run.
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// A SAM text line could not be parsed
    #[error("Malformed SAM line {line_number}: {reason}")]
    MalformedSamLine {
        /// 1-based line number in the input
        line_number: u64,
        /// Explanation of the problem
        reason: String,
    },

    /// A CIGAR or ECIGAR string contained an operation that cannot be transcoded
    #[error("Invalid CIGAR token '{token}' in '{cigar}'")]
    InvalidCigarToken {
        /// The offending operation byte
        token: char,
        /// The full string being converted
        cigar: String,
    },

    /// A split alignment of the wrong kind was found where a specific kind is required
    #[error("Unsupported split alignment for '{read_name}' segment {segment}: {reason}")]
    UnsupportedSplit {
        /// Read name of the record
        read_name: String,
        /// Segment being reconstructed
        segment: usize,
        /// Explanation of the problem
        reason: String,
    },

    /// A QNAME group did not fall into any record category
    #[error("Invalid record group '{qname}': {reason}")]
    InvalidGroup {
        /// The shared QNAME of the group
        qname: String,
        /// Explanation of the problem
        reason: String,
    },

    /// A paired record had neither the first nor the last segment flag set
    #[error("Record '{qname}' is paired but flagged as neither read 1 nor read 2")]
    NeitherRead1NorRead2 {
        /// The record's QNAME
        qname: String,
    },

    /// A record with an unexpected class was re-ingested during the merge phase
    #[error("Record '{read_name}' has class {class} which cannot be position sorted")]
    InvalidClass {
        /// Read name of the record
        read_name: String,
        /// The class that was found
        class: String,
    },

    /// An encoded record could not be decoded
    #[error("Invalid record: {reason}")]
    InvalidRecord {
        /// Explanation of the problem
        reason: String,
    },

    /// The operation was cancelled by its caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "SAM", "mgrec")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },
}
