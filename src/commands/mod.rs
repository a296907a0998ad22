//! CLI command implementations for mgtranscode.
//!
//! - [`transcode`] - Convert QNAME-grouped SAM into position-sorted mgrec
//! - [`export`] - Convert mgrec back into SAM text

#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::uninlined_format_args
)]

pub mod command;
pub mod export;
pub mod transcode;
