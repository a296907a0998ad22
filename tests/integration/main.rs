//! Integration tests for mgtranscode.
//!
//! These tests run the `mgtranscode` binary and the library end to end: SAM in,
//! sorted mgrec out, and back to SAM again.

mod helpers;
mod test_error_paths;
mod test_round_trip;
mod test_transcode_command;
